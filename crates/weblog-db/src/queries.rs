use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};

use weblog_types::models::User;

use crate::Database;
use crate::encode::{encode_ts, now};
use crate::models::UserRow;

impl Database {
    // -- Users --

    /// Insert a user and return its id. Fails on a duplicate username
    /// (UNIQUE constraint).
    pub fn create_user(&self, username: &str, password_hash: &str, nickname: &str) -> Result<i64> {
        self.with_conn(|conn| insert_user(conn, username, password_hash, nickname))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_username(conn, username))
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    /// Batch-fetch users for a set of ids. Missing ids are skipped.
    pub fn get_users_by_ids(&self, ids: &[i64]) -> Result<Vec<User>> {
        self.with_conn(|conn| query_users_by_ids(conn, ids))
    }

    /// Set a new nickname. `None` if the user does not exist.
    pub fn update_user(&self, id: i64, nickname: &str) -> Result<Option<User>> {
        self.with_conn(|conn| update_user(conn, id, nickname))
    }

    /// Replace the stored password hash. Returns false if the user does not
    /// exist.
    pub fn update_password(&self, id: i64, password_hash: &str) -> Result<bool> {
        self.with_conn(|conn| update_password(conn, id, password_hash))
    }
}

pub fn insert_user(conn: &Connection, username: &str, password_hash: &str, nickname: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO users (username, password, nickname, created_at) VALUES (?1, ?2, ?3, ?4)",
        (username, password_hash, nickname, encode_ts(&now())),
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn query_user_by_username(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {} FROM users WHERE username = ?1", UserRow::COLUMNS);
    let row = conn
        .query_row(&sql, [username], UserRow::from_row)
        .optional()?;
    Ok(row)
}

pub fn query_user_by_id(conn: &Connection, id: i64) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?1", UserRow::COLUMNS);
    let row = conn.query_row(&sql, [id], UserRow::from_row).optional()?;
    Ok(row)
}

pub fn query_users_by_ids(conn: &Connection, ids: &[i64]) -> Result<Vec<User>> {
    if ids.is_empty() {
        return Ok(vec![]);
    }

    let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "SELECT {} FROM users WHERE id IN ({})",
        UserRow::COLUMNS,
        placeholders.join(", ")
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(ids.iter()), UserRow::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter().map(UserRow::into_user).collect()
}

pub fn update_user(conn: &Connection, id: i64, nickname: &str) -> Result<Option<User>> {
    let changed = conn.execute("UPDATE users SET nickname = ?2 WHERE id = ?1", (id, nickname))?;
    if changed == 0 {
        return Ok(None);
    }
    query_user_by_id(conn, id)?.map(UserRow::into_user).transpose()
}

pub fn update_password(conn: &Connection, id: i64, password_hash: &str) -> Result<bool> {
    let changed = conn.execute("UPDATE users SET password = ?2 WHERE id = ?1", (id, password_hash))?;
    Ok(changed > 0)
}
