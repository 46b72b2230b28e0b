//! Relationship store. Every function takes a `&Connection` so it can run
//! either standalone or inside a caller's transaction.

use anyhow::{Result, anyhow};
use chrono::NaiveDateTime;
use rusqlite::{Connection, OptionalExtension, params};

use weblog_types::models::{Relationship, RelationshipStatus, RelationshipType, canonical_pair};

use crate::encode::encode_ts;
use crate::models::RelationshipRow;

fn select(where_clause: &str) -> String {
    format!(
        "SELECT {} FROM relationships WHERE {}",
        RelationshipRow::COLUMNS,
        where_clause
    )
}

fn query_one(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<Option<Relationship>> {
    conn.query_row(sql, params, RelationshipRow::from_row)
        .optional()?
        .map(RelationshipRow::into_relationship)
        .transpose()
}

fn query_many(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Relationship>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, RelationshipRow::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter().map(RelationshipRow::into_relationship).collect()
}

pub fn get(conn: &Connection, id: i64) -> Result<Option<Relationship>> {
    query_one(conn, &select("id = ?1"), [id])
}

/// The row for an unordered pair, whatever its status.
pub fn find_between(conn: &Connection, x: i64, y: i64) -> Result<Option<Relationship>> {
    let (a, b) = canonical_pair(x, y);
    query_one(conn, &select("user_a = ?1 AND user_b = ?2"), [a, b])
}

/// The caller's ACTIVE relationship, if any.
pub fn find_active_for(conn: &Connection, user_id: i64) -> Result<Option<Relationship>> {
    query_one(
        conn,
        &select("(user_a = ?1 OR user_b = ?1) AND status = 'ACTIVE' LIMIT 1"),
        [user_id],
    )
}

/// Any PENDING relationship the user is a member of, on either side.
pub fn find_pending_for(conn: &Connection, user_id: i64) -> Result<Option<Relationship>> {
    query_one(
        conn,
        &select("(user_a = ?1 OR user_b = ?1) AND status = 'PENDING' ORDER BY created_at DESC, id DESC LIMIT 1"),
        [user_id],
    )
}

pub fn active_between(conn: &Connection, x: i64, y: i64) -> Result<bool> {
    let (a, b) = canonical_pair(x, y);
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM relationships WHERE user_a = ?1 AND user_b = ?2 AND status = 'ACTIVE'",
            [a, b],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Insert a fresh PENDING row for the pair with `requester` as initiator.
pub fn insert_pending(
    conn: &Connection,
    requester: i64,
    target: i64,
    now: &NaiveDateTime,
) -> Result<Relationship> {
    let (a, b) = canonical_pair(requester, target);
    conn.execute(
        "INSERT INTO relationships (user_a, user_b, requester, kind, status, created_at, ended_at)
         VALUES (?1, ?2, ?3, ?4, 'PENDING', ?5, NULL)",
        params![a, b, requester, RelationshipType::Couple.as_str(), encode_ts(now)],
    )?;
    let id = conn.last_insert_rowid();
    get(conn, id)?.ok_or_else(|| anyhow!("relationship {} vanished after insert", id))
}

/// Put an INACTIVE row back to PENDING for a new request cycle.
pub fn reactivate(conn: &Connection, id: i64, requester: i64, now: &NaiveDateTime) -> Result<Relationship> {
    let changed = conn.execute(
        "UPDATE relationships
         SET status = 'PENDING', requester = ?2, created_at = ?3, ended_at = NULL
         WHERE id = ?1 AND status = 'INACTIVE'",
        params![id, requester, encode_ts(now)],
    )?;
    if changed != 1 {
        return Err(anyhow!("relationship {} is not INACTIVE", id));
    }
    get(conn, id)?.ok_or_else(|| anyhow!("relationship {} vanished after update", id))
}

/// Move a row from `from` to `to`. `ended_at` is stamped when entering
/// INACTIVE. Fails if the row is no longer in `from`.
pub fn transition(
    conn: &Connection,
    id: i64,
    from: RelationshipStatus,
    to: RelationshipStatus,
    now: &NaiveDateTime,
) -> Result<Relationship> {
    if !from.can_transition_to(to) {
        return Err(anyhow!("illegal relationship transition {:?} -> {:?}", from, to));
    }

    let ended_at = (to == RelationshipStatus::Inactive).then(|| encode_ts(now));
    let changed = conn.execute(
        "UPDATE relationships SET status = ?3, ended_at = ?4 WHERE id = ?1 AND status = ?2",
        params![id, from.as_str(), to.as_str(), ended_at],
    )?;
    if changed != 1 {
        return Err(anyhow!("relationship {} is not {}", id, from.as_str()));
    }
    get(conn, id)?.ok_or_else(|| anyhow!("relationship {} vanished after update", id))
}

/// Every relationship the user has been part of, newest first.
pub fn list_for_user(conn: &Connection, user_id: i64) -> Result<Vec<Relationship>> {
    query_many(
        conn,
        &select("user_a = ?1 OR user_b = ?1 ORDER BY created_at DESC, id DESC"),
        [user_id],
    )
}

/// PENDING requests addressed to the user, newest first.
pub fn list_pending_incoming(conn: &Connection, user_id: i64) -> Result<Vec<Relationship>> {
    query_many(
        conn,
        &select(
            "(user_a = ?1 OR user_b = ?1) AND requester != ?1 AND status = 'PENDING'
             ORDER BY created_at DESC, id DESC",
        ),
        [user_id],
    )
}

/// PENDING requests the user sent, newest first.
pub fn list_pending_outgoing(conn: &Connection, user_id: i64) -> Result<Vec<Relationship>> {
    query_many(
        conn,
        &select("requester = ?1 AND status = 'PENDING' ORDER BY created_at DESC, id DESC"),
        [user_id],
    )
}
