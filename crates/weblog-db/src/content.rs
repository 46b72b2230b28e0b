//! Posts and comments.

use std::collections::HashMap;

use anyhow::{Result, anyhow};
use chrono::NaiveDateTime;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};

use weblog_types::models::{Comment, Post};

use crate::encode::encode_ts;
use crate::models::{CommentRow, PostRow};

// -- Posts --

pub fn insert_post(conn: &Connection, user_id: i64, content: &str, now: &NaiveDateTime) -> Result<Post> {
    let ts = encode_ts(now);
    conn.execute(
        "INSERT INTO posts (user_id, content, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
        params![user_id, content, ts],
    )?;
    let id = conn.last_insert_rowid();
    get_post(conn, id)?.ok_or_else(|| anyhow!("post {} vanished after insert", id))
}

pub fn get_post(conn: &Connection, id: i64) -> Result<Option<Post>> {
    let sql = format!("SELECT {} FROM posts WHERE id = ?1", PostRow::COLUMNS);
    conn.query_row(&sql, [id], PostRow::from_row)
        .optional()?
        .map(PostRow::into_post)
        .transpose()
}

pub fn update_post(conn: &Connection, id: i64, content: &str, now: &NaiveDateTime) -> Result<Post> {
    conn.execute(
        "UPDATE posts SET content = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, content, encode_ts(now)],
    )?;
    get_post(conn, id)?.ok_or_else(|| anyhow!("post {} vanished after update", id))
}

/// Delete a post together with its comments.
pub fn delete_post(conn: &Connection, id: i64) -> Result<()> {
    conn.execute("DELETE FROM comments WHERE post_id = ?1", [id])?;
    conn.execute("DELETE FROM posts WHERE id = ?1", [id])?;
    Ok(())
}

/// Posts authored by any of `user_ids`, newest first, plus the total count.
pub fn list_posts_by_users(
    conn: &Connection,
    user_ids: &[i64],
    limit: u32,
    offset: u32,
) -> Result<(Vec<Post>, i64)> {
    if user_ids.is_empty() {
        return Ok((vec![], 0));
    }

    let placeholders: Vec<String> = (1..=user_ids.len()).map(|i| format!("?{}", i)).collect();
    let in_clause = placeholders.join(", ");

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM posts WHERE user_id IN ({})", in_clause),
        params_from_iter(user_ids.iter()),
        |row| row.get(0),
    )?;

    let sql = format!(
        "SELECT {} FROM posts WHERE user_id IN ({}) ORDER BY created_at DESC, id DESC LIMIT {} OFFSET {}",
        PostRow::COLUMNS,
        in_clause,
        limit,
        offset
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(user_ids.iter()), PostRow::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let posts = rows.into_iter().map(PostRow::into_post).collect::<Result<Vec<_>>>()?;

    Ok((posts, total))
}

/// Comment counts keyed by post id. Posts without comments are absent.
pub fn count_comments_for_posts(conn: &Connection, post_ids: &[i64]) -> Result<HashMap<i64, i64>> {
    if post_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let placeholders: Vec<String> = (1..=post_ids.len()).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "SELECT post_id, COUNT(*) FROM comments WHERE post_id IN ({}) GROUP BY post_id",
        placeholders.join(", ")
    );
    let mut stmt = conn.prepare(&sql)?;
    let counts = stmt
        .query_map(params_from_iter(post_ids.iter()), |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<HashMap<i64, i64>, _>>()?;
    Ok(counts)
}

/// Author id keyed by post id. Missing posts are absent.
pub fn post_owners(conn: &Connection, post_ids: &[i64]) -> Result<HashMap<i64, i64>> {
    if post_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let placeholders: Vec<String> = (1..=post_ids.len()).map(|i| format!("?{}", i)).collect();
    let sql = format!("SELECT id, user_id FROM posts WHERE id IN ({})", placeholders.join(", "));
    let mut stmt = conn.prepare(&sql)?;
    let owners = stmt
        .query_map(params_from_iter(post_ids.iter()), |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<HashMap<i64, i64>, _>>()?;
    Ok(owners)
}

// -- Comments --

pub fn insert_comment(
    conn: &Connection,
    post_id: i64,
    user_id: i64,
    content: &str,
    now: &NaiveDateTime,
) -> Result<Comment> {
    conn.execute(
        "INSERT INTO comments (post_id, user_id, content, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![post_id, user_id, content, encode_ts(now)],
    )?;
    let id = conn.last_insert_rowid();
    get_comment(conn, id)?.ok_or_else(|| anyhow!("comment {} vanished after insert", id))
}

pub fn get_comment(conn: &Connection, id: i64) -> Result<Option<Comment>> {
    let sql = format!("SELECT {} FROM comments WHERE id = ?1", CommentRow::COLUMNS);
    conn.query_row(&sql, [id], CommentRow::from_row)
        .optional()?
        .map(CommentRow::into_comment)
        .transpose()
}

/// Comments on a post, oldest first, plus the total count.
pub fn list_comments(conn: &Connection, post_id: i64, limit: u32, offset: u32) -> Result<(Vec<Comment>, i64)> {
    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM comments WHERE post_id = ?1",
        [post_id],
        |row| row.get(0),
    )?;

    let sql = format!(
        "SELECT {} FROM comments WHERE post_id = ?1 ORDER BY created_at ASC, id ASC LIMIT ?2 OFFSET ?3",
        CommentRow::COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![post_id, limit, offset], CommentRow::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let comments = rows.into_iter().map(CommentRow::into_comment).collect::<Result<Vec<_>>>()?;

    Ok((comments, total))
}

/// Batch-fetch comments by id, ordered by id. Missing ids are skipped.
pub fn get_comments_by_ids(conn: &Connection, ids: &[i64]) -> Result<Vec<Comment>> {
    if ids.is_empty() {
        return Ok(vec![]);
    }

    let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "SELECT {} FROM comments WHERE id IN ({}) ORDER BY id ASC",
        CommentRow::COLUMNS,
        placeholders.join(", ")
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(ids.iter()), CommentRow::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter().map(CommentRow::into_comment).collect()
}

pub fn delete_comment(conn: &Connection, id: i64) -> Result<()> {
    conn.execute("DELETE FROM comments WHERE id = ?1", [id])?;
    Ok(())
}
