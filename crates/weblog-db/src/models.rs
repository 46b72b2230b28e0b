//! Database row types. These map directly to SQLite rows.
//! Distinct from weblog-types models to keep the DB layer independent.

use anyhow::Result;
use rusqlite::Row;

use weblog_types::models::{Comment, Post, Relationship, User};

use crate::encode::{decode_kind, decode_status, decode_ts};

pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub nickname: String,
    pub created_at: String,
}

impl UserRow {
    pub const COLUMNS: &'static str = "id, username, password, nickname, created_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            username: row.get(1)?,
            password: row.get(2)?,
            nickname: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    pub fn into_user(self) -> Result<User> {
        Ok(User {
            id: self.id,
            username: self.username,
            nickname: self.nickname,
            created_at: decode_ts(&self.created_at)?,
        })
    }
}

pub struct RelationshipRow {
    pub id: i64,
    pub user_a: i64,
    pub user_b: i64,
    pub requester: i64,
    pub kind: String,
    pub status: String,
    pub created_at: String,
    pub ended_at: Option<String>,
}

impl RelationshipRow {
    pub const COLUMNS: &'static str =
        "id, user_a, user_b, requester, kind, status, created_at, ended_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_a: row.get(1)?,
            user_b: row.get(2)?,
            requester: row.get(3)?,
            kind: row.get(4)?,
            status: row.get(5)?,
            created_at: row.get(6)?,
            ended_at: row.get(7)?,
        })
    }

    pub fn into_relationship(self) -> Result<Relationship> {
        Ok(Relationship {
            id: self.id,
            user_a: self.user_a,
            user_b: self.user_b,
            requester: self.requester,
            kind: decode_kind(&self.kind)?,
            status: decode_status(&self.status)?,
            created_at: decode_ts(&self.created_at)?,
            ended_at: self.ended_at.as_deref().map(decode_ts).transpose()?,
        })
    }
}

pub struct PostRow {
    pub id: i64,
    pub user_id: i64,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
}

impl PostRow {
    pub const COLUMNS: &'static str = "id, user_id, content, created_at, updated_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            content: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
        })
    }

    pub fn into_post(self) -> Result<Post> {
        Ok(Post {
            id: self.id,
            user_id: self.user_id,
            content: self.content,
            created_at: decode_ts(&self.created_at)?,
            updated_at: decode_ts(&self.updated_at)?,
        })
    }
}

pub struct CommentRow {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub content: String,
    pub created_at: String,
}

impl CommentRow {
    pub const COLUMNS: &'static str = "id, post_id, user_id, content, created_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            post_id: row.get(1)?,
            user_id: row.get(2)?,
            content: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    pub fn into_comment(self) -> Result<Comment> {
        Ok(Comment {
            id: self.id,
            post_id: self.post_id,
            user_id: self.user_id,
            content: self.content,
            created_at: decode_ts(&self.created_at)?,
        })
    }
}
