use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            username    TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            nickname    TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        -- One row per unordered pair, reused across request cycles.
        CREATE TABLE IF NOT EXISTS relationships (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            user_a      INTEGER NOT NULL REFERENCES users(id),
            user_b      INTEGER NOT NULL REFERENCES users(id),
            requester   INTEGER NOT NULL,
            kind        TEXT NOT NULL DEFAULT 'COUPLE',
            status      TEXT NOT NULL CHECK (status IN ('PENDING', 'ACTIVE', 'INACTIVE')),
            created_at  TEXT NOT NULL,
            ended_at    TEXT,
            UNIQUE (user_a, user_b),
            CHECK (user_a < user_b),
            CHECK (requester IN (user_a, user_b)),
            CHECK ((status = 'INACTIVE') = (ended_at IS NOT NULL))
        );

        CREATE INDEX IF NOT EXISTS idx_relationships_user_a
            ON relationships(user_a, status);
        CREATE INDEX IF NOT EXISTS idx_relationships_user_b
            ON relationships(user_b, status);

        CREATE TABLE IF NOT EXISTS posts (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id     INTEGER NOT NULL REFERENCES users(id),
            content     TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_posts_user
            ON posts(user_id, created_at);

        CREATE TABLE IF NOT EXISTS comments (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            post_id     INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
            user_id     INTEGER NOT NULL REFERENCES users(id),
            content     TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_comments_post
            ON comments(post_id, created_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
