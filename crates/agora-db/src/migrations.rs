use rusqlite::Connection;
use tracing::info;

use crate::StoreResult;

pub fn run(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            username    TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS accounts (
            id              TEXT PRIMARY KEY,
            user_id         TEXT NOT NULL UNIQUE REFERENCES users(id),
            phone_number    TEXT UNIQUE,
            date_of_birth   TEXT,
            gender          INTEGER,
            role            TEXT NOT NULL DEFAULT 'user',
            active          INTEGER NOT NULL DEFAULT 1,
            created_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS categories (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL UNIQUE,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS products (
            id              TEXT PRIMARY KEY,
            name            TEXT NOT NULL,
            description     TEXT NOT NULL,
            price           REAL NOT NULL,
            category_id     TEXT NOT NULL REFERENCES categories(id),
            owner_id        TEXT NOT NULL REFERENCES accounts(id),
            created_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- One table for both plain and product posts: product_id is
        -- NULL for plain posts. Reactions, comments and polls all hang
        -- off this table regardless of which flavor the post is.
        CREATE TABLE IF NOT EXISTS posts (
            id          TEXT PRIMARY KEY,
            account_id  TEXT NOT NULL REFERENCES accounts(id),
            content     TEXT NOT NULL,
            image_url   TEXT,
            product_id  TEXT REFERENCES products(id),
            active      INTEGER NOT NULL DEFAULT 1,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_posts_feed
            ON posts(active, created_at);

        CREATE TABLE IF NOT EXISTS comments (
            id          TEXT PRIMARY KEY,
            post_id     TEXT NOT NULL REFERENCES posts(id),
            account_id  TEXT NOT NULL REFERENCES accounts(id),
            content     TEXT NOT NULL,
            image_url   TEXT,
            active      INTEGER NOT NULL DEFAULT 1,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_comments_post
            ON comments(post_id, created_at);

        -- At most one reaction row per (post, account); the like
        -- toggle mutates kind in place instead of deleting the row.
        CREATE TABLE IF NOT EXISTS reactions (
            id          TEXT PRIMARY KEY,
            post_id     TEXT NOT NULL REFERENCES posts(id),
            account_id  TEXT NOT NULL REFERENCES accounts(id),
            kind        INTEGER NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(post_id, account_id)
        );

        CREATE INDEX IF NOT EXISTS idx_reactions_post
            ON reactions(post_id);

        -- A poll is 1:1 with its post, enforced by UNIQUE(post_id).
        CREATE TABLE IF NOT EXISTS polls (
            id          TEXT PRIMARY KEY,
            post_id     TEXT NOT NULL UNIQUE REFERENCES posts(id),
            title       TEXT NOT NULL,
            start_time  TEXT NOT NULL,
            end_time    TEXT NOT NULL,
            is_closed   INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS poll_options (
            id          TEXT PRIMARY KEY,
            poll_id     TEXT NOT NULL REFERENCES polls(id),
            option_text TEXT NOT NULL,
            vote_count  INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_poll_options_poll
            ON poll_options(poll_id);

        CREATE TABLE IF NOT EXISTS poll_responses (
            id          TEXT PRIMARY KEY,
            poll_id     TEXT NOT NULL REFERENCES polls(id),
            option_id   TEXT NOT NULL REFERENCES poll_options(id),
            account_id  TEXT NOT NULL REFERENCES accounts(id),
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(poll_id, account_id)
        );

        -- pair_lo/pair_hi hold the two member ids in sorted order, so
        -- the same two accounts can never get a second room no matter
        -- which of them opened the conversation.
        CREATE TABLE IF NOT EXISTS rooms (
            id              TEXT PRIMARY KEY,
            first_user      TEXT NOT NULL REFERENCES accounts(id),
            second_user     TEXT NOT NULL REFERENCES accounts(id),
            pair_lo         TEXT NOT NULL,
            pair_hi         TEXT NOT NULL,
            last_message_at TEXT,
            seen            INTEGER NOT NULL DEFAULT 0,
            created_at      TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(pair_lo, pair_hi)
        );

        CREATE TABLE IF NOT EXISTS messages (
            id          TEXT PRIMARY KEY,
            room_id     TEXT NOT NULL REFERENCES rooms(id),
            sender_id   TEXT NOT NULL REFERENCES accounts(id),
            content     TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_messages_room
            ON messages(room_id, created_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
