use rusqlite::{Connection, Result};

use crate::types::{ChatLink, User};

pub(crate) const USER_COLUMNS: &str = "id, email, display_name, created_at";
pub(crate) const LINK_COLUMNS: &str = "chat_id, user_id, created_at, linked_at";

pub(crate) fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        display_name: row.get(2)?,
        created_at: row.get(3)?,
    })
}

pub(crate) fn row_to_link(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatLink> {
    Ok(ChatLink {
        chat_id: row.get(0)?,
        user_id: row.get(1)?,
        created_at: row.get(2)?,
        linked_at: row.get(3)?,
    })
}

/// Initialise the `users` table. Safe to call on every startup: CREATE IF
/// NOT EXISTS means it's idempotent.
pub fn init_users(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            id            TEXT PRIMARY KEY NOT NULL,
            email         TEXT NOT NULL UNIQUE,
            display_name  TEXT NOT NULL,
            created_at    TEXT NOT NULL
        );",
    )
}

/// Initialise the `chat_links` table (relay database).
pub fn init_links(conn: &Connection) -> Result<()> {
    // chat_id is the primary key: at most one link row per chat.
    // user_id is deliberately not a foreign key: users live in the main
    // application's database, not the relay's.
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS chat_links (
            chat_id     TEXT PRIMARY KEY NOT NULL,
            user_id     TEXT,
            created_at  TEXT NOT NULL,
            linked_at   TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_chat_links_user ON chat_links (user_id);",
    )
}
