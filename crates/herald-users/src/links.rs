use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, instrument};

use crate::db::{init_links, row_to_link, LINK_COLUMNS};
use crate::error::Result;
use crate::types::ChatLink;

/// Result of [`ChatLinkRegistry::link`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    /// The chat was unlinked and now points at the user.
    Linked(ChatLink),
    /// The chat was already linked; nothing was written.
    AlreadyLinked(ChatLink),
}

/// Persistent chat id → user mapping.
///
/// Writes happen only from the relay's receive loop, one chat at a time, so
/// `link` uses an optimistic `WHERE user_id IS NULL` guard instead of locking.
#[derive(Clone)]
pub struct ChatLinkRegistry {
    db: Arc<Mutex<Connection>>,
}

impl ChatLinkRegistry {
    pub fn new(db: Arc<Mutex<Connection>>) -> Result<Self> {
        init_links(&db.lock().unwrap_or_else(|e| e.into_inner()))?;
        Ok(Self { db })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, chat_id: &str) -> Result<Option<ChatLink>> {
        let conn = self.conn();
        let sql = format!("SELECT {LINK_COLUMNS} FROM chat_links WHERE chat_id = ?1");
        Ok(conn.query_row(&sql, [chat_id], row_to_link).optional()?)
    }

    /// Return the link row for `chat_id`, creating an unlinked one on first contact.
    #[instrument(skip(self))]
    pub fn ensure(&self, chat_id: &str) -> Result<ChatLink> {
        let now = Utc::now().to_rfc3339();
        {
            let conn = self.conn();
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO chat_links (chat_id, user_id, created_at, linked_at)
                 VALUES (?1, NULL, ?2, NULL)",
                params![chat_id, now],
            )?;
            if inserted > 0 {
                info!(chat_id, "new chat registered");
            } else {
                debug!(chat_id, "chat already registered");
            }
        }
        // Read back: handles the row having existed before the INSERT.
        let conn = self.conn();
        let sql = format!("SELECT {LINK_COLUMNS} FROM chat_links WHERE chat_id = ?1");
        Ok(conn.query_row(&sql, [chat_id], row_to_link)?)
    }

    /// Attach `user_id` to an unlinked chat. Creates the row if needed.
    #[instrument(skip(self))]
    pub fn link(&self, chat_id: &str, user_id: &str) -> Result<LinkOutcome> {
        self.ensure(chat_id)?;
        let now = Utc::now().to_rfc3339();
        let rows = {
            let conn = self.conn();
            conn.execute(
                "UPDATE chat_links SET user_id = ?2, linked_at = ?3
                 WHERE chat_id = ?1 AND user_id IS NULL",
                params![chat_id, user_id, now],
            )?
        };
        let current = self.ensure(chat_id)?;
        if rows == 0 {
            debug!(chat_id, "link skipped: chat already linked");
            return Ok(LinkOutcome::AlreadyLinked(current));
        }
        info!(chat_id, user_id, "chat linked");
        Ok(LinkOutcome::Linked(current))
    }

    /// Every chat that has a user attached, oldest first.
    pub fn list_linked(&self) -> Result<Vec<ChatLink>> {
        let conn = self.conn();
        let sql = format!(
            "SELECT {LINK_COLUMNS} FROM chat_links WHERE user_id IS NOT NULL ORDER BY created_at"
        );
        let mut stmt = conn.prepare(&sql)?;
        let links = stmt
            .query_map([], row_to_link)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(links)
    }
}
