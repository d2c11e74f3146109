use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{info, instrument};

use crate::db::{db_timestamp, init_db, row_to_event, EVENT_COLUMNS};
use crate::error::Result;
use crate::types::Event;

/// Row storage for events. Validation happens in the service, not here.
#[derive(Clone)]
pub struct EventStore {
    db: Arc<Mutex<Connection>>,
}

impl EventStore {
    pub fn new(db: Arc<Mutex<Connection>>) -> Result<Self> {
        init_db(&db.lock().unwrap_or_else(|e| e.into_inner()))?;
        Ok(Self { db })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[instrument(skip_all, fields(event_id = %event.id))]
    pub fn insert(&self, event: &Event) -> Result<()> {
        self.conn().execute(
            "INSERT INTO events
             (id, title, description, start_at, end_at, location, is_public, organizer_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                event.id,
                event.title,
                event.description,
                db_timestamp(event.start_at),
                db_timestamp(event.end_at),
                event.location,
                event.is_public,
                event.organizer_id.as_ref().map(|u| u.as_str()),
                db_timestamp(event.created_at),
            ],
        )?;
        info!("event stored");
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Option<Event>> {
        let conn = self.conn();
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1");
        Ok(conn.query_row(&sql, [id], row_to_event).optional()?)
    }

    /// All events, soonest start first.
    pub fn list(&self) -> Result<Vec<Event>> {
        let conn = self.conn();
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events ORDER BY start_at, id");
        let mut stmt = conn.prepare(&sql)?;
        let events = stmt
            .query_map([], row_to_event)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(events)
    }

    /// Returns whether a row was removed.
    #[instrument(skip(self))]
    pub fn delete(&self, id: &str) -> Result<bool> {
        let n = self.conn().execute("DELETE FROM events WHERE id = ?1", [id])?;
        Ok(n > 0)
    }
}
