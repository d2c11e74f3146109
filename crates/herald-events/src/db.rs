use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, Result};

use crate::types::Event;

pub(crate) const EVENT_COLUMNS: &str =
    "id, title, description, start_at, end_at, location, is_public, organizer_id, created_at";

pub(crate) fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<Event> {
    let organizer: Option<String> = row.get(7)?;
    Ok(Event {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        start_at: parse_ts(row.get::<_, String>(3)?),
        end_at: parse_ts(row.get::<_, String>(4)?),
        location: row.get(5)?,
        is_public: row.get(6)?,
        organizer_id: organizer.map(Into::into),
        created_at: parse_ts(row.get::<_, String>(8)?),
    })
}

/// Fixed-width UTC text so `ORDER BY start_at` is chronological.
pub(crate) fn db_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_ts(raw: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}

/// Initialise the `events` table. Idempotent.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS events (
            id            TEXT PRIMARY KEY NOT NULL,
            title         TEXT NOT NULL,
            description   TEXT NOT NULL DEFAULT '',
            start_at      TEXT NOT NULL,
            end_at        TEXT NOT NULL,
            location      TEXT NOT NULL DEFAULT '',
            is_public     INTEGER NOT NULL,
            organizer_id  TEXT,
            created_at    TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_events_start ON events (start_at);",
    )
}
