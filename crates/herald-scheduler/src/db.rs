use rusqlite::Connection;

use crate::error::Result;

/// Initialise the scheduler schema in `conn`.
///
/// Creates the `scheduled_jobs` table (idempotent) and an index on
/// `(status, due_at)` so the polling query stays cheap with many pending jobs.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS scheduled_jobs (
            id          TEXT    NOT NULL PRIMARY KEY,
            name        TEXT    NOT NULL,
            invocation  TEXT    NOT NULL,   -- JSON-encoded Invocation
            status      TEXT    NOT NULL DEFAULT 'pending',
            due_at      TEXT    NOT NULL,   -- RFC 3339, millisecond precision, UTC
            attempts    INTEGER NOT NULL DEFAULT 0,
            last_error  TEXT,
            created_at  TEXT    NOT NULL,
            updated_at  TEXT    NOT NULL
        ) STRICT;

        -- Efficient polling: SELECT … WHERE status = 'pending' AND due_at <= ?
        CREATE INDEX IF NOT EXISTS idx_scheduled_jobs_due
            ON scheduled_jobs (status, due_at);
        ",
    )?;
    Ok(())
}
