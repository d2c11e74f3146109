use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::db::{init_users, row_to_user, USER_COLUMNS};
use crate::error::{Result, UserError};
use crate::types::User;

/// Read/write access to the `users` table.
///
/// The wider application owns user management; the notification subsystem
/// only needs existence checks (organizers) and email lookups (chat login).
#[derive(Clone)]
pub struct UserDirectory {
    db: Arc<Mutex<Connection>>,
}

impl UserDirectory {
    pub fn new(db: Arc<Mutex<Connection>>) -> Result<Self> {
        init_users(&db.lock().unwrap_or_else(|e| e.into_inner()))?;
        Ok(Self { db })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[instrument(skip(self))]
    pub fn create_user(&self, email: &str, display_name: &str) -> Result<User> {
        let email = normalize_email(email)?;
        let conn = self.conn();

        let taken: Option<String> = conn
            .query_row("SELECT id FROM users WHERE email = ?1", [&email], |r| r.get(0))
            .optional()?;
        if taken.is_some() {
            return Err(UserError::AlreadyExists(email));
        }

        let user = User {
            id: Uuid::now_v7().to_string(),
            email,
            display_name: display_name.trim().to_string(),
            created_at: Utc::now().to_rfc3339(),
        };
        conn.execute(
            "INSERT INTO users (id, email, display_name, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![user.id, user.email, user.display_name, user.created_at],
        )?;
        info!(user_id = %user.id, "user created");
        Ok(user)
    }

    /// Load a user by primary key. Returns None instead of an error when absent
    /// so callers decide whether missing is exceptional in their context.
    pub fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        let conn = self.conn();
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
        Ok(conn.query_row(&sql, [user_id], row_to_user).optional()?)
    }

    pub fn exists(&self, user_id: &str) -> Result<bool> {
        Ok(self.get_user(user_id)?.is_some())
    }

    /// Case-insensitive email lookup. Malformed input resolves to `None`.
    pub fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let Ok(email) = normalize_email(email) else {
            return Ok(None);
        };
        let conn = self.conn();
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1");
        Ok(conn.query_row(&sql, [&email], row_to_user).optional()?)
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn();
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at");
        let mut stmt = conn.prepare(&sql)?;
        let users = stmt
            .query_map([], row_to_user)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }
}

/// Trim + lowercase, and reject anything without a `local@domain` shape.
pub fn normalize_email(raw: &str) -> Result<String> {
    let email = raw.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty() && !domain.is_empty() && !email.contains(char::is_whitespace) =>
        {
            Ok(email)
        }
        _ => Err(UserError::InvalidEmail(raw.to_string())),
    }
}
