use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventError {
    /// Input rejected before anything was written.
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Organizer not found: {0}")]
    OrganizerNotFound(String),

    #[error("Event not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("User lookup failed: {0}")]
    Users(#[from] herald_users::UserError),
}

impl EventError {
    /// Client-caused errors, as opposed to storage failures.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, EventError::Validation(_) | EventError::OrganizerNotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, EventError>;
