use thiserror::Error;

/// Errors produced while delivering a notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The relay could not be reached.
    #[error("relay unavailable: {0}")]
    Unavailable(String),

    /// The relay answered with a non-success status.
    #[error("relay returned {status}: {message}")]
    Relay { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Operation timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("chat link lookup failed: {0}")]
    Links(#[from] herald_users::UserError),

    /// Job arguments that do not decode into a payload.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

pub type Result<T> = std::result::Result<T, NotifyError>;
