/// Errors produced by the chat relay.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("teloxide error: {0}")]
    Teloxide(#[from] teloxide::RequestError),

    #[error("not a Telegram chat id: {0}")]
    InvalidChatId(String),

    #[error("main application returned {status}: {message}")]
    MainApp { status: u16, message: String },

    #[error("main application unreachable: {0}")]
    Http(#[from] reqwest::Error),

    #[error("chat link registry: {0}")]
    Links(#[from] herald_users::UserError),

    #[error("Operation timed out after {ms}ms")]
    Timeout { ms: u64 },
}

pub type Result<T> = std::result::Result<T, RelayError>;
