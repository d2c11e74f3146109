use thiserror::Error;

#[derive(Debug, Error)]
pub enum HeraldError {
    /// The file or environment could not be parsed into a config.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Parsed, but a value is unusable.
    #[error("Invalid config value `{field}`: {reason}")]
    InvalidConfig { field: &'static str, reason: String },
}

impl HeraldError {
    /// Short, stable code for logs.
    pub fn code(&self) -> &'static str {
        match self {
            HeraldError::Config(_) => "CONFIG_ERROR",
            HeraldError::InvalidConfig { .. } => "CONFIG_INVALID",
        }
    }
}

pub type Result<T> = std::result::Result<T, HeraldError>;
