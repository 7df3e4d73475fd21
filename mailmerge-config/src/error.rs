// Error types for configuration loading and resolution

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("no body source: set a body value or an existing body column")]
    NoBodySource,

    #[error("no subject source: set a subject value or an existing subject column")]
    NoSubjectSource,

    #[error("no sender source: set a sender value or an existing sender column")]
    NoSenderSource,

    #[error("no recipient: the recipient column is not set")]
    NoRecipient,

    #[error("unknown column: {column} (configured for {field})")]
    UnknownColumn { field: &'static str, column: String },

    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),
}

impl ConfigError {
    pub(crate) fn invalid(key: &str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
