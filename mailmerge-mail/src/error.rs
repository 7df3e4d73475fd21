//! Mail error types.

use thiserror::Error;

use crate::TemplateSlot;

/// Result type for mail operations.
pub type Result<T> = std::result::Result<T, MailError>;

/// Mail errors.
#[derive(Debug, Error)]
pub enum MailError {
    /// SMTP protocol or connection error during a send.
    #[error("SMTP error: {0}")]
    Smtp(String),

    /// Could not open (or authenticate) the transport connection.
    #[error("Could not connect: {0}")]
    Connect(String),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Missing required field.
    #[error("Missing {0}")]
    MissingField(&'static str),

    /// Template source could not be compiled.
    #[error("Invalid {slot} template: {message}")]
    TemplateSyntax {
        slot: TemplateSlot,
        message: String,
    },

    /// Template failed to render against a row.
    #[error("Could not render {slot} template: {message}")]
    Render {
        slot: TemplateSlot,
        message: String,
    },

    /// No template registered for the slot.
    #[error("No template registered for the {0}")]
    TemplateNotFound(TemplateSlot),

    /// Attachment error.
    #[error("Attachment error: {0}")]
    Attachment(String),

    /// The channel id is not known to the registry.
    #[error("Unknown messaging channel: {0}")]
    UnknownChannel(String),

    /// The channel refused or failed the delivery.
    #[error("Channel {channel} failed to deliver: {message}")]
    Channel {
        channel: String,
        message: String,
    },

    /// Transport used before `connect` or after `disconnect`.
    #[error("Transport is not connected")]
    NotConnected,
}

impl From<lettre::transport::smtp::Error> for MailError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        Self::Smtp(err.to_string())
    }
}

impl From<lettre::address::AddressError> for MailError {
    fn from(err: lettre::address::AddressError) -> Self {
        Self::InvalidAddress(err.to_string())
    }
}

impl From<lettre::error::Error> for MailError {
    fn from(err: lettre::error::Error) -> Self {
        Self::Smtp(err.to_string())
    }
}
