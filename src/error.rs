//! Job-level errors.
//!
//! Everything here aborts the job. Failures scoped to a single contact row
//! are recorded in the output and never surface as a [`JobError`].

use mailmerge_config::ConfigError;
use mailmerge_mail::MailError;
use thiserror::Error;

/// Result type for job operations.
pub type Result<T> = std::result::Result<T, JobError>;

/// Fatal job errors.
#[derive(Debug, Error)]
pub enum JobError {
    /// The configuration does not describe a valid job.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A subject or body template failed to compile.
    #[error("Template error: {0}")]
    Template(MailError),

    /// An attachment table could not be read.
    #[error("Could not fetch attachment {table}: {message}")]
    AttachmentFetch { table: String, message: String },

    /// The transport could not be created or connected.
    #[error("Could not connect transport: {0}")]
    TransportConnect(MailError),

    /// The contact source failed.
    #[error("Contact source error: {0}")]
    Source(String),

    /// The output sink failed.
    #[error("Output error: {0}")]
    Sink(String),

    /// Channel definitions could not be loaded.
    #[error("Channel definitions error: {0}")]
    Channels(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl JobError {
    pub(crate) fn source(message: impl std::fmt::Display) -> Self {
        Self::Source(message.to_string())
    }

    pub(crate) fn sink(message: impl std::fmt::Display) -> Self {
        Self::Sink(message.to_string())
    }
}
