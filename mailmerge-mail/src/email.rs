//! Email message types.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use lettre::message::{MultiPart, SinglePart};

use crate::{Address, Attachment, MailError, Result};

/// How a message body is interpreted by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyFormat {
    /// Plain text.
    #[default]
    Text,
    /// HTML markup.
    Html,
}

impl BodyFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Html => "html",
        }
    }

    pub fn is_plain_text(&self) -> bool {
        matches!(self, Self::Text)
    }
}

impl fmt::Display for BodyFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BodyFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "html" => Ok(Self::Html),
            other => Err(format!("unknown body format '{}'", other)),
        }
    }
}

/// One personalized message, addressed to exactly one recipient.
///
/// Attachments are shared by every message of a run, so they are held
/// behind an `Arc` rather than copied per row.
#[derive(Debug, Clone, Default)]
pub struct Email {
    /// Sender as resolved from the configuration. Channels with their own
    /// sender ignore it.
    pub from: String,
    /// Recipient.
    pub to: String,
    /// Rendered subject.
    pub subject: String,
    /// Rendered body.
    pub body: String,
    /// Attachments.
    pub attachments: Arc<[Attachment]>,
}

impl Email {
    /// Create a new empty email.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sender.
    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.from = from.into();
        self
    }

    /// Set the recipient.
    pub fn to(mut self, to: impl Into<String>) -> Self {
        self.to = to.into();
        self
    }

    /// Set the subject.
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Set the body.
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Share an attachment list with this message.
    pub fn attachments(mut self, attachments: Arc<[Attachment]>) -> Self {
        self.attachments = attachments;
        self
    }

    /// Parse the recipient, failing when the row did not provide one.
    pub fn recipient(&self) -> Result<Address> {
        if self.to.trim().is_empty() {
            return Err(MailError::MissingField("recipient"));
        }
        Address::parse(&self.to)
    }

    /// Parse the sender, failing when none was resolved.
    pub fn sender(&self) -> Result<Address> {
        if self.from.trim().is_empty() {
            return Err(MailError::MissingField("sender"));
        }
        Address::parse(&self.from)
    }

    /// Build a lettre message sent from `from`.
    pub(crate) fn to_lettre(&self, from: &Address, format: BodyFormat) -> Result<lettre::Message> {
        let to = self.recipient()?;

        let builder = lettre::Message::builder()
            .from(from.to_mailbox()?)
            .to(to.to_mailbox()?)
            .subject(self.subject.as_str());

        let text = match format {
            BodyFormat::Text => SinglePart::plain(self.body.clone()),
            BodyFormat::Html => SinglePart::html(self.body.clone()),
        };

        let mut body = MultiPart::mixed().singlepart(text);
        for attachment in self.attachments.iter() {
            body = body.singlepart(attachment.to_part()?);
        }

        builder
            .multipart(body)
            .map_err(|e| MailError::Smtp(e.to_string()))
    }
}
