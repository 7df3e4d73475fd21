//! # Mailmerge Mail
//!
//! Message building, templating, and delivery for personalized bulk mail.
//!
//! ## Features
//!
//! - **SMTP Transport**: Direct SMTP sending with optional STARTTLS and auth
//! - **Messaging Channels**: Named, pre-configured routes that may carry their own sender
//! - **Templates**: MiniJinja subject/body templates with strict undefined handling
//! - **Attachments**: CSV and spreadsheet files shared by every message of a run
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mailmerge_mail::{BodyFormat, Email, SmtpConfig, SmtpTransport, Transport};
//!
//! let mut transport = SmtpTransport::new(
//!     SmtpConfig::new("smtp.example.com").port(587).starttls(),
//!     BodyFormat::Text,
//! );
//! transport.connect().await?;
//!
//! let email = Email::new()
//!     .from("sender@example.com")
//!     .to("recipient@example.com")
//!     .subject("Hello")
//!     .body("Hello Ana\n\n");
//! transport.send(&email).await?;
//! transport.disconnect().await?;
//! ```

mod address;
mod attachment;
mod channel;
mod email;
mod error;
mod template_minijinja;
mod transport;

use std::fmt;

pub use address::Address;
pub use attachment::{Attachment, XLSX_SUBTYPE};
pub use channel::{
    ChannelChoice, ChannelDelivery, ChannelRegistry, ChannelTransport, DIRECT_SMTP_CHANNEL,
    MessagingChannel, SENDER_SUFFIX, SmtpChannel, StaticChannelRegistry, channel_choices,
    encode_channel_choice,
};
pub use email::{BodyFormat, Email};
pub use error::{MailError, Result};
pub use template_minijinja::MiniJinjaEngine;
pub use transport::{SmtpConfig, SmtpTransport, Transport};

/// The two templated parts of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateSlot {
    Subject,
    Body,
}

impl TemplateSlot {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Subject => "subject",
            Self::Body => "body",
        }
    }
}

impl fmt::Display for TemplateSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Template engine trait for rendering email templates.
pub trait TemplateEngine: Send + Sync {
    /// Render the template in `slot` with the given context.
    fn render(&self, slot: TemplateSlot, context: &serde_json::Value) -> Result<String>;

    /// Compile and register a template for the slot.
    fn register_template(&mut self, slot: TemplateSlot, source: &str) -> Result<()>;
}

/// Prelude for common imports.
///
/// ```
/// use mailmerge_mail::prelude::*;
/// ```
pub mod prelude {
    pub use crate::address::Address;
    pub use crate::attachment::Attachment;
    pub use crate::channel::{ChannelRegistry, ChannelTransport, MessagingChannel};
    pub use crate::email::{BodyFormat, Email};
    pub use crate::error::{MailError, Result};
    pub use crate::transport::{SmtpConfig, SmtpTransport, Transport};
    pub use crate::{MiniJinjaEngine, TemplateEngine, TemplateSlot};
}
