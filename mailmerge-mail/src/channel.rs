//! Pre-configured messaging channels.
//!
//! A channel is a named delivery route set up by an administrator. It may
//! carry its own sender address, in which case that sender is always used
//! and the sender resolved for a row is dropped.

use async_trait::async_trait;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::{Address, Attachment, BodyFormat, Email, MailError, Result, SmtpConfig, Transport};

/// Suffix appended to a channel id when the channel has its own sender.
pub const SENDER_SUFFIX: &str = "__|*_S";

/// Channel value selecting direct SMTP instead of a channel.
pub const DIRECT_SMTP_CHANNEL: &str = "__DKU__DIRECT_SMTP__";

/// A message handed over to a channel.
#[derive(Debug, Clone)]
pub struct ChannelDelivery {
    /// Sender to use, `None` when the channel supplies its own.
    pub sender: Option<String>,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub plain_text: bool,
    pub attachments: Arc<[Attachment]>,
}

/// A named delivery route.
#[async_trait]
pub trait MessagingChannel: Send + Sync {
    /// Channel id.
    fn id(&self) -> &str;

    /// Sender configured on the channel, if any.
    fn sender(&self) -> Option<&str>;

    /// Deliver one message.
    async fn deliver(&self, delivery: ChannelDelivery) -> Result<()>;
}

/// Lookup of channels by id.
pub trait ChannelRegistry: Send + Sync {
    /// Resolve a channel by its real id (without suffix).
    fn resolve(&self, id: &str) -> Result<Arc<dyn MessagingChannel>>;

    /// All known channels.
    fn list(&self) -> Vec<Arc<dyn MessagingChannel>>;
}

/// Encode a channel as a selectable configuration value.
///
/// Channels with their own sender get [`SENDER_SUFFIX`] appended so the
/// resolver can tell, from the configuration alone, that no sender needs
/// to be configured.
pub fn encode_channel_choice(channel: &dyn MessagingChannel) -> ChannelChoice {
    match channel.sender() {
        Some(sender) => ChannelChoice {
            label: format!("{} ({})", channel.id(), sender),
            value: Some(format!("{}{}", channel.id(), SENDER_SUFFIX)),
        },
        None => ChannelChoice {
            label: channel.id().to_string(),
            value: Some(channel.id().to_string()),
        },
    }
}

/// List the choices for the `mail_channel` setting.
///
/// Direct SMTP is always offered. When channels exist it gets the explicit
/// sentinel value; otherwise it has no value and is the default.
pub fn channel_choices(registry: &dyn ChannelRegistry) -> Vec<ChannelChoice> {
    let channels = registry.list();
    let mut choices: Vec<ChannelChoice> = channels
        .iter()
        .map(|channel| encode_channel_choice(channel.as_ref()))
        .collect();

    let direct_value = if channels.is_empty() {
        None
    } else {
        Some(DIRECT_SMTP_CHANNEL.to_string())
    };
    choices.push(ChannelChoice {
        label: "Manually define SMTP".to_string(),
        value: direct_value,
    });
    choices
}

/// A selectable `mail_channel` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelChoice {
    pub label: String,
    pub value: Option<String>,
}

/// Transport delegating to a messaging channel.
pub struct ChannelTransport {
    channel: Arc<dyn MessagingChannel>,
    format: BodyFormat,
}

impl ChannelTransport {
    pub fn new(channel: Arc<dyn MessagingChannel>, format: BodyFormat) -> Self {
        info!(
            channel = channel.id(),
            sender = channel.sender().unwrap_or("-"),
            plain_text = format.is_plain_text(),
            "Configured channel messaging client"
        );
        Self { channel, format }
    }

    /// Build a transport from a registry lookup.
    pub fn from_registry(
        registry: &dyn ChannelRegistry,
        id: &str,
        format: BodyFormat,
    ) -> Result<Self> {
        Ok(Self::new(registry.resolve(id)?, format))
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send(&mut self, email: &Email) -> Result<()> {
        if email.to.trim().is_empty() {
            return Err(MailError::MissingField("recipient"));
        }

        let sender = match self.channel.sender() {
            Some(_) => None,
            None => Some(email.from.clone()),
        };

        self.channel
            .deliver(ChannelDelivery {
                sender,
                recipient: email.to.clone(),
                subject: email.subject.clone(),
                body: email.body.clone(),
                plain_text: self.format.is_plain_text(),
                attachments: Arc::clone(&email.attachments),
            })
            .await
    }
}

/// Channel backed by an SMTP relay.
pub struct SmtpChannel {
    id: String,
    sender: Option<String>,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpChannel {
    pub fn new(id: impl Into<String>, sender: Option<String>, config: &SmtpConfig) -> Result<Self> {
        let id = id.into();
        if let Some(sender) = &sender {
            Address::parse(sender)?;
        }
        let transport = config.build_transport()?;
        debug!(channel = %id, host = %config.host, "Registered SMTP channel");
        Ok(Self {
            id,
            sender: sender.filter(|s| !s.trim().is_empty()),
            transport,
        })
    }
}

#[async_trait]
impl MessagingChannel for SmtpChannel {
    fn id(&self) -> &str {
        &self.id
    }

    fn sender(&self) -> Option<&str> {
        self.sender.as_deref()
    }

    async fn deliver(&self, delivery: ChannelDelivery) -> Result<()> {
        let from = delivery
            .sender
            .as_deref()
            .or(self.sender.as_deref())
            .unwrap_or_default();

        let format = if delivery.plain_text {
            BodyFormat::Text
        } else {
            BodyFormat::Html
        };
        let email = Email::new()
            .from(from)
            .to(delivery.recipient)
            .subject(delivery.subject)
            .body(delivery.body)
            .attachments(delivery.attachments);
        let message = email.to_lettre(&email.sender()?, format)?;

        self.transport
            .send(message)
            .await
            .map_err(|e| MailError::Channel {
                channel: self.id.clone(),
                message: e.to_string(),
            })?;
        Ok(())
    }
}

/// Fixed set of channels.
#[derive(Default, Clone)]
pub struct StaticChannelRegistry {
    channels: BTreeMap<String, Arc<dyn MessagingChannel>>,
}

impl StaticChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel under its id.
    pub fn register(mut self, channel: impl MessagingChannel + 'static) -> Self {
        self.channels
            .insert(channel.id().to_string(), Arc::new(channel));
        self
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

impl ChannelRegistry for StaticChannelRegistry {
    fn resolve(&self, id: &str) -> Result<Arc<dyn MessagingChannel>> {
        self.channels
            .get(id)
            .cloned()
            .ok_or_else(|| MailError::UnknownChannel(id.to_string()))
    }

    fn list(&self) -> Vec<Arc<dyn MessagingChannel>> {
        self.channels.values().cloned().collect()
    }
}
