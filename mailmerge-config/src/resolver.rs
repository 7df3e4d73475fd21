// Resolution of the flat configuration into typed send parameters

use mailmerge_mail::{BodyFormat, DIRECT_SMTP_CHANNEL, SENDER_SUFFIX, SmtpConfig};

use crate::{ConfigError, ConfigValidator, RecipeConfig, Result};

/// Host used for direct SMTP when `smtp_host` is unset.
pub const DEFAULT_SMTP_HOST: &str = "localhost";

/// Where a per-message value comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSelector {
    /// A fixed template source, rendered per row.
    Fixed(String),
    /// A column of the contact row, used verbatim.
    Column(String),
}

/// Where the sender comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SenderSelector {
    /// The same sender for every row.
    Fixed(String),
    /// A column of the contact row.
    Column(String),
    /// The messaging channel's own sender.
    ChannelDefault,
}

/// Where the body comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodySelector {
    /// A template rendered per row, sent as `format`.
    Fixed { template: String, format: BodyFormat },
    /// A column of the contact row, always sent as plain text.
    Column(String),
}

/// Format of the files attached to every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentType {
    Csv,
    Excel,
    None,
}

/// A messaging channel selected by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSpec {
    /// Channel id with any sender suffix removed.
    pub id: String,
    /// The channel brings its own sender.
    pub has_configured_sender: bool,
}

impl ChannelSpec {
    /// Decode a `mail_channel` value. Returns `None` for direct SMTP.
    pub fn parse(value: Option<&str>) -> Option<Self> {
        let value = value.map(str::trim).filter(|v| !v.is_empty())?;
        if value == DIRECT_SMTP_CHANNEL {
            return None;
        }
        Some(match value.strip_suffix(SENDER_SUFFIX) {
            Some(id) => Self {
                id: id.to_string(),
                has_configured_sender: true,
            },
            None => Self {
                id: value.to_string(),
                has_configured_sender: false,
            },
        })
    }
}

/// How messages leave the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportSpec {
    Smtp(SmtpConfig),
    Channel(ChannelSpec),
}

impl TransportSpec {
    /// True for a channel whose own sender overrides the configured one.
    pub fn channel_has_sender(&self) -> bool {
        matches!(self, Self::Channel(c) if c.has_configured_sender)
    }
}

/// Validated parameters of a send job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendConfig {
    pub recipient_column: String,
    pub sender: SenderSelector,
    pub subject: FieldSelector,
    pub body: BodySelector,
    pub attachment_type: AttachmentType,
    pub apply_excel_coloring: bool,
    pub transport: TransportSpec,
}

impl SendConfig {
    /// Resolve and validate `config` against the contact schema.
    ///
    /// Presence of every source is checked before any column is looked up
    /// in the schema, so a job missing several settings reports the body
    /// first, then subject, sender and recipient. Row data is never read.
    pub fn resolve<S: AsRef<str>>(config: &RecipeConfig, schema: &[S]) -> Result<Self> {
        let transport = resolve_transport(config)?;

        let body = resolve_body(config)?;
        let subject = resolve_subject(config)?;
        let sender = resolve_sender(config, transport.channel_has_sender())?;
        let recipient_column = config
            .get_string("recipient_column")
            .ok_or(ConfigError::NoRecipient)?;

        if let FieldSelector::Column(column) = &subject {
            ConfigValidator::column_exists(schema, column, "subject")?;
        }
        if let BodySelector::Column(column) = &body {
            ConfigValidator::column_exists(schema, column, "body")?;
        }
        if let SenderSelector::Column(column) = &sender {
            ConfigValidator::column_exists(schema, column, "sender")?;
        }
        ConfigValidator::column_exists(schema, &recipient_column, "recipient")?;

        let attachment_type = match config.get_string("attachment_type") {
            None => AttachmentType::Csv,
            Some(value) => {
                let kinds = ["csv", "excel", "none"];
                match ConfigValidator::one_of(&value, &kinds, "attachment_type")? {
                    "excel" => AttachmentType::Excel,
                    "none" => AttachmentType::None,
                    _ => AttachmentType::Csv,
                }
            }
        };

        Ok(Self {
            recipient_column,
            sender,
            subject,
            body,
            attachment_type,
            apply_excel_coloring: config.get_bool("apply_coloring_excel")?,
            transport,
        })
    }

    /// Format the transport sends bodies in. Column bodies are plain text.
    pub fn body_format(&self) -> BodyFormat {
        match &self.body {
            BodySelector::Fixed { format, .. } => *format,
            BodySelector::Column(_) => BodyFormat::Text,
        }
    }

    /// Subject template source, when the subject is templated.
    pub fn subject_template(&self) -> Option<&str> {
        match &self.subject {
            FieldSelector::Fixed(source) => Some(source),
            FieldSelector::Column(_) => None,
        }
    }

    /// Body template source, when the body is templated.
    pub fn body_template(&self) -> Option<&str> {
        match &self.body {
            BodySelector::Fixed { template, .. } => Some(template),
            BodySelector::Column(_) => None,
        }
    }
}

fn resolve_body(config: &RecipeConfig) -> Result<BodySelector> {
    let format = match config.get_string("body_format") {
        None => BodyFormat::Text,
        Some(value) => value
            .parse::<BodyFormat>()
            .map_err(|message| ConfigError::invalid("body_format", message))?,
    };

    if config.get_bool("use_body_value")? {
        let key = match format {
            BodyFormat::Html => "html_body_value",
            BodyFormat::Text => "body_value",
        };
        let template = config.get_string(key).ok_or(ConfigError::NoBodySource)?;
        Ok(BodySelector::Fixed { template, format })
    } else {
        config
            .get_string("body_column")
            .map(BodySelector::Column)
            .ok_or(ConfigError::NoBodySource)
    }
}

fn resolve_subject(config: &RecipeConfig) -> Result<FieldSelector> {
    let selector = if config.get_bool("use_subject_value")? {
        config.get_string("subject_value").map(FieldSelector::Fixed)
    } else {
        config.get_string("subject_column").map(FieldSelector::Column)
    };
    selector.ok_or(ConfigError::NoSubjectSource)
}

fn resolve_sender(config: &RecipeConfig, channel_has_sender: bool) -> Result<SenderSelector> {
    if channel_has_sender {
        return Ok(SenderSelector::ChannelDefault);
    }
    let selector = if config.get_bool("use_sender_value")? {
        config.get_string("sender_value").map(SenderSelector::Fixed)
    } else {
        config.get_string("sender_column").map(SenderSelector::Column)
    };
    selector.ok_or(ConfigError::NoSenderSource)
}

fn resolve_transport(config: &RecipeConfig) -> Result<TransportSpec> {
    let channel = config.get_string("mail_channel");
    if let Some(spec) = ChannelSpec::parse(channel.as_deref()) {
        return Ok(TransportSpec::Channel(spec));
    }

    let host = config
        .get_string("smtp_host")
        .unwrap_or_else(|| DEFAULT_SMTP_HOST.to_string());
    let mut smtp = SmtpConfig::new(host).port(config.get_port("smtp_port", 25)?);

    if config.get_bool("smtp_use_tls")? {
        smtp = smtp.starttls();
    }
    if config.get_bool("smtp_use_auth")? {
        let user = config.get_string("smtp_user");
        let user = ConfigValidator::not_empty(user.as_deref(), "smtp_user")?;
        smtp = smtp.credentials(user, config.get_string("smtp_pass").unwrap_or_default());
    }

    Ok(TransportSpec::Smtp(smtp))
}
