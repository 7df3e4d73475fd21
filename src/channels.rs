//! Channel definitions file.
//!
//! Messaging channels are declared by an administrator in a JSON or TOML
//! file and served to jobs through a [`StaticChannelRegistry`]:
//!
//! ```toml
//! [[channels]]
//! id = "ops-mail"
//! sender = "ops@example.com"
//! host = "smtp.example.com"
//! port = 587
//! use_tls = true
//! user = "ops"
//! password = "secret"
//! ```

use mailmerge_config::ConfigLoader;
use mailmerge_mail::{SmtpChannel, SmtpConfig, StaticChannelRegistry};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

use crate::{JobError, Result};

fn default_port() -> u16 {
    25
}

/// One channel of the definitions file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChannelDefinition {
    pub id: String,
    /// Sender forced on every message of the channel.
    #[serde(default)]
    pub sender: Option<String>,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub use_tls: bool,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl ChannelDefinition {
    pub fn smtp_config(&self) -> SmtpConfig {
        let mut config = SmtpConfig::new(self.host.clone()).port(self.port);
        if self.use_tls {
            config = config.starttls();
        }
        if let Some(user) = self.user.as_deref().filter(|u| !u.is_empty()) {
            config = config.credentials(user, self.password.clone().unwrap_or_default());
        }
        config
    }
}

#[derive(Debug, Deserialize)]
struct ChannelsFile {
    #[serde(default)]
    channels: Vec<ChannelDefinition>,
}

/// Read channel definitions from a `.json` or `.toml` file.
pub fn read_definitions(path: impl AsRef<Path>) -> Result<Vec<ChannelDefinition>> {
    let path = path.as_ref();
    let document = ConfigLoader::auto(path)?.load_file(path)?;
    let file: ChannelsFile = serde_json::from_value(document)
        .map_err(|e| JobError::Channels(format!("{}: {}", path.display(), e)))?;

    let mut seen = std::collections::HashSet::new();
    for definition in &file.channels {
        if !seen.insert(definition.id.as_str()) {
            return Err(JobError::Channels(format!(
                "channel {} is defined twice",
                definition.id
            )));
        }
    }
    Ok(file.channels)
}

/// Build a registry of SMTP channels.
///
/// Must be called within a Tokio runtime.
pub fn build_registry(definitions: &[ChannelDefinition]) -> Result<StaticChannelRegistry> {
    let mut registry = StaticChannelRegistry::new();
    for definition in definitions {
        let channel = SmtpChannel::new(
            definition.id.clone(),
            definition.sender.clone(),
            &definition.smtp_config(),
        )
        .map_err(|e| JobError::Channels(format!("{}: {}", definition.id, e)))?;
        registry = registry.register(channel);
    }
    info!(channels = registry.len(), "Loaded messaging channels");
    Ok(registry)
}

/// Read a definitions file into a registry.
pub fn load_channels(path: impl AsRef<Path>) -> Result<StaticChannelRegistry> {
    build_registry(&read_definitions(path)?)
}
