//! Email transport implementations.

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, Tokio1Executor,
    transport::smtp::{
        PoolConfig,
        authentication::{Credentials, DEFAULT_MECHANISMS},
        client::{AsyncSmtpConnection, TlsParameters},
        extension::ClientId,
    },
};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::{BodyFormat, Email, MailError, Result};

/// Email transport trait.
///
/// A run calls `connect` once, `send` once per contact, then `disconnect`
/// once.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open the connection. Failures here abort the run.
    async fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    /// Send one message to its single recipient.
    async fn send(&mut self, email: &Email) -> Result<()>;

    /// Close the connection.
    async fn disconnect(&mut self) -> Result<()> {
        Ok(())
    }
}

/// SMTP configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpConfig {
    /// SMTP server host.
    pub host: String,
    /// SMTP server port.
    pub port: u16,
    /// Upgrade the connection with STARTTLS.
    pub use_tls: bool,
    /// Username for authentication.
    pub username: Option<String>,
    /// Password for authentication.
    pub password: Option<String>,
    /// Connection timeout.
    pub timeout: Duration,
}

impl SmtpConfig {
    /// Create a new SMTP configuration on port 25, no TLS, no auth.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 25,
            use_tls: false,
            username: None,
            password: None,
            timeout: Duration::from_secs(30),
        }
    }

    /// Set credentials.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set the port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Use STARTTLS.
    pub fn starttls(mut self) -> Self {
        self.use_tls = true;
        self
    }

    /// Set the connection timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether credentials are configured.
    pub fn uses_auth(&self) -> bool {
        self.username.is_some()
    }

    fn credentials_for_auth(&self) -> Option<Credentials> {
        let username = self.username.clone()?;
        Some(Credentials::new(username, self.password.clone().unwrap_or_default()))
    }

    /// Open one session: greeting and EHLO, then STARTTLS and AUTH when configured.
    pub(crate) async fn open_session(&self) -> Result<AsyncSmtpConnection> {
        let refused = |e: lettre::transport::smtp::Error| MailError::Connect(e.to_string());
        let hello = ClientId::default();

        let mut session = AsyncSmtpConnection::connect_tokio1(
            (self.host.as_str(), self.port),
            Some(self.timeout),
            &hello,
            None,
            None,
        )
        .await
        .map_err(refused)?;

        if self.use_tls {
            let tls = TlsParameters::new(self.host.clone()).map_err(refused)?;
            // A failed upgrade has already closed the session.
            session.starttls(tls, &hello).await.map_err(refused)?;
            info!("SMTP TLS started");
        }

        if let Some(credentials) = self.credentials_for_auth() {
            if let Err(e) = session.auth(DEFAULT_MECHANISMS, &credentials).await {
                session.abort().await;
                return Err(refused(e));
            }
            info!("Authenticated against SMTP server");
        }

        Ok(session)
    }

    /// Build a lettre transport holding at most one pooled connection.
    pub(crate) fn build_transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let mut builder = if self.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.host)
        };

        builder = builder
            .port(self.port)
            .timeout(Some(self.timeout))
            .pool_config(PoolConfig::new().max_size(1));

        if let Some(credentials) = self.credentials_for_auth() {
            builder = builder.credentials(credentials);
        }

        Ok(builder.build())
    }
}

/// Direct SMTP transport.
///
/// Holds a single session from `connect` to `disconnect`. A session closed
/// by a failed send is reopened on the next send.
pub struct SmtpTransport {
    config: SmtpConfig,
    format: BodyFormat,
    session: Option<AsyncSmtpConnection>,
}

impl SmtpTransport {
    /// Create a new SMTP transport. Nothing is opened until `connect`.
    pub fn new(config: SmtpConfig, format: BodyFormat) -> Self {
        info!(
            host = %config.host,
            port = config.port,
            tls = config.use_tls,
            auth = config.uses_auth(),
            plain_text = format.is_plain_text(),
            "Configured SMTP mail client"
        );
        Self {
            config,
            format,
            session: None,
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &SmtpConfig {
        &self.config
    }
}

#[async_trait]
impl Transport for SmtpTransport {
    async fn connect(&mut self) -> Result<()> {
        let session = self.config.open_session().await?;
        debug!(host = %self.config.host, port = self.config.port, "Opened SMTP session");
        self.session = Some(session);
        Ok(())
    }

    async fn send(&mut self, email: &Email) -> Result<()> {
        let session = self.session.as_mut().ok_or(MailError::NotConnected)?;
        email.recipient()?;
        let from = email.sender()?;
        let message = email.to_lettre(&from, self.format)?;

        if session.has_broken() {
            warn!(host = %self.config.host, "SMTP session was closed, reconnecting");
            *session = self.config.open_session().await?;
        }

        debug!(to = %email.to, subject = %email.subject, "Sending email via SMTP");

        session.send(message.envelope(), &message.formatted()).await?;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        let Some(mut session) = self.session.take() else {
            return Ok(());
        };
        if !session.has_broken() {
            session.quit().await?;
        }
        info!(host = %self.config.host, "Closed SMTP connection");
        Ok(())
    }
}
