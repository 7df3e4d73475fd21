//! The send job: validate, prepare, then send one message per contact.
//!
//! Setup failures (configuration, templates, attachments, transport) abort
//! the job before any row is written. Once the loop runs, a row can only fail
//! on its own: the failure is recorded next to the row and the loop moves on.

use async_trait::async_trait;
use mailmerge_config::{RecipeConfig, SendConfig, TransportSpec};
use mailmerge_mail::{
    BodyFormat, ChannelRegistry, ChannelTransport, SmtpTransport, StaticChannelRegistry, Transport,
};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::attachments::AttachmentBuilder;
use crate::render::MessageRenderer;
use crate::source::{
    ColumnSchema, ContactRow, OutputSink, PlatformCapabilities, RowSource, TableSource,
    column_names,
};
use crate::{JobError, Result};

/// Output column holding the outcome of a row.
pub const STATUS_COLUMN: &str = "sendmail_status";

/// Output column holding the failure cause of a row.
pub const ERROR_COLUMN: &str = "sendmail_error";

const PROGRESS_INTERVAL: usize = 5;

/// Outcome of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    Success,
    Failed,
}

impl SendStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for SendStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters of a finished job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobSummary {
    pub sent: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl JobSummary {
    fn record(&mut self, status: SendStatus) {
        self.sent += 1;
        match status {
            SendStatus::Success => self.succeeded += 1,
            SendStatus::Failed => self.failed += 1,
        }
    }
}

/// Creates the transport described by the configuration.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn create(&self, spec: &TransportSpec, format: BodyFormat) -> Result<Box<dyn Transport>>;
}

/// SMTP transports and channels from a registry.
#[derive(Clone)]
pub struct DefaultTransportFactory {
    channels: Arc<dyn ChannelRegistry>,
}

impl DefaultTransportFactory {
    pub fn new(channels: Arc<dyn ChannelRegistry>) -> Self {
        Self { channels }
    }
}

impl Default for DefaultTransportFactory {
    fn default() -> Self {
        Self::new(Arc::new(StaticChannelRegistry::new()))
    }
}

#[async_trait]
impl TransportFactory for DefaultTransportFactory {
    async fn create(&self, spec: &TransportSpec, format: BodyFormat) -> Result<Box<dyn Transport>> {
        match spec {
            TransportSpec::Smtp(config) => Ok(Box::new(SmtpTransport::new(config.clone(), format))),
            TransportSpec::Channel(channel) => {
                let transport =
                    ChannelTransport::from_registry(self.channels.as_ref(), &channel.id, format)
                        .map_err(JobError::TransportConnect)?;
                Ok(Box::new(transport))
            }
        }
    }
}

/// A configured send job.
///
/// ```rust,ignore
/// let summary = MailJob::new(config)
///     .project_key("SALES")
///     .attachment(Arc::new(CsvTable::open("orders.csv", "SALES")?))
///     .run(&mut contacts, &mut output)
///     .await?;
/// ```
pub struct MailJob {
    config: RecipeConfig,
    project_key: String,
    tables: Vec<Arc<dyn TableSource>>,
    capabilities: PlatformCapabilities,
    transports: Arc<dyn TransportFactory>,
}

impl MailJob {
    pub fn new(config: RecipeConfig) -> Self {
        Self {
            config,
            project_key: String::new(),
            tables: Vec::new(),
            capabilities: PlatformCapabilities::default(),
            transports: Arc::new(DefaultTransportFactory::default()),
        }
    }

    /// Project running the job.
    pub fn project_key(mut self, project_key: impl Into<String>) -> Self {
        self.project_key = project_key.into();
        self
    }

    /// Attach a table to every message.
    pub fn attachment(mut self, table: Arc<dyn TableSource>) -> Self {
        self.tables.push(table);
        self
    }

    pub fn capabilities(mut self, capabilities: PlatformCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Resolve channels from `registry`.
    pub fn channels(self, registry: Arc<dyn ChannelRegistry>) -> Self {
        self.transports(Arc::new(DefaultTransportFactory::new(registry)))
    }

    pub fn transports(mut self, factory: Arc<dyn TransportFactory>) -> Self {
        self.transports = factory;
        self
    }

    /// Run the job, writing one outcome row per contact to `sink`.
    pub async fn run(
        &self,
        source: &mut dyn RowSource,
        sink: &mut dyn OutputSink,
    ) -> Result<JobSummary> {
        let schema = source.schema()?;
        let columns = column_names(&schema);

        let send = SendConfig::resolve(&self.config, &columns)?;

        // Templates compile before anything is written.
        let renderer = MessageRenderer::new(&send)?;
        renderer.check_columns(&columns);

        let mut output_schema = schema;
        output_schema.push(ColumnSchema::string(STATUS_COLUMN));
        output_schema.push(ColumnSchema::string(ERROR_COLUMN));
        sink.write_schema(&output_schema)?;

        let attachments = AttachmentBuilder::new(send.attachment_type)
            .apply_coloring(send.apply_excel_coloring)
            .capabilities(self.capabilities)
            .project_key(self.project_key.clone())
            .build(&self.tables)
            .await?;
        let renderer = renderer.with_attachments(attachments);

        let mut transport = self
            .transports
            .create(&send.transport, renderer.format())
            .await?;
        transport
            .connect()
            .await
            .map_err(JobError::TransportConnect)?;

        let outcome = send_rows(&renderer, transport.as_mut(), source, sink).await;

        if let Err(e) = transport.disconnect().await {
            warn!(error = %e, "Failed to disconnect transport");
        }

        let summary = outcome?;
        sink.finish()?;
        info!(
            sent = summary.sent,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Mail job finished"
        );
        Ok(summary)
    }
}

async fn send_rows(
    renderer: &MessageRenderer,
    transport: &mut dyn Transport,
    source: &mut dyn RowSource,
    sink: &mut dyn OutputSink,
) -> Result<JobSummary> {
    let mut summary = JobSummary::default();

    for row in source.rows()? {
        let row = row?;
        let status = send_row(renderer, transport, row, sink).await?;
        summary.record(status);

        if summary.sent.is_multiple_of(PROGRESS_INTERVAL) {
            info!(
                sent = summary.sent,
                succeeded = summary.succeeded,
                failed = summary.failed,
                "Sent {} mails ({} success {} fail)",
                summary.sent,
                summary.succeeded,
                summary.failed
            );
        }
    }

    Ok(summary)
}

async fn send_row(
    renderer: &MessageRenderer,
    transport: &mut dyn Transport,
    row: ContactRow,
    sink: &mut dyn OutputSink,
) -> Result<SendStatus> {
    let recipient = renderer.recipient(&row);
    if recipient.trim().is_empty() {
        info!(row = ?row, "No recipient for row, sending will fail");
    } else {
        info!(recipient = %recipient, "Sending to {}", recipient);
    }

    let result = match renderer.render(&row) {
        Ok(email) => transport.send(&email).await,
        Err(e) => Err(e),
    };

    let mut output = row;
    let status = match result {
        Ok(()) => {
            output.insert(STATUS_COLUMN.to_string(), Value::from(SendStatus::Success.as_str()));
            output.insert(ERROR_COLUMN.to_string(), Value::Null);
            SendStatus::Success
        }
        Err(e) => {
            warn!(recipient = %recipient, error = %e, "Send failed");
            output.insert(STATUS_COLUMN.to_string(), Value::from(SendStatus::Failed.as_str()));
            output.insert(ERROR_COLUMN.to_string(), Value::String(e.to_string()));
            SendStatus::Failed
        }
    };

    sink.write_row(&output)?;
    Ok(status)
}
