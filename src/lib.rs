//! # Mailmerge
//!
//! Templated bulk mail: one personalized message per contact row, sent over
//! direct SMTP or a pre-configured messaging channel, with the outcome of
//! every row recorded next to the original data.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mailmerge::prelude::*;
//!
//! let config = RecipeConfig::from_file("job.toml")?;
//! let mut contacts = CsvRowSource::open("contacts.csv")?;
//! let mut output = CsvOutputSink::create("outcomes.csv")?;
//!
//! let summary = MailJob::new(config).run(&mut contacts, &mut output).await?;
//! println!("{} sent, {} failed", summary.succeeded, summary.failed);
//! ```

pub mod attachments;
pub mod channels;
pub mod csv_source;
pub mod error;
pub mod memory;
pub mod pipeline;
pub mod render;
pub mod source;

pub use attachments::{AttachmentBuilder, AttachmentSet, TEMPLATE_ROW_LIMIT, render_html_table};
pub use channels::{ChannelDefinition, build_registry, load_channels, read_definitions};
pub use csv_source::{CsvOutputSink, CsvRowSource, CsvTable, rows_to_tsv};
pub use error::{JobError, Result};
pub use memory::{MemoryRowSource, MemorySink, MemoryTable};
pub use pipeline::{
    DefaultTransportFactory, ERROR_COLUMN, JobSummary, MailJob, STATUS_COLUMN, SendStatus,
    TransportFactory,
};
pub use render::MessageRenderer;
pub use source::{
    ColumnSchema, ContactRow, OutputSink, PlatformCapabilities, RawFormat, RowSource, TableHead,
    TableSource,
};

pub use mailmerge_config;
pub use mailmerge_mail;

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        CsvOutputSink, CsvRowSource, CsvTable, JobError, JobSummary, MailJob, MemoryRowSource,
        MemorySink, MemoryTable, OutputSink, PlatformCapabilities, RowSource, TableSource,
    };
    pub use mailmerge_config::{EnvLoader, RecipeConfig};
    pub use mailmerge_mail::{ChannelRegistry, StaticChannelRegistry, Transport};
}
