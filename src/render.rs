//! Per-row message rendering.

use mailmerge_config::{BodySelector, FieldSelector, SendConfig, SenderSelector};
use mailmerge_mail::{BodyFormat, Email, MiniJinjaEngine, TemplateEngine, TemplateSlot};
use serde_json::Value;
use tracing::warn;

use crate::attachments::AttachmentSet;
use crate::source::{ContactRow, cell_to_string};
use crate::{JobError, Result};

/// Template variable holding the attachment view.
pub const ATTACHMENTS_KEY: &str = "attachments";

/// Template variable holding the rendered subject.
pub const SUBJECT_KEY: &str = "subject";

/// Turns contact rows into messages.
///
/// Templates are compiled once, when the renderer is built. The stored row is
/// never modified; the body is rendered against a working copy extended with
/// `attachments` and `subject` unless the row already has such columns.
pub struct MessageRenderer {
    engine: Box<dyn TemplateEngine>,
    recipient_column: String,
    sender: SenderSelector,
    subject: FieldSelector,
    body: BodySelector,
    format: BodyFormat,
    attachments: AttachmentSet,
}

impl MessageRenderer {
    pub fn new(config: &SendConfig) -> Result<Self> {
        Self::with_engine(config, Box::new(MiniJinjaEngine::new()))
    }

    /// Compile the templates of `config` into `engine`.
    pub fn with_engine(config: &SendConfig, mut engine: Box<dyn TemplateEngine>) -> Result<Self> {
        if let Some(source) = config.subject_template() {
            engine
                .register_template(TemplateSlot::Subject, source)
                .map_err(JobError::Template)?;
        }
        if let Some(source) = config.body_template() {
            engine
                .register_template(TemplateSlot::Body, source)
                .map_err(JobError::Template)?;
        }

        Ok(Self {
            engine,
            recipient_column: config.recipient_column.clone(),
            sender: config.sender.clone(),
            subject: config.subject.clone(),
            body: config.body.clone(),
            format: config.body_format(),
            attachments: AttachmentSet::empty(),
        })
    }

    /// Share `attachments` with every message.
    pub fn with_attachments(mut self, attachments: AttachmentSet) -> Self {
        self.attachments = attachments;
        self
    }

    /// Warn about contact columns that shadow template variables.
    pub fn check_columns<S: AsRef<str>>(&self, columns: &[S]) {
        if !matches!(self.body, BodySelector::Fixed { .. }) {
            return;
        }
        for column in columns.iter().map(AsRef::as_ref) {
            match column {
                ATTACHMENTS_KEY => warn!(
                    "The contacts contain a column called 'attachments'. It takes priority over \
                     the attachment data, rename it to use 'attachments' in the body template"
                ),
                SUBJECT_KEY => warn!(
                    "The contacts contain a column called 'subject'. It takes priority over the \
                     rendered subject in the body template"
                ),
                _ => {}
            }
        }
    }

    /// Format bodies are sent in.
    pub fn format(&self) -> BodyFormat {
        self.format
    }

    /// Recipient of a row, empty when the row has none.
    pub fn recipient(&self, row: &ContactRow) -> String {
        column_value(row, &self.recipient_column)
    }

    /// Sender of a row, empty when the channel supplies it.
    pub fn sender(&self, row: &ContactRow) -> String {
        match &self.sender {
            SenderSelector::Fixed(sender) => sender.clone(),
            SenderSelector::Column(column) => column_value(row, column),
            SenderSelector::ChannelDefault => String::new(),
        }
    }

    /// Render the subject against the raw row.
    pub fn subject(&self, row: &ContactRow) -> mailmerge_mail::Result<String> {
        match &self.subject {
            FieldSelector::Fixed(_) => self
                .engine
                .render(TemplateSlot::Subject, &Value::Object(row.clone())),
            FieldSelector::Column(column) => Ok(column_value(row, column)),
        }
    }

    /// Render the body. Plain-text bodies end with a blank line.
    pub fn body(&self, row: &ContactRow, subject: &str) -> mailmerge_mail::Result<String> {
        let mut body = match &self.body {
            BodySelector::Fixed { .. } => {
                let mut context = row.clone();
                if !context.contains_key(ATTACHMENTS_KEY) {
                    context.insert(
                        ATTACHMENTS_KEY.to_string(),
                        self.attachments.template_context.clone(),
                    );
                }
                if !context.contains_key(SUBJECT_KEY) {
                    context.insert(SUBJECT_KEY.to_string(), Value::String(subject.to_string()));
                }
                self.engine
                    .render(TemplateSlot::Body, &Value::Object(context))?
            }
            BodySelector::Column(column) => column_value(row, column),
        };

        if self.format.is_plain_text() {
            body.push_str("\n\n");
        }
        Ok(body)
    }

    /// Build the complete message of a row.
    pub fn render(&self, row: &ContactRow) -> mailmerge_mail::Result<Email> {
        let subject = self.subject(row)?;
        let body = self.body(row, &subject)?;
        Ok(Email::new()
            .from(self.sender(row))
            .to(self.recipient(row))
            .subject(subject)
            .body(body)
            .attachments(self.attachments.files.clone()))
    }
}

fn column_value(row: &ContactRow, column: &str) -> String {
    row.get(column).map(cell_to_string).unwrap_or_default()
}
