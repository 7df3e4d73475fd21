//! Attachment materialization.
//!
//! Runs once per job. Every table is exported in the configured format and
//! attached to every message, and its first rows are exposed to the body
//! template under `attachments`.

use mailmerge_config::AttachmentType;
use mailmerge_mail::Attachment;
use serde_json::{Map, Value, json};
use std::fmt::Write;
use std::sync::Arc;
use tracing::debug;

use crate::source::{
    ContactRow, PlatformCapabilities, RawFormat, TableHead, TableSource, cell_to_string,
};
use crate::{JobError, Result};

/// Rows of each table exposed to templates.
pub const TEMPLATE_ROW_LIMIT: usize = 50;

/// Files and template view shared by every message of a job.
#[derive(Debug, Clone)]
pub struct AttachmentSet {
    pub files: Arc<[Attachment]>,
    /// `name -> {html_table, data}`, tables of other projects nested under their project key.
    pub template_context: Value,
}

impl AttachmentSet {
    pub fn empty() -> Self {
        Self {
            files: Arc::from(Vec::new()),
            template_context: Value::Object(Map::new()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl Default for AttachmentSet {
    fn default() -> Self {
        Self::empty()
    }
}

/// Builds the [`AttachmentSet`] of a job.
#[derive(Debug, Clone)]
pub struct AttachmentBuilder {
    attachment_type: AttachmentType,
    apply_coloring: bool,
    capabilities: PlatformCapabilities,
    project_key: String,
}

impl AttachmentBuilder {
    pub fn new(attachment_type: AttachmentType) -> Self {
        Self {
            attachment_type,
            apply_coloring: false,
            capabilities: PlatformCapabilities::default(),
            project_key: String::new(),
        }
    }

    /// Request conditional formatting where the platform supports it.
    pub fn apply_coloring(mut self, apply: bool) -> Self {
        self.apply_coloring = apply;
        self
    }

    pub fn capabilities(mut self, capabilities: PlatformCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Project running the job. Tables of other projects are nested in the template view.
    pub fn project_key(mut self, project_key: impl Into<String>) -> Self {
        self.project_key = project_key.into();
        self
    }

    fn coloring(&self) -> bool {
        self.apply_coloring && self.capabilities.conditional_formatting
    }

    /// Fetch every table. Any failure aborts the job.
    pub async fn build(&self, tables: &[Arc<dyn TableSource>]) -> Result<AttachmentSet> {
        if self.attachment_type == AttachmentType::None {
            return Ok(AttachmentSet::empty());
        }

        let mut files = Vec::with_capacity(tables.len());
        let mut context = Map::new();

        for table in tables {
            let full_name = table.full_name();
            let fetch_err = |e: JobError| JobError::AttachmentFetch {
                table: full_name.clone(),
                message: e.to_string(),
            };

            files.push(self.export(table.as_ref(), &full_name).await.map_err(fetch_err)?);

            let entry = self.template_entry(table.as_ref()).await.map_err(fetch_err)?;
            if table.project_key() == self.project_key || self.project_key.is_empty() {
                context.insert(table.name().to_string(), entry);
            } else {
                let project = context
                    .entry(table.project_key().to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                if let Value::Object(project) = project {
                    project.insert(table.name().to_string(), entry);
                }
            }
        }

        Ok(AttachmentSet {
            files: Arc::from(files),
            template_context: Value::Object(context),
        })
    }

    async fn export(&self, table: &dyn TableSource, full_name: &str) -> Result<Attachment> {
        match self.attachment_type {
            AttachmentType::Excel => {
                let format = RawFormat::Spreadsheet {
                    apply_coloring: self.coloring(),
                };
                debug!(table = %full_name, ?format, "Fetching attachment");
                let bytes = table.raw_bytes(format).await?;
                Ok(Attachment::xlsx(format!("{}.xlsx", full_name), bytes))
            }
            _ => {
                debug!(table = %full_name, "Fetching attachment as TSV");
                let bytes = table.raw_bytes(RawFormat::TsvWithHeader).await?;
                Ok(Attachment::csv(format!("{}.csv", full_name), bytes))
            }
        }
    }

    async fn template_entry(&self, table: &dyn TableSource) -> Result<Value> {
        let head = table.head_rows(TEMPLATE_ROW_LIMIT).await?;

        let hosted = if self.capabilities.dataset_to_html {
            table.html_table(TEMPLATE_ROW_LIMIT, self.coloring()).await?
        } else {
            None
        };
        let html_table = match hosted {
            Some(html) => html,
            None => render_html_table(&head),
        };

        let data: Vec<Value> = head.rows.into_iter().map(Value::Object).collect();
        Ok(json!({
            "html_table": html_table,
            "data": data,
        }))
    }
}

/// Render rows as an HTML table with class `dataframe`.
///
/// Headers are left-justified, cells escaped, and nulls rendered empty.
pub fn render_html_table(head: &TableHead) -> String {
    let mut html = String::from("<table border=\"0\" class=\"dataframe\">\n  <thead>\n");
    html.push_str("    <tr style=\"text-align: left;\">\n");
    for column in &head.columns {
        let _ = writeln!(html, "      <th>{}</th>", html_escape::encode_text(column));
    }
    html.push_str("    </tr>\n  </thead>\n  <tbody>\n");
    for row in &head.rows {
        html.push_str("    <tr>\n");
        for column in &head.columns {
            let value = cell(row, column);
            let _ = writeln!(html, "      <td>{}</td>", html_escape::encode_text(&value));
        }
        html.push_str("    </tr>\n");
    }
    html.push_str("  </tbody>\n</table>");
    html
}

fn cell(row: &ContactRow, column: &str) -> String {
    row.get(column).map(cell_to_string).unwrap_or_default()
}
