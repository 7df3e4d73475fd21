//! In-memory bindings, used by tests and embedders that already hold their data.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::csv_source::rows_to_tsv;
use crate::source::{
    ColumnSchema, ContactRow, OutputSink, RawFormat, RowSource, TableHead, TableSource,
};
use crate::{JobError, Result};

/// Contacts held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryRowSource {
    schema: Vec<ColumnSchema>,
    rows: Vec<ContactRow>,
}

impl MemoryRowSource {
    pub fn new(schema: Vec<ColumnSchema>, rows: Vec<ContactRow>) -> Self {
        Self { schema, rows }
    }

    /// Build from rows alone; every column is a string column, in first-seen order.
    pub fn from_rows(rows: Vec<ContactRow>) -> Self {
        let mut schema: Vec<ColumnSchema> = Vec::new();
        for row in &rows {
            for key in row.keys() {
                if !schema.iter().any(|c| &c.name == key) {
                    schema.push(ColumnSchema::string(key.clone()));
                }
            }
        }
        Self { schema, rows }
    }
}

impl RowSource for MemoryRowSource {
    fn schema(&self) -> Result<Vec<ColumnSchema>> {
        Ok(self.schema.clone())
    }

    fn rows(&mut self) -> Result<Box<dyn Iterator<Item = Result<ContactRow>> + Send + '_>> {
        Ok(Box::new(self.rows.iter().cloned().map(Ok)))
    }
}

/// Outcome rows collected in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub schema: Option<Vec<ColumnSchema>>,
    pub rows: Vec<ContactRow>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutputSink for MemorySink {
    fn write_schema(&mut self, schema: &[ColumnSchema]) -> Result<()> {
        self.schema = Some(schema.to_vec());
        Ok(())
    }

    fn write_row(&mut self, row: &ContactRow) -> Result<()> {
        self.rows.push(row.clone());
        Ok(())
    }
}

/// Attachment table held in memory.
#[derive(Debug, Default)]
pub struct MemoryTable {
    project_key: String,
    name: String,
    columns: Vec<String>,
    rows: Vec<ContactRow>,
    spreadsheet: Option<Vec<u8>>,
    html: Option<String>,
    unavailable: bool,
    requests: Mutex<Vec<RawFormat>>,
}

impl MemoryTable {
    pub fn new(
        project_key: impl Into<String>,
        name: impl Into<String>,
        columns: Vec<String>,
    ) -> Self {
        Self {
            project_key: project_key.into(),
            name: name.into(),
            columns,
            ..Self::default()
        }
    }

    pub fn with_rows(mut self, rows: Vec<ContactRow>) -> Self {
        self.rows = rows;
        self
    }

    /// Bytes served for spreadsheet exports.
    pub fn with_spreadsheet(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.spreadsheet = Some(bytes.into());
        self
    }

    /// HTML served when the host renders tables itself.
    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    /// Make every read fail.
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// Raw formats requested so far.
    pub fn requests(&self) -> Vec<RawFormat> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable {
            return Err(JobError::source(format!("table {} is unavailable", self.full_name())));
        }
        Ok(())
    }
}

#[async_trait]
impl TableSource for MemoryTable {
    fn project_key(&self) -> &str {
        &self.project_key
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn head_rows(&self, limit: usize) -> Result<TableHead> {
        self.check_available()?;
        Ok(TableHead {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(limit).cloned().collect(),
        })
    }

    async fn raw_bytes(&self, format: RawFormat) -> Result<Vec<u8>> {
        self.check_available()?;
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(format);
        }
        match format {
            RawFormat::TsvWithHeader => rows_to_tsv(&self.columns, &self.rows),
            RawFormat::Spreadsheet { .. } => self.spreadsheet.clone().ok_or_else(|| {
                JobError::source(format!("no spreadsheet export for {}", self.full_name()))
            }),
        }
    }

    async fn html_table(&self, _limit: usize, _apply_coloring: bool) -> Result<Option<String>> {
        self.check_available()?;
        Ok(self.html.clone())
    }
}
