//! Host collaborators of a mail job.
//!
//! The job never touches storage directly. It reads contacts from a
//! [`RowSource`], reads attachment tables through [`TableSource`] and writes
//! outcomes to an [`OutputSink`]. Bindings for CSV files and in-memory data
//! live in [`crate::csv_source`] and [`crate::memory`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Result;

/// A contact: ordered mapping of column name to scalar value.
pub type ContactRow = Map<String, Value>;

/// A column of a tabular schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, column_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into(),
        }
    }

    /// A string column.
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, "string")
    }
}

/// Column names of a schema, in order.
pub fn column_names(schema: &[ColumnSchema]) -> Vec<String> {
    schema.iter().map(|c| c.name.clone()).collect()
}

/// Source of contact rows.
pub trait RowSource: Send {
    /// Schema of the rows.
    fn schema(&self) -> Result<Vec<ColumnSchema>>;

    /// Rows in input order.
    fn rows(&mut self) -> Result<Box<dyn Iterator<Item = Result<ContactRow>> + Send + '_>>;
}

/// Destination of outcome rows.
pub trait OutputSink: Send {
    /// Declare the output schema. Called once, before any row.
    fn write_schema(&mut self, schema: &[ColumnSchema]) -> Result<()>;

    /// Append one row.
    fn write_row(&mut self, row: &ContactRow) -> Result<()>;

    /// Flush buffered output.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Raw export formats of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawFormat {
    /// Tab-separated values with a header line.
    TsvWithHeader,
    /// Spreadsheet workbook, optionally with the table's conditional formatting.
    Spreadsheet { apply_coloring: bool },
}

/// The first rows of a table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableHead {
    pub columns: Vec<String>,
    pub rows: Vec<ContactRow>,
}

/// A table attached to every message.
#[async_trait]
pub trait TableSource: Send + Sync {
    /// Key of the project owning the table.
    fn project_key(&self) -> &str;

    /// Table name within its project.
    fn name(&self) -> &str;

    /// `PROJECT.name`, used for attachment file names.
    fn full_name(&self) -> String {
        format!("{}.{}", self.project_key(), self.name())
    }

    /// Read at most `limit` rows.
    async fn head_rows(&self, limit: usize) -> Result<TableHead>;

    /// Export the whole table.
    async fn raw_bytes(&self, format: RawFormat) -> Result<Vec<u8>>;

    /// HTML rendering of the first `limit` rows, when the host can produce one.
    async fn html_table(&self, _limit: usize, _apply_coloring: bool) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Optional features of the host platform.
///
/// Provided by the binding; features that are not advertised are never
/// requested.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlatformCapabilities {
    /// Tables can render themselves as HTML.
    pub dataset_to_html: bool,
    /// Spreadsheet exports can carry conditional formatting.
    pub conditional_formatting: bool,
}

impl PlatformCapabilities {
    pub fn all() -> Self {
        Self {
            dataset_to_html: true,
            conditional_formatting: true,
        }
    }
}

/// Render a cell the way it appears in messages and files. Nulls are empty.
pub fn cell_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
