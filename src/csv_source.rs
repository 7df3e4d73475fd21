//! CSV file bindings.
//!
//! Contacts are read from a CSV file with a header line, attachment tables
//! from CSV files (with an optional `.xlsx` export next to them) and outcomes
//! are written to a CSV file.

use async_trait::async_trait;
use serde_json::Value;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::source::{
    ColumnSchema, ContactRow, OutputSink, RawFormat, RowSource, TableHead, TableSource,
    cell_to_string,
};
use crate::{JobError, Result};

/// Serialize rows as tab-separated values with a header line.
pub fn rows_to_tsv(columns: &[String], rows: &[ContactRow]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(Vec::new());
    writer.write_record(columns)?;
    for row in rows {
        writer.write_record(
            columns
                .iter()
                .map(|c| row.get(c).map(cell_to_string).unwrap_or_default()),
        )?;
    }
    writer.into_inner().map_err(|e| JobError::Io(e.into_error()))
}

fn read_headers(path: &Path, delimiter: u8) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .from_path(path)?;
    Ok(reader.headers()?.iter().map(str::to_string).collect())
}

fn record_to_row(headers: &[String], record: &csv::StringRecord) -> ContactRow {
    headers
        .iter()
        .zip(record.iter())
        .map(|(h, v)| (h.clone(), Value::String(v.to_string())))
        .collect()
}

/// Contacts read from a CSV file. Every column is a string column.
#[derive(Debug, Clone)]
pub struct CsvRowSource {
    path: PathBuf,
    delimiter: u8,
    headers: Vec<String>,
}

impl CsvRowSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_delimiter(path, b',')
    }

    pub fn with_delimiter(path: impl AsRef<Path>, delimiter: u8) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let headers = read_headers(&path, delimiter)?;
        debug!(path = %path.display(), columns = headers.len(), "Opened contacts file");
        Ok(Self {
            path,
            delimiter,
            headers,
        })
    }
}

impl RowSource for CsvRowSource {
    fn schema(&self) -> Result<Vec<ColumnSchema>> {
        Ok(self.headers.iter().map(ColumnSchema::string).collect())
    }

    fn rows(&mut self) -> Result<Box<dyn Iterator<Item = Result<ContactRow>> + Send + '_>> {
        let reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .from_path(&self.path)?;
        let headers = &self.headers;
        Ok(Box::new(reader.into_records().map(move |record| {
            record
                .map(|r| record_to_row(headers, &r))
                .map_err(JobError::from)
        })))
    }
}

/// Attachment table backed by a CSV file.
///
/// Spreadsheet exports are served from a file with the same stem and an
/// `.xlsx` extension, when one exists.
#[derive(Debug, Clone)]
pub struct CsvTable {
    path: PathBuf,
    project_key: String,
    name: String,
}

impl CsvTable {
    /// Table named after the file stem.
    pub fn open(path: impl AsRef<Path>, project_key: impl Into<String>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                JobError::source(format!("cannot name table from {}", path.display()))
            })?
            .to_string();
        Ok(Self {
            path,
            project_key: project_key.into(),
            name,
        })
    }

    fn read_all(&self, limit: Option<usize>) -> Result<TableHead> {
        let mut reader = csv::Reader::from_path(&self.path)?;
        let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            if limit.is_some_and(|l| rows.len() >= l) {
                break;
            }
            rows.push(record_to_row(&columns, &record?));
        }
        Ok(TableHead { columns, rows })
    }

    fn spreadsheet_path(&self) -> PathBuf {
        self.path.with_extension("xlsx")
    }
}

#[async_trait]
impl TableSource for CsvTable {
    fn project_key(&self) -> &str {
        &self.project_key
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn head_rows(&self, limit: usize) -> Result<TableHead> {
        self.read_all(Some(limit))
    }

    async fn raw_bytes(&self, format: RawFormat) -> Result<Vec<u8>> {
        match format {
            RawFormat::TsvWithHeader => {
                let table = self.read_all(None)?;
                rows_to_tsv(&table.columns, &table.rows)
            }
            RawFormat::Spreadsheet { .. } => {
                let path = self.spreadsheet_path();
                tokio::fs::read(&path).await.map_err(|e| {
                    JobError::source(format!("no spreadsheet export at {}: {}", path.display(), e))
                })
            }
        }
    }
}

/// Outcome rows written to a CSV file.
pub struct CsvOutputSink {
    writer: csv::Writer<File>,
    columns: Vec<String>,
}

impl CsvOutputSink {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            writer: csv::Writer::from_path(path)?,
            columns: Vec::new(),
        })
    }
}

impl OutputSink for CsvOutputSink {
    fn write_schema(&mut self, schema: &[ColumnSchema]) -> Result<()> {
        self.columns = schema.iter().map(|c| c.name.clone()).collect();
        self.writer.write_record(&self.columns)?;
        self.writer.flush()?;
        Ok(())
    }

    fn write_row(&mut self, row: &ContactRow) -> Result<()> {
        if self.columns.is_empty() {
            return Err(JobError::sink("row written before schema"));
        }
        self.writer.write_record(
            self.columns
                .iter()
                .map(|c| row.get(c).map(cell_to_string).unwrap_or_default()),
        )?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
