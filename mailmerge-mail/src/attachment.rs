//! Email attachments.

use lettre::message::SinglePart;
use lettre::message::header::ContentType;

use crate::{MailError, Result};

/// MIME subtype of xlsx workbooks.
pub const XLSX_SUBTYPE: &str = "vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// A file attached to every message of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// File name including extension.
    pub filename: String,
    /// Main MIME type (`text`, `application`).
    pub mime_type: String,
    /// MIME subtype (`csv`, the xlsx subtype, ...).
    pub mime_subtype: String,
    /// File content.
    pub data: Vec<u8>,
}

impl Attachment {
    /// Create a new attachment from bytes.
    pub fn new(
        filename: impl Into<String>,
        mime_type: impl Into<String>,
        mime_subtype: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            filename: filename.into(),
            mime_type: mime_type.into(),
            mime_subtype: mime_subtype.into(),
            data: data.into(),
        }
    }

    /// Create a CSV attachment.
    pub fn csv(filename: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self::new(filename, "text", "csv", data)
    }

    /// Create an Excel attachment.
    pub fn xlsx(filename: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self::new(filename, "application", XLSX_SUBTYPE, data)
    }

    /// Full content type, e.g. `text/csv`.
    pub fn content_type(&self) -> String {
        format!("{}/{}", self.mime_type, self.mime_subtype)
    }

    /// Build the MIME part. Text attachments are declared utf-8.
    pub(crate) fn to_part(&self) -> Result<SinglePart> {
        let content_type = match self.mime_type.as_str() {
            "text" => format!("{}; charset=utf-8", self.content_type()),
            "application" => self.content_type(),
            other => {
                return Err(MailError::Attachment(format!(
                    "Cannot handle mime type {} for {}",
                    other, self.filename
                )));
            }
        };
        let content_type = ContentType::parse(&content_type)
            .map_err(|e| MailError::Attachment(format!("{}: {}", self.filename, e)))?;

        Ok(lettre::message::Attachment::new(self.filename.clone())
            .body(self.data.clone(), content_type))
    }
}
