// Configuration validation helpers

use crate::{ConfigError, Result};

/// Validation rules shared by the resolver
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate that a value is present and not blank
    pub fn not_empty<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str> {
        match value {
            Some(v) if !v.trim().is_empty() => Ok(v),
            _ => Err(ConfigError::invalid(field, "cannot be empty")),
        }
    }

    /// Validate that a column is part of the contact schema
    pub fn column_exists<S: AsRef<str>>(
        schema: &[S],
        column: &str,
        field: &'static str,
    ) -> Result<()> {
        if schema.iter().any(|c| c.as_ref() == column) {
            Ok(())
        } else {
            Err(ConfigError::UnknownColumn {
                field,
                column: column.to_string(),
            })
        }
    }

    /// Validate that a value is in a list of allowed values
    pub fn one_of<'a>(value: &str, allowed: &[&'a str], field: &str) -> Result<&'a str> {
        let value = value.trim().to_lowercase();
        allowed
            .iter()
            .find(|a| **a == value)
            .copied()
            .ok_or_else(|| {
                ConfigError::invalid(
                    field,
                    format!("'{}' is not one of {}", value, allowed.join(", ")),
                )
            })
    }

    /// Validate port number
    pub fn is_port(value: i64, field: &str) -> Result<u16> {
        match u16::try_from(value) {
            Ok(port) if port != 0 => Ok(port),
            _ => Err(ConfigError::invalid(
                field,
                format!("{} is not a valid port number", value),
            )),
        }
    }
}
