// Configuration for mailmerge jobs

pub mod env;
pub mod error;
pub mod loader;
pub mod resolver;
pub mod validation;

pub use env::EnvLoader;
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};
pub use resolver::{
    AttachmentType, BodySelector, ChannelSpec, FieldSelector, SendConfig, SenderSelector,
    TransportSpec,
};
pub use validation::ConfigValidator;

use serde_json::{Map, Value};
use std::path::Path;

/// The flat key/value configuration of a job.
///
/// Values keep the loose typing of hand-edited files: an empty string counts
/// as unset, booleans may be written as strings, ports as strings or numbers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeConfig {
    values: Map<String, Value>,
}

impl RecipeConfig {
    /// Create an empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON value, which must be an object
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(values) => Ok(Self { values }),
            _ => Err(ConfigError::ParseError(
                "configuration must be a key/value mapping".to_string(),
            )),
        }
    }

    /// Load from a JSON, TOML or .env file, picking the format from the extension
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let values = ConfigLoader::auto(path)?.load_mapping(path)?;
        Ok(Self { values })
    }

    /// Overlay entries from another mapping, replacing existing keys
    pub fn merge(&mut self, other: Map<String, Value>) {
        for (key, value) in other {
            self.values.insert(key, value);
        }
    }

    /// Set a configuration value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Builder-style `set`
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Raw value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Non-empty string value. Numbers are rendered as strings.
    pub fn get_string(&self, key: &str) -> Option<String> {
        match self.values.get(key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Boolean flag, `false` when unset
    pub fn get_bool(&self, key: &str) -> Result<bool> {
        match self.values.get(key) {
            None | Some(Value::Null) => Ok(false),
            Some(Value::Bool(b)) => Ok(*b),
            Some(Value::Number(n)) => match n.as_i64() {
                Some(0) => Ok(false),
                Some(1) => Ok(true),
                _ => Err(ConfigError::invalid(key, format!("{} is not a boolean", n))),
            },
            Some(Value::String(s)) => match s.trim().to_lowercase().as_str() {
                "" | "false" | "0" | "no" | "off" => Ok(false),
                "true" | "1" | "yes" | "on" => Ok(true),
                other => Err(ConfigError::invalid(
                    key,
                    format!("'{}' is not a boolean", other),
                )),
            },
            Some(_) => Err(ConfigError::invalid(key, "expected a boolean")),
        }
    }

    /// Port number, `default` when unset
    pub fn get_port(&self, key: &str, default: u16) -> Result<u16> {
        let raw = match self.values.get(key) {
            None | Some(Value::Null) => return Ok(default),
            Some(Value::Number(n)) => n
                .as_i64()
                .ok_or_else(|| ConfigError::invalid(key, format!("{} is not an integer", n)))?,
            Some(Value::String(s)) if s.trim().is_empty() => return Ok(default),
            Some(Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| ConfigError::invalid(key, format!("'{}' is not an integer", s)))?,
            Some(_) => return Err(ConfigError::invalid(key, "expected an integer")),
        };
        ConfigValidator::is_port(raw, key)
    }

    /// Check if a key exists
    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }
}
