// Job and channel file readers

use crate::{ConfigError, Result};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// On-disk formats a job or channel file may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Toml,
    /// `KEY=value` lines; keys are lowercased so `SMTP_HOST` reads as `smtp_host`.
    Env,
}

impl FileFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "toml" => Some(Self::Toml),
            "env" => Some(Self::Env),
            _ => None,
        }
    }

    fn detect(path: &Path) -> Result<Self> {
        let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
            return Err(ConfigError::LoadError(format!(
                "{}: cannot tell the file format without an extension",
                path.display()
            )));
        };
        Self::from_extension(ext).ok_or_else(|| {
            ConfigError::LoadError(format!("{}: unsupported format .{ext}", path.display()))
        })
    }

    fn read(self, content: &str) -> Result<Value> {
        match self {
            Self::Json => serde_json::from_str(content)
                .map_err(|e| ConfigError::ParseError(format!("invalid JSON: {e}"))),
            Self::Toml => {
                let table: toml::Table = toml::from_str(content)
                    .map_err(|e| ConfigError::ParseError(format!("invalid TOML: {e}")))?;
                serde_json::to_value(table)
                    .map_err(|e| ConfigError::ParseError(format!("unrepresentable TOML: {e}")))
            }
            Self::Env => Ok(Value::Object(read_env_lines(content))),
        }
    }
}

/// Reads a document in one [`FileFormat`].
pub struct ConfigLoader {
    format: FileFormat,
}

impl ConfigLoader {
    pub fn new(format: FileFormat) -> Self {
        Self { format }
    }

    /// Pick the format from the file extension.
    pub fn auto(path: impl AsRef<Path>) -> Result<Self> {
        FileFormat::detect(path.as_ref()).map(Self::new)
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }

    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<Value> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadError(format!("{}: {e}", path.display())))?;
        self.parse(&content)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), detail(e))))
    }

    /// Load a file whose top level must be a key/value mapping.
    pub fn load_mapping(&self, path: impl AsRef<Path>) -> Result<Map<String, Value>> {
        let path = path.as_ref();
        match self.load_file(path)? {
            Value::Object(map) => Ok(map),
            other => Err(ConfigError::ParseError(format!(
                "{}: expected a key/value mapping, found {}",
                path.display(),
                kind(&other)
            ))),
        }
    }

    pub fn parse(&self, content: &str) -> Result<Value> {
        self.format.read(content)
    }
}

fn read_env_lines(content: &str) -> Map<String, Value> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, value) = line.split_once('=')?;
            Some((key.trim().to_lowercase(), Value::String(unquote(value.trim()).to_string())))
        })
        .collect()
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

fn detail(err: ConfigError) -> String {
    match err {
        ConfigError::ParseError(msg) | ConfigError::LoadError(msg) => msg,
        other => other.to_string(),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_job() {
        let loader = ConfigLoader::new(FileFormat::Json);
        let job = loader
            .parse(r#"{"recipient_column": "email", "smtp_port": 2525}"#)
            .unwrap();
        assert_eq!(job["recipient_column"], "email");
        assert_eq!(job["smtp_port"], 2525);
    }

    #[test]
    fn test_toml_job() {
        let loader = ConfigLoader::new(FileFormat::Toml);
        let job = loader
            .parse(
                r#"
                use_subject_value = true
                subject_value = "Hi {{ name }}"
                "#,
            )
            .unwrap();
        assert_eq!(job["use_subject_value"], true);
        assert_eq!(job["subject_value"], "Hi {{ name }}");
    }

    #[test]
    fn test_env_lines() {
        let loader = ConfigLoader::new(FileFormat::Env);
        let job = loader
            .parse(
                r#"
                SMTP_HOST=mail.example.com
                # ignored
                export SMTP_USER="mailer"
                SUBJECT_VALUE='Hello "{{ name }}"'
                "#,
            )
            .unwrap();
        assert_eq!(job["smtp_host"], "mail.example.com");
        assert_eq!(job["smtp_user"], "mailer");
        assert_eq!(job["subject_value"], "Hello \"{{ name }}\"");
    }

    #[test]
    fn test_mapping_required_at_top_level() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.json");
        fs::write(&path, "[1, 2]").unwrap();

        let err = ConfigLoader::auto(&path)
            .unwrap()
            .load_mapping(&path)
            .unwrap_err();
        assert!(err.to_string().contains("found an array"));
    }

    #[test]
    fn test_parse_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.toml");
        fs::write(&path, "smtp_port = ").unwrap();

        let err = ConfigLoader::auto(&path).unwrap().load_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
        assert!(err.to_string().contains("job.toml"));
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(FileFormat::from_extension("TOML"), Some(FileFormat::Toml));
        assert_eq!(FileFormat::from_extension("yaml"), None);
        assert_eq!(ConfigLoader::auto("job.env").unwrap().format(), FileFormat::Env);
        assert!(ConfigLoader::auto("job").is_err());
        assert!(ConfigLoader::auto("job.yaml").is_err());
    }
}
