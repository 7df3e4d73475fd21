// Environment variable overrides

use serde_json::{Map, Value};
use std::env;

/// Reads `<PREFIX>_<KEY>` environment variables as configuration entries.
///
/// `MAILMERGE_SMTP_PASS=secret` becomes `smtp_pass = "secret"`, which keeps
/// credentials out of job files.
pub struct EnvLoader {
    prefix: String,
}

impl EnvLoader {
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into().trim_end_matches('_').to_uppercase();
        Self { prefix }
    }

    /// Entries from the process environment. Non-unicode variables are skipped.
    pub fn load(&self) -> Map<String, Value> {
        self.load_from(env::vars_os().filter_map(|(key, value)| {
            Some((key.into_string().ok()?, value.into_string().ok()?))
        }))
    }

    /// Entries from an explicit list of variables
    pub fn load_from<I>(&self, vars: I) -> Map<String, Value>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let marker = format!("{}_", self.prefix);
        vars.into_iter()
            .filter_map(|(key, value)| {
                let key = key.strip_prefix(&marker)?.to_lowercase();
                (!key.is_empty()).then(|| (key, Value::String(value)))
            })
            .collect()
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::new("MAILMERGE")
    }
}
