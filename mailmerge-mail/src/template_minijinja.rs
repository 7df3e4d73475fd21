//! MiniJinja template engine integration for email templates.
//!
//! Undefined variables are errors: a template that references a key absent
//! from the render context fails instead of rendering an empty string.

use minijinja::{Environment, UndefinedBehavior};
use tracing::debug;

use crate::{MailError, Result, TemplateEngine, TemplateSlot};

/// MiniJinja template engine for email rendering.
pub struct MiniJinjaEngine {
    env: Environment<'static>,
}

impl MiniJinjaEngine {
    /// Create an engine with strict undefined handling.
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        Self { env }
    }
}

impl Default for MiniJinjaEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine for MiniJinjaEngine {
    fn render(&self, slot: TemplateSlot, context: &serde_json::Value) -> Result<String> {
        let template = self
            .env
            .get_template(slot.as_str())
            .map_err(|_| MailError::TemplateNotFound(slot))?;

        template.render(context).map_err(|e| MailError::Render {
            slot,
            message: e.to_string(),
        })
    }

    fn register_template(&mut self, slot: TemplateSlot, source: &str) -> Result<()> {
        self.env
            .add_template_owned(slot.as_str(), source.to_string())
            .map_err(|e| MailError::TemplateSyntax {
                slot,
                message: e.to_string(),
            })?;
        debug!(slot = %slot, "Compiled template");
        Ok(())
    }
}
