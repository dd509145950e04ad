//! Handlebars template registry shared by transforms and mapping resolution.
//!
//! # Design Decisions
//! - HTML escaping is disabled: templates produce arbitrary text (JSON, CSV, plain)
//! - Non-strict mode: a missing field renders as an empty string
//! - `json` helper renders any value as compact JSON

use handlebars::{handlebars_helper, no_escape, Handlebars, RenderError, TemplateError};
use serde::Serialize;

handlebars_helper!(json: |v: Json| v.to_string());

/// A set of named, pre-compiled templates.
#[derive(Clone)]
pub struct Templates {
    registry: Handlebars<'static>,
}

impl Templates {
    /// Create an empty template set.
    pub fn new() -> Self {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(no_escape);
        registry.register_helper("json", Box::new(json));
        Self { registry }
    }

    /// Compile `source` and register it under `name`.
    pub fn add(&mut self, name: &str, source: &str) -> Result<(), TemplateError> {
        self.registry.register_template_string(name, source)
    }

    /// Render the template `name` against `context`.
    pub fn render<T: Serialize>(&self, name: &str, context: &T) -> Result<String, RenderError> {
        self.registry.render(name, context)
    }
}

impl Default for Templates {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Templates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.registry.get_templates().keys().collect();
        names.sort();
        f.debug_struct("Templates").field("names", &names).finish()
    }
}
