//! Response transform subsystem.
//!
//! # Data Flow
//! ```text
//! materialized upstream body
//!     → extract.rs (json object parse | regexp named captures)
//!     → { "data": <extraction> } merged with the mapping's data bag
//!     → template.rs (Handlebars render)
//!     → new response body
//! ```
//!
//! # Design Decisions
//! - Transforms are compiled once, when the mapping table is built
//! - Data-bag keys are applied after `data`, plain overwrite

pub mod extract;
pub mod template;

use handlebars::{RenderError, TemplateError};
use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::schema::TransformConfig;

pub use extract::Extraction;
pub use template::Templates;

const TEMPLATE_NAME: &str = "transform";

/// Errors raised while compiling or applying a transform.
#[derive(Debug, Error)]
pub enum TransformError {
    /// The body could not be parsed for a `json` transform.
    #[error("{source} : {body}")]
    Parse {
        source: serde_json::Error,
        body: String,
    },

    /// Template rendering failed.
    #[error("{0}")]
    Render(#[from] RenderError),

    /// Unsupported transform type in configuration.
    #[error("unknown transform type '{0}' (expected json or regexp)")]
    UnknownKind(String),

    /// A `regexp` transform without a pattern.
    #[error("regexp transform requires a pattern")]
    MissingPattern,

    /// Pattern failed to compile.
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Template failed to compile.
    #[error("invalid template: {0}")]
    Template(#[from] TemplateError),
}

/// A transform ready to run: extraction rule plus compiled template.
#[derive(Debug, Clone)]
pub struct CompiledTransform {
    extraction: Extraction,
    templates: Templates,
}

impl CompiledTransform {
    /// Compile a transform from its configuration.
    pub fn compile(config: &TransformConfig) -> Result<Self, TransformError> {
        let extraction = match config.kind.as_str() {
            "json" => Extraction::Json,
            "regexp" => {
                let pattern = config.pattern.as_deref().ok_or(TransformError::MissingPattern)?;
                Extraction::Regexp(Regex::new(pattern)?)
            }
            other => return Err(TransformError::UnknownKind(other.to_string())),
        };
        Self::new(extraction, &config.template)
    }

    /// Build a transform from an extraction rule and template source.
    pub fn new(extraction: Extraction, template: &str) -> Result<Self, TransformError> {
        let mut templates = Templates::new();
        templates.add(TEMPLATE_NAME, template)?;
        Ok(Self {
            extraction,
            templates,
        })
    }

    /// Extraction rule of this transform.
    pub fn extraction(&self) -> &Extraction {
        &self.extraction
    }

    /// Extract from `body` and render the template against the result merged with `bag`.
    pub fn apply(&self, body: &[u8], bag: &Map<String, Value>) -> Result<String, TransformError> {
        let data = self.extraction.extract(body)?;
        self.render(data, bag)
    }

    /// Render the template with `data` wrapped under `"data"` and `bag` applied over it.
    pub fn render(
        &self,
        data: Map<String, Value>,
        bag: &Map<String, Value>,
    ) -> Result<String, TransformError> {
        let mut context = Map::new();
        context.insert("data".to_string(), Value::Object(data));
        for (key, value) in bag {
            context.insert(key.clone(), value.clone());
        }
        Ok(self.templates.render(TEMPLATE_NAME, &context)?)
    }
}
