//! Structured extraction from upstream bodies.

use regex::Regex;
use serde_json::{Map, Value};

use crate::transform::TransformError;

/// How structured data is pulled out of a materialized body.
#[derive(Debug, Clone)]
pub enum Extraction {
    /// Parse the body as a JSON object.
    Json,
    /// Take the named capture groups of the first match.
    Regexp(Regex),
}

impl Extraction {
    /// Name of the extraction mode as written in configuration.
    pub fn kind(&self) -> &'static str {
        match self {
            Extraction::Json => "json",
            Extraction::Regexp(_) => "regexp",
        }
    }

    /// Extract a string-keyed map from `body`.
    ///
    /// A `regexp` non-match yields an empty map. Named groups that did not
    /// take part in the match are reported as empty strings.
    pub fn extract(&self, body: &[u8]) -> Result<Map<String, Value>, TransformError> {
        match self {
            Extraction::Json => {
                serde_json::from_slice(body).map_err(|source| TransformError::Parse {
                    source,
                    body: String::from_utf8_lossy(body).into_owned(),
                })
            }
            Extraction::Regexp(re) => {
                let text = String::from_utf8_lossy(body);
                let mut data = Map::new();
                if let Some(caps) = re.captures(&text) {
                    for (i, name) in re.capture_names().enumerate() {
                        let Some(name) = name.filter(|n| !n.is_empty()) else {
                            continue;
                        };
                        let value = caps.get(i).map(|m| m.as_str()).unwrap_or_default();
                        data.insert(name.to_string(), Value::String(value.to_string()));
                    }
                }
                Ok(data)
            }
        }
    }
}
