//! Request mapping subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request (method, path, query, headers, body)
//!     → table.rs (first mapping by priority whose method + path pattern match)
//!     → pattern.rs (path captures)
//!     → data bag { method, path, query, headers }
//!     → render target templates (uri, headers, body, cache key)
//!     → RequestMapping (consumed read-only by the pipe)
//! ```
//!
//! # Design Decisions
//! - Mappings compiled at startup (and on reload), immutable at runtime
//! - Suppression flags are typed; the data bag stays open for template context
//! - First match wins (ordered by priority, then file order)

pub mod pattern;
pub mod table;

use std::sync::Arc;

use axum::http::Method;
use bytes::Bytes;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::transform::{CompiledTransform, TransformError};

pub use pattern::PathPattern;
pub use table::{InboundRequest, MappingTable};

/// Query key that disables the response transform for one request.
pub const NO_TRANSFORM_FLAG: &str = "_notransform";
/// Query key that disables cache lookup and store for one request.
pub const NO_CACHE_FLAG: &str = "_nocache";

/// Errors raised while compiling or resolving mappings.
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("mapping '{mapping}': invalid path pattern: {reason}")]
    Pattern { mapping: String, reason: String },

    #[error("mapping '{mapping}': invalid method '{value}'")]
    Method { mapping: String, value: String },

    #[error("mapping '{mapping}': invalid header name '{name}'")]
    HeaderName { mapping: String, name: String },

    #[error("mapping '{mapping}': invalid {field} template: {source}")]
    Template {
        mapping: String,
        field: String,
        source: handlebars::TemplateError,
    },

    #[error("mapping '{mapping}': {source}")]
    Transform {
        mapping: String,
        source: TransformError,
    },

    #[error("mapping '{mapping}': failed to render {field}: {source}")]
    Render {
        mapping: String,
        field: String,
        source: handlebars::RenderError,
    },
}

/// Per-request switches read from the `query` map of the data bag.
///
/// Only the presence of a key matters, not its value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MappingFlags {
    pub suppress_transform: bool,
    pub suppress_cache: bool,
}

impl MappingFlags {
    /// Read the flags from `data["query"]`. Absent keys yield `false`.
    pub fn from_data(data: &Map<String, Value>) -> Self {
        let query = data.get("query").and_then(Value::as_object);
        let has = |key: &str| query.is_some_and(|q| q.contains_key(key));
        Self {
            suppress_transform: has(NO_TRANSFORM_FLAG),
            suppress_cache: has(NO_CACHE_FLAG),
        }
    }
}

/// Caching policy of a mapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CachingPolicy {
    /// Time-to-live in seconds, added to the current time at store time.
    pub ttl_secs: u64,
}

/// A resolved description of one outbound request.
#[derive(Debug, Clone)]
pub struct RequestMapping {
    /// Name of the mapping this request resolved through.
    pub name: String,
    pub verb: Method,
    pub uri: String,
    /// Outbound headers, one value per name.
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    /// Open data bag: template context. Always holds a `query` object when resolved.
    pub data: Map<String, Value>,
    pub flags: MappingFlags,
    pub cache_key: Option<String>,
    pub transform: Option<Arc<CompiledTransform>>,
    pub caching: CachingPolicy,
}

impl RequestMapping {
    /// A mapping with no headers, body, data, caching or transform.
    pub fn new(verb: Method, uri: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            verb,
            uri: uri.into(),
            headers: Vec::new(),
            body: Bytes::new(),
            data: Map::new(),
            flags: MappingFlags::default(),
            cache_key: None,
            transform: None,
            caching: CachingPolicy::default(),
        }
    }

    /// Replace the data bag, re-deriving the flags from it.
    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.flags = MappingFlags::from_data(&data);
        self.data = data;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_cache(mut self, key: impl Into<String>, ttl_secs: u64) -> Self {
        self.cache_key = Some(key.into());
        self.caching = CachingPolicy { ttl_secs };
        self
    }

    pub fn with_transform(mut self, transform: CompiledTransform) -> Self {
        self.transform = Some(Arc::new(transform));
        self
    }

    /// Cache key in force for this request: `None` when absent, empty, or suppressed.
    pub fn effective_cache_key(&self) -> Option<&str> {
        if self.flags.suppress_cache {
            return None;
        }
        self.cache_key.as_deref().filter(|key| !key.is_empty())
    }

    /// Transform in force for this request, unless suppressed.
    pub fn effective_transform(&self) -> Option<&CompiledTransform> {
        if self.flags.suppress_transform {
            return None;
        }
        self.transform.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::Extraction;
    use serde_json::json;

    fn bag(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_flags_by_presence() {
        let flags = MappingFlags::from_data(&bag(json!({ "query": { "_nocache": "", "_notransform": "0" } })));
        assert!(flags.suppress_cache);
        assert!(flags.suppress_transform);

        let flags = MappingFlags::from_data(&bag(json!({ "query": { "page": "1" } })));
        assert_eq!(flags, MappingFlags::default());
    }

    #[test]
    fn test_flags_without_query() {
        assert_eq!(MappingFlags::from_data(&Map::new()), MappingFlags::default());
        let flags = MappingFlags::from_data(&bag(json!({ "query": "not-a-map", "_nocache": true })));
        assert_eq!(flags, MappingFlags::default());
    }

    #[test]
    fn test_effective_cache_key() {
        let mapping = RequestMapping::new(Method::GET, "http://upstream/").with_cache("k", 10);
        assert_eq!(mapping.effective_cache_key(), Some("k"));

        let empty = RequestMapping::new(Method::GET, "http://upstream/").with_cache("", 10);
        assert_eq!(empty.effective_cache_key(), None);

        let suppressed = mapping.with_data(bag(json!({ "query": { "_nocache": "" } })));
        assert_eq!(suppressed.effective_cache_key(), None);
        assert_eq!(suppressed.cache_key.as_deref(), Some("k"));
    }

    #[test]
    fn test_effective_transform() {
        let transform = CompiledTransform::new(Extraction::Json, "{{data.a}}").unwrap();
        let mapping = RequestMapping::new(Method::GET, "http://upstream/").with_transform(transform);
        assert!(mapping.effective_transform().is_some());

        let suppressed = mapping.with_data(bag(json!({ "query": { "_notransform": "" } })));
        assert!(suppressed.effective_transform().is_none());
    }
}
