//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root configuration for aproxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, inbound limits).
    pub listener: ListenerConfig,

    /// Response cache settings.
    pub cache: CacheConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Mapping definitions turning inbound requests into upstream requests.
    pub mappings: Vec<MappingConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum inbound request body size in bytes.
    pub max_body_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Response cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable the in-memory cache store.
    pub enabled: bool,

    /// Maximum number of entries held by the memory store.
    pub max_entries: usize,

    /// Interval between sweeps of expired entries in seconds (0 disables the sweep).
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 10_000,
            sweep_interval_secs: 60,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// A single mapping: which inbound requests it applies to and how they are forwarded.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MappingConfig {
    /// Mapping identifier for logging.
    pub name: String,

    /// Inbound method filter. Any method matches when absent.
    #[serde(default)]
    pub method: Option<String>,

    /// Inbound path pattern, e.g. `/orders/{id}` or `/static/{*rest}`.
    pub path: String,

    /// Mapping priority (higher = checked first).
    #[serde(default)]
    pub priority: u32,

    /// Upstream request description.
    pub target: TargetConfig,

    /// Caching policy. No caching when absent.
    #[serde(default)]
    pub caching: Option<CachingConfig>,
}

/// Upstream target of a mapping. String fields are Handlebars templates.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TargetConfig {
    /// Upstream method. Defaults to the inbound method.
    #[serde(default)]
    pub method: Option<String>,

    /// Upstream URI template.
    pub uri: String,

    /// Outbound header templates, one value per name.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Outbound body template. The inbound body is forwarded when absent.
    #[serde(default)]
    pub body: Option<String>,

    /// Optional response transform.
    #[serde(default)]
    pub transform: Option<TransformConfig>,
}

/// Caching policy of a mapping.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CachingConfig {
    /// Cache key template. An empty rendering disables caching for that request.
    pub key: String,

    /// Time-to-live in seconds.
    #[serde(default = "default_cache_seconds")]
    pub seconds: u64,
}

fn default_cache_seconds() -> u64 {
    60
}

/// Response transform of a mapping.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransformConfig {
    /// Extraction mode: `json` or `regexp`.
    #[serde(rename = "type")]
    pub kind: String,

    /// Regular expression with named groups (required for `regexp`).
    #[serde(default)]
    pub pattern: Option<String>,

    /// Template rendered against `{ data: <extraction>, ..data bag }`.
    pub template: String,
}
