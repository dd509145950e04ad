//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Compile every mapping (patterns, methods, templates, transforms)
//! - Validate value ranges (capacity > 0, parseable bind address)
//! - Detect duplicate mapping names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::mapping::{MappingError, MappingTable};

/// A single semantic problem in a configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid listener bind address '{0}'")]
    BindAddress(String),

    #[error("cache.max_entries must be greater than zero")]
    ZeroCacheCapacity,

    #[error("mapping name must not be empty")]
    EmptyMappingName,

    #[error("duplicate mapping name '{0}'")]
    DuplicateMappingName(String),

    #[error(transparent)]
    Mapping(#[from] MappingError),
}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    if config.cache.enabled && config.cache.max_entries == 0 {
        errors.push(ValidationError::ZeroCacheCapacity);
    }

    let mut names = HashSet::new();
    for mapping in &config.mappings {
        if mapping.name.is_empty() {
            errors.push(ValidationError::EmptyMappingName);
        } else if !names.insert(mapping.name.as_str()) {
            errors.push(ValidationError::DuplicateMappingName(mapping.name.clone()));
        }
    }

    if let Err(mapping_errors) = MappingTable::from_config(&config.mappings) {
        errors.extend(mapping_errors.into_iter().map(ValidationError::from));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
