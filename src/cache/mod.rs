//! Response cache subsystem.
//!
//! # Data Flow
//! ```text
//! pipe (cache key non-empty)
//!     → CacheStore::get(key)        hit → replay CachedResponse
//!     → ... upstream round trip ...
//!     → CacheStore::set(key, now + ttl, CachedResponse)
//! ```
//!
//! # Design Decisions
//! - The store owns concurrency and eviction; callers never lock
//! - `Expires` is absolute (unix seconds), computed once at store time
//! - Lookup failures are the caller's to downgrade to a miss

pub mod memory;

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::MemoryCache;

/// Errors surfaced by a cache store.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The backing store could not be reached or answered with an error.
    #[error("cache backend error: {0}")]
    Backend(String),
}

/// The unit persisted to and replayed from a cache store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CachedResponse {
    /// Upstream headers, all values per name. Only the first is replayed.
    pub header: BTreeMap<String, Vec<String>>,
    /// Upstream status code.
    pub status_code: u16,
    /// Final (possibly transformed) body.
    pub body: String,
    /// Expiry timestamp (seconds since epoch).
    pub expires: i64,
    /// Key the entry was stored under.
    pub key: String,
}

impl CachedResponse {
    /// Seconds left until expiry, measured at `now`. Negative once expired.
    pub fn remaining_secs(&self, now: i64) -> i64 {
        self.expires - now
    }
}

/// Concurrent key/value store for cached responses.
///
/// Implementations must tolerate simultaneous `get`/`set` calls from many requests.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Look up `key`. `Ok(None)` is a miss.
    async fn get(&self, key: &str) -> Result<Option<CachedResponse>, CacheError>;

    /// Store `value` under `key` until `expires_at` (unix seconds).
    async fn set(&self, key: &str, expires_at: i64, value: CachedResponse) -> Result<(), CacheError>;
}

/// Current unix time in seconds.
pub fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_field_names() {
        let entry = CachedResponse {
            header: BTreeMap::from([("Content-Type".to_string(), vec!["text/plain".to_string()])]),
            status_code: 200,
            body: "hello".to_string(),
            expires: 1_700_000_000,
            key: "k".to_string(),
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["StatusCode"], 200);
        assert_eq!(value["Header"]["Content-Type"][0], "text/plain");
        assert_eq!(value["Expires"], 1_700_000_000i64);
        assert_eq!(value["Key"], "k");

        let decoded: CachedResponse = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, entry);
    }

    #[test]
    fn test_remaining_secs_may_be_negative() {
        let entry = CachedResponse {
            header: BTreeMap::new(),
            status_code: 200,
            body: String::new(),
            expires: 100,
            key: String::new(),
        };
        assert_eq!(entry.remaining_secs(40), 60);
        assert_eq!(entry.remaining_secs(100), 0);
        assert_eq!(entry.remaining_secs(130), -30);
    }
}
