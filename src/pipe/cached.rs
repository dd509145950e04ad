//! Cache lookup, replay and entry construction for the pipe.

use std::collections::BTreeMap;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Response, StatusCode};

use crate::cache::{now_unix, CacheStore, CachedResponse};
use crate::pipe::{copy_first_values, X_CACHE_EXPIRATION_SECONDS, X_CACHE_HIT, X_CACHE_KEY};

/// Look up `key` and build the replayed response on a hit.
///
/// Misses, store errors and unusable entries all return `None`.
pub async fn lookup(cache: &dyn CacheStore, key: &str) -> Option<Response<Body>> {
    match cache.get(key).await {
        Ok(Some(entry)) => match StatusCode::from_u16(entry.status_code) {
            Ok(status) => {
                tracing::info!(cache_key = %key, "Cache hit");
                Some(replay(entry, status, now_unix()))
            }
            Err(_) => {
                tracing::warn!(cache_key = %key, status = entry.status_code, "Ignoring cache entry with invalid status");
                None
            }
        },
        Ok(None) => {
            tracing::debug!(cache_key = %key, "Cache miss");
            None
        }
        Err(e) => {
            tracing::warn!(cache_key = %key, error = %e, "Cache lookup failed, treating as miss");
            None
        }
    }
}

/// Rebuild a response from a stored entry, adding the three cache headers.
fn replay(entry: CachedResponse, status: StatusCode, now: i64) -> Response<Body> {
    let mut headers = HeaderMap::new();
    copy_first_values(
        entry.header.iter().filter_map(|(name, values)| {
            let name = HeaderName::from_bytes(name.as_bytes()).ok()?;
            let value = HeaderValue::from_str(values.first()?).ok()?;
            Some((name, value))
        }),
        &mut headers,
    );

    headers.insert(X_CACHE_HIT, HeaderValue::from_static("true"));
    match HeaderValue::from_str(&entry.key) {
        Ok(key) => {
            headers.insert(X_CACHE_KEY, key);
        }
        Err(_) => {
            tracing::warn!(cache_key = ?entry.key, "Cache key is not a valid header value, omitting X-Cache-Key");
        }
    }
    headers.insert(
        X_CACHE_EXPIRATION_SECONDS,
        HeaderValue::from(entry.remaining_secs(now)),
    );

    let mut response = Response::new(Body::from(entry.body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// Snapshot every upstream header value, grouped by name.
pub fn header_snapshot(headers: &HeaderMap) -> BTreeMap<String, Vec<String>> {
    let mut snapshot: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            snapshot
                .entry(canonical_name(name.as_str()))
                .or_default()
                .push(value.to_string());
        }
    }
    snapshot
}

/// `content-type` → `Content-Type`.
fn canonical_name(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}
