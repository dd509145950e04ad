//! The forwarding pipe.
//!
//! # Data Flow
//! ```text
//! RequestMapping
//!     → flags (suppress transform / cache) → effective cache key
//!     → cached.rs lookup          hit → replay stored response, stop
//!     → forward.rs                build + send outbound request
//!     → body.rs                   drain now if a transform must run
//!     → transform                 extract + render new body
//!     → upstream headers + status
//!     → body.rs                   drain late if the result will be cached
//!     → CacheStore::set           only for a drained body and a live key
//!     → body                      buffered bytes, or the upstream stream as-is
//! ```
//!
//! # Design Decisions
//! - The response is assembled in full before it is returned, so a late drain
//!   failure becomes a clean 500 instead of a half-written response
//! - Nothing is buffered when neither a transform nor a cache write needs it
//! - The cached body and the body sent to the caller are the same text

pub mod body;
pub mod cached;
pub mod error;
pub mod forward;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Response};
use axum::response::IntoResponse;
use bytes::Bytes;

use crate::cache::{now_unix, CacheStore, CachedResponse};
use crate::mapping::RequestMapping;

pub use body::UpstreamBody;
pub use error::PipeError;
pub use forward::{build_request, HyperUpstream, Upstream};

/// Version advertised in `X-AProxy-Version`.
pub const PROXY_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const X_APROXY_VERSION: HeaderName = HeaderName::from_static("x-aproxy-version");
pub const X_CACHE_HIT: HeaderName = HeaderName::from_static("x-cache-hit");
pub const X_CACHE_KEY: HeaderName = HeaderName::from_static("x-cache-key");
pub const X_CACHE_EXPIRATION_SECONDS: HeaderName =
    HeaderName::from_static("x-cache-expiration-seconds");

/// Framing headers describe the upstream message, not the body we send.
fn is_framing(name: &HeaderName) -> bool {
    name == header::CONTENT_LENGTH || name == header::TRANSFER_ENCODING || name == header::CONNECTION
}

/// Copy the first value of each header name into `dst`, skipping framing headers.
pub(crate) fn copy_first_values<I>(src: I, dst: &mut HeaderMap)
where
    I: IntoIterator<Item = (HeaderName, HeaderValue)>,
{
    for (name, value) in src {
        if is_framing(&name) || dst.contains_key(&name) {
            continue;
        }
        dst.insert(name, value);
    }
}

/// Forwards mapped requests upstream, with optional caching and transforms.
#[derive(Clone)]
pub struct HttpPipe {
    upstream: Arc<dyn Upstream>,
    cache: Option<Arc<dyn CacheStore>>,
}

impl HttpPipe {
    /// Create a pipe. Without a cache store every request behaves as cache-less.
    pub fn new(upstream: Arc<dyn Upstream>, cache: Option<Arc<dyn CacheStore>>) -> Self {
        Self { upstream, cache }
    }

    /// Serve one mapped request. Failures are rendered as error responses.
    pub async fn pipe(&self, mapping: &RequestMapping) -> Response<Body> {
        let mut response = match self.run(mapping).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(
                    mapping = %mapping.name,
                    uri = %mapping.uri,
                    status = e.status().as_u16(),
                    error = %e,
                    "Pipe failed"
                );
                e.into_response()
            }
        };
        response
            .headers_mut()
            .insert(X_APROXY_VERSION, HeaderValue::from_static(PROXY_VERSION));
        response
    }

    async fn run(&self, mapping: &RequestMapping) -> Result<Response<Body>, PipeError> {
        let cache = self.cache.as_deref().zip(mapping.effective_cache_key());

        tracing::info!(
            mapping = %mapping.name,
            verb = %mapping.verb,
            uri = %mapping.uri,
            cache_key = cache.map(|(_, key)| key).unwrap_or_default(),
            transform = mapping
                .effective_transform()
                .map(|t| t.extraction().kind())
                .unwrap_or("none"),
            "Piping request"
        );

        if let Some((store, key)) = cache {
            if let Some(hit) = cached::lookup(store, key).await {
                return Ok(hit);
            }
        }

        let request = build_request(mapping)?;
        let upstream = self.upstream.send(request).await.map_err(PipeError::Transport)?;
        let (parts, body) = upstream.into_parts();
        let mut body = UpstreamBody::Streamed(body);

        let mut rendered = None;
        if let Some(transform) = mapping.effective_transform() {
            body = body.into_buffered().await.map_err(PipeError::BodyRead)?;
            let bytes: &[u8] = body.bytes().map(|b| &b[..]).unwrap_or_default();
            rendered = Some(transform.apply(bytes, &mapping.data)?);
        }

        let mut headers = HeaderMap::new();
        copy_first_values(
            parts.headers.iter().map(|(n, v)| (n.clone(), v.clone())),
            &mut headers,
        );
        let mut response = Response::new(Body::empty());
        *response.status_mut() = parts.status;
        *response.headers_mut() = headers;

        if cache.is_some() && !body.is_buffered() {
            body = body.into_buffered().await.map_err(PipeError::BodyRead)?;
        }

        *response.body_mut() = match body {
            UpstreamBody::Buffered(bytes) => {
                let final_body = rendered.map(Bytes::from).unwrap_or(bytes);
                if let Some((store, key)) = cache {
                    let ttl_secs = mapping.caching.ttl_secs;
                    store_entry(store, key, ttl_secs, &parts.headers, parts.status.as_u16(), &final_body).await;
                }
                Body::from(final_body)
            }
            UpstreamBody::Streamed(stream) => stream,
        };

        Ok(response)
    }
}

async fn store_entry(
    store: &dyn CacheStore,
    key: &str,
    ttl_secs: u64,
    headers: &HeaderMap,
    status_code: u16,
    body: &Bytes,
) {
    let Ok(text) = std::str::from_utf8(body) else {
        tracing::debug!(cache_key = %key, "Body is not UTF-8, not caching");
        return;
    };

    let expires = now_unix().saturating_add(i64::try_from(ttl_secs).unwrap_or(i64::MAX));
    let entry = CachedResponse {
        header: cached::header_snapshot(headers),
        status_code,
        body: text.to_string(),
        expires,
        key: key.to_string(),
    };

    if let Err(e) = store.set(key, expires, entry).await {
        tracing::warn!(cache_key = %key, error = %e, "Cache store failed");
    } else {
        tracing::debug!(cache_key = %key, ttl_secs, "Stored response");
    }
}
