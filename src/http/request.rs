//! Inbound request helpers.
//!
//! # Responsibilities
//! - Name the request-id header shared by the id layers and the handler
//! - Read the body within the configured size limit
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - The inbound body is read in full: mappings may template it or forward it

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, StatusCode};
use bytes::Bytes;
use http_body_util::LengthLimitError;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// The request id set by the id layer, or `"unknown"`.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Read the inbound body, rejecting anything over `limit` bytes.
pub async fn read_body(body: Body, limit: usize) -> Result<Bytes, (StatusCode, &'static str)> {
    axum::body::to_bytes(body, limit).await.map_err(|e| {
        let too_large = std::error::Error::source(&e).is_some_and(|s| s.is::<LengthLimitError>());
        if too_large {
            (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large")
        } else {
            (StatusCode::BAD_REQUEST, "Failed to read request body")
        }
    })
}
