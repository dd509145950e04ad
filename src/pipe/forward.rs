//! Outbound request construction and the upstream transport.
//!
//! # Responsibilities
//! - Build the outbound request from a `RequestMapping`
//! - Execute it through one shared, injected transport
//!
//! # Design Decisions
//! - Content-Length is always the byte length of the mapping body
//! - Mapping headers overwrite anything already present for that name
//! - Transfer-Encoding is stripped so the body is never sent chunked
//! - No retries, no timeouts: the exchange runs to completion or failure

use std::error::Error as StdError;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderName, HeaderValue, Request, Response};
use axum::BoxError;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::mapping::RequestMapping;
use crate::pipe::PipeError;

/// Transport executing outbound requests.
///
/// One instance is built at startup and shared by every request.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn send(&self, request: Request<Body>) -> Result<Response<Body>, BoxError>;
}

/// `Upstream` backed by a pooled hyper-util client.
#[derive(Clone)]
pub struct HyperUpstream {
    client: Client<HttpConnector, Body>,
}

impl HyperUpstream {
    pub fn new() -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { client }
    }
}

impl Default for HyperUpstream {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Upstream for HyperUpstream {
    async fn send(&self, request: Request<Body>) -> Result<Response<Body>, BoxError> {
        match self.client.request(request).await {
            Ok(response) => {
                let (parts, body) = response.into_parts();
                Ok(Response::from_parts(parts, Body::new(body)))
            }
            // hyper-util's top-level message is terse; the cause is in the chain.
            Err(e) => Err(error_chain(&e).into()),
        }
    }
}

fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Build the outbound request for `mapping`.
pub fn build_request(mapping: &RequestMapping) -> Result<Request<Body>, PipeError> {
    let mut request = Request::builder()
        .method(mapping.verb.clone())
        .uri(mapping.uri.as_str())
        .body(Body::from(mapping.body.clone()))?;

    let headers = request.headers_mut();
    for (name, value) in &mapping.headers {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(axum::http::Error::from)?;
        let value = HeaderValue::from_str(value).map_err(axum::http::Error::from)?;
        headers.insert(name, value);
    }
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(mapping.body.len()));
    headers.remove(header::TRANSFER_ENCODING);

    Ok(request)
}
