//! Pipe failures and their HTTP rendering.

use axum::body::Body;
use axum::http::{header, HeaderValue, Response, StatusCode};
use axum::response::IntoResponse;
use axum::BoxError;
use thiserror::Error;

use crate::transform::TransformError;

/// Terminal failures of a single piped request.
///
/// Cache lookup failures are not listed: they degrade to a miss.
#[derive(Debug, Error)]
pub enum PipeError {
    /// The outbound request could not be constructed (bad URI, header name or value).
    #[error("{0}")]
    BuildRequest(#[from] axum::http::Error),

    /// The upstream could not be reached or the exchange failed.
    #[error("{0}")]
    Transport(BoxError),

    /// The upstream body failed while being read.
    #[error("{0}")]
    BodyRead(axum::Error),

    /// Extraction or template rendering failed.
    #[error(transparent)]
    Transform(#[from] TransformError),
}

impl PipeError {
    /// Status code reported to the caller.
    pub fn status(&self) -> StatusCode {
        match self {
            PipeError::BuildRequest(_) => StatusCode::SERVICE_UNAVAILABLE,
            PipeError::Transport(_) | PipeError::BodyRead(_) | PipeError::Transform(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for PipeError {
    fn into_response(self) -> axum::response::Response {
        let mut response = Response::new(Body::from(self.to_string()));
        *response.status_mut() = self.status();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response.headers_mut().insert(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        );
        response
    }
}
