//! Upstream body state.
//!
//! The upstream body can be read once. `UpstreamBody` tags whether it has
//! been drained into memory; draining consumes the stream, so a second
//! drain cannot be expressed.

use axum::body::Body;
use bytes::{Bytes, BytesMut};
use http_body_util::BodyExt;

/// Upstream response body, either still streaming or fully read.
#[derive(Debug)]
pub enum UpstreamBody {
    Streamed(Body),
    Buffered(Bytes),
}

impl UpstreamBody {
    pub fn is_buffered(&self) -> bool {
        matches!(self, UpstreamBody::Buffered(_))
    }

    /// Drain a streamed body into memory. A buffered body is returned unchanged.
    pub async fn into_buffered(self) -> Result<Self, axum::Error> {
        match self {
            UpstreamBody::Streamed(body) => Ok(UpstreamBody::Buffered(drain(body).await?)),
            buffered => Ok(buffered),
        }
    }

    /// The buffered bytes, if the body has been drained.
    pub fn bytes(&self) -> Option<&Bytes> {
        match self {
            UpstreamBody::Buffered(bytes) => Some(bytes),
            UpstreamBody::Streamed(_) => None,
        }
    }
}

/// Read data frames until end of stream. Trailers are dropped.
async fn drain(mut body: Body) -> Result<Bytes, axum::Error> {
    let mut buffer = BytesMut::new();
    while let Some(frame) = body.frame().await {
        if let Ok(data) = frame?.into_data() {
            buffer.extend_from_slice(&data);
        }
    }
    Ok(buffer.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    #[tokio::test]
    async fn test_drain_multiple_chunks() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"hello ")),
            Ok(Bytes::new()),
            Ok(Bytes::from_static(b"world")),
        ];
        let body = UpstreamBody::Streamed(Body::from_stream(stream::iter(chunks)));
        assert!(!body.is_buffered());
        assert!(body.bytes().is_none());

        let body = body.into_buffered().await.unwrap();
        assert!(body.is_buffered());
        assert_eq!(body.bytes().unwrap(), &Bytes::from_static(b"hello world"));
    }

    #[tokio::test]
    async fn test_buffered_is_not_reread() {
        let body = UpstreamBody::Buffered(Bytes::from_static(b"done"));
        let body = body.into_buffered().await.unwrap();
        assert_eq!(body.bytes().unwrap(), &Bytes::from_static(b"done"));
    }

    #[tokio::test]
    async fn test_read_error_surfaces() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"partial")),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer")),
        ];
        let body = UpstreamBody::Streamed(Body::from_stream(stream::iter(chunks)));
        let err = body.into_buffered().await.unwrap_err();
        assert!(err.to_string().contains("reset by peer"));
    }
}
