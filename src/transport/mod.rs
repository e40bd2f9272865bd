mod http_transport;

pub use http_transport::HttpTransport;

use std::pin::Pin;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use http::{HeaderMap, StatusCode};

/// Failure preparing or performing an upstream call.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("{0}")]
    Connect(String),
    #[error("{0}")]
    Body(String),
    #[error("Failed to encode upstream payload: {0}")]
    Encode(String),
}

pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// One fully prepared upstream call.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Upstream response whose body has not been read yet.
///
/// Whoever consumes `body` owns the connection; dropping the stream closes it.
pub struct UpstreamEnvelope {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: BodyStream,
}

impl UpstreamEnvelope {
    /// Build an envelope over an in-memory body.
    #[must_use]
    pub fn from_bytes(status: StatusCode, body: impl Into<Bytes>) -> Self {
        let body: Bytes = body.into();
        Self {
            status,
            headers: HeaderMap::new(),
            body: Box::pin(futures_util::stream::once(async move { Ok(body) })),
        }
    }

    /// Drain the whole body, e.g. to read an upstream error document.
    ///
    /// # Errors
    ///
    /// Returns the first body read failure.
    pub async fn read_to_bytes(self) -> Result<Bytes, TransportError> {
        let mut body = self.body;
        let mut out = Vec::new();
        while let Some(chunk) = body.next().await {
            out.extend_from_slice(&chunk?);
        }
        Ok(Bytes::from(out))
    }
}

impl std::fmt::Debug for UpstreamEnvelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamEnvelope")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// The seam between request handling and the network. Production uses
/// [`HttpTransport`]; tests substitute scripted fakes.
#[async_trait::async_trait]
pub trait UpstreamTransport: Send + Sync {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamEnvelope, TransportError>;
}
