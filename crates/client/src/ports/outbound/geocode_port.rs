//! Geocoding transport port
//!
//! The transport only moves bytes: it reports the HTTP status, the `Retry-After`
//! header and the raw body. Deciding what a status means is the job of the
//! application services, so every adapter gets identical classification.

use async_trait::async_trait;
use thiserror::Error;

/// Raw HTTP reply from the geocoding service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    /// Value of the `Retry-After` header, if the service sent one.
    pub retry_after: Option<String>,
    pub body: String,
}

impl HttpReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            retry_after: None,
            body: body.into(),
        }
    }

    pub fn with_retry_after(mut self, value: impl Into<String>) -> Self {
        self.retry_after = Some(value.into());
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The request never produced an HTTP reply.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Failed to read response body: {0}")]
    Body(String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GeocodeTransport: Send + Sync {
    /// Forward search: `GET /search?q=<query>&limit=<limit>`.
    async fn search(&self, query: &str, limit: usize) -> Result<HttpReply, TransportError>;

    /// Reverse lookup: `GET /reverse?lat=<lat>&lon=<lon>`.
    async fn reverse(&self, lat: f64, lon: f64) -> Result<HttpReply, TransportError>;
}
