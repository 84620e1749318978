//! Error types for application services
//!
//! Errors are tagged kinds with parameters. Rendering them for people is left to the
//! presentation layer: every variant exposes a stable `message_key()` that a
//! localisation table can map, while `Display` gives an English fallback for logs.

use thiserror::Error;

use crate::infrastructure::mutation_queue::MutationAborted;
use crate::ports::outbound::TransportError;

/// Failure of a persisted-collection operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EntityError {
    /// The collection could not be encoded for storage.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The runtime cancelled the queued mutation before it settled.
    #[error(transparent)]
    Aborted(#[from] MutationAborted),
}

impl From<serde_json::Error> for EntityError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Caller-fatal geocoding failures.
///
/// Expected outcomes (empty query, cancellation, rate limiting) are not errors; see
/// [`SuggestionNotice`](crate::application::services::SuggestionNotice).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GeocodeError {
    /// The service rejected the API key (HTTP 401).
    #[error("Geocoding service rejected the API key")]
    Unauthorized,

    /// Any other non-success status.
    #[error("Geocoding service returned HTTP status {status}")]
    HttpStatus { status: u16 },

    /// The lookup did not settle before its deadline.
    #[error("Geocoding request timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    /// No HTTP reply was received.
    #[error("Geocoding transport error: {0}")]
    Transport(#[from] TransportError),

    /// A success reply whose body could not be understood.
    #[error("Malformed geocoding response: {0}")]
    MalformedResponse(String),
}

impl GeocodeError {
    pub fn message_key(&self) -> &'static str {
        match self {
            Self::Unauthorized => "backend.geocoder.http401",
            Self::HttpStatus { .. } => "backend.geocoder.httpStatus",
            Self::Timeout { .. } => "backend.geocoder.timeout",
            Self::Transport(_) => "backend.geocoder.network",
            Self::MalformedResponse(_) => "backend.geocoder.malformed",
        }
    }

    /// Whether retrying the same request later could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unauthorized | Self::MalformedResponse(_) => false,
            Self::HttpStatus { status } => *status >= 500,
            Self::Timeout { .. } | Self::Transport(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_carries_code() {
        let err = GeocodeError::HttpStatus { status: 503 };
        assert_eq!(err.to_string(), "Geocoding service returned HTTP status 503");
        assert_eq!(err.message_key(), "backend.geocoder.httpStatus");
        assert!(err.is_transient());
    }

    #[test]
    fn unauthorized_is_not_transient() {
        assert!(!GeocodeError::Unauthorized.is_transient());
        assert!(!GeocodeError::HttpStatus { status: 404 }.is_transient());
    }

    #[test]
    fn from_transport_error() {
        let err: GeocodeError = TransportError::Request("dns failure".into()).into();
        assert!(matches!(err, GeocodeError::Transport(_)));
        assert!(err.to_string().contains("dns failure"));
    }

    #[test]
    fn from_serde_error() {
        let serde_err = serde_json::from_str::<u32>("nope").unwrap_err();
        let err: EntityError = serde_err.into();
        assert!(matches!(err, EntityError::Serialization(_)));
    }

    #[test]
    fn from_aborted_mutation() {
        let err: EntityError = MutationAborted.into();
        assert_eq!(err, EntityError::Aborted(MutationAborted));
        assert_eq!(err.to_string(), "Queued mutation was aborted before it completed");
    }
}
