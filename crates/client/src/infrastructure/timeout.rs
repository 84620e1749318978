//! Deadline race for fallible async operations.
//!
//! [`race`] resolves no later than the deadline. When the deadline wins, the
//! operation future is dropped; for I/O futures such as `reqwest` requests that drop
//! aborts the underlying transport. Operations that must observe a cancellation signal
//! of their own (a superseded request, for example) combine this with a token.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Outcome of a raced operation that did not succeed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RaceError<E> {
    /// The deadline elapsed before the operation settled.
    #[error("Operation timed out after {timeout_ms} ms")]
    TimedOut { timeout_ms: u64 },

    /// The operation settled first, with a failure.
    #[error(transparent)]
    Operation(E),
}

impl<E> RaceError<E> {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }
}

/// Run `operation` against a deadline of `timeout`.
///
/// The timer is owned by the returned future and released as soon as either side
/// settles, so no delayed callback outlives the call.
pub async fn race<F, T, E>(operation: F, timeout: Duration) -> Result<T, RaceError<E>>
where
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(timeout, operation).await {
        Ok(outcome) => outcome.map_err(RaceError::Operation),
        Err(_) => {
            let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
            tracing::debug!(timeout_ms, "Raced operation hit its deadline");
            Err(RaceError::TimedOut { timeout_ms })
        }
    }
}
