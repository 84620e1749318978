//! Geocode Suggestion Client - ranked location candidates for free-text input
//!
//! Each client instance allows one live request. A new query cancels the previous
//! one through its [`CancellationToken`]; the superseded caller resolves with a
//! [`SuggestionNotice::Cancelled`] page instead of an error. Request starts are spaced
//! at least `min_interval` apart, and every request races a deadline that drops (and
//! so aborts) the transport call.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use geomarks_domain::Suggestion;
use serde::Deserialize;
use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::application::GeocodeError;
use crate::infrastructure::timeout::{race, RaceError};
use crate::ports::outbound::{GeocodeTransport, HttpReply};

/// Default number of suggestions requested per query.
pub const DEFAULT_SUGGESTION_LIMIT: usize = 10;
/// Minimum spacing between the starts of two outbound requests.
pub const DEFAULT_MIN_REQUEST_INTERVAL_MS: u64 = 1000;
/// Hard deadline for a single geocoding request.
pub const DEFAULT_GEOCODE_TIMEOUT_MS: u64 = 8000;

/// Why a page came back without (or instead of) results.
///
/// These are expected outcomes, not failures: callers show them as hints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuggestionNotice {
    /// The query was blank; nothing was sent.
    EmptyQuery,
    /// A newer query superseded this one.
    Cancelled,
    /// The request did not finish before its deadline and was aborted.
    TimedOut { timeout_ms: u64 },
    /// The service asked us to slow down (HTTP 429).
    RateLimited { retry_after_secs: Option<u64> },
}

impl SuggestionNotice {
    pub fn message_key(&self) -> &'static str {
        match self {
            Self::EmptyQuery => "backend.geocoder.emptyQuery",
            Self::Cancelled => "backend.geocoder.cancelled",
            Self::TimedOut { .. } => "backend.geocoder.timeout",
            Self::RateLimited {
                retry_after_secs: Some(_),
            } => "backend.geocoder.tooManyRequestsWithRetry",
            Self::RateLimited {
                retry_after_secs: None,
            } => "backend.geocoder.tooManyRequests",
        }
    }
}

impl fmt::Display for SuggestionNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Blank input is not worth a message.
            Self::EmptyQuery => Ok(()),
            Self::Cancelled => write!(f, "Request was superseded by a newer search"),
            Self::TimedOut { timeout_ms } => {
                write!(f, "Geocoding service did not answer within {timeout_ms} ms")
            }
            Self::RateLimited {
                retry_after_secs: Some(secs),
            } => write!(f, "Too many requests, retry in {secs} s"),
            Self::RateLimited {
                retry_after_secs: None,
            } => write!(f, "Too many requests, try again later"),
        }
    }
}

/// Result of one suggestion query.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SuggestionPage {
    pub items: Vec<Suggestion>,
    /// Present when the page is empty for an expected reason.
    pub notice: Option<SuggestionNotice>,
}

impl SuggestionPage {
    pub fn found(items: Vec<Suggestion>) -> Self {
        Self {
            items,
            notice: None,
        }
    }

    pub fn notice(notice: SuggestionNotice) -> Self {
        Self {
            items: Vec::new(),
            notice: Some(notice),
        }
    }
}

/// Tunables for a [`SuggestionClient`].
#[derive(Debug, Clone)]
pub struct SuggestionConfig {
    pub min_interval: Duration,
    pub timeout: Duration,
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(DEFAULT_MIN_REQUEST_INTERVAL_MS),
            timeout: Duration::from_millis(DEFAULT_GEOCODE_TIMEOUT_MS),
        }
    }
}

struct InFlight {
    generation: u64,
    token: CancellationToken,
}

#[derive(Default)]
struct RequestState {
    last_started: Option<Instant>,
    in_flight: Option<InFlight>,
    generation: u64,
}

/// Clears the in-flight slot when the owning call ends, however it ends.
struct InFlightGuard<'a> {
    state: &'a Mutex<RequestState>,
    generation: u64,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state
            .in_flight
            .as_ref()
            .is_some_and(|current| current.generation == self.generation)
        {
            state.in_flight = None;
        }
    }
}

/// Rate-limited, cancellable forward-geocoding client.
pub struct SuggestionClient {
    transport: Arc<dyn GeocodeTransport>,
    config: SuggestionConfig,
    state: Mutex<RequestState>,
}

impl SuggestionClient {
    pub fn new(transport: Arc<dyn GeocodeTransport>, config: SuggestionConfig) -> Self {
        Self {
            transport,
            config,
            state: Mutex::new(RequestState::default()),
        }
    }

    /// Suggestions for `query` with the default limit.
    pub async fn fetch_suggestions(&self, query: &str) -> Result<SuggestionPage, GeocodeError> {
        self.fetch_suggestions_with_limit(query, DEFAULT_SUGGESTION_LIMIT)
            .await
    }

    /// Up to `limit` suggestions for `query`.
    ///
    /// Blank queries, superseded requests, deadlines and HTTP 429 resolve to an empty
    /// page with a [`SuggestionNotice`]. HTTP 401, other non-success statuses and
    /// transport failures are returned as errors.
    pub async fn fetch_suggestions_with_limit(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<SuggestionPage, GeocodeError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(SuggestionPage::notice(SuggestionNotice::EmptyQuery));
        }

        let (generation, token) = self.supersede();
        let _guard = InFlightGuard {
            state: &self.state,
            generation,
        };

        if !self.wait_for_slot(&token).await {
            tracing::debug!(generation, "Suggestion request superseded while waiting");
            return Ok(SuggestionPage::notice(SuggestionNotice::Cancelled));
        }

        let request = race(self.transport.search(query, limit), self.config.timeout);
        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => {
                tracing::debug!(generation, "Suggestion request superseded in flight");
                return Ok(SuggestionPage::notice(SuggestionNotice::Cancelled));
            }
            outcome = request => outcome,
        };

        let reply = match outcome {
            Ok(reply) => reply,
            Err(RaceError::TimedOut { timeout_ms }) => {
                tracing::warn!(query, timeout_ms, "Suggestion request timed out");
                return Ok(SuggestionPage::notice(SuggestionNotice::TimedOut { timeout_ms }));
            }
            Err(RaceError::Operation(e)) => return Err(e.into()),
        };

        classify(reply, limit)
    }

    fn lock_state(&self) -> MutexGuard<'_, RequestState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new request, cancelling the one it replaces.
    fn supersede(&self) -> (u64, CancellationToken) {
        let mut state = self.lock_state();
        if let Some(previous) = state.in_flight.take() {
            tracing::info!(
                superseded = previous.generation,
                "Cancelling in-flight suggestion request"
            );
            previous.token.cancel();
        }

        state.generation += 1;
        let generation = state.generation;
        let token = CancellationToken::new();
        state.in_flight = Some(InFlight {
            generation,
            token: token.clone(),
        });
        (generation, token)
    }

    /// Wait until `min_interval` has passed since the last request start, then claim
    /// the slot. Returns `false` if cancelled while waiting.
    async fn wait_for_slot(&self, token: &CancellationToken) -> bool {
        loop {
            let ready_at = {
                let mut state = self.lock_state();
                let now = Instant::now();
                match state.last_started.map(|t| t + self.config.min_interval) {
                    Some(ready_at) if ready_at > now => ready_at,
                    _ => {
                        state.last_started = Some(now);
                        return true;
                    }
                }
            };

            tracing::debug!(
                wait_ms = u64::try_from(ready_at.saturating_duration_since(Instant::now()).as_millis())
                    .unwrap_or(u64::MAX),
                "Delaying suggestion request to respect rate limit"
            );

            tokio::select! {
                biased;
                _ = token.cancelled() => return false,
                _ = tokio::time::sleep_until(ready_at) => {}
            }
        }
    }
}

#[derive(Deserialize)]
struct RawPlace {
    #[serde(default)]
    lat: Option<Value>,
    #[serde(default)]
    lon: Option<Value>,
    #[serde(default)]
    display_name: Option<String>,
}

fn classify(reply: HttpReply, limit: usize) -> Result<SuggestionPage, GeocodeError> {
    match reply.status {
        401 => Err(GeocodeError::Unauthorized),
        429 => {
            let retry_after_secs = reply.retry_after.as_deref().and_then(parse_retry_after);
            tracing::info!(?retry_after_secs, "Geocoding service rate limited the request");
            Ok(SuggestionPage::notice(SuggestionNotice::RateLimited {
                retry_after_secs,
            }))
        }
        _ if reply.is_success() => Ok(SuggestionPage::found(parse_suggestions(
            &reply.body,
            limit,
        ))),
        status => Err(GeocodeError::HttpStatus { status }),
    }
}

/// Map a search body to suggestions; anything unreadable is dropped, not failed.
fn parse_suggestions(body: &str, limit: usize) -> Vec<Suggestion> {
    let records: Vec<Value> = match serde_json::from_str(body) {
        Ok(records) => records,
        Err(e) => {
            tracing::warn!(error = %e, "Malformed suggestion body, treating as empty");
            return Vec::new();
        }
    };

    records
        .into_iter()
        .take(limit)
        .filter_map(|record| serde_json::from_value::<RawPlace>(record).ok())
        .filter_map(|place| {
            let lat = coordinate(place.lat.as_ref())?;
            let lng = coordinate(place.lon.as_ref())?;
            Some(Suggestion::new(lat, lng, place.display_name.as_deref()))
        })
        .collect()
}

/// Coordinates arrive as strings from the service; plain numbers are accepted too.
fn coordinate(value: Option<&Value>) -> Option<f64> {
    let parsed = match value? {
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        Value::Number(n) => n.as_f64()?,
        _ => return None,
    };
    parsed.is_finite().then_some(parsed)
}

fn parse_retry_after(value: &str) -> Option<u64> {
    value.trim().parse().ok()
}
