//! Reverse geocoding - coordinates to a human-readable address

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::application::services::suggestion_client::DEFAULT_GEOCODE_TIMEOUT_MS;
use crate::application::GeocodeError;
use crate::infrastructure::timeout::{race, RaceError};
use crate::ports::outbound::GeocodeTransport;

#[derive(Deserialize)]
struct RawReverse {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    address: Option<Map<String, Value>>,
}

/// Looks up the address for a coordinate pair.
///
/// Unlike [`SuggestionClient`](super::SuggestionClient) this is neither rate limited
/// nor superseded: every call is independent and bounded by its own deadline.
pub struct ReverseGeocoder {
    transport: Arc<dyn GeocodeTransport>,
    timeout: Duration,
}

impl ReverseGeocoder {
    pub fn new(transport: Arc<dyn GeocodeTransport>) -> Self {
        Self::with_timeout(transport, Duration::from_millis(DEFAULT_GEOCODE_TIMEOUT_MS))
    }

    pub fn with_timeout(transport: Arc<dyn GeocodeTransport>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    /// Address for `(lat, lon)` within the configured deadline.
    ///
    /// `Ok(None)` means the service answered but had nothing to name the place by.
    pub async fn reverse_geocode(&self, lat: f64, lon: f64) -> Result<Option<String>, GeocodeError> {
        self.reverse_geocode_within(lat, lon, self.timeout).await
    }

    /// Same as [`reverse_geocode`](Self::reverse_geocode) with an explicit deadline.
    pub async fn reverse_geocode_within(
        &self,
        lat: f64,
        lon: f64,
        timeout: Duration,
    ) -> Result<Option<String>, GeocodeError> {
        let reply = match race(self.transport.reverse(lat, lon), timeout).await {
            Ok(reply) => reply,
            Err(RaceError::TimedOut { timeout_ms }) => {
                tracing::warn!(lat, lon, timeout_ms, "Reverse geocode timed out");
                return Err(GeocodeError::Timeout { timeout_ms });
            }
            Err(RaceError::Operation(e)) => return Err(e.into()),
        };

        if !reply.is_success() {
            return Err(GeocodeError::HttpStatus {
                status: reply.status,
            });
        }

        let raw: RawReverse = serde_json::from_str(&reply.body)
            .map_err(|e| GeocodeError::MalformedResponse(e.to_string()))?;

        Ok(address_text(raw))
    }
}

/// A present `display_name` wins even when blank; the address map is used only when
/// the field is missing or null.
fn address_text(raw: RawReverse) -> Option<String> {
    let text = match raw.display_name {
        Some(name) => name,
        None => raw
            .address
            .map(|components| {
                components
                    .values()
                    .filter_map(|value| match value {
                        Value::String(s) => Some(s.clone()),
                        Value::Number(n) => Some(n.to_string()),
                        _ => None,
                    })
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default(),
    };

    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}
