//! geocode.maps.co HTTP transport

use async_trait::async_trait;
use reqwest::header::{RETRY_AFTER, USER_AGENT};
use reqwest::{Client, RequestBuilder};

use crate::ports::outbound::{GeocodeTransport, HttpReply, TransportError};

/// Default geocoding service base URL.
pub const DEFAULT_GEOCODE_BASE_URL: &str = "https://geocode.maps.co";

const USER_AGENT_VALUE: &str = concat!("geomarks/", env!("CARGO_PKG_VERSION"));

/// Client for a geocode.maps.co compatible API
///
/// No request timeout is configured on the underlying client: deadlines are applied
/// by the calling service, and dropping the request future aborts the connection.
#[derive(Clone)]
pub struct MapsCoTransport {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl MapsCoTransport {
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        Self::with_client(Client::new(), base_url, api_key)
    }

    pub fn with_client(client: Client, base_url: &str, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        }
    }

    fn get(&self, path: &str) -> RequestBuilder {
        let request = self
            .client
            .get(format!("{}/{}", self.base_url, path))
            .header(USER_AGENT, USER_AGENT_VALUE);

        match &self.api_key {
            Some(key) => request.query(&[("api_key", key.trim())]),
            None => request,
        }
    }

    async fn send(request: RequestBuilder) -> Result<HttpReply, TransportError> {
        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?;

        Ok(HttpReply {
            status,
            retry_after,
            body,
        })
    }
}

impl Default for MapsCoTransport {
    fn default() -> Self {
        Self::new(DEFAULT_GEOCODE_BASE_URL, None)
    }
}

#[async_trait]
impl GeocodeTransport for MapsCoTransport {
    async fn search(&self, query: &str, limit: usize) -> Result<HttpReply, TransportError> {
        let limit = limit.to_string();
        let request = self
            .get("search")
            .query(&[("q", query), ("limit", limit.as_str())]);

        tracing::debug!(query, limit = %limit, "Sending geocode search request");
        Self::send(request).await
    }

    async fn reverse(&self, lat: f64, lon: f64) -> Result<HttpReply, TransportError> {
        let request = self
            .get("reverse")
            .query(&[("lat", lat.to_string()), ("lon", lon.to_string())]);

        tracing::debug!(lat, lon, "Sending reverse geocode request");
        Self::send(request).await
    }
}
