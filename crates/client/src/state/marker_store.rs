//! Marker state management
//!
//! [`MarkerStore`] drives the marker collection and the geocoding clients and keeps
//! a [`MarkerState`] snapshot that mirrors what has been persisted. Observers follow
//! changes through a `watch` receiver from [`MarkerStore::subscribe`].

use std::sync::Arc;

use geomarks_domain::{EntityId, Marker, MarkerDraft, Suggestion};
use tokio::sync::watch;

use crate::application::services::{
    EntityClient, ReverseGeocoder, SuggestionClient, SuggestionNotice,
};
use crate::application::{ClientSettings, EntityError, GeocodeError};
use crate::ports::outbound::{GeocodeTransport, RandomPort, StorageProvider};

/// Storage namespace of the marker collection.
pub const MARKER_NAMESPACE: &str = "markers";

/// Snapshot of everything the marker views render.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkerState {
    pub markers: Vec<Marker>,
    pub selected_id: Option<EntityId>,
    /// A list or suggestion request is running
    pub loading: bool,
    /// Message of the last failed action, cleared when the next one starts
    pub error: Option<String>,
    /// Result of the last successful reverse lookup
    pub last_address: Option<String>,
    /// Why the last suggestion page was empty, if it was
    pub suggestion_notice: Option<SuggestionNotice>,
}

/// Resets the loading flag when an action ends, including when it is dropped.
struct LoadingGuard<'a>(&'a watch::Sender<MarkerState>);

impl<'a> LoadingGuard<'a> {
    fn start(state: &'a watch::Sender<MarkerState>) -> Self {
        state.send_modify(|s| {
            s.loading = true;
            s.error = None;
        });
        Self(state)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.send_modify(|s| s.loading = false);
    }
}

/// Title given to markers added from the map: `Marker` plus the last five digits
/// of the millisecond timestamp.
pub fn marker_title(timestamp_millis: i64) -> String {
    format!("Marker {:05}", timestamp_millis.rem_euclid(100_000))
}

pub struct MarkerStore {
    markers: EntityClient<Marker>,
    suggestions: SuggestionClient,
    geocoder: ReverseGeocoder,
    state: watch::Sender<MarkerState>,
}

impl MarkerStore {
    pub fn new(
        markers: EntityClient<Marker>,
        suggestions: SuggestionClient,
        geocoder: ReverseGeocoder,
    ) -> Self {
        Self {
            markers,
            suggestions,
            geocoder,
            state: watch::Sender::new(MarkerState::default()),
        }
    }

    /// Wire a store from settings and adapters.
    pub fn from_settings(
        settings: &ClientSettings,
        storage: Arc<dyn StorageProvider>,
        random: Arc<dyn RandomPort>,
        transport: Arc<dyn GeocodeTransport>,
    ) -> Self {
        let markers = EntityClient::new(
            MARKER_NAMESPACE,
            settings.marker_latency,
            storage,
            random,
        );
        let suggestions =
            SuggestionClient::new(Arc::clone(&transport), settings.suggestion_config());
        let geocoder = ReverseGeocoder::with_timeout(transport, settings.geocode_timeout);

        Self::new(markers, suggestions, geocoder)
    }

    /// Current snapshot.
    pub fn state(&self) -> MarkerState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<MarkerState> {
        self.state.subscribe()
    }

    pub fn markers(&self) -> &EntityClient<Marker> {
        &self.markers
    }

    /// Reload the marker list from storage.
    pub async fn fetch_markers(&self) -> Vec<Marker> {
        let _loading = LoadingGuard::start(&self.state);
        let list = self.markers.list().await;
        tracing::debug!(count = list.len(), "Fetched markers");
        self.state.send_modify(|s| s.markers = list.clone());
        list
    }

    /// Persist a new marker at `(lat, lng)` and append it to the list.
    pub async fn add_marker(
        &self,
        lat: f64,
        lng: f64,
        address: Option<String>,
    ) -> Result<Marker, EntityError> {
        let title = marker_title(chrono::Utc::now().timestamp_millis());
        let mut draft = MarkerDraft::new(title, lat, lng);
        if let Some(address) = address {
            draft = draft.with_address(address);
        }
        self.add_draft(draft).await
    }

    /// Persist a marker built from an explicit draft.
    pub async fn add_draft(&self, draft: MarkerDraft) -> Result<Marker, EntityError> {
        self.state.send_modify(|s| s.error = None);

        match self.markers.create(draft, None).await {
            Ok(created) => {
                tracing::info!(marker_id = %created.id, "Marker added");
                self.state.send_modify(|s| s.markers.push(created.clone()));
                Ok(created)
            }
            Err(e) => {
                self.record_error(&e);
                Err(e)
            }
        }
    }

    pub async fn remove_marker(&self, id: &EntityId) -> Result<(), EntityError> {
        if let Err(e) = self.markers.remove(id.clone()).await {
            self.record_error(&e);
            return Err(e);
        }

        self.state.send_modify(|s| {
            s.markers.retain(|m| &m.id != id);
            if s.selected_id.as_ref() == Some(id) {
                s.selected_id = None;
            }
        });
        Ok(())
    }

    pub async fn clear_all_markers(&self) -> Result<(), EntityError> {
        if let Err(e) = self.markers.clear().await {
            self.record_error(&e);
            return Err(e);
        }

        tracing::info!("All markers cleared");
        self.state.send_modify(|s| {
            s.markers.clear();
            s.selected_id = None;
        });
        Ok(())
    }

    /// Load the persisted selection into state.
    pub async fn hydrate_selected_id(&self) -> Option<EntityId> {
        let saved = self.markers.get_selected_id().await;
        self.state.send_modify(|s| s.selected_id = saved.clone());
        saved
    }

    /// Select `id` (or clear with `None`). State updates before the write lands.
    pub async fn set_selected_id(&self, id: Option<EntityId>) -> Result<(), EntityError> {
        self.state.send_modify(|s| s.selected_id = id.clone());
        self.markers.set_selected_id(id).await.inspect_err(|e| {
            self.record_error(e);
        })
    }

    /// Suggestions for `query`. Failures land in state and yield an empty list.
    pub async fn fetch_suggestions(&self, query: &str, limit: usize) -> Vec<Suggestion> {
        let _loading = LoadingGuard::start(&self.state);

        match self
            .suggestions
            .fetch_suggestions_with_limit(query, limit)
            .await
        {
            Ok(page) => {
                self.state
                    .send_modify(|s| s.suggestion_notice = page.notice.clone());
                page.items
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    key = e.message_key(),
                    transient = e.is_transient(),
                    "Suggestion lookup failed"
                );
                self.state.send_modify(|s| {
                    s.error = Some(e.to_string());
                    s.suggestion_notice = None;
                });
                Vec::new()
            }
        }
    }

    /// Look up the address for `(lat, lon)` and remember it as the last address.
    pub async fn reverse_geocode(
        &self,
        lat: f64,
        lon: f64,
    ) -> Result<Option<String>, GeocodeError> {
        match self.geocoder.reverse_geocode(lat, lon).await {
            Ok(address) => {
                self.state
                    .send_modify(|s| s.last_address = address.clone());
                Ok(address)
            }
            Err(e) => {
                tracing::warn!(
                    lat,
                    lon,
                    error = %e,
                    transient = e.is_transient(),
                    "Reverse geocode failed"
                );
                self.state.send_modify(|s| s.error = Some(e.to_string()));
                Err(e)
            }
        }
    }

    fn record_error(&self, error: &EntityError) {
        tracing::error!(error = %error, "Marker operation failed");
        self.state.send_modify(|s| s.error = Some(error.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::SuggestionConfig;
    use crate::infrastructure::platform::{InMemoryStorage, SystemRandom};
    use crate::ports::outbound::{HttpReply, MockGeocodeTransport, TransportError};
    use std::time::Duration;

    fn store_with(transport: MockGeocodeTransport) -> (MarkerStore, InMemoryStorage) {
        let storage = InMemoryStorage::new();
        let transport: Arc<dyn GeocodeTransport> = Arc::new(transport);
        let markers = EntityClient::new(
            MARKER_NAMESPACE,
            Duration::ZERO,
            Arc::new(storage.clone()),
            Arc::new(SystemRandom::new()),
        );
        let store = MarkerStore::new(
            markers,
            SuggestionClient::new(Arc::clone(&transport), SuggestionConfig::default()),
            ReverseGeocoder::new(transport),
        );
        (store, storage)
    }

    fn store() -> MarkerStore {
        store_with(MockGeocodeTransport::new()).0
    }

    #[test]
    fn title_uses_last_five_digits() {
        assert_eq!(marker_title(1_700_000_012_345), "Marker 12345");
        assert_eq!(marker_title(1_700_000_000_042), "Marker 00042");
    }

    #[tokio::test]
    async fn added_markers_appear_in_state_and_storage() {
        let store = store();

        let created = store
            .add_marker(52.5, 13.4, Some("Berlin".into()))
            .await
            .unwrap();

        assert!(created.title.starts_with("Marker "));
        assert_eq!(created.title.len(), "Marker 00000".len());
        assert_eq!(created.address.as_deref(), Some("Berlin"));
        assert_eq!(store.state().markers, vec![created.clone()]);
        assert_eq!(store.fetch_markers().await, vec![created]);
    }

    #[tokio::test]
    async fn fetch_markers_toggles_loading() {
        let store = store();
        let mut updates = store.subscribe();

        store.fetch_markers().await;

        assert!(updates.has_changed().unwrap());
        assert!(!updates.borrow_and_update().loading);
        assert_eq!(store.state().error, None);
    }

    #[tokio::test]
    async fn removing_selected_marker_clears_selection() {
        let store = store();
        let a = store.add_marker(1.0, 1.0, None).await.unwrap();
        let b = store.add_marker(2.0, 2.0, None).await.unwrap();
        store.set_selected_id(Some(a.id.clone())).await.unwrap();

        store.remove_marker(&a.id).await.unwrap();

        let state = store.state();
        assert_eq!(state.markers, vec![b]);
        assert_eq!(state.selected_id, None);
        assert_eq!(store.markers().get_selected_id().await, None);
    }

    #[tokio::test]
    async fn selection_survives_a_new_store_over_the_same_storage() {
        let (store, storage) = store_with(MockGeocodeTransport::new());
        let marker = store.add_marker(1.0, 2.0, None).await.unwrap();
        store.set_selected_id(Some(marker.id.clone())).await.unwrap();

        let reopened = MarkerStore::new(
            EntityClient::new(
                MARKER_NAMESPACE,
                Duration::ZERO,
                Arc::new(storage),
                Arc::new(SystemRandom::new()),
            ),
            SuggestionClient::new(
                Arc::new(MockGeocodeTransport::new()),
                SuggestionConfig::default(),
            ),
            ReverseGeocoder::new(Arc::new(MockGeocodeTransport::new())),
        );

        assert_eq!(reopened.state().selected_id, None);
        assert_eq!(reopened.hydrate_selected_id().await, Some(marker.id.clone()));
        assert_eq!(reopened.state().selected_id, Some(marker.id));
    }

    #[tokio::test]
    async fn clear_all_resets_markers_and_selection() {
        let store = store();
        let marker = store.add_marker(1.0, 2.0, None).await.unwrap();
        store.set_selected_id(Some(marker.id)).await.unwrap();

        store.clear_all_markers().await.unwrap();

        let state = store.state();
        assert!(state.markers.is_empty());
        assert_eq!(state.selected_id, None);
        assert!(store.fetch_markers().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn suggestion_failure_is_recorded_and_yields_empty_list() {
        let mut transport = MockGeocodeTransport::new();
        transport
            .expect_search()
            .returning(|_, _| Ok(HttpReply::new(401, "")));
        let (store, _) = store_with(transport);

        let items = store.fetch_suggestions("berlin", 5).await;

        assert!(items.is_empty());
        let state = store.state();
        assert!(!state.loading);
        assert_eq!(
            state.error.as_deref(),
            Some("Geocoding service rejected the API key")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn suggestion_notice_is_recorded() {
        let mut transport = MockGeocodeTransport::new();
        transport
            .expect_search()
            .returning(|_, _| Ok(HttpReply::new(429, "").with_retry_after("3")));
        let (store, _) = store_with(transport);

        let items = store.fetch_suggestions("berlin", 5).await;

        assert!(items.is_empty());
        assert_eq!(
            store.state().suggestion_notice,
            Some(SuggestionNotice::RateLimited {
                retry_after_secs: Some(3)
            })
        );
        assert_eq!(store.state().error, None);
    }

    #[tokio::test]
    async fn reverse_geocode_records_last_address() {
        let mut transport = MockGeocodeTransport::new();
        transport
            .expect_reverse()
            .returning(|_, _| Ok(HttpReply::new(200, r#"{"display_name":"Somewhere"}"#)));
        let (store, _) = store_with(transport);

        let address = store.reverse_geocode(1.0, 2.0).await.unwrap();

        assert_eq!(address.as_deref(), Some("Somewhere"));
        assert_eq!(store.state().last_address.as_deref(), Some("Somewhere"));
    }

    #[tokio::test]
    async fn reverse_geocode_failure_keeps_previous_address() {
        let mut transport = MockGeocodeTransport::new();
        let mut calls = 0;
        transport.expect_reverse().returning(move |_, _| {
            calls += 1;
            if calls == 1 {
                Ok(HttpReply::new(200, r#"{"display_name":"First"}"#))
            } else {
                Err(TransportError::Request("offline".into()))
            }
        });
        let (store, _) = store_with(transport);

        store.reverse_geocode(1.0, 2.0).await.unwrap();
        assert!(store.reverse_geocode(3.0, 4.0).await.is_err());

        let state = store.state();
        assert_eq!(state.last_address.as_deref(), Some("First"));
        assert!(state.error.is_some());
    }
}
