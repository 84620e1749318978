//! Application services
//!
//! Services depend only on outbound ports, so storage and network can be swapped
//! for in-memory fakes in tests.

pub mod entity_client;
pub mod reverse_geocoder;
pub mod suggestion_client;

pub use entity_client::{CollectionKeys, EntityClient};
pub use reverse_geocoder::ReverseGeocoder;
pub use suggestion_client::{
    SuggestionClient, SuggestionConfig, SuggestionNotice, SuggestionPage,
    DEFAULT_GEOCODE_TIMEOUT_MS, DEFAULT_MIN_REQUEST_INTERVAL_MS, DEFAULT_SUGGESTION_LIMIT,
};
