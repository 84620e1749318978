//! Geomarks Client
//!
//! Client-side data layer for a map-marker application:
//!
//! - [`application::services::EntityClient`]: persisted entity collections whose
//!   mutations apply strictly in issue order
//! - [`application::services::SuggestionClient`]: rate-limited, cancellable forward
//!   geocoding
//! - [`application::services::ReverseGeocoder`]: coordinates to an address
//! - [`state::MarkerStore`]: observable marker state on top of the three
//!
//! Storage and network sit behind the traits in [`ports::outbound`]; concrete
//! adapters live in [`infrastructure`].

pub mod application;
pub mod infrastructure;
pub mod ports;
pub mod state;

pub use application::services::{
    EntityClient, ReverseGeocoder, SuggestionClient, SuggestionConfig, SuggestionNotice,
    SuggestionPage,
};
pub use application::{ClientSettings, EntityError, GeocodeError};
pub use state::{MarkerState, MarkerStore};
