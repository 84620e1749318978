//! HTTP adapters

pub mod maps_co;

pub use maps_co::{MapsCoTransport, DEFAULT_GEOCODE_BASE_URL};
