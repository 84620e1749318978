//! Outbound ports - Interfaces for external services
//!
//! These ports define the contracts that infrastructure adapters must implement,
//! allowing application services to interact with storage and the geocoding
//! service without depending on concrete implementations.

pub mod geocode_port;
pub mod platform;

pub use geocode_port::{GeocodeTransport, HttpReply, TransportError};
pub use platform::{RandomPort, StorageProvider};

#[cfg(test)]
pub use geocode_port::MockGeocodeTransport;
#[cfg(test)]
pub use platform::{MockRandomPort, MockStorageProvider};
