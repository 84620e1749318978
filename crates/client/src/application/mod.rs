//! Application layer - services and settings built on the outbound ports

pub mod error;
pub mod services;
pub mod settings;

pub use error::{EntityError, GeocodeError};
pub use settings::ClientSettings;
