//! Geomarks domain types.
//!
//! Plain data shared by the client layer and its callers: entity ids, the
//! [`Entity`] contract, markers and geocoding suggestions. Nothing here performs I/O.

pub mod entities;
pub mod entity;
pub mod ids;
pub mod value_objects;

pub use entities::{Marker, MarkerDraft};
pub use entity::Entity;
pub use ids::EntityId;
pub use value_objects::{Suggestion, SuggestionValue};
