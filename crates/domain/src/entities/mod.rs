//! Persisted entities

mod marker;

pub use marker::{Marker, MarkerDraft};
