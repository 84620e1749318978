//! Observable state containers

pub mod marker_store;

pub use marker_store::{marker_title, MarkerState, MarkerStore, MARKER_NAMESPACE};
