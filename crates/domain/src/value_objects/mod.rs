//! Value objects - Immutable objects defined by their attributes

mod suggestion;

pub use suggestion::{Suggestion, SuggestionValue};
