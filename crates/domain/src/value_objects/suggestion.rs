//! Geocoding suggestions
//!
//! Suggestions are produced fresh for every query and never persisted.

use serde::{Deserialize, Serialize};

/// Resolved coordinates of a suggestion plus the text shown for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionValue {
    pub lat: f64,
    pub lng: f64,
    pub display: String,
}

/// A ranked location candidate for a free-text query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub label: String,
    pub value: SuggestionValue,
}

impl Suggestion {
    /// Build a suggestion, falling back to a `"lat, lng"` label with five decimals
    /// when the display name is missing or blank.
    pub fn new(lat: f64, lng: f64, display_name: Option<&str>) -> Self {
        let label = match display_name.map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("{lat:.5}, {lng:.5}"),
        };

        Self {
            value: SuggestionValue {
                lat,
                lng,
                display: label.clone(),
            },
            label,
        }
    }
}
