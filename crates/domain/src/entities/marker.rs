//! Map markers

use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::ids::EntityId;

/// A titled point on the map.
///
/// Field names match the persisted JSON layout (`lat`/`lng`), so collections written
/// by earlier versions load unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub id: EntityId,
    pub title: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// A marker that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerDraft {
    pub title: String,
    pub lat: f64,
    pub lng: f64,
    pub address: Option<String>,
}

impl MarkerDraft {
    pub fn new(title: impl Into<String>, lat: f64, lng: f64) -> Self {
        Self {
            title: title.into(),
            lat,
            lng,
            address: None,
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }
}

impl Entity for Marker {
    type Draft = MarkerDraft;

    const KIND: &'static str = "marker";

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn from_draft(id: EntityId, draft: MarkerDraft) -> Self {
        Self {
            id,
            title: draft.title,
            lat: draft.lat,
            lng: draft.lng,
            address: draft.address,
        }
    }
}
