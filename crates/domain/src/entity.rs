//! The persisted-entity contract.

use serde::{de::DeserializeOwned, Serialize};

use crate::ids::EntityId;

/// A uniquely identified record stored in a named collection.
///
/// `Draft` is the entity without its id: what a caller hands to `create` before an id
/// has been chosen. The id is assigned exactly once, in [`Entity::from_draft`], and
/// is never reassigned afterwards.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    type Draft: Send + 'static;

    /// Short human-readable name of the entity kind, used in logs.
    const KIND: &'static str;

    fn id(&self) -> &EntityId;

    fn from_draft(id: EntityId, draft: Self::Draft) -> Self;
}
