//! In-memory storage for tests and ephemeral sessions.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::ports::outbound::StorageProvider;

/// Process-local storage that forgets everything on drop.
///
/// Clones share the same map, so a test can hand one clone to a client and keep
/// another to inspect or tamper with the raw persisted values.
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageProvider for InMemoryStorage {
    fn save(&self, key: &str, value: &str) {
        match self.entries.write() {
            Ok(mut guard) => {
                guard.insert(key.to_string(), value.to_string());
            }
            Err(e) => tracing::error!(error = %e, "Failed to acquire write lock for storage"),
        }
    }

    fn load(&self, key: &str) -> Option<String> {
        match self.entries.read() {
            Ok(guard) => guard.get(key).cloned(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to acquire read lock for storage");
                None
            }
        }
    }

    fn remove(&self, key: &str) {
        match self.entries.write() {
            Ok(mut guard) => {
                guard.remove(key);
            }
            Err(e) => tracing::error!(error = %e, "Failed to acquire write lock for storage"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_entries() {
        let storage = InMemoryStorage::new();
        let view = storage.clone();

        storage.save("markers:items", "[]");
        assert_eq!(view.load("markers:items").as_deref(), Some("[]"));

        view.remove("markers:items");
        assert_eq!(storage.load("markers:items"), None);
    }
}
