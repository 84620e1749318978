//! File-backed storage for desktop use.

use directories::ProjectDirs;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::ports::outbound::StorageProvider;

/// Storage provider with file-based persistence
///
/// Stores key-value pairs in a JSON file at:
/// - Linux: ~/.config/geomarks/storage.json
/// - macOS: ~/Library/Application Support/io.geomarks.geomarks/storage.json
/// - Windows: C:\Users\<User>\AppData\Roaming\geomarks\geomarks\config\storage.json
#[derive(Clone)]
pub struct FileStorage {
    storage_path: PathBuf,
    cache: Arc<RwLock<HashMap<String, String>>>,
}

impl Default for FileStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl FileStorage {
    /// Open the storage file in the platform config directory.
    pub fn new() -> Self {
        let storage_path = if let Some(dirs) = ProjectDirs::from("io", "geomarks", "geomarks") {
            dirs.config_dir().join("storage.json")
        } else {
            PathBuf::from("geomarks_storage.json")
        };
        Self::at(storage_path)
    }

    /// Open (or lazily create) the storage file at an explicit path.
    pub fn at(storage_path: impl Into<PathBuf>) -> Self {
        let storage_path = storage_path.into();
        let cache = load_entries(&storage_path);

        tracing::debug!(path = %storage_path.display(), entries = cache.len(), "File storage initialized");

        Self {
            storage_path,
            cache: Arc::new(RwLock::new(cache)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.storage_path
    }

    /// Persist the cache to disk
    fn persist(&self) {
        if let Some(parent) = self.storage_path.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = fs::create_dir_all(parent) {
                    tracing::error!(error = %e, "Failed to create storage directory");
                    return;
                }
            }
        }

        let data = match self.cache.read() {
            Ok(guard) => serde_json::to_string_pretty(&*guard),
            Err(e) => {
                tracing::error!(error = %e, "Failed to acquire read lock for storage");
                return;
            }
        };

        match data {
            Ok(data) => {
                if let Err(e) = fs::write(&self.storage_path, data) {
                    tracing::error!(error = %e, "Failed to write storage file");
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize storage data");
            }
        }
    }
}

fn load_entries(path: &Path) -> HashMap<String, String> {
    if !path.exists() {
        return HashMap::new();
    }

    match fs::read_to_string(path) {
        Ok(data) => match serde_json::from_str::<HashMap<String, String>>(&data) {
            Ok(map) => map,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to parse storage file, starting empty");
                HashMap::new()
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read storage file, starting empty");
            HashMap::new()
        }
    }
}

impl StorageProvider for FileStorage {
    fn save(&self, key: &str, value: &str) {
        match self.cache.write() {
            Ok(mut guard) => {
                guard.insert(key.to_string(), value.to_string());
                drop(guard); // Release lock before I/O
                self.persist();
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to acquire write lock for storage");
            }
        }
    }

    fn load(&self, key: &str) -> Option<String> {
        match self.cache.read() {
            Ok(guard) => guard.get(key).cloned(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to acquire read lock for storage");
                None
            }
        }
    }

    fn remove(&self, key: &str) {
        match self.cache.write() {
            Ok(mut guard) => {
                let removed = guard.remove(key).is_some();
                drop(guard);
                if removed {
                    self.persist();
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to acquire write lock for storage");
            }
        }
    }
}
