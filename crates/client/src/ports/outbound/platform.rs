//! Platform abstraction ports
//!
//! These traits abstract process-local services so that:
//! 1. Application code stays independent of where data is kept
//! 2. Concrete adapters are isolated in infrastructure
//! 3. Services are easily testable with mock implementations

use uuid::Uuid;

/// Persistent key/value storage (file-based or in-memory)
///
/// Synchronous and process-local. Implementations log their own I/O failures;
/// callers see a missing value as `None`.
#[cfg_attr(test, mockall::automock)]
pub trait StorageProvider: Send + Sync {
    /// Save a string value with the given key
    fn save(&self, key: &str, value: &str);

    /// Load a string value by key, returns None if not found
    fn load(&self, key: &str) -> Option<String>;

    /// Remove a value by key
    fn remove(&self, key: &str);
}

/// Source of freshly generated identifiers
#[cfg_attr(test, mockall::automock)]
pub trait RandomPort: Send + Sync {
    fn gen_uuid(&self) -> Uuid;
}
