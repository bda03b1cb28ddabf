//! Storage area trait

use crate::Result;

/// A string key/value store with local-storage semantics.
///
/// Every operation may fail: storage can be disabled by the user agent,
/// full, or backed by a broken database. Callers decide how to degrade.
pub trait StorageArea: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    fn remove_item(&self, key: &str) -> Result<()>;

    /// Remove every key in this area
    fn clear(&self) -> Result<()>;
}
