//! In-memory storage area
//!
//! Used for session-only profiles and tests. Availability and quota can be
//! toggled at runtime to reproduce disabled or full browser storage.

use parking_lot::RwLock;
use std::collections::HashMap;

use crate::area::StorageArea;
use crate::error::StorageError;
use crate::Result;

#[derive(Default)]
pub struct MemoryStorage {
    items: RwLock<HashMap<String, String>>,
    /// Maximum total bytes (keys + values); None means unlimited
    quota: RwLock<Option<usize>>,
    unavailable: RwLock<bool>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(limit: usize) -> Self {
        let storage = Self::new();
        storage.set_quota(Some(limit));
        storage
    }

    pub fn set_quota(&self, limit: Option<usize>) {
        *self.quota.write() = limit;
    }

    /// Simulate storage being disabled (private browsing, blocked by policy)
    pub fn set_available(&self, available: bool) {
        *self.unavailable.write() = !available;
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    fn check_available(&self) -> Result<()> {
        if *self.unavailable.read() {
            return Err(StorageError::Unavailable);
        }
        Ok(())
    }

    fn used_bytes_without(&self, items: &HashMap<String, String>, key: &str) -> usize {
        items
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }
}

impl StorageArea for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        self.check_available()?;
        Ok(self.items.read().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.check_available()?;

        let mut items = self.items.write();
        if let Some(limit) = *self.quota.read() {
            let needed = self.used_bytes_without(&items, key) + key.len() + value.len();
            if needed > limit {
                return Err(StorageError::QuotaExceeded { needed, limit });
            }
        }

        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.check_available()?;
        self.items.write().remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.check_available()?;
        self.items.write().clear();
        Ok(())
    }
}
