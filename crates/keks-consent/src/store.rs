//! Consent store
//!
//! Reads and writes the consent record in local storage. Nothing here returns
//! an error to the caller: unreadable records count as absent, failed writes
//! are logged and the record is handed back for session-only use.

use chrono::{DateTime, Utc};
use keks_storage::StorageArea;
use std::sync::Arc;

use crate::id::ConsentId;
use crate::record::{Categories, ConsentRecord};
use crate::Result;

pub const CONSENT_KEY: &str = "keks_consent";
pub const CONSENT_ID_KEY: &str = "keks_consent_id";
pub const DEFAULT_CONSENT_DAYS: u32 = 365;
/// Longest lifetime a record can be given (100 years)
pub const MAX_CONSENT_DAYS: u32 = 36_500;

const DEFAULT_UNAVAILABLE_MESSAGE: &str = "Keks: localStorage not available";

/// Result of [`ConsentStore::write`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    pub record: ConsentRecord,
    /// False when storage refused the write; the record then only lives in memory
    pub persisted: bool,
}

pub struct ConsentStore {
    storage: Arc<dyn StorageArea>,
    unavailable_message: String,
}

impl ConsentStore {
    pub fn new(storage: Arc<dyn StorageArea>) -> Self {
        Self {
            storage,
            unavailable_message: DEFAULT_UNAVAILABLE_MESSAGE.to_string(),
        }
    }

    /// Localised warning logged when storage rejects a write
    pub fn with_unavailable_message(mut self, message: impl Into<String>) -> Self {
        self.unavailable_message = message.into();
        self
    }

    pub fn read(&self) -> Option<ConsentRecord> {
        self.read_at(Utc::now())
    }

    /// Read the record as of `now`, purging it if it has expired
    pub fn read_at(&self, now: DateTime<Utc>) -> Option<ConsentRecord> {
        match self.try_read(now) {
            Ok(record) => record,
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring unreadable consent record");
                None
            }
        }
    }

    fn try_read(&self, now: DateTime<Utc>) -> Result<Option<ConsentRecord>> {
        let Some(data) = self.storage.get_item(CONSENT_KEY)? else {
            return Ok(None);
        };
        if data.is_empty() {
            return Ok(None);
        }

        let record = ConsentRecord::from_stored_json(&data)?;

        if record.is_expired_at(now) {
            tracing::info!(expires = %record.expires, "Consent expired, removing record");
            self.storage.remove_item(CONSENT_KEY)?;
            return Ok(None);
        }

        Ok(Some(record))
    }

    pub fn write(&self, categories: Categories, ttl_days: u32) -> WriteOutcome {
        self.write_at(categories, ttl_days, Utc::now())
    }

    /// Persist a new record; a `ttl_days` of zero means the default lifetime
    pub fn write_at(&self, categories: Categories, ttl_days: u32, now: DateTime<Utc>) -> WriteOutcome {
        let ttl_days = if ttl_days == 0 {
            DEFAULT_CONSENT_DAYS
        } else {
            ttl_days
        };
        let record = ConsentRecord::new(categories, ttl_days, now);

        let persisted = match self.try_write(&record) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "{}", self.unavailable_message);
                false
            }
        };

        WriteOutcome { record, persisted }
    }

    fn try_write(&self, record: &ConsentRecord) -> Result<()> {
        let json = record.to_json()?;
        self.storage.set_item(CONSENT_KEY, &json)?;
        Ok(())
    }

    pub fn clear(&self) {
        if let Err(e) = self.storage.remove_item(CONSENT_KEY) {
            tracing::debug!(error = %e, "Failed to remove consent record");
        }
    }

    /// Existing id, or a freshly minted and persisted one.
    ///
    /// When storage fails the returned id is transient: it is not stored and
    /// the next call mints another.
    pub fn get_or_create_id(&self) -> ConsentId {
        match self.try_get_or_create_id() {
            Ok(id) => id,
            Err(e) => {
                tracing::debug!(error = %e, "Using transient consent id");
                ConsentId::generate()
            }
        }
    }

    fn try_get_or_create_id(&self) -> Result<ConsentId> {
        if let Some(id) = self
            .storage
            .get_item(CONSENT_ID_KEY)?
            .and_then(ConsentId::from_stored)
        {
            return Ok(id);
        }

        let id = ConsentId::generate();
        self.storage.set_item(CONSENT_ID_KEY, id.as_str())?;
        tracing::debug!(consent_id = %id, "Created consent id");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use keks_storage::MemoryStorage;

    fn store() -> (Arc<MemoryStorage>, ConsentStore) {
        let storage = Arc::new(MemoryStorage::new());
        let store = ConsentStore::new(storage.clone());
        (storage, store)
    }

    fn categories(pairs: &[(&str, bool)]) -> Categories {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_write_then_read() {
        let (_, store) = store();
        let selection = categories(&[("necessary", true), ("statistics", true), ("marketing", false)]);

        let outcome = store.write(selection.clone(), 365);
        assert!(outcome.persisted);

        let record = store.read().unwrap();
        assert_eq!(record.categories, selection);

        let ttl = record.expires - Utc::now();
        assert!(ttl > Duration::days(364) && ttl <= Duration::days(365));
    }

    #[test]
    fn test_write_forces_necessary() {
        let (_, store) = store();
        store.write(categories(&[("necessary", false), ("marketing", true)]), 30);

        let record = store.read().unwrap();
        assert_eq!(record.categories.get("necessary"), Some(&true));
    }

    #[test]
    fn test_zero_ttl_uses_default() {
        let (_, store) = store();
        let now = Utc::now();
        let outcome = store.write_at(Categories::new(), 0, now);
        assert_eq!(
            outcome.record.expires,
            now + Duration::days(i64::from(DEFAULT_CONSENT_DAYS))
        );
    }

    #[test]
    fn test_expired_record_is_purged() {
        let (storage, store) = store();
        storage
            .set_item(
                CONSENT_KEY,
                r#"{"categories":{"necessary":true},"timestamp":"2020-01-01T00:00:00.000Z","expires":"2021-01-01T00:00:00.000Z"}"#,
            )
            .unwrap();

        assert!(store.read().is_none());
        assert_eq!(storage.get_item(CONSENT_KEY).unwrap(), None);
    }

    #[test]
    fn test_legacy_record_read() {
        let (storage, store) = store();
        let json = r#"{"accepted":true,"timestamp":"2026-01-01T00:00:00.000Z","expires":"2099-01-01T00:00:00.000Z"}"#;
        storage.set_item(CONSENT_KEY, json).unwrap();

        let record = store.read().unwrap();
        assert_eq!(
            record.categories,
            categories(&[("necessary", true), ("statistics", true), ("marketing", true)])
        );
        assert_eq!(record.timestamp.to_rfc3339(), "2026-01-01T00:00:00+00:00");
        assert_eq!(record.expires.to_rfc3339(), "2099-01-01T00:00:00+00:00");

        // Migration happens in memory only
        assert_eq!(storage.get_item(CONSENT_KEY).unwrap().as_deref(), Some(json));
    }

    #[test]
    fn test_corrupt_record_reads_as_absent() {
        let (storage, store) = store();
        storage.set_item(CONSENT_KEY, "{\"categories\":").unwrap();
        assert!(store.read().is_none());
    }

    #[test]
    fn test_unavailable_storage_degrades() {
        let (storage, store) = store();
        storage.set_available(false);

        let outcome = store.write(categories(&[("statistics", true)]), 365);
        assert!(!outcome.persisted);
        assert!(outcome.record.is_granted("statistics"));

        assert!(store.read().is_none());
        store.clear();
    }

    #[test]
    fn test_quota_exceeded_degrades() {
        let storage = Arc::new(MemoryStorage::with_quota(8));
        let store = ConsentStore::new(storage);

        let outcome = store.write(categories(&[("statistics", true)]), 365);
        assert!(!outcome.persisted);
    }

    #[test]
    fn test_clear_removes_record_but_keeps_id() {
        let (_, store) = store();
        let id = store.get_or_create_id();
        store.write(Categories::new(), 365);

        store.clear();
        assert!(store.read().is_none());
        assert_eq!(store.get_or_create_id(), id);
    }

    #[test]
    fn test_transient_id_when_storage_fails() {
        let (storage, store) = store();
        storage.set_available(false);

        let first = store.get_or_create_id();
        let second = store.get_or_create_id();
        assert_ne!(first, second);

        storage.set_available(true);
        assert!(storage.is_empty());
    }
}
