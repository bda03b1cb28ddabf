//! Persisted consent record
//!
//! Stored as JSON:
//! `{"categories": {"necessary": true, ...}, "timestamp": ISO8601, "expires": ISO8601}`
//!
//! Older installs stored `{"accepted": bool, "timestamp", "expires"}`; those
//! records are still read and mapped onto the three default categories.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use indexmap::IndexMap;

use crate::category::NECESSARY;
use crate::store::MAX_CONSENT_DAYS;
use crate::Result;

/// Category key -> granted, in the order the categories were declared
pub type Categories = IndexMap<String, bool>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentRecord {
    pub categories: Categories,
    pub timestamp: DateTime<Utc>,
    pub expires: DateTime<Utc>,
}

impl ConsentRecord {
    /// New record valid for `ttl_days` from `now`; `necessary` is always granted.
    ///
    /// Lifetimes are capped at [`MAX_CONSENT_DAYS`].
    pub fn new(mut categories: Categories, ttl_days: u32, now: DateTime<Utc>) -> Self {
        categories.insert(NECESSARY.to_string(), true);

        let ttl = Duration::days(i64::from(ttl_days.min(MAX_CONSENT_DAYS)));
        let expires = now
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            categories,
            timestamp: now,
            expires,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires < now
    }

    /// Only an explicit `true` counts as granted
    pub fn is_granted(&self, key: &str) -> bool {
        self.categories.get(key).copied().unwrap_or(false)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse the stored JSON, accepting the legacy `accepted` shape
    pub fn from_stored_json(json: &str) -> Result<Self> {
        let stored: StoredRecord = serde_json::from_str(json)?;
        Ok(stored.into_record())
    }
}

/// Every shape the record has ever been stored in
#[derive(Debug, Deserialize)]
struct StoredRecord {
    #[serde(default)]
    categories: Option<Categories>,
    #[serde(default)]
    accepted: Option<bool>,
    timestamp: DateTime<Utc>,
    expires: DateTime<Utc>,
}

impl StoredRecord {
    fn into_record(self) -> ConsentRecord {
        let categories = match (self.categories, self.accepted) {
            (Some(categories), _) => categories,
            (None, Some(accepted)) => [
                (NECESSARY.to_string(), true),
                ("statistics".to_string(), accepted),
                ("marketing".to_string(), accepted),
            ]
            .into_iter()
            .collect(),
            (None, None) => Categories::new(),
        };

        ConsentRecord {
            categories,
            timestamp: self.timestamp,
            expires: self.expires,
        }
    }
}
