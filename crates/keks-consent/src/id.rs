//! Consent identifier
//!
//! Correlates audit entries written by the same browser profile. It is not
//! part of the consent record and survives revocation.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

const SUFFIX_LEN: usize = 9;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConsentId(String);

impl ConsentId {
    /// `keks_<unix millis>_<9 random lowercase alphanumerics>`
    pub fn generate() -> Self {
        let random = Uuid::new_v4().simple().to_string();
        Self(format!(
            "keks_{}_{}",
            Utc::now().timestamp_millis(),
            &random[..SUFFIX_LEN]
        ))
    }

    /// Wrap a previously stored id; blank values are rejected
    pub fn from_stored(value: String) -> Option<Self> {
        if value.trim().is_empty() {
            None
        } else {
            Some(Self(value))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConsentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
