//! Consent-mode signal
//!
//! Maps the marketing and statistics categories onto the four flags tag
//! managers understand (`ad_storage`, `ad_user_data`, `ad_personalization`,
//! `analytics_storage`).

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use keks_consent::Categories;

use crate::error::NotifyError;
use crate::Result;

/// How long tags wait for an update after the default was sent
pub const WAIT_FOR_UPDATE_MS: u32 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalState {
    Granted,
    Denied,
}

impl From<bool> for SignalState {
    fn from(granted: bool) -> Self {
        if granted {
            SignalState::Granted
        } else {
            SignalState::Denied
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentSignal {
    pub ad_storage: SignalState,
    pub ad_user_data: SignalState,
    pub ad_personalization: SignalState,
    pub analytics_storage: SignalState,
}

impl ConsentSignal {
    pub fn from_categories(categories: &Categories) -> Self {
        let marketing = SignalState::from(categories.get("marketing").copied().unwrap_or(false));
        let statistics = SignalState::from(categories.get("statistics").copied().unwrap_or(false));

        Self {
            ad_storage: marketing,
            ad_user_data: marketing,
            ad_personalization: marketing,
            analytics_storage: statistics,
        }
    }

    pub fn denied() -> Self {
        Self {
            ad_storage: SignalState::Denied,
            ad_user_data: SignalState::Denied,
            ad_personalization: SignalState::Denied,
            analytics_storage: SignalState::Denied,
        }
    }
}

/// The page's consent-mode tag API (`gtag('consent', ...)`)
pub trait ConsentModeApi: Send + Sync {
    /// Initial state sent before any tag loads
    fn set_default(&self, signal: &ConsentSignal, wait_for_update_ms: u32) -> Result<()>;

    fn update(&self, signal: &ConsentSignal) -> Result<()>;
}

/// Records consent commands the way a tag data layer receives them:
/// `["consent", "default" | "update", {flags...}]`
#[derive(Debug, Default)]
pub struct DataLayer {
    entries: Mutex<Vec<Value>>,
}

impl DataLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<Value> {
        self.entries.lock().clone()
    }

    fn push(&self, command: &str, flags: Value) {
        self.entries.lock().push(json!(["consent", command, flags]));
    }
}

impl ConsentModeApi for DataLayer {
    fn set_default(&self, signal: &ConsentSignal, wait_for_update_ms: u32) -> Result<()> {
        let mut flags = serde_json::to_value(signal)
            .map_err(|e| NotifyError::ConsentMode(e.to_string()))?;
        if let Value::Object(map) = &mut flags {
            map.insert("wait_for_update".to_string(), json!(wait_for_update_ms));
        }
        self.push("default", flags);
        Ok(())
    }

    fn update(&self, signal: &ConsentSignal) -> Result<()> {
        let flags = serde_json::to_value(signal)
            .map_err(|e| NotifyError::ConsentMode(e.to_string()))?;
        self.push("update", flags);
        Ok(())
    }
}
