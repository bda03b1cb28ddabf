//! Consent action labels

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConsentError;

/// What the user did; sent along with every audit entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentAction {
    AcceptAll,
    RejectAll,
    Custom,
    Revoke,
}

impl ConsentAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsentAction::AcceptAll => "accept_all",
            ConsentAction::RejectAll => "reject_all",
            ConsentAction::Custom => "custom",
            ConsentAction::Revoke => "revoke",
        }
    }
}

impl fmt::Display for ConsentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsentAction {
    type Err = ConsentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accept_all" => Ok(ConsentAction::AcceptAll),
            "reject_all" => Ok(ConsentAction::RejectAll),
            "custom" => Ok(ConsentAction::Custom),
            "revoke" => Ok(ConsentAction::Revoke),
            other => Err(ConsentError::UnknownAction(other.to_string())),
        }
    }
}
