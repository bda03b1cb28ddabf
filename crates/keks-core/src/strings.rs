//! UI and log strings
//!
//! Supplied by the host already translated; any key it leaves out falls back
//! to English.

use serde::{Deserialize, Serialize};

use keks_dom::ActivationMessages;
use keks_notify::NotifierMessages;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Strings {
    pub preview_mode: String,
    pub accepted_preview: String,
    pub rejected_preview: String,
    pub selection_saved_preview: String,
    pub gcm_updated: String,
    pub local_storage_unavailable: String,
    pub logging_failed: String,
    pub consent_saved: String,
    pub revoke_failed: String,
    pub script_activated: String,
    pub iframe_activated: String,
    pub overlay_message: String,
    pub overlay_hint: String,
    /// `%s` is replaced by the category key
    pub iframe_placeholder: String,
}

impl Strings {
    pub fn activation_messages(&self) -> ActivationMessages {
        ActivationMessages {
            script_activated: self.script_activated.clone(),
            iframe_activated: self.iframe_activated.clone(),
        }
    }

    pub fn notifier_messages(&self) -> NotifierMessages {
        NotifierMessages {
            gcm_updated: self.gcm_updated.clone(),
            logging_failed: self.logging_failed.clone(),
            revoke_failed: self.revoke_failed.clone(),
        }
    }
}

impl Default for Strings {
    fn default() -> Self {
        Self {
            preview_mode: "Keks: Preview mode active".to_string(),
            accepted_preview: "Keks: All accepted (Preview - not saved)".to_string(),
            rejected_preview: "Keks: All rejected (Preview - not saved)".to_string(),
            selection_saved_preview: "Keks: Selection saved (Preview)".to_string(),
            gcm_updated: "Keks: Google Consent Mode updated".to_string(),
            local_storage_unavailable: "Keks: localStorage not available".to_string(),
            logging_failed: "Keks: Consent logging failed".to_string(),
            consent_saved: "Keks: Consent saved".to_string(),
            revoke_failed: "Keks: Revoke logging failed".to_string(),
            script_activated: "Keks: Script activated".to_string(),
            iframe_activated: "Keks: Iframe activated".to_string(),
            overlay_message: "To use this website, you must consent to the use of cookies."
                .to_string(),
            overlay_hint: "Please select your cookie settings in the banner below.".to_string(),
            iframe_placeholder: keks_dom::DEFAULT_IFRAME_PLACEHOLDER.to_string(),
        }
    }
}
