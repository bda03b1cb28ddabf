//! Notifier
//!
//! Fans a consent decision out to the enabled side channels.

use std::sync::Arc;
use tokio::task::JoinHandle;

use keks_consent::{Categories, ConsentAction};

use crate::audit::{AuditEntry, AuditRelay};
use crate::signal::{ConsentModeApi, ConsentSignal, WAIT_FOR_UPDATE_MS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifierMessages {
    pub gcm_updated: String,
    pub logging_failed: String,
    pub revoke_failed: String,
}

impl Default for NotifierMessages {
    fn default() -> Self {
        Self {
            gcm_updated: "Keks: Google Consent Mode updated".to_string(),
            logging_failed: "Keks: Consent logging failed".to_string(),
            revoke_failed: "Keks: Revoke logging failed".to_string(),
        }
    }
}

#[derive(Default)]
pub struct Notifier {
    /// Present only when the host enabled consent mode and the page has the API
    consent_mode: Option<Arc<dyn ConsentModeApi>>,
    audit: Option<AuditRelay>,
    messages: NotifierMessages,
}

impl Notifier {
    pub fn new(messages: NotifierMessages) -> Self {
        Self {
            consent_mode: None,
            audit: None,
            messages,
        }
    }

    /// Attach the consent-mode API; ignored unless `enabled`
    pub fn with_consent_mode(mut self, enabled: bool, api: Option<Arc<dyn ConsentModeApi>>) -> Self {
        self.consent_mode = if enabled { api } else { None };
        self
    }

    pub fn with_audit_relay(mut self, relay: AuditRelay) -> Self {
        self.audit = Some(relay);
        self
    }

    pub fn has_consent_mode(&self) -> bool {
        self.consent_mode.is_some()
    }

    pub fn has_audit_relay(&self) -> bool {
        self.audit.is_some()
    }

    /// Everything denied until the visitor decides
    pub fn signal_default(&self) {
        let Some(api) = &self.consent_mode else {
            return;
        };
        if let Err(e) = api.set_default(&ConsentSignal::denied(), WAIT_FOR_UPDATE_MS) {
            tracing::warn!(error = %e, "Failed to set consent mode default");
        }
    }

    pub fn signal_categories(&self, categories: &Categories) {
        self.send_signal(ConsentSignal::from_categories(categories));
    }

    pub fn signal_revoked(&self) {
        self.send_signal(ConsentSignal::denied());
    }

    fn send_signal(&self, signal: ConsentSignal) {
        let Some(api) = &self.consent_mode else {
            return;
        };
        match api.update(&signal) {
            Ok(()) => tracing::info!(?signal, "{}", self.messages.gcm_updated),
            Err(e) => tracing::warn!(error = %e, "Failed to update consent mode"),
        }
    }

    /// Fire-and-forget audit entry; the handle is only useful to tests
    pub fn relay(&self, entry: AuditEntry) -> Option<JoinHandle<()>> {
        let relay = self.audit.as_ref()?;
        let failure = if entry.action == ConsentAction::Revoke {
            self.messages.revoke_failed.clone()
        } else {
            self.messages.logging_failed.clone()
        };
        relay.dispatch(entry, failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NotifyError;
    use crate::signal::DataLayer;

    struct BrokenApi;

    impl ConsentModeApi for BrokenApi {
        fn set_default(&self, _: &ConsentSignal, _: u32) -> crate::Result<()> {
            Err(NotifyError::ConsentMode("gtag is not a function".to_string()))
        }

        fn update(&self, _: &ConsentSignal) -> crate::Result<()> {
            Err(NotifyError::ConsentMode("gtag is not a function".to_string()))
        }
    }

    #[test]
    fn test_disabled_consent_mode_sends_nothing() {
        let layer = Arc::new(DataLayer::new());
        let api: Arc<dyn ConsentModeApi> = layer.clone();
        let notifier = Notifier::default().with_consent_mode(false, Some(api));

        notifier.signal_default();
        notifier.signal_revoked();
        assert!(layer.entries().is_empty());
        assert!(!notifier.has_consent_mode());
    }

    #[test]
    fn test_revoke_sends_all_denied() {
        let layer = Arc::new(DataLayer::new());
        let api: Arc<dyn ConsentModeApi> = layer.clone();
        let notifier = Notifier::default().with_consent_mode(true, Some(api));

        notifier.signal_revoked();
        let entries = layer.entries();
        assert_eq!(entries.len(), 1);
        for flag in ["ad_storage", "ad_user_data", "ad_personalization", "analytics_storage"] {
            assert_eq!(entries[0][2][flag], "denied");
        }
    }

    #[test]
    fn test_broken_api_is_swallowed() {
        let api: Arc<dyn ConsentModeApi> = Arc::new(BrokenApi);
        let notifier = Notifier::default().with_consent_mode(true, Some(api));
        notifier.signal_default();
        notifier.signal_categories(&Categories::new());
    }

    #[test]
    fn test_relay_without_endpoint() {
        let notifier = Notifier::default();
        let entry = AuditEntry {
            consent_id: keks_consent::ConsentId::generate(),
            action: ConsentAction::AcceptAll,
            categories: Categories::new(),
            url: String::new(),
        };
        assert!(notifier.relay(entry).is_none());
    }
}
