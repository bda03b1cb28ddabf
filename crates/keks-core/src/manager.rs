//! Consent manager
//!
//! One instance per page load. Owns the page config, the consent store and
//! the side channels, and is shared (behind an `Arc`) between the banner
//! controller and anything on the page that asks whether a category is
//! allowed.

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::broadcast;

use keks_consent::{
    Categories, CategoryModel, ConsentAction, ConsentRecord, ConsentStore, Decision,
    DecisionEngine, NECESSARY,
};
use keks_dom::{ActivationEngine, Document, GatedIframe};
use keks_notify::{AuditEntry, AuditRelay, ConsentModeApi, Notifier};
use keks_storage::StorageArea;

use crate::config::PageConfig;

const CHANGE_CHANNEL_CAPACITY: usize = 16;

/// Sent to subscribers whenever consent is saved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentChanged {
    pub categories: Categories,
}

pub struct ConsentManager {
    config: PageConfig,
    store: ConsentStore,
    engine: DecisionEngine,
    activation: ActivationEngine,
    notifier: Notifier,
    /// Last saved record when storage refused to persist it
    session: RwLock<Option<ConsentRecord>>,
    changes: broadcast::Sender<ConsentChanged>,
}

impl ConsentManager {
    pub fn new(config: PageConfig, storage: Arc<dyn StorageArea>) -> Self {
        let store = ConsentStore::new(storage)
            .with_unavailable_message(config.strings.local_storage_unavailable.clone());
        let engine = DecisionEngine::new(config.policy());
        let activation = ActivationEngine::new(config.strings.activation_messages());

        let mut notifier = Notifier::new(config.strings.notifier_messages());
        if let Some(endpoint) = config.ajax_url.clone() {
            match AuditRelay::new(endpoint, config.nonce.clone()) {
                Ok(relay) => notifier = notifier.with_audit_relay(relay),
                Err(e) => tracing::warn!(error = %e, "Consent logging disabled"),
            }
        }

        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);

        Self {
            config,
            store,
            engine,
            activation,
            notifier,
            session: RwLock::new(None),
            changes,
        }
    }

    /// Attach the page's consent-mode API. Without one (or with the
    /// integration disabled in the config) no signals are sent.
    pub fn with_consent_mode_api(mut self, api: Arc<dyn ConsentModeApi>) -> Self {
        self.notifier = self
            .notifier
            .with_consent_mode(self.config.google_consent_mode, Some(api));
        self
    }

    pub fn config(&self) -> &PageConfig {
        &self.config
    }

    pub fn categories(&self) -> &CategoryModel {
        &self.config.categories
    }

    pub fn is_preview(&self) -> bool {
        self.config.preview_mode
    }

    /// Stored record, or the session-only one if storage failed
    pub fn current_record(&self) -> Option<ConsentRecord> {
        self.store.read().or_else(|| {
            self.session
                .read()
                .clone()
                .filter(|r| !r.is_expired_at(chrono::Utc::now()))
        })
    }

    pub fn decide(&self) -> Decision {
        let record = self.current_record();
        self.engine.evaluate(&self.config.categories, record.as_ref())
    }

    pub fn decide_revoked(&self) -> Decision {
        self.engine.evaluate_revoked()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConsentChanged> {
        self.changes.subscribe()
    }

    pub fn is_allowed(&self, category: &str) -> bool {
        self.current_record()
            .map(|r| r.is_granted(category))
            .unwrap_or(false)
    }

    /// True if any category other than `necessary` is granted
    pub fn is_accepted(&self) -> bool {
        self.current_record().is_some_and(|record| {
            record
                .categories
                .iter()
                .any(|(key, granted)| *granted && key != NECESSARY)
        })
    }

    pub fn get_categories(&self) -> Categories {
        self.current_record()
            .map(|r| r.categories)
            .unwrap_or_default()
    }

    /// Page-load work that does not touch the banner: consent-mode defaults
    /// and activation of what an existing record already allows.
    pub fn on_page_load(&self, doc: &mut Document) {
        self.notifier.signal_default();

        if self.config.preview_mode {
            return;
        }

        if let Some(record) = self.current_record() {
            self.notifier.signal_categories(&record.categories);
            self.activation.activate_all(doc, &record);
        }
    }

    /// Store a decision and act on it.
    ///
    /// Persisting and activation finish before the notifier is called, so
    /// slow or failing relays cannot change the outcome. Returns `None` in
    /// preview mode, where nothing is saved.
    pub fn record_decision(
        &self,
        doc: &mut Document,
        selection: Categories,
        action: ConsentAction,
    ) -> Option<ConsentRecord> {
        if self.config.preview_mode {
            return None;
        }

        let selection = self.config.categories.enforce_required(selection);
        let outcome = self.store.write(selection, self.config.consent_days);
        let record = outcome.record;
        *self.session.write() = if outcome.persisted {
            None
        } else {
            Some(record.clone())
        };

        self.activation.activate_all(doc, &record);

        self.notifier.signal_categories(&record.categories);
        self.audit(action, record.categories.clone());

        // No subscribers is fine
        let _ = self.changes.send(ConsentChanged {
            categories: record.categories.clone(),
        });

        tracing::info!(
            action = %action,
            categories = ?record.categories,
            "{}",
            self.config.strings.consent_saved
        );
        Some(record)
    }

    /// Forget the decision. The consent id is kept so the revocation can be
    /// correlated with earlier entries.
    pub fn revoke(&self) {
        if self.config.preview_mode {
            return;
        }

        self.store.clear();
        *self.session.write() = None;

        self.notifier.signal_revoked();
        self.audit(ConsentAction::Revoke, Categories::new());

        tracing::info!(action = %ConsentAction::Revoke, "Consent revoked");
    }

    /// Inert iframe plus its placeholder, worded in the page's language
    pub fn inert_iframe(
        &self,
        doc: &mut Document,
        category: &str,
        src: &str,
        attrs: &[(&str, &str)],
    ) -> GatedIframe {
        keks_dom::inert_iframe(doc, category, src, attrs, &self.config.strings.iframe_placeholder)
    }

    /// The consent id only exists to correlate audit entries, so it is not
    /// minted unless there is somewhere to send them.
    fn audit(&self, action: ConsentAction, categories: Categories) {
        if !self.notifier.has_audit_relay() {
            return;
        }
        self.notifier.relay(AuditEntry {
            consent_id: self.store.get_or_create_id(),
            action,
            categories,
            url: self.config.page_url.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keks_consent::{PageState, CONSENT_KEY};
    use keks_notify::DataLayer;
    use keks_storage::MemoryStorage;

    const PAGE: &str = r#"<html><head>
<script type="text/plain" data-keks-category="statistics">window.stats = 1;</script>
<script type="text/plain" data-keks-category="marketing">window.ads = 1;</script>
</head><body></body></html>"#;

    fn config(json: &str) -> PageConfig {
        PageConfig::from_json(json, "https://example.com/").unwrap()
    }

    fn manager(json: &str) -> (Arc<MemoryStorage>, ConsentManager) {
        let storage = Arc::new(MemoryStorage::new());
        let manager = ConsentManager::new(config(json), storage.clone());
        (storage, manager)
    }

    fn inert(doc: &Document, category: &str) -> usize {
        doc.select(|el| el.attr(keks_dom::CATEGORY_ATTR) == Some(category))
            .len()
    }

    #[test]
    fn test_record_decision_persists_and_activates() {
        let (storage, manager) = manager(r#"{"shouldBlockPage": "1"}"#);
        let mut doc = Document::parse(PAGE);
        let mut changes = manager.subscribe();

        let selection = manager.categories().reject_all_selection();
        let record = manager
            .record_decision(&mut doc, selection, ConsentAction::RejectAll)
            .unwrap();

        assert!(record.is_granted("necessary"));
        assert!(storage.get_item(CONSENT_KEY).unwrap().is_some());
        assert_eq!(inert(&doc, "statistics"), 1);
        assert_eq!(manager.decide().state, PageState::Sufficient);

        let event = changes.try_recv().unwrap();
        assert_eq!(event.categories, record.categories);
    }

    #[test]
    fn test_handle_queries() {
        let (_, manager) = manager("{}");
        let mut doc = Document::parse(PAGE);

        assert!(!manager.is_allowed("necessary"));
        assert!(!manager.is_accepted());
        assert!(manager.get_categories().is_empty());

        let selection: Categories = [("statistics".to_string(), true)].into_iter().collect();
        manager.record_decision(&mut doc, selection, ConsentAction::Custom);

        assert!(manager.is_allowed("necessary"));
        assert!(manager.is_allowed("statistics"));
        assert!(!manager.is_allowed("marketing"));
        assert!(manager.is_accepted());
        assert_eq!(manager.get_categories().len(), 2);
    }

    #[test]
    fn test_only_necessary_is_not_accepted() {
        let (_, manager) = manager("{}");
        let mut doc = Document::parse(PAGE);
        let selection = manager.categories().reject_all_selection();
        manager.record_decision(&mut doc, selection, ConsentAction::RejectAll);

        assert!(!manager.is_accepted());
    }

    #[test]
    fn test_session_record_when_storage_disabled() {
        let (storage, manager) = manager(r#"{"shouldBlockPage": "1"}"#);
        storage.set_available(false);
        let mut doc = Document::parse(PAGE);

        let selection = manager.categories().accept_all_selection();
        manager.record_decision(&mut doc, selection, ConsentAction::AcceptAll);

        assert!(manager.is_allowed("marketing"));
        assert!(!manager.decide().must_show_banner);
        assert_eq!(inert(&doc, "marketing"), 0);
    }

    #[test]
    fn test_revoke_clears_record() {
        let (storage, manager) = manager(r#"{"ajaxUrl": "/wp-admin/admin-ajax.php"}"#);
        let mut doc = Document::parse(PAGE);
        let selection = manager.categories().accept_all_selection();
        manager.record_decision(&mut doc, selection, ConsentAction::AcceptAll);
        let id = storage.get_item(keks_consent::CONSENT_ID_KEY).unwrap();

        assert!(id.is_some());

        manager.revoke();

        assert!(manager.current_record().is_none());
        assert_eq!(manager.decide().state, PageState::NoDecision);
        assert_eq!(storage.get_item(keks_consent::CONSENT_ID_KEY).unwrap(), id);
    }

    #[test]
    fn test_no_consent_id_without_audit_endpoint() {
        let (storage, manager) = manager("{}");
        let mut doc = Document::parse(PAGE);

        let selection = manager.categories().reject_all_selection();
        manager.record_decision(&mut doc, selection, ConsentAction::RejectAll);
        manager.revoke();

        assert_eq!(storage.get_item(keks_consent::CONSENT_ID_KEY).unwrap(), None);
    }

    #[test]
    fn test_required_optional_category_counts_as_accepted() {
        let json = r#"{"categories": {
            "necessary": {"required": "1"},
            "comfort": {"required": "1"},
            "marketing": {}
        }}"#;
        let (_, manager) = manager(json);
        let mut doc = Document::parse(PAGE);

        let selection = manager.categories().reject_all_selection();
        manager.record_decision(&mut doc, selection, ConsentAction::RejectAll);

        assert!(manager.is_allowed("comfort"));
        assert!(manager.is_accepted());
    }

    #[test]
    fn test_huge_consent_days_still_saves() {
        let (storage, manager) = manager(r#"{"consentDays": "100000000"}"#);
        let mut doc = Document::parse(PAGE);

        let selection = manager.categories().accept_all_selection();
        let record = manager
            .record_decision(&mut doc, selection, ConsentAction::AcceptAll)
            .unwrap();

        assert!(storage.get_item(CONSENT_KEY).unwrap().is_some());
        assert!(record.expires > record.timestamp);
        assert!(manager.is_allowed("marketing"));
    }

    #[test]
    fn test_inert_iframe_uses_page_strings() {
        let json = r#"{"strings": {"iframePlaceholder": "Inhalt nach Zustimmung zu %s-Cookies."}}"#;
        let (_, manager) = manager(json);
        let mut doc = Document::parse(PAGE);

        let gated = manager.inert_iframe(&mut doc, "marketing", "https://video.example/embed", &[]);

        assert_eq!(
            doc.text_content(gated.placeholder),
            "Inhalt nach Zustimmung zu marketing-Cookies."
        );
        assert_eq!(
            doc.element(gated.iframe).unwrap().attr(keks_dom::DEFERRED_SRC_ATTR),
            Some("https://video.example/embed")
        );
    }

    #[test]
    fn test_preview_does_not_persist() {
        let storage = Arc::new(MemoryStorage::new());
        let config =
            PageConfig::from_json("{}", "https://example.com/?keks_preview=1").unwrap();
        let manager = ConsentManager::new(config, storage.clone());
        let mut doc = Document::parse(PAGE);

        let selection = manager.categories().accept_all_selection();
        assert!(manager
            .record_decision(&mut doc, selection, ConsentAction::AcceptAll)
            .is_none());
        assert!(storage.is_empty());
        assert_eq!(inert(&doc, "statistics"), 1);
    }

    #[test]
    fn test_page_load_restores_consent_mode() {
        let storage = Arc::new(MemoryStorage::new());
        let layer = Arc::new(DataLayer::new());
        let api: Arc<dyn ConsentModeApi> = layer.clone();
        let manager = ConsentManager::new(config(r#"{"googleConsentMode": "1"}"#), storage)
            .with_consent_mode_api(api);
        let mut doc = Document::parse(PAGE);

        let selection: Categories = [("statistics".to_string(), true)].into_iter().collect();
        manager.record_decision(&mut doc, selection, ConsentAction::Custom);

        let mut reloaded = Document::parse(PAGE);
        manager.on_page_load(&mut reloaded);

        let entries = layer.entries();
        // update on save, then default + update on the next load
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1][1], "default");
        assert_eq!(entries[2][1], "update");
        assert_eq!(entries[2][2]["analytics_storage"], "granted");
        assert_eq!(entries[2][2]["ad_storage"], "denied");
        assert_eq!(inert(&reloaded, "statistics"), 0);
        assert_eq!(inert(&reloaded, "marketing"), 1);
    }
}
