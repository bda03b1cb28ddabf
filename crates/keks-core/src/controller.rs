//! Banner controller
//!
//! Drives the pre-rendered banner markup: shows or hides it, blocks the page,
//! builds the overlay and turns clicks into consent actions. Missing markup is
//! never an error, every operation on an absent element is a no-op.

use std::sync::Arc;
use std::time::{Duration, Instant};

use keks_consent::{Categories, ConsentAction, Decision};
use keks_dom::{Document, Element, NodeId};

use crate::manager::ConsentManager;

pub const BANNER_ID: &str = "keks-banner";
pub const OVERLAY_ID: &str = "keks-block-overlay";
pub const BLOCKER_ID: &str = "keks-page-blocker";

pub const HIDDEN_CLASS: &str = "keks-hidden";
pub const VISIBLE_CLASS: &str = "keks-visible";
pub const BODY_BLOCKED_CLASS: &str = "keks-body-blocked";

/// Checkbox attribute naming the category it toggles
pub const CHECKBOX_CATEGORY_ATTR: &str = "data-category";

/// Delay between starting a hide and finishing it
pub const TRANSITION_DELAY: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    AcceptAll,
    RejectAll,
    SaveSelection,
    Revoke,
}

impl Intent {
    fn from_element(element: &Element) -> Option<Self> {
        if element.has_class("keks-btn-accept") {
            Some(Intent::AcceptAll)
        } else if element.has_class("keks-btn-reject") {
            Some(Intent::RejectAll)
        } else if element.has_class("keks-btn-save") {
            Some(Intent::SaveSelection)
        } else if element.has_class("keks-revoke-link") {
            Some(Intent::Revoke)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransitionKind {
    HideBanner,
    DetachOverlay,
}

#[derive(Debug, Clone, Copy)]
struct Transition {
    due: Instant,
    kind: TransitionKind,
}

pub struct BannerController {
    manager: Arc<ConsentManager>,
    document: Document,
    decision: Option<Decision>,
    pending: Vec<Transition>,
}

impl BannerController {
    pub fn new(manager: Arc<ConsentManager>, document: Document) -> Self {
        Self {
            manager,
            document,
            decision: None,
            pending: Vec::new(),
        }
    }

    /// Page-load entry point
    pub fn mount(&mut self) -> Decision {
        self.manager.on_page_load(&mut self.document);

        let decision = self.manager.decide();
        if self.manager.is_preview() {
            tracing::info!("{}", self.manager.config().strings.preview_mode);
        }
        self.apply(&decision);
        self.decision = Some(decision);
        decision
    }

    /// Route a click. Returns the intent that was handled, if any.
    pub fn handle_click(&mut self, target: NodeId) -> Option<Intent> {
        if !self.document.is_attached(target) {
            return None;
        }
        let intent = self.document.element(target).and_then(Intent::from_element)?;
        self.dispatch(intent);
        Some(intent)
    }

    pub fn dispatch(&mut self, intent: Intent) {
        match intent {
            Intent::AcceptAll => self.accept_all(),
            Intent::RejectAll => self.reject_all(),
            Intent::SaveSelection => self.save_selection(),
            Intent::Revoke => self.revoke(),
        }
    }

    pub fn accept_all(&mut self) {
        let selection = self.manager.categories().accept_all_selection();
        self.commit(selection, ConsentAction::AcceptAll);
    }

    pub fn reject_all(&mut self) {
        let selection = self.manager.categories().reject_all_selection();
        self.commit(selection, ConsentAction::RejectAll);
    }

    pub fn save_selection(&mut self) {
        let selection = self.selection();
        self.commit(selection, ConsentAction::Custom);
    }

    pub fn revoke(&mut self) {
        self.manager.revoke();

        let decision = self.manager.decide_revoked();
        self.apply(&decision);
        self.decision = Some(decision);
    }

    /// Current state of the banner checkboxes.
    ///
    /// Required categories read as granted whatever their box says. Without
    /// any checkboxes every category falls back to its required flag.
    pub fn selection(&self) -> Categories {
        let model = self.manager.categories();
        let mut selection = Categories::new();

        for checkbox in self.checkboxes() {
            let Some(element) = self.document.element(checkbox) else {
                continue;
            };
            let Some(key) = element.attr(CHECKBOX_CATEGORY_ATTR) else {
                continue;
            };
            let granted = model.is_required(key) || element.has_attr("checked");
            selection.insert(key.to_string(), granted);
        }

        if selection.is_empty() {
            return model.reject_all_selection();
        }
        selection
    }

    /// Tick or untick a category box, as the user would. Disabled boxes
    /// ignore it.
    pub fn set_category_checked(&mut self, category: &str, checked: bool) -> bool {
        for checkbox in self.checkboxes() {
            let Some(element) = self.document.element_mut(checkbox) else {
                continue;
            };
            if element.attr(CHECKBOX_CATEGORY_ATTR) != Some(category)
                || element.has_attr("disabled")
            {
                continue;
            }
            set_checked(element, checked);
            return true;
        }
        false
    }

    /// Finish every transition due at `now`. Returns how many ran.
    pub fn poll_transitions(&mut self, now: Instant) -> usize {
        let (due, waiting): (Vec<_>, Vec<_>) =
            self.pending.drain(..).partition(|t| t.due <= now);
        self.pending = waiting;

        for transition in &due {
            match transition.kind {
                TransitionKind::HideBanner => {
                    if let Some(banner) = self.element_by_id_mut(BANNER_ID) {
                        banner.add_class(HIDDEN_CLASS);
                    }
                }
                TransitionKind::DetachOverlay => {
                    if let Some(overlay) = self.document.get_element_by_id(OVERLAY_ID) {
                        if let Err(e) = self.document.detach(overlay) {
                            tracing::debug!(error = %e, "Overlay already gone");
                        }
                    }
                }
            }
        }
        due.len()
    }

    pub fn has_pending_transitions(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn decision(&self) -> Option<Decision> {
        self.decision
    }

    pub fn manager(&self) -> &Arc<ConsentManager> {
        &self.manager
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    fn commit(&mut self, selection: Categories, action: ConsentAction) {
        if self.manager.is_preview() {
            let strings = &self.manager.config().strings;
            let message = match action {
                ConsentAction::AcceptAll => &strings.accepted_preview,
                ConsentAction::RejectAll => &strings.rejected_preview,
                _ => &strings.selection_saved_preview,
            };
            tracing::info!(action = %action, selection = ?selection, "{}", message);
        } else {
            self.manager
                .record_decision(&mut self.document, selection, action);
            self.decision = Some(self.manager.decide());
        }

        self.hide_banner();
        self.unblock_page();
        self.hide_overlay();
    }

    fn apply(&mut self, decision: &Decision) {
        if decision.must_show_banner {
            self.show_banner();
        }
        if decision.must_block_page {
            self.block_page();
        }
        if decision.must_show_overlay {
            self.show_overlay();
        }
    }

    fn show_banner(&mut self) {
        let Some(banner) = self.element_by_id_mut(BANNER_ID) else {
            return;
        };
        banner.remove_class(HIDDEN_CLASS);
        banner.add_class(VISIBLE_CLASS);
        self.cancel(TransitionKind::HideBanner);

        let Some(record) = self.manager.current_record() else {
            return;
        };
        for checkbox in self.checkboxes() {
            let Some(element) = self.document.element_mut(checkbox) else {
                continue;
            };
            if element.has_attr("disabled") {
                continue;
            }
            let stored = element
                .attr(CHECKBOX_CATEGORY_ATTR)
                .and_then(|key| record.categories.get(key))
                .copied();
            if let Some(granted) = stored {
                set_checked(element, granted);
            }
        }
    }

    fn hide_banner(&mut self) {
        let Some(banner) = self.element_by_id_mut(BANNER_ID) else {
            return;
        };
        banner.remove_class(VISIBLE_CLASS);
        self.schedule(TransitionKind::HideBanner);
    }

    fn block_page(&mut self) {
        let Some(body) = self.document.body() else {
            return;
        };
        if let Some(element) = self.document.element_mut(body) {
            element.add_class(BODY_BLOCKED_CLASS);
        }

        if self.document.get_element_by_id(BLOCKER_ID).is_none() {
            let blocker = self.document.create_element(
                Element::new("div")
                    .with_attr("id", BLOCKER_ID)
                    .with_attr("class", BLOCKER_ID),
            );
            self.append(body, blocker);
        }
    }

    fn unblock_page(&mut self) {
        if let Some(body) = self.document.body() {
            if let Some(element) = self.document.element_mut(body) {
                element.remove_class(BODY_BLOCKED_CLASS);
            }
        }
        if let Some(blocker) = self.document.get_element_by_id(BLOCKER_ID) {
            if let Err(e) = self.document.detach(blocker) {
                tracing::debug!(error = %e, "Page blocker already gone");
            }
        }
    }

    fn show_overlay(&mut self) {
        self.cancel(TransitionKind::DetachOverlay);

        if let Some(overlay) = self.element_by_id_mut(OVERLAY_ID) {
            overlay.add_class(VISIBLE_CLASS);
            return;
        }
        let Some(body) = self.document.body() else {
            return;
        };

        let config = self.manager.config();
        let message = config.overlay_message().to_string();
        let hint = config.strings.overlay_hint.clone();

        let overlay = self.document.create_element(
            Element::new("div")
                .with_attr("id", OVERLAY_ID)
                .with_attr("class", format!("{} {}", OVERLAY_ID, VISIBLE_CLASS)),
        );
        let content = self
            .document
            .create_element(Element::new("div").with_attr("class", "keks-block-content"));
        self.append(overlay, content);

        for (tag, class, text) in [
            ("div", "keks-block-icon", "🍪".to_string()),
            ("p", "keks-block-message", message),
            ("p", "keks-block-hint", hint),
        ] {
            let node = self
                .document
                .create_element(Element::new(tag).with_attr("class", class));
            let text = self.document.create_text(text);
            self.append(node, text);
            self.append(content, node);
        }

        self.append(body, overlay);
    }

    fn hide_overlay(&mut self) {
        let Some(overlay) = self.element_by_id_mut(OVERLAY_ID) else {
            return;
        };
        overlay.remove_class(VISIBLE_CLASS);
        self.schedule(TransitionKind::DetachOverlay);
    }

    fn checkboxes(&self) -> Vec<NodeId> {
        let Some(banner) = self.document.get_element_by_id(BANNER_ID) else {
            return Vec::new();
        };
        self.document.select_within(banner, |el| {
            el.name() == "input" && el.has_attr(CHECKBOX_CATEGORY_ATTR)
        })
    }

    fn element_by_id_mut(&mut self, id: &str) -> Option<&mut Element> {
        let node = self.document.get_element_by_id(id)?;
        self.document.element_mut(node)
    }

    fn append(&mut self, parent: NodeId, child: NodeId) {
        if let Err(e) = self.document.append_child(parent, child) {
            tracing::warn!(error = %e, "Failed to insert banner element");
        }
    }

    fn schedule(&mut self, kind: TransitionKind) {
        self.cancel(kind);
        self.pending.push(Transition {
            due: Instant::now() + TRANSITION_DELAY,
            kind,
        });
    }

    fn cancel(&mut self, kind: TransitionKind) {
        self.pending.retain(|t| t.kind != kind);
    }
}

fn set_checked(element: &mut Element, checked: bool) {
    if checked {
        element.set_attr("checked", "");
    } else {
        element.remove_attr("checked");
    }
}
