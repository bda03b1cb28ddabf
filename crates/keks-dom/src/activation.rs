//! Script activation
//!
//! Gated scripts ship with a neutral `type="text/plain"` so the browser never
//! runs them. Flipping the attribute in place does not make a script run, so
//! each inert script is swapped for a freshly created one carrying the same
//! attributes and inline code. Gated iframes only need their real `src`.
//!
//! Activated nodes no longer match the inert contract, which makes every
//! activation safe to repeat.

use keks_consent::ConsentRecord;

use crate::document::{Document, Element, NodeId, NodeKind};

pub const INERT_SCRIPT_TYPE: &str = "text/plain";
pub const CATEGORY_ATTR: &str = "data-keks-category";
pub const DEFERRED_SRC_ATTR: &str = "data-keks-src";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationMessages {
    pub script_activated: String,
    pub iframe_activated: String,
}

impl Default for ActivationMessages {
    fn default() -> Self {
        Self {
            script_activated: "Keks: Script activated".to_string(),
            iframe_activated: "Keks: Iframe activated".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ActivationEngine {
    messages: ActivationMessages,
}

impl ActivationEngine {
    pub fn new(messages: ActivationMessages) -> Self {
        Self { messages }
    }

    /// Make every inert script and iframe tagged with `category` live
    pub fn activate_category(&self, doc: &mut Document, category: &str) {
        let scripts = doc.select(|el| is_inert_script(el, category));
        for script in scripts {
            let live = build_live_script(doc, script);
            match doc.replace_node(script, live) {
                Ok(()) => {
                    tracing::info!(category = %category, "{} ({})", self.messages.script_activated, category);
                }
                Err(e) => {
                    tracing::warn!(category = %category, error = %e, "Failed to activate script");
                }
            }
        }

        let iframes = doc.select(|el| is_inert_iframe(el, category));
        for iframe in iframes {
            let Some(element) = doc.element_mut(iframe) else {
                continue;
            };
            if let Some(src) = element.remove_attr(DEFERRED_SRC_ATTR) {
                element.set_attr("src", src);
                tracing::info!(category = %category, "{} ({})", self.messages.iframe_activated, category);
            }
        }
    }

    /// Activate every category the record grants
    pub fn activate_all(&self, doc: &mut Document, record: &ConsentRecord) {
        for (category, granted) in &record.categories {
            if *granted {
                self.activate_category(doc, category);
            }
        }
    }
}

fn is_inert_script(element: &Element, category: &str) -> bool {
    element.name() == "script"
        && element
            .attr("type")
            .is_some_and(|t| t.trim().eq_ignore_ascii_case(INERT_SCRIPT_TYPE))
        && element.attr(CATEGORY_ATTR) == Some(category)
}

fn is_inert_iframe(element: &Element, category: &str) -> bool {
    element.name() == "iframe"
        && element.attr(CATEGORY_ATTR) == Some(category)
        && element.has_attr(DEFERRED_SRC_ATTR)
}

/// Detached live copy of an inert script
fn build_live_script(doc: &mut Document, inert: NodeId) -> NodeId {
    let mut live = Element::new("script");
    let mut code = String::new();

    if let Some(element) = doc.element(inert) {
        for (name, value) in element.attrs() {
            if name != "type" && name != CATEGORY_ATTR {
                live.set_attr(name, value);
            }
        }
    }
    for child in doc.children(inert) {
        if let Some(NodeKind::Text(text)) = doc.kind(*child) {
            code.push_str(text);
        }
    }

    let live = doc.create_element(live);
    if !code.is_empty() {
        let text = doc.create_text(code);
        // Fresh nodes cannot form a cycle
        let _ = doc.append_child(live, text);
    }
    live
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use keks_consent::Categories;

    const PAGE: &str = r#"<html><head>
<script type="text/plain" data-keks-category="statistics" id="ga" async>window.ga = 1;</script>
<script type="text/plain" data-keks-category="marketing" src="https://ads.example/pixel.js"></script>
<script>window.site = 1;</script>
</head><body>
<iframe data-keks-category="statistics" data-keks-src="https://maps.example/embed"></iframe>
<iframe data-keks-category="marketing" data-keks-src="https://video.example/embed"></iframe>
</body></html>"#;

    fn inert_scripts(doc: &Document, category: &str) -> usize {
        doc.select(|el| is_inert_script(el, category)).len()
    }

    #[test]
    fn test_activate_script_and_iframe() {
        let mut doc = Document::parse(PAGE);
        let engine = ActivationEngine::default();

        engine.activate_category(&mut doc, "statistics");

        assert_eq!(inert_scripts(&doc, "statistics"), 0);
        let live = doc.get_element_by_id("ga").unwrap();
        let element = doc.element(live).unwrap();
        assert_eq!(element.attr("type"), None);
        assert_eq!(element.attr(CATEGORY_ATTR), None);
        assert!(element.has_attr("async"));
        assert_eq!(doc.text_content(live), "window.ga = 1;");

        let iframe = doc
            .select(|el| el.name() == "iframe" && el.attr(CATEGORY_ATTR) == Some("statistics"))[0];
        let iframe = doc.element(iframe).unwrap();
        assert_eq!(iframe.attr("src"), Some("https://maps.example/embed"));
        assert!(!iframe.has_attr(DEFERRED_SRC_ATTR));

        // Other categories untouched
        assert_eq!(inert_scripts(&doc, "marketing"), 1);
        assert_eq!(
            doc.select(|el| el.has_attr(DEFERRED_SRC_ATTR)).len(),
            1
        );
    }

    #[test]
    fn test_activation_is_idempotent() {
        let mut doc = Document::parse(PAGE);
        let engine = ActivationEngine::default();

        engine.activate_category(&mut doc, "statistics");
        let once = doc.to_html();
        engine.activate_category(&mut doc, "statistics");

        assert_eq!(doc.to_html(), once);
        assert_eq!(doc.select(|el| el.id() == Some("ga")).len(), 1);
    }

    #[test]
    fn test_no_matching_nodes_is_noop() {
        let mut doc = Document::parse(PAGE);
        let before = doc.to_html();

        ActivationEngine::default().activate_category(&mut doc, "comfort");
        assert_eq!(doc.to_html(), before);
    }

    #[test]
    fn test_script_order_preserved() {
        let mut doc = Document::parse(
            r#"<html><head>
<script type="text/plain" data-keks-category="statistics" id="first">1</script>
<script type="text/plain" data-keks-category="statistics" id="second">2</script>
</head></html>"#,
        );
        ActivationEngine::default().activate_category(&mut doc, "statistics");

        let ids: Vec<&str> = doc
            .select(|el| el.name() == "script")
            .into_iter()
            .filter_map(|id| doc.element(id).and_then(|el| el.id()))
            .collect();
        assert_eq!(ids, vec!["first", "second"]);
    }

    #[test]
    fn test_activate_all_skips_denied() {
        let mut doc = Document::parse(PAGE);
        let categories: Categories = [
            ("necessary".to_string(), true),
            ("statistics".to_string(), true),
            ("marketing".to_string(), false),
        ]
        .into_iter()
        .collect();
        let record = ConsentRecord::new(categories, 365, Utc::now());

        ActivationEngine::default().activate_all(&mut doc, &record);

        assert_eq!(inert_scripts(&doc, "statistics"), 0);
        assert_eq!(inert_scripts(&doc, "marketing"), 1);
    }
}
