//! Gated content builders
//!
//! Produce the inert markup that [`ActivationEngine`](crate::ActivationEngine)
//! later turns live. Nodes are created detached; the caller decides where
//! they go.

use crate::activation::{CATEGORY_ATTR, DEFERRED_SRC_ATTR, INERT_SCRIPT_TYPE};
use crate::document::{Document, Element, NodeId};

/// Placeholder text shown until a gated iframe loads; `%s` is the category
pub const DEFAULT_IFRAME_PLACEHOLDER: &str =
    "This content will load after consent to %s cookies.";

const PLACEHOLDER_STYLE: &str =
    "background:#f0f0f0;padding:40px;text-align:center;border:1px solid #ddd;";

/// A gated iframe and the placeholder rendered next to it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatedIframe {
    pub iframe: NodeId,
    pub placeholder: NodeId,
}

/// Inert script for `category`.
///
/// An external `src` wins over `inline` code. With neither there is nothing
/// to gate and `None` is returned.
pub fn inert_script(doc: &mut Document, category: &str, src: &str, inline: &str) -> Option<NodeId> {
    let script = Element::new("script")
        .with_attr("type", INERT_SCRIPT_TYPE)
        .with_attr(CATEGORY_ATTR, category);

    if !src.trim().is_empty() {
        return Some(doc.create_element(script.with_attr("src", src.trim())));
    }
    if inline.is_empty() {
        return None;
    }

    let script = doc.create_element(script);
    let code = doc.create_text(inline);
    // Fresh nodes cannot form a cycle
    let _ = doc.append_child(script, code);
    Some(script)
}

/// Inert iframe for `category` plus its placeholder.
///
/// `attrs` are copied onto the iframe as given (size, title, allow...).
/// `placeholder` is a message template where `%s` stands for the category.
pub fn inert_iframe(
    doc: &mut Document,
    category: &str,
    src: &str,
    attrs: &[(&str, &str)],
    placeholder: &str,
) -> GatedIframe {
    let mut iframe = Element::new("iframe")
        .with_attr(CATEGORY_ATTR, category)
        .with_attr(DEFERRED_SRC_ATTR, src.trim());
    for (name, value) in attrs {
        // The live source is only ever set on activation
        if !name.eq_ignore_ascii_case("src") {
            iframe.set_attr(*name, *value);
        }
    }
    let iframe = doc.create_element(iframe);

    let wrapper =
        doc.create_element(Element::new("div").with_attr("style", PLACEHOLDER_STYLE));
    let message = doc.create_element(Element::new("p").with_attr("style", "margin:0;"));
    let text = doc.create_text(placeholder.replacen("%s", category, 1));
    let _ = doc.append_child(message, text);
    let _ = doc.append_child(wrapper, message);

    GatedIframe {
        iframe,
        placeholder: wrapper,
    }
}
