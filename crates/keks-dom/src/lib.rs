//! Keks DOM
//!
//! A small mutable document model for the page Keks runs on, and the engine
//! that turns inert (consent-gated) scripts and iframes into live ones.
//!
//! Gated content follows this contract:
//! - `<script type="text/plain" data-keks-category="statistics">...</script>`
//! - `<iframe data-keks-category="marketing" data-keks-src="https://..."></iframe>`

mod activation;
mod document;
mod error;
mod gated;

pub use activation::{
    ActivationEngine, ActivationMessages, CATEGORY_ATTR, DEFERRED_SRC_ATTR, INERT_SCRIPT_TYPE,
};
pub use document::{Document, Element, NodeId, NodeKind};
pub use error::DomError;
pub use gated::{inert_iframe, inert_script, GatedIframe, DEFAULT_IFRAME_PLACEHOLDER};

pub type Result<T> = std::result::Result<T, DomError>;
