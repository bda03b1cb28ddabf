//! Keks Core
//!
//! Per-page entry point of the consent manager. The host supplies its
//! configuration object, a storage area and the page document; the
//! [`BannerController`] mounts on it and the shared [`ConsentManager`] answers
//! consent queries for the rest of the page.

mod config;
mod controller;
mod error;
mod manager;
mod strings;

pub use config::{HostConfig, PageConfig, PREVIEW_PARAM};
pub use controller::{
    BannerController, Intent, BANNER_ID, BLOCKER_ID, BODY_BLOCKED_CLASS, CHECKBOX_CATEGORY_ATTR,
    HIDDEN_CLASS, OVERLAY_ID, TRANSITION_DELAY, VISIBLE_CLASS,
};
pub use error::CoreError;
pub use manager::{ConsentChanged, ConsentManager};
pub use strings::Strings;

// Re-export the component crates
pub use keks_consent::{
    Categories, CategoryDefinition, CategoryModel, ConsentAction, ConsentError, ConsentId,
    ConsentRecord, ConsentStore, Decision, DecisionEngine, PagePolicy, PageState,
};
pub use keks_dom::{ActivationEngine, Document, DomError, Element, NodeId};
pub use keks_notify::{AuditRelay, ConsentModeApi, ConsentSignal, DataLayer, NotifyError};
pub use keks_storage::{Database, MemoryStorage, SqliteStorage, StorageArea, StorageError};

pub type Result<T> = std::result::Result<T, CoreError>;

/// Initialize logging
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_target(true).init();
}
