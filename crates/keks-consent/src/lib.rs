//! Keks Consent
//!
//! The consent state the rest of Keks is built on:
//! - which categories exist and which of them are required
//! - the persisted, expiring consent record (with legacy migration)
//! - the per-page decision whether to show the banner and block the page

mod action;
mod category;
mod decision;
mod error;
mod id;
mod record;
mod store;

pub use action::ConsentAction;
pub use category::{CategoryDefinition, CategoryModel, NECESSARY};
pub use decision::{has_sufficient_consent, Decision, DecisionEngine, PagePolicy, PageState};
pub use error::ConsentError;
pub use id::ConsentId;
pub use record::{Categories, ConsentRecord};
pub use store::{
    ConsentStore, WriteOutcome, CONSENT_ID_KEY, CONSENT_KEY, DEFAULT_CONSENT_DAYS, MAX_CONSENT_DAYS,
};

pub type Result<T> = std::result::Result<T, ConsentError>;
