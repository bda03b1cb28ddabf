//! Keks Notifier
//!
//! Best-effort side channels run after a consent decision is stored:
//! - consent-mode signal to the advertising/analytics tag API
//! - audit entry posted to the host's logging endpoint
//!
//! Failures are logged and dropped. Neither channel can affect the decision.

mod audit;
mod error;
mod notifier;
mod signal;

pub use audit::{AuditEntry, AuditRelay, LOG_ACTION};
pub use error::NotifyError;
pub use notifier::{Notifier, NotifierMessages};
pub use signal::{ConsentModeApi, ConsentSignal, DataLayer, SignalState, WAIT_FOR_UPDATE_MS};

pub type Result<T> = std::result::Result<T, NotifyError>;
