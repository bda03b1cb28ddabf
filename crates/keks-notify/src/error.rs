//! Notifier error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Audit endpoint returned HTTP {0}")]
    Status(u16),

    #[error("Consent mode API error: {0}")]
    ConsentMode(String),
}
