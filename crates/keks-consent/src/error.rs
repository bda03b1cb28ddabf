//! Consent error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConsentError {
    #[error("Storage error: {0}")]
    Storage(#[from] keks_storage::StorageError),

    #[error("Invalid consent record JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid category key: {0:?}")]
    InvalidCategory(String),

    #[error("Duplicate category key: {0}")]
    DuplicateCategory(String),

    #[error("Unknown consent action: {0}")]
    UnknownAction(String),
}
