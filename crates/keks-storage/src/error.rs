//! Storage error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Storage unavailable")]
    Unavailable,

    #[error("Storage quota exceeded: needed {needed} bytes, limit {limit}")]
    QuotaExceeded { needed: usize, limit: usize },
}
