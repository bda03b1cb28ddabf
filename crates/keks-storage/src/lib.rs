//! Keks Storage Layer
//!
//! Local key/value storage the consent store reads and writes.
//! Behaves like browser local storage: string keys, string values,
//! and every call may fail when storage is disabled or full.

mod area;
mod database;
mod error;
mod memory;
mod migrations;
mod sqlite;

pub use area::StorageArea;
pub use database::Database;
pub use error::StorageError;
pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

pub type Result<T> = std::result::Result<T, StorageError>;
