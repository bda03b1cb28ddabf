//! SQLite-backed local storage
//!
//! Persists items per origin so several sites can share one database file.

use chrono::Utc;
use rusqlite::OptionalExtension;

use crate::area::StorageArea;
use crate::database::Database;
use crate::Result;

pub struct SqliteStorage {
    db: Database,
    origin: String,
}

impl SqliteStorage {
    pub fn new(db: Database, origin: impl Into<String>) -> Self {
        Self {
            db,
            origin: origin.into(),
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }
}

impl StorageArea for SqliteStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        self.db.with_connection(|conn| {
            let value = conn
                .query_row(
                    "SELECT value FROM local_storage WHERE origin = ?1 AND key = ?2",
                    [self.origin.as_str(), key],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(value)
        })
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let updated_at = Utc::now().to_rfc3339();
        self.db.with_connection(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO local_storage (origin, key, value, updated_at)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![self.origin, key, value, updated_at],
            )?;
            Ok(())
        })
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.db.with_connection(|conn| {
            conn.execute(
                "DELETE FROM local_storage WHERE origin = ?1 AND key = ?2",
                [self.origin.as_str(), key],
            )?;
            Ok(())
        })
    }

    fn clear(&self) -> Result<()> {
        self.db.with_connection(|conn| {
            conn.execute(
                "DELETE FROM local_storage WHERE origin = ?1",
                [self.origin.as_str()],
            )?;
            Ok(())
        })
    }
}
