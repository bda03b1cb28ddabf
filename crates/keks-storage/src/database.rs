//! Local storage database
//!
//! One SQLite file holds the storage areas of every origin a host serves.
//! Handles are cheap to clone and share one connection.

use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::migrations::run_migrations;
use crate::sqlite::SqliteStorage;
use crate::Result;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        // Pages in other tabs keep reading while one tab saves
        let _: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        Self::prepare(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::prepare(Connection::open_in_memory()?)
    }

    fn prepare(conn: Connection) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        run_migrations(&conn)?;
        tracing::debug!("Local storage database ready");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Storage area scoped to one origin
    pub fn area(&self, origin: impl Into<String>) -> SqliteStorage {
        SqliteStorage::new(self.clone(), origin)
    }

    /// Origins holding at least one item
    pub fn origins(&self) -> Result<Vec<String>> {
        self.with_connection(|conn| {
            let mut stmt =
                conn.prepare("SELECT DISTINCT origin FROM local_storage ORDER BY origin")?;
            let origins = stmt
                .query_map([], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(origins)
        })
    }

    pub(crate) fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock();
        f(&conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area::StorageArea;

    #[test]
    fn test_fresh_database_is_empty() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.origins().unwrap().is_empty());
    }

    #[test]
    fn test_origins_with_items() {
        let db = Database::open_in_memory().unwrap();
        db.area("https://b.example").set_item("k", "v").unwrap();
        db.area("https://a.example").set_item("k", "v").unwrap();
        db.area("https://a.example").set_item("k2", "v").unwrap();

        assert_eq!(
            db.origins().unwrap(),
            vec!["https://a.example", "https://b.example"]
        );

        db.area("https://b.example").clear().unwrap();
        assert_eq!(db.origins().unwrap(), vec!["https://a.example"]);
    }

    #[test]
    fn test_file_database_survives_reopen() {
        let path = std::env::temp_dir().join(format!("keks-storage-{}.db", std::process::id()));
        let _ = std::fs::remove_file(&path);

        Database::open(&path)
            .unwrap()
            .area("https://a.example")
            .set_item("keks_consent", "{}")
            .unwrap();
        let reopened = Database::open(&path).unwrap();
        assert_eq!(
            reopened.area("https://a.example").get_item("keks_consent").unwrap().as_deref(),
            Some("{}")
        );

        drop(reopened);
        let _ = std::fs::remove_file(&path);
    }
}
