//! Schema migrations
//!
//! Applied in order on open. The applied version lives in SQLite's
//! `user_version` header field.

use rusqlite::Connection;

use crate::Result;

/// One row per (origin, key), like a browser's per-origin local storage
const V1_LOCAL_STORAGE: &str = r#"
    CREATE TABLE IF NOT EXISTS local_storage (
        origin TEXT NOT NULL,
        key TEXT NOT NULL,
        value TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (origin, key)
    );
"#;

const MIGRATIONS: &[(i32, &str)] = &[(1, V1_LOCAL_STORAGE)];

pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current = schema_version(conn)?;

    for &(version, sql) in MIGRATIONS.iter().filter(|(v, _)| *v > current) {
        tracing::info!(version, "Applying local storage migration");
        conn.execute_batch(sql)?;
        conn.pragma_update(None, "user_version", version)?;
    }
    Ok(())
}

pub fn schema_version(conn: &Connection) -> Result<i32> {
    let version = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    Ok(version)
}
