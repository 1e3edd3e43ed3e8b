//! SQLite backing for the notification list.
//!
//! The database holds nothing but the `notifications` table and the
//! `schema_version` ledger. Each numbered script in
//! `resources/migrations` runs once, in order, the first time a
//! connection sees a version above the recorded maximum.

use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;

use super::StoreError;

/// Numbered schema scripts for the notification database.
const MIGRATIONS: &[(i64, &str)] = &[(
    1,
    include_str!("../../resources/migrations/001_notifications.sql"),
)];

/// Writers wait this long for a competing connection to release the file.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open the notification database at `path`, creating and migrating it
/// as needed.
pub fn open_database(path: &Path) -> Result<Connection, StoreError> {
    let conn = Connection::open(path)?;
    prepare(&conn)?;
    tracing::debug!(path = %path.display(), version = schema_version(&conn), "Notification database open");
    Ok(conn)
}

/// Migrated in-memory notification database.
pub fn open_memory_database() -> Result<Connection, StoreError> {
    let conn = Connection::open_in_memory()?;
    prepare(&conn)?;
    Ok(conn)
}

fn prepare(conn: &Connection) -> Result<(), StoreError> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch("PRAGMA journal_mode=DELETE;")?;
    run_migrations(conn)
}

/// Apply every script newer than the recorded schema version.
pub fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
    let current = schema_version(conn);
    for &(version, sql) in MIGRATIONS.iter().filter(|(v, _)| *v > current) {
        tracing::info!(version, "Applying notification schema migration");
        conn.execute_batch(sql)
            .map_err(|e| StoreError::MigrationFailed {
                version,
                reason: e.to_string(),
            })?;
    }
    Ok(())
}

/// Highest applied migration; 0 for a fresh file.
pub fn schema_version(conn: &Connection) -> i64 {
    conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
        row.get::<_, Option<i64>>(0)
    })
    .ok()
    .flatten()
    .unwrap_or(0)
}
