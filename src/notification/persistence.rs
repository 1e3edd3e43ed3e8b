//! Durable storage port for the notification list, plus adapters.
//!
//! The store hands the whole list (newest first) to `save` after every
//! mutation and reads it back once at startup with `load`.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use thiserror::Error;

use crate::db::sqlite::{open_database, open_memory_database};
use crate::db::StoreError;
use crate::error::ErrorKind;
use crate::models::{Notification, NotificationType};

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Database error: {0}")]
    Store(#[from] StoreError),

    #[error("Atomic replace failed: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("Corrupt notification row {id}: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("Simulated persistence failure")]
    Simulated,

    #[error("Internal lock error")]
    LockPoisoned,
}

impl PersistenceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::LockPoisoned => ErrorKind::Internal,
            _ => ErrorKind::Storage,
        }
    }
}

pub trait NotificationPersistence: Send + Sync {
    /// Stored list, newest first. An empty store loads as an empty list.
    fn load(&self) -> Result<Vec<Notification>, PersistenceError>;

    /// Replace the stored list.
    fn save(&self, notifications: &[Notification]) -> Result<(), PersistenceError>;
}

// ═══════════════════════════════════════════════════════════
// Memory
// ═══════════════════════════════════════════════════════════

/// In-memory backend. Clones share one slot, so a test can keep a handle,
/// drop the store, and build a new one over the same data to mimic a
/// reload.
#[derive(Debug, Clone, Default)]
pub struct MemoryPersistence {
    slot: Arc<Mutex<Vec<Notification>>>,
    fail_on_save: Arc<AtomicBool>,
    save_count: Arc<AtomicUsize>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `save` fail until switched off again.
    pub fn set_fail_on_save(&self, fail: bool) {
        self.fail_on_save.store(fail, Ordering::SeqCst);
    }

    pub fn save_count(&self) -> usize {
        self.save_count.load(Ordering::SeqCst)
    }
}

impl NotificationPersistence for MemoryPersistence {
    fn load(&self) -> Result<Vec<Notification>, PersistenceError> {
        let slot = self.slot.lock().map_err(|_| PersistenceError::LockPoisoned)?;
        Ok(slot.clone())
    }

    fn save(&self, notifications: &[Notification]) -> Result<(), PersistenceError> {
        if self.fail_on_save.load(Ordering::SeqCst) {
            return Err(PersistenceError::Simulated);
        }
        let mut slot = self.slot.lock().map_err(|_| PersistenceError::LockPoisoned)?;
        *slot = notifications.to_vec();
        self.save_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════
// JSON file
// ═══════════════════════════════════════════════════════════

/// Pretty-printed JSON array in a single file. Writes go to a sibling
/// temp file that is renamed over the target, so a crash mid-write
/// leaves the previous list intact.
#[derive(Debug, Clone)]
pub struct JsonFilePersistence {
    path: PathBuf,
}

impl JsonFilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl NotificationPersistence for JsonFilePersistence {
    fn load(&self) -> Result<Vec<Notification>, PersistenceError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    fn save(&self, notifications: &[Notification]) -> Result<(), PersistenceError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut tmp, notifications)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)?;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════
// SQLite
// ═══════════════════════════════════════════════════════════

/// One row per notification; `position` keeps the newest-first order.
pub struct SqlitePersistence {
    conn: Mutex<Connection>,
}

impl SqlitePersistence {
    pub fn open(path: &Path) -> Result<Self, PersistenceError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(Self {
            conn: Mutex::new(open_database(path)?),
        })
    }

    pub fn in_memory() -> Result<Self, PersistenceError> {
        Ok(Self {
            conn: Mutex::new(open_memory_database()?),
        })
    }
}

impl NotificationPersistence for SqlitePersistence {
    fn load(&self) -> Result<Vec<Notification>, PersistenceError> {
        let conn = self.conn.lock().map_err(|_| PersistenceError::LockPoisoned)?;
        let mut stmt = conn.prepare(
            "SELECT id, recipient_id, message, kind, link, read, timestamp
             FROM notifications ORDER BY position ASC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, bool>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;

        let mut notifications = Vec::new();
        for row in rows {
            let (id, recipient_id, message, kind, link, read, timestamp) = row?;
            let kind: NotificationType = kind.parse().map_err(|e: StoreError| {
                PersistenceError::Corrupt {
                    id: id.clone(),
                    reason: e.to_string(),
                }
            })?;
            let timestamp = DateTime::parse_from_rfc3339(&timestamp)
                .map_err(|e| PersistenceError::Corrupt {
                    id: id.clone(),
                    reason: e.to_string(),
                })?
                .with_timezone(&Utc);
            notifications.push(Notification {
                id,
                message,
                read,
                timestamp,
                link,
                kind,
                recipient_id,
            });
        }
        Ok(notifications)
    }

    fn save(&self, notifications: &[Notification]) -> Result<(), PersistenceError> {
        let mut conn = self.conn.lock().map_err(|_| PersistenceError::LockPoisoned)?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM notifications", [])?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO notifications (id, position, recipient_id, message, kind, link, read, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for (position, n) in notifications.iter().enumerate() {
                insert.execute(params![
                    n.id,
                    position as i64,
                    n.recipient_id,
                    n.message,
                    n.kind.as_str(),
                    n.link,
                    n.read,
                    n.timestamp.to_rfc3339(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: &str, recipient: &str, read: bool) -> Notification {
        Notification {
            id: id.into(),
            message: format!("message {id}"),
            read,
            timestamp: Utc::now(),
            link: Some("/dashboard/doctor".into()),
            kind: NotificationType::Warning,
            recipient_id: recipient.into(),
        }
    }

    #[test]
    fn memory_clones_share_state() {
        let a = MemoryPersistence::new();
        let b = a.clone();
        a.save(&[sample("n1", "d1", false)]).unwrap();
        assert_eq!(b.load().unwrap().len(), 1);
        assert_eq!(b.save_count(), 1);
    }

    #[test]
    fn memory_simulated_failure() {
        let backend = MemoryPersistence::new();
        backend.set_fail_on_save(true);
        let err = backend.save(&[sample("n1", "d1", false)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert!(backend.load().unwrap().is_empty());
    }

    #[test]
    fn json_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonFilePersistence::new(dir.path().join("none.json"));
        assert!(backend.load().unwrap().is_empty());
    }

    #[test]
    fn json_file_keeps_order_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("notifications.json");
        let items = vec![sample("n2", "p1", false), sample("n1", "d1", true)];

        JsonFilePersistence::new(&path).save(&items).unwrap();
        let loaded = JsonFilePersistence::new(&path).load().unwrap();
        assert_eq!(loaded, items);

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"recipientId\""));
        assert!(raw.contains("\"type\": \"warning\""));
    }

    #[test]
    fn json_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notifications.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = JsonFilePersistence::new(&path).load().unwrap_err();
        assert!(matches!(err, PersistenceError::Json(_)));
    }

    #[test]
    fn sqlite_replaces_list_on_save() {
        let backend = SqlitePersistence::in_memory().unwrap();
        backend
            .save(&[sample("a", "d1", false), sample("b", "d1", false)])
            .unwrap();
        backend.save(&[sample("c", "p1", true)]).unwrap();

        let loaded = backend.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, "c");
        assert!(loaded[0].read);
        assert_eq!(loaded[0].kind, NotificationType::Warning);
    }

    #[test]
    fn sqlite_file_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notifications.db");
        let items = vec![sample("n3", "d1", false), sample("n2", "d1", false), sample("n1", "p1", true)];
        SqlitePersistence::open(&path).unwrap().save(&items).unwrap();

        let loaded = SqlitePersistence::open(&path).unwrap().load().unwrap();
        let ids: Vec<_> = loaded.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["n3", "n2", "n1"]);
        assert_eq!(loaded[0].link.as_deref(), Some("/dashboard/doctor"));
    }
}
