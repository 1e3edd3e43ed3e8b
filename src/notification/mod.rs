//! Per-recipient alert list, persisted independently of the document store.
//!
//! The list is kept newest first and capped globally: once it holds
//! `capacity` entries, each `add` drops the oldest entry whichever
//! recipient it belonged to. Every mutation is saved through the
//! persistence port before it becomes visible; a failed save leaves the
//! in-memory list as it was.

pub mod badge;
pub mod persistence;

pub use badge::UnreadBadge;
pub use persistence::{
    JsonFilePersistence, MemoryPersistence, NotificationPersistence, PersistenceError,
    SqlitePersistence,
};

use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::runtime::{Handle, RuntimeFlavor};
use uuid::Uuid;

use crate::db::simulate_latency;
use crate::error::ErrorKind;
use crate::events::{Subscribers, Subscription};
use crate::models::{NewNotification, Notification};

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Internal lock error")]
    LockPoisoned,
}

impl NotificationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingField(_) => ErrorKind::MissingField,
            Self::Persistence(e) => e.kind(),
            Self::LockPoisoned => ErrorKind::Internal,
        }
    }
}

pub struct NotificationStore {
    items: RwLock<Vec<Notification>>,
    persistence: Arc<dyn NotificationPersistence>,
    capacity: usize,
    subscribers: Arc<Subscribers<[Notification]>>,
    latency: Duration,
}

impl NotificationStore {
    /// Load the persisted list. An unreadable list is logged and replaced
    /// by an empty one; the next successful save overwrites it.
    pub fn new(persistence: Arc<dyn NotificationPersistence>, capacity: usize) -> Self {
        Self::with_latency(persistence, capacity, Duration::ZERO)
    }

    pub fn with_latency(
        persistence: Arc<dyn NotificationPersistence>,
        capacity: usize,
        latency: Duration,
    ) -> Self {
        let capacity = capacity.max(1);
        let mut items = match persistence.load() {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load notifications, starting empty");
                Vec::new()
            }
        };
        items.truncate(capacity);
        tracing::debug!(count = items.len(), capacity, "Notification store loaded");

        Self {
            items: RwLock::new(items),
            persistence,
            capacity,
            subscribers: Subscribers::new(),
            latency,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // ── Mutations ───────────────────────────────────────────

    /// Prepend a new unread notification, dropping the globally oldest
    /// entries beyond the cap.
    pub async fn add(&self, new: NewNotification) -> Result<Notification, NotificationError> {
        simulate_latency(self.latency).await;

        if new.recipient_id.trim().is_empty() {
            return Err(NotificationError::MissingField("recipientId"));
        }
        if new.message.trim().is_empty() {
            return Err(NotificationError::MissingField("message"));
        }

        let notification = Notification {
            id: Uuid::new_v4().to_string(),
            message: new.message,
            read: false,
            timestamp: Utc::now(),
            link: new.link.filter(|l| !l.trim().is_empty()),
            kind: new.kind,
            recipient_id: new.recipient_id,
        };

        let capacity = self.capacity;
        let created = notification.clone();
        self.commit(move |items| {
            items.insert(0, notification);
            items.truncate(capacity);
            true
        })?;

        tracing::debug!(recipient = %created.recipient_id, kind = %created.kind, "Notification added");
        Ok(created)
    }

    /// Returns whether a notification changed. Unknown ids are ignored.
    pub async fn mark_read(&self, id: &str) -> Result<bool, NotificationError> {
        simulate_latency(self.latency).await;
        self.commit(|items| match items.iter_mut().find(|n| n.id == id) {
            Some(n) if !n.read => {
                n.read = true;
                true
            }
            _ => false,
        })
    }

    /// Mark every notification of `recipient_id` read. Returns how many changed.
    pub async fn mark_all_read(&self, recipient_id: &str) -> Result<usize, NotificationError> {
        simulate_latency(self.latency).await;
        let mut changed = 0;
        self.commit(|items| {
            for n in items.iter_mut().filter(|n| n.recipient_id == recipient_id && !n.read) {
                n.read = true;
                changed += 1;
            }
            changed > 0
        })?;
        Ok(changed)
    }

    /// Remove every notification of `recipient_id`. Returns how many were removed.
    pub async fn clear(&self, recipient_id: &str) -> Result<usize, NotificationError> {
        simulate_latency(self.latency).await;
        let mut removed = 0;
        self.commit(|items| {
            let before = items.len();
            items.retain(|n| n.recipient_id != recipient_id);
            removed = before - items.len();
            removed > 0
        })?;
        Ok(removed)
    }

    // ── Reads ───────────────────────────────────────────────

    /// Notifications for `recipient_id`, newest first.
    pub async fn list_for(&self, recipient_id: &str) -> Result<Vec<Notification>, NotificationError> {
        simulate_latency(self.latency).await;
        let items = self.items.read().map_err(|_| NotificationError::LockPoisoned)?;
        Ok(items
            .iter()
            .filter(|n| n.recipient_id == recipient_id)
            .cloned()
            .collect())
    }

    pub fn unread_count(&self, recipient_id: &str) -> usize {
        self.items
            .read()
            .map(|items| {
                items
                    .iter()
                    .filter(|n| n.recipient_id == recipient_id && !n.read)
                    .count()
            })
            .unwrap_or(0)
    }

    /// Whole list across recipients, newest first.
    pub fn snapshot(&self) -> Vec<Notification> {
        self.items.read().map(|items| items.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.items.read().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `callback` receives the full list after every committed mutation.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&[Notification]) + Send + Sync + 'static,
    {
        self.subscribers.subscribe(callback)
    }

    /// Apply `mutate` to a copy of the list. When it reports a change, the
    /// copy is saved and only then swapped in.
    ///
    /// The delivery guard is held throughout, so commits and their
    /// snapshots are strictly ordered and readers are never blocked on the
    /// save.
    fn commit<F>(&self, mutate: F) -> Result<bool, NotificationError>
    where
        F: FnOnce(&mut Vec<Notification>) -> bool,
    {
        let _delivery = self.subscribers.delivery();
        let mut next = self
            .items
            .read()
            .map_err(|_| NotificationError::LockPoisoned)?
            .clone();
        if !mutate(&mut next) {
            return Ok(false);
        }
        if let Err(e) = blocking_io(|| self.persistence.save(&next)) {
            tracing::warn!(error = %e, "Failed to persist notifications, change discarded");
            return Err(e.into());
        }

        let snapshot = {
            let mut items = self.items.write().map_err(|_| NotificationError::LockPoisoned)?;
            *items = next;
            items.clone()
        };
        self.subscribers.emit(&snapshot[..]);
        Ok(true)
    }
}

/// Run persistence I/O on the current thread, first handing the worker's
/// other tasks off when on a multi-threaded runtime.
fn blocking_io<R>(io: impl FnOnce() -> R) -> R {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(io)
        }
        _ => io(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NotificationType;
    use std::sync::Mutex;

    fn store_with(backend: &MemoryPersistence, capacity: usize) -> NotificationStore {
        NotificationStore::new(Arc::new(backend.clone()), capacity)
    }

    fn note(recipient: &str, message: &str) -> NewNotification {
        NewNotification::new(recipient, message, NotificationType::Info)
    }

    #[tokio::test]
    async fn add_prepends_unread() {
        let store = store_with(&MemoryPersistence::new(), 50);
        store.add(note("d1", "first")).await.unwrap();
        let second = store.add(note("d1", "second")).await.unwrap();

        assert!(!second.read);
        let listed = store.list_for("d1").await.unwrap();
        assert_eq!(listed[0].message, "second");
        assert_eq!(listed[1].message, "first");
    }

    #[tokio::test]
    async fn cap_is_global_and_keeps_most_recent() {
        let store = store_with(&MemoryPersistence::new(), 50);
        for i in 0..60 {
            let recipient = if i % 2 == 0 { "d1" } else { "p1" };
            store.add(note(recipient, &format!("n{i}"))).await.unwrap();
        }

        let all = store.snapshot();
        assert_eq!(all.len(), 50);
        let expected: Vec<String> = (10..60).rev().map(|i| format!("n{i}")).collect();
        let actual: Vec<String> = all.into_iter().map(|n| n.message).collect();
        assert_eq!(actual, expected);
    }

    #[tokio::test]
    async fn cap_can_evict_another_recipients_entries() {
        let store = store_with(&MemoryPersistence::new(), 3);
        store.add(note("p1", "old")).await.unwrap();
        for i in 0..3 {
            store.add(note("d1", &format!("new{i}"))).await.unwrap();
        }
        assert!(store.list_for("p1").await.unwrap().is_empty());
        assert_eq!(store.list_for("d1").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn add_requires_recipient_and_message() {
        let store = store_with(&MemoryPersistence::new(), 50);
        let err = store.add(note(" ", "x")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingField);
        let err = store.add(note("d1", "")).await.unwrap_err();
        assert!(matches!(err, NotificationError::MissingField("message")));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn mark_read_and_unread_count() {
        let store = store_with(&MemoryPersistence::new(), 50);
        let a = store.add(note("d1", "a")).await.unwrap();
        store.add(note("d1", "b")).await.unwrap();
        store.add(note("p1", "c")).await.unwrap();
        assert_eq!(store.unread_count("d1"), 2);

        assert!(store.mark_read(&a.id).await.unwrap());
        assert!(!store.mark_read(&a.id).await.unwrap());
        assert!(!store.mark_read("unknown").await.unwrap());
        assert_eq!(store.unread_count("d1"), 1);
        assert_eq!(store.unread_count("p1"), 1);
    }

    #[tokio::test]
    async fn mark_all_read_is_scoped_to_recipient() {
        let store = store_with(&MemoryPersistence::new(), 50);
        store.add(note("d1", "a")).await.unwrap();
        store.add(note("d1", "b")).await.unwrap();
        store.add(note("p1", "c")).await.unwrap();

        assert_eq!(store.mark_all_read("d1").await.unwrap(), 2);
        assert_eq!(store.mark_all_read("d1").await.unwrap(), 0);
        assert_eq!(store.unread_count("d1"), 0);
        assert_eq!(store.unread_count("p1"), 1);
    }

    #[tokio::test]
    async fn clear_removes_only_recipient_entries() {
        let store = store_with(&MemoryPersistence::new(), 50);
        store.add(note("d1", "a")).await.unwrap();
        store.add(note("p1", "b")).await.unwrap();

        assert_eq!(store.clear("d1").await.unwrap(), 1);
        assert!(store.list_for("d1").await.unwrap().is_empty());
        assert_eq!(store.list_for("p1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn survives_reload() {
        let backend = MemoryPersistence::new();
        {
            let store = store_with(&backend, 50);
            store.add(note("d1", "persisted")).await.unwrap();
        }
        let reloaded = store_with(&backend, 50);
        let listed = reloaded.list_for("d1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].message, "persisted");
    }

    #[tokio::test]
    async fn survives_reload_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notifications.json");
        {
            let store = NotificationStore::new(Arc::new(JsonFilePersistence::new(&path)), 50);
            let n = store.add(note("p1", "a")).await.unwrap();
            store.mark_read(&n.id).await.unwrap();
        }
        let store = NotificationStore::new(Arc::new(JsonFilePersistence::new(&path)), 50);
        let listed = store.list_for("p1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].read);
    }

    #[tokio::test]
    async fn failed_save_discards_change() {
        let backend = MemoryPersistence::new();
        let store = store_with(&backend, 50);
        let kept = store.add(note("d1", "kept")).await.unwrap();

        backend.set_fail_on_save(true);
        let err = store.add(note("d1", "lost")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert!(store.mark_read(&kept.id).await.is_err());

        let listed = store.list_for("d1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(!listed[0].read);
    }

    #[tokio::test]
    async fn no_op_mutations_skip_save() {
        let backend = MemoryPersistence::new();
        let store = store_with(&backend, 50);
        store.mark_all_read("nobody").await.unwrap();
        store.clear("nobody").await.unwrap();
        assert_eq!(backend.save_count(), 0);
    }

    #[tokio::test]
    async fn loaded_list_is_truncated_to_capacity() {
        let backend = MemoryPersistence::new();
        {
            let store = store_with(&backend, 10);
            for i in 0..10 {
                store.add(note("d1", &format!("n{i}"))).await.unwrap();
            }
        }
        let smaller = store_with(&backend, 4);
        let messages: Vec<String> = smaller.snapshot().into_iter().map(|n| n.message).collect();
        assert_eq!(messages, vec!["n9", "n8", "n7", "n6"]);
    }

    #[tokio::test]
    async fn subscribers_receive_snapshot_after_commit() {
        let store = store_with(&MemoryPersistence::new(), 50);
        let sizes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&sizes);
        let _sub = store.subscribe(move |items| sink.lock().unwrap().push(items.len()));

        store.add(note("d1", "a")).await.unwrap();
        store.add(note("d1", "b")).await.unwrap();
        store.clear("ghost").await.unwrap();
        store.clear("d1").await.unwrap();

        assert_eq!(*sizes.lock().unwrap(), vec![1, 2, 0]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_adds_deliver_snapshots_in_commit_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notifications.json");
        let store = Arc::new(NotificationStore::new(
            Arc::new(JsonFilePersistence::new(&path)),
            50,
        ));
        let sizes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&sizes);
        let _sub = store.subscribe(move |items| sink.lock().unwrap().push(items.len()));

        let mut tasks = Vec::new();
        for i in 0..24 {
            let store = Arc::clone(&store);
            let recipient = if i % 2 == 0 { "d1" } else { "p1" };
            tasks.push(tokio::spawn(async move {
                store.add(note(recipient, &format!("n{i}"))).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(*sizes.lock().unwrap(), (1..=24).collect::<Vec<usize>>());

        let reloaded = NotificationStore::new(Arc::new(JsonFilePersistence::new(&path)), 50);
        assert_eq!(reloaded.snapshot(), store.snapshot());
    }
}
