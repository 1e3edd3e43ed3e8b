//! In-process document store addressed by `collection/id` paths.
//!
//! Writes are shallow merges. Every read-modify-write runs under a single
//! write lock and never awaits while holding it, so each operation is atomic
//! with respect to the others. Observers run after the lock is released
//! and before the write returns.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{RwLock, Weak};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use super::{simulate_latency, StoreError};

/// A stored record: a flat JSON object.
pub type Document = Map<String, Value>;

pub const USERS: &str = "users";
pub const APPOINTMENTS: &str = "appointments";
pub const MEDICAL_RECORDS: &str = "medicalRecords";

// ═══════════════════════════════════════════════════════════
// DocPath
// ═══════════════════════════════════════════════════════════

/// Validated `collection/id` address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocPath {
    collection: String,
    id: String,
}

impl DocPath {
    pub fn new(collection: &str, id: &str) -> Result<Self, StoreError> {
        let valid = |segment: &str| !segment.trim().is_empty() && !segment.contains('/');
        if !valid(collection) || !valid(id) {
            return Err(StoreError::InvalidPath(format!("{collection}/{id}")));
        }
        Ok(Self {
            collection: collection.to_string(),
            id: id.to_string(),
        })
    }

    /// Parse `"<collection>/<id>"`. Anything else is an invalid path.
    pub fn parse(path: &str) -> Result<Self, StoreError> {
        let mut segments = path.split('/');
        match (segments.next(), segments.next(), segments.next()) {
            (Some(collection), Some(id), None) => Self::new(collection, id)
                .map_err(|_| StoreError::InvalidPath(path.to_string())),
            _ => Err(StoreError::InvalidPath(path.to_string())),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl FromStr for DocPath {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

// ═══════════════════════════════════════════════════════════
// DocResult
// ═══════════════════════════════════════════════════════════

/// Outcome of a read. Absence is a normal result, not an error.
#[derive(Debug, Clone, PartialEq)]
pub struct DocResult {
    id: String,
    data: Option<Document>,
}

impl DocResult {
    fn found(id: &str, data: Document) -> Self {
        Self {
            id: id.to_string(),
            data: Some(data),
        }
    }

    fn missing(id: &str) -> Self {
        Self {
            id: id.to_string(),
            data: None,
        }
    }

    pub fn exists(&self) -> bool {
        self.data.is_some()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn data(&self) -> Option<&Document> {
        self.data.as_ref()
    }

    pub fn into_data(self) -> Option<Document> {
        self.data
    }

    /// Deserialize the stored fields into `T`.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<Option<T>, StoreError> {
        self.data
            .as_ref()
            .map(|doc| serde_json::from_value(Value::Object(doc.clone())))
            .transpose()
            .map_err(StoreError::from)
    }
}

/// Serialize `value` into a document (must serialize as a JSON object).
pub fn to_document<T: Serialize>(value: &T) -> Result<Document, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        _ => Err(StoreError::NotAnObject),
    }
}

/// Hook invoked with the merged document after every successful write.
pub trait DocumentObserver: Send + Sync {
    fn document_written(&self, path: &DocPath, data: &Document);
}

// ═══════════════════════════════════════════════════════════
// DocumentStore
// ═══════════════════════════════════════════════════════════

pub struct DocumentStore {
    collections: RwLock<BTreeMap<String, BTreeMap<String, Document>>>,
    observers: RwLock<Vec<Weak<dyn DocumentObserver>>>,
    latency: Duration,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::with_latency(Duration::ZERO)
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            collections: RwLock::new(BTreeMap::new()),
            observers: RwLock::new(Vec::new()),
            latency,
        }
    }

    /// Register a write observer. Held weakly; dead observers are pruned.
    pub fn register_observer(&self, observer: Weak<dyn DocumentObserver>) {
        match self.observers.write() {
            Ok(mut observers) => observers.push(observer),
            Err(_) => tracing::error!("Observer list lock poisoned, observer not registered"),
        }
    }

    // ── Path-string contract ────────────────────────────────

    /// Read by raw path. A malformed path is logged and reads as absent.
    pub async fn get_doc(&self, path: &str) -> Result<DocResult, StoreError> {
        match DocPath::parse(path) {
            Ok(parsed) => self.get(&parsed).await,
            Err(_) => {
                tracing::warn!(path, "get_doc on malformed path, treating as not found");
                Ok(DocResult::missing(""))
            }
        }
    }

    /// Merge-write by raw path. A malformed path is logged and ignored.
    pub async fn set_doc(&self, path: &str, data: Document) -> Result<(), StoreError> {
        match DocPath::parse(path) {
            Ok(parsed) => self.set(&parsed, data).await.map(|_| ()),
            Err(_) => {
                tracing::warn!(path, "set_doc on malformed path ignored");
                Ok(())
            }
        }
    }

    // ── Typed contract ──────────────────────────────────────

    pub async fn get(&self, path: &DocPath) -> Result<DocResult, StoreError> {
        simulate_latency(self.latency).await;
        let collections = self.collections.read().map_err(|_| StoreError::LockPoisoned)?;
        let result = collections
            .get(path.collection())
            .and_then(|docs| docs.get(path.id()))
            .map(|doc| DocResult::found(path.id(), doc.clone()))
            .unwrap_or_else(|| DocResult::missing(path.id()));
        tracing::debug!(path = %path, exists = result.exists(), "get");
        Ok(result)
    }

    /// Shallow-merge `data` onto the document at `path` and return the
    /// merged result. The `id` field always equals the path id.
    pub async fn set(&self, path: &DocPath, data: Document) -> Result<Document, StoreError> {
        simulate_latency(self.latency).await;
        let merged = {
            let mut collections = self.collections.write().map_err(|_| StoreError::LockPoisoned)?;
            merge_into(&mut collections, path, data)
        };
        tracing::debug!(path = %path, "set");
        self.notify_observers(path, &merged);
        Ok(merged)
    }

    /// Read-modify-write under one lock. `f` sees the current document and
    /// returns the patch to merge, or `None` to leave the store untouched.
    pub async fn modify<F, E>(&self, path: &DocPath, f: F) -> Result<Option<Document>, E>
    where
        F: FnOnce(Option<&Document>) -> Result<Option<Document>, E>,
        E: From<StoreError>,
    {
        simulate_latency(self.latency).await;
        let merged = {
            let mut collections = self.collections.write().map_err(|_| StoreError::LockPoisoned)?;
            let current = collections
                .get(path.collection())
                .and_then(|docs| docs.get(path.id()));
            let Some(patch) = f(current)? else {
                return Ok(None);
            };
            merge_into(&mut collections, path, patch)
        };
        tracing::debug!(path = %path, "modify");
        self.notify_observers(path, &merged);
        Ok(Some(merged))
    }

    /// Hard delete. Returns whether a document was removed.
    pub async fn delete(&self, path: &DocPath) -> Result<bool, StoreError> {
        Ok(self.remove(path).await?.is_some())
    }

    /// Hard delete that hands back the removed document.
    pub async fn remove(&self, path: &DocPath) -> Result<Option<Document>, StoreError> {
        simulate_latency(self.latency).await;
        let mut collections = self.collections.write().map_err(|_| StoreError::LockPoisoned)?;
        let removed = collections
            .get_mut(path.collection())
            .and_then(|docs| docs.remove(path.id()));
        tracing::debug!(path = %path, removed = removed.is_some(), "delete");
        Ok(removed)
    }

    /// Every document in `collection`, ordered by id.
    pub async fn list(&self, collection: &str) -> Result<Vec<(String, Document)>, StoreError> {
        simulate_latency(self.latency).await;
        let collections = self.collections.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, doc)| (id.clone(), doc.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Number of documents in `collection`.
    pub fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .map(|c| c.get(collection).map_or(0, BTreeMap::len))
            .unwrap_or(0)
    }

    fn notify_observers(&self, path: &DocPath, merged: &Document) {
        let live: Vec<_> = match self.observers.write() {
            Ok(mut observers) => {
                observers.retain(|o| o.strong_count() > 0);
                observers.iter().filter_map(Weak::upgrade).collect()
            }
            Err(_) => {
                tracing::error!("Observer list lock poisoned, observers skipped");
                return;
            }
        };
        for observer in live {
            observer.document_written(path, merged);
        }
    }
}

fn merge_into(
    collections: &mut BTreeMap<String, BTreeMap<String, Document>>,
    path: &DocPath,
    data: Document,
) -> Document {
    let doc = collections
        .entry(path.collection().to_string())
        .or_default()
        .entry(path.id().to_string())
        .or_default();
    for (key, value) in data {
        doc.insert(key, value);
    }
    doc.insert("id".to_string(), Value::String(path.id().to_string()));
    doc.clone()
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn parse_accepts_collection_and_id() {
        let path = DocPath::parse("users/abc").unwrap();
        assert_eq!(path.collection(), "users");
        assert_eq!(path.id(), "abc");
        assert_eq!(path.to_string(), "users/abc");
    }

    #[test]
    fn parse_rejects_malformed_paths() {
        for bad in ["users", "users/", "/abc", "", "a/b/c", "users/  "] {
            let err = DocPath::parse(bad).unwrap_err();
            assert!(matches!(err, StoreError::InvalidPath(_)), "{bad:?} should be invalid");
        }
    }

    #[tokio::test]
    async fn get_missing_returns_not_exists() {
        let store = DocumentStore::new();
        let result = store.get_doc("users/nobody").await.unwrap();
        assert!(!result.exists());
        assert_eq!(result.id(), "nobody");
        assert!(result.data().is_none());
    }

    #[tokio::test]
    async fn set_merges_fields() {
        let store = DocumentStore::new();
        store.set_doc("things/p", doc(json!({"a": 1}))).await.unwrap();
        store.set_doc("things/p", doc(json!({"b": 2}))).await.unwrap();

        let data = store.get_doc("things/p").await.unwrap().into_data().unwrap();
        assert_eq!(Value::Object(data), json!({"a": 1, "b": 2, "id": "p"}));
    }

    #[tokio::test]
    async fn set_overwrites_only_given_fields() {
        let store = DocumentStore::new();
        store.set_doc("things/p", doc(json!({"a": 1, "b": 1}))).await.unwrap();
        store.set_doc("things/p", doc(json!({"b": 9}))).await.unwrap();

        let data = store.get_doc("things/p").await.unwrap().into_data().unwrap();
        assert_eq!(data["a"], json!(1));
        assert_eq!(data["b"], json!(9));
    }

    #[tokio::test]
    async fn id_field_tracks_path() {
        let store = DocumentStore::new();
        let path = DocPath::new("users", "u1").unwrap();
        let merged = store.set(&path, doc(json!({"id": "spoofed"}))).await.unwrap();
        assert_eq!(merged["id"], json!("u1"));
    }

    #[tokio::test]
    async fn malformed_set_is_noop() {
        let store = DocumentStore::new();
        store.set_doc("users", doc(json!({"a": 1}))).await.unwrap();
        assert_eq!(store.count("users"), 0);

        let result = store.get_doc("users").await.unwrap();
        assert!(!result.exists());
    }

    #[tokio::test]
    async fn delete_removes_document() {
        let store = DocumentStore::new();
        let path = DocPath::new("appointments", "a1").unwrap();
        store.set(&path, doc(json!({"x": 1}))).await.unwrap();

        assert!(store.delete(&path).await.unwrap());
        assert!(!store.get(&path).await.unwrap().exists());
        assert!(!store.delete(&path).await.unwrap());
    }

    #[tokio::test]
    async fn modify_sees_current_and_merges_patch() {
        let store = DocumentStore::new();
        let path = DocPath::new("counters", "c").unwrap();
        store.set(&path, doc(json!({"n": 1, "label": "x"}))).await.unwrap();

        let merged = store
            .modify(&path, |current| {
                let n = current.and_then(|d| d["n"].as_i64()).unwrap_or(0);
                Ok::<_, StoreError>(Some(doc(json!({"n": n + 1}))))
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(merged["n"], json!(2));
        assert_eq!(merged["label"], json!("x"));
    }

    #[tokio::test]
    async fn modify_returning_none_leaves_store_untouched() {
        let store = DocumentStore::new();
        let path = DocPath::new("counters", "missing").unwrap();
        let result = store
            .modify(&path, |current| {
                assert!(current.is_none());
                Ok::<_, StoreError>(None)
            })
            .await
            .unwrap();
        assert!(result.is_none());
        assert_eq!(store.count("counters"), 0);
    }

    #[tokio::test]
    async fn modify_propagates_closure_error() {
        let store = DocumentStore::new();
        let path = DocPath::new("counters", "c").unwrap();
        let err = store
            .modify(&path, |_| Err::<Option<Document>, _>(StoreError::NotAnObject))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotAnObject));
    }

    #[tokio::test]
    async fn remove_returns_deleted_document() {
        let store = DocumentStore::new();
        let path = DocPath::new("appointments", "a1").unwrap();
        store.set(&path, doc(json!({"x": 1}))).await.unwrap();

        let removed = store.remove(&path).await.unwrap().unwrap();
        assert_eq!(removed["x"], json!(1));
        assert!(store.remove(&path).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_is_ordered_and_scoped() {
        let store = DocumentStore::new();
        store.set_doc("users/b", doc(json!({}))).await.unwrap();
        store.set_doc("users/a", doc(json!({}))).await.unwrap();
        store.set_doc("other/z", doc(json!({}))).await.unwrap();

        let ids: Vec<String> = store.list("users").await.unwrap().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(store.list("empty").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn parse_into_typed_value() {
        #[derive(serde::Deserialize)]
        struct Thing {
            a: i64,
        }
        let store = DocumentStore::new();
        store.set_doc("things/t", doc(json!({"a": 5}))).await.unwrap();
        let thing: Thing = store.get_doc("things/t").await.unwrap().parse().unwrap().unwrap();
        assert_eq!(thing.a, 5);
    }

    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    impl DocumentObserver for Recorder {
        fn document_written(&self, path: &DocPath, _data: &Document) {
            self.seen.lock().unwrap().push(path.to_string());
        }
    }

    #[tokio::test]
    async fn observers_see_writes_before_set_returns() {
        let store = DocumentStore::new();
        let recorder = Arc::new(Recorder { seen: Mutex::new(Vec::new()) });
        let weak: Weak<dyn DocumentObserver> = Arc::downgrade(&recorder) as Weak<dyn DocumentObserver>;
        store.register_observer(weak);

        store.set_doc("users/u1", doc(json!({"a": 1}))).await.unwrap();
        assert_eq!(*recorder.seen.lock().unwrap(), vec!["users/u1".to_string()]);
    }

    #[tokio::test]
    async fn dropped_observer_is_pruned() {
        let store = DocumentStore::new();
        let recorder = Arc::new(Recorder { seen: Mutex::new(Vec::new()) });
        let weak: Weak<dyn DocumentObserver> = Arc::downgrade(&recorder) as Weak<dyn DocumentObserver>;
        store.register_observer(weak);
        drop(recorder);

        store.set_doc("users/u1", doc(json!({}))).await.unwrap();
        assert!(store.observers.read().unwrap().is_empty());
    }

    #[test]
    fn to_document_rejects_non_objects() {
        assert!(matches!(to_document(&5), Err(StoreError::NotAnObject)));
        assert!(to_document(&json!({"a": 1})).is_ok());
    }
}
