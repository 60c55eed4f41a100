//!
//! xceliq document store
//! ----------------------
//! In-process document database holding the platform's collections. Each
//! collection maps a document id to a JSON object, mirroring a hosted
//! document database: documents are schemaless, writes are last-write-wins and
//! there is no transactional boundary between calls.
//!
//! The whole store is snapshotted to `<data_dir>/<project>/store.json`. The
//! project name selects which backend project a process targets.
//!
//! Key responsibilities:
//! - Point reads/writes (`get`, `set`, `merge`, `add`, `delete`).
//! - Filtered scans with equality, `array-contains` and `in` filters, ordering
//!   and offset/limit (see [`Query`]).
//! - Typed access through serde (`get_as`, `put`, `query_as`).
//! - Snapshot persistence with a dirty flag so the background loop only writes
//!   after changes.

mod query;

pub use query::{Direction, Filter, Query};

use std::collections::{BTreeMap, HashMap};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, info};

/// A stored document body. Ids live outside the body.
pub type Document = serde_json::Map<String, JsonValue>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("document {collection}/{id} not found")]
    NotFound { collection: String, id: String },
    #[error("document {collection}/{id} has an unexpected shape: {source}")]
    Decode {
        collection: String,
        id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("value cannot be stored as a document: {0}")]
    Encode(String),
    #[error("store io: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot: {0}")]
    Snapshot(String),
}

/// Collections known to the platform. Names are the on-disk/wire names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Collection {
    #[serde(rename = "users")]
    Users,
    #[serde(rename = "students")]
    Students,
    #[serde(rename = "admins")]
    Admins,
    #[serde(rename = "colleges")]
    Colleges,
    #[serde(rename = "games")]
    Games,
    #[serde(rename = "gameStats")]
    GameStats,
    #[serde(rename = "assessments")]
    Assessments,
    #[serde(rename = "assessmentAttempts")]
    AssessmentAttempts,
    /// Identity provider accounts; never exposed through the API.
    #[serde(rename = "authAccounts")]
    AuthAccounts,
}

impl Collection {
    pub const ALL: [Collection; 9] = [
        Collection::Users,
        Collection::Students,
        Collection::Admins,
        Collection::Colleges,
        Collection::Games,
        Collection::GameStats,
        Collection::Assessments,
        Collection::AssessmentAttempts,
        Collection::AuthAccounts,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Students => "students",
            Collection::Admins => "admins",
            Collection::Colleges => "colleges",
            Collection::Games => "games",
            Collection::GameStats => "gameStats",
            Collection::Assessments => "assessments",
            Collection::AssessmentAttempts => "assessmentAttempts",
            Collection::AuthAccounts => "authAccounts",
        }
    }

    pub fn from_name(name: &str) -> Option<Collection> {
        Collection::ALL.iter().copied().find(|c| c.name() == name)
    }
}

/// A typed document together with its id. Serializes flat: `{"id": ..., <fields>}`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Stored<T> {
    pub id: String,
    #[serde(flatten)]
    pub data: T,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    project: String,
    saved_ms: i64,
    collections: BTreeMap<String, BTreeMap<String, Document>>,
}

type CollectionMap = HashMap<Collection, BTreeMap<String, Document>>;

pub struct DocumentStore {
    project: String,
    snapshot_path: Option<PathBuf>,
    collections: RwLock<CollectionMap>,
    dirty: AtomicBool,
}

impl DocumentStore {
    fn new(project: &str, snapshot_path: Option<PathBuf>) -> Self {
        Self {
            project: project.to_string(),
            snapshot_path,
            collections: RwLock::new(HashMap::new()),
            dirty: AtomicBool::new(false),
        }
    }

    pub fn project(&self) -> &str { &self.project }

    pub fn snapshot_path(&self) -> Option<&Path> { self.snapshot_path.as_deref() }

    pub fn is_dirty(&self) -> bool { self.dirty.load(AtomicOrdering::Acquire) }

    fn mark_dirty(&self) { self.dirty.store(true, AtomicOrdering::Release); }

    pub fn get(&self, coll: Collection, id: &str) -> Option<Document> {
        self.collections.read().get(&coll).and_then(|docs| docs.get(id).cloned())
    }

    pub fn exists(&self, coll: Collection, id: &str) -> bool {
        self.collections.read().get(&coll).map(|docs| docs.contains_key(id)).unwrap_or(false)
    }

    /// Overwrite (or create) a document.
    pub fn set(&self, coll: Collection, id: &str, doc: Document) {
        self.collections.write().entry(coll).or_default().insert(id.to_string(), doc);
        self.mark_dirty();
        debug!(target: "xceliq::store", "set {}/{}", coll.name(), id);
    }

    /// Merge top-level fields into an existing document. Missing documents are an error,
    /// matching update semantics of the hosted database.
    pub fn merge(&self, coll: Collection, id: &str, patch: Document) -> Result<(), StoreError> {
        let mut guard = self.collections.write();
        let Some(doc) = guard.get_mut(&coll).and_then(|docs| docs.get_mut(id)) else {
            return Err(StoreError::NotFound { collection: coll.name().to_string(), id: id.to_string() });
        };
        for (k, v) in patch {
            doc.insert(k, v);
        }
        drop(guard);
        self.mark_dirty();
        debug!(target: "xceliq::store", "merge {}/{}", coll.name(), id);
        Ok(())
    }

    /// Insert a document under a freshly generated id and return the id.
    pub fn add(&self, coll: Collection, doc: Document) -> String {
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.set(coll, &id, doc);
        id
    }

    pub fn delete(&self, coll: Collection, id: &str) -> bool {
        let removed = self
            .collections
            .write()
            .get_mut(&coll)
            .map(|docs| docs.remove(id).is_some())
            .unwrap_or(false);
        if removed {
            self.mark_dirty();
            debug!(target: "xceliq::store", "delete {}/{}", coll.name(), id);
        }
        removed
    }

    /// Run a filtered scan over one collection. Results are ordered by id unless
    /// the query orders by a field.
    pub fn query(&self, coll: Collection, q: &Query) -> Vec<(String, Document)> {
        let guard = self.collections.read();
        let Some(docs) = guard.get(&coll) else { return Vec::new(); };
        let matched: Vec<(String, Document)> = docs
            .iter()
            .filter(|(_, d)| q.matches(d))
            .map(|(id, d)| (id.clone(), d.clone()))
            .collect();
        drop(guard);
        q.finish(matched)
    }

    pub fn count(&self, coll: Collection, q: &Query) -> usize {
        let guard = self.collections.read();
        guard.get(&coll).map(|docs| docs.values().filter(|d| q.matches(d)).count()).unwrap_or(0)
    }

    pub fn get_as<T: DeserializeOwned>(&self, coll: Collection, id: &str) -> Result<Option<T>, StoreError> {
        match self.get(coll, id) {
            None => Ok(None),
            Some(doc) => decode(coll, id, doc).map(Some),
        }
    }

    /// Like `get_as`, but a missing document is a `NotFound` error.
    pub fn fetch<T: DeserializeOwned>(&self, coll: Collection, id: &str) -> Result<T, StoreError> {
        self.get_as(coll, id)?
            .ok_or_else(|| StoreError::NotFound { collection: coll.name().to_string(), id: id.to_string() })
    }

    pub fn put<T: Serialize>(&self, coll: Collection, id: &str, value: &T) -> Result<(), StoreError> {
        let doc = encode(value)?;
        self.set(coll, id, doc);
        Ok(())
    }

    pub fn insert<T: Serialize>(&self, coll: Collection, value: &T) -> Result<String, StoreError> {
        let doc = encode(value)?;
        Ok(self.add(coll, doc))
    }

    pub fn query_as<T: DeserializeOwned>(&self, coll: Collection, q: &Query) -> Result<Vec<Stored<T>>, StoreError> {
        self.query(coll, q)
            .into_iter()
            .map(|(id, doc)| decode(coll, &id, doc).map(|data| Stored { id, data }))
            .collect()
    }

    /// Write the snapshot file (tmp + rename). In-memory stores are a no-op.
    pub fn persist(&self) -> Result<(), StoreError> {
        let Some(path) = self.snapshot_path.as_ref() else { return Ok(()); };
        // Clear first so writes racing the serialization re-mark the store.
        self.dirty.store(false, AtomicOrdering::Release);
        let collections = {
            let guard = self.collections.read();
            guard
                .iter()
                .map(|(c, docs)| (c.name().to_string(), docs.clone()))
                .collect::<BTreeMap<_, _>>()
        };
        let snap = Snapshot {
            version: 1,
            project: self.project.clone(),
            saved_ms: chrono::Utc::now().timestamp_millis(),
            collections,
        };
        let bytes = serde_json::to_vec_pretty(&snap).map_err(|e| StoreError::Snapshot(e.to_string()));
        let bytes = match bytes {
            Ok(b) => b,
            Err(e) => {
                self.mark_dirty();
                return Err(e);
            }
        };
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let tmp = path.with_extension("json.tmp");
        let written = std::fs::write(&tmp, bytes).and_then(|_| std::fs::rename(&tmp, path));
        if let Err(e) = written {
            self.mark_dirty();
            return Err(StoreError::Io(e));
        }
        debug!(target: "xceliq::store", "snapshot written to {}", path.display());
        Ok(())
    }

    pub fn persist_if_dirty(&self) -> Result<bool, StoreError> {
        if !self.is_dirty() {
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }

    fn load_snapshot(&self) -> Result<(), StoreError> {
        let Some(path) = self.snapshot_path.as_ref() else { return Ok(()); };
        if !path.exists() {
            return Ok(());
        }
        let bytes = std::fs::read(path)?;
        let snap: Snapshot = serde_json::from_slice(&bytes).map_err(|e| StoreError::Snapshot(e.to_string()))?;
        if snap.project != self.project {
            return Err(StoreError::Snapshot(format!(
                "snapshot at {} belongs to project '{}', not '{}'",
                path.display(),
                snap.project,
                self.project
            )));
        }
        let mut guard = self.collections.write();
        guard.clear();
        for (name, docs) in snap.collections {
            match Collection::from_name(&name) {
                Some(c) => {
                    guard.insert(c, docs);
                }
                None => tracing::warn!(target: "xceliq::store", "ignoring unknown collection '{}' in snapshot", name),
            }
        }
        let total: usize = guard.values().map(|d| d.len()).sum();
        info!(target: "xceliq::store", "loaded {} documents for project '{}'", total, self.project);
        Ok(())
    }
}

fn decode<T: DeserializeOwned>(coll: Collection, id: &str, doc: Document) -> Result<T, StoreError> {
    serde_json::from_value(JsonValue::Object(doc)).map_err(|source| StoreError::Decode {
        collection: coll.name().to_string(),
        id: id.to_string(),
        source,
    })
}

/// Serialize a value into a document body; anything but a JSON object is rejected.
pub fn encode<T: Serialize>(value: &T) -> Result<Document, StoreError> {
    match serde_json::to_value(value).map_err(|e| StoreError::Encode(e.to_string()))? {
        JsonValue::Object(map) => Ok(map),
        other => Err(StoreError::Encode(format!("expected an object, got {}", other))),
    }
}

/// Cheaply cloneable handle to the process-wide document store.
#[derive(Clone)]
pub struct SharedStore(pub Arc<DocumentStore>);

impl SharedStore {
    /// Open (or create) the store for `project` under `data_dir`, loading an existing snapshot.
    pub fn open<P: AsRef<Path>>(data_dir: P, project: &str) -> Result<Self, StoreError> {
        let dir = data_dir.as_ref().join(project);
        std::fs::create_dir_all(&dir)?;
        let store = DocumentStore::new(project, Some(dir.join("store.json")));
        store.load_snapshot()?;
        Ok(SharedStore(Arc::new(store)))
    }

    /// Store without a snapshot file; used by tests and tooling.
    pub fn in_memory(project: &str) -> Self {
        SharedStore(Arc::new(DocumentStore::new(project, None)))
    }
}

impl Deref for SharedStore {
    type Target = DocumentStore;
    fn deref(&self) -> &DocumentStore { &self.0 }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
