//! Knowledge snapshots and the service that owns the current one.

use crate::loader::{LoadReport, load_dir};
use crate::record::KnowledgeRecord;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// An immutable, ordered set of records keyed by topic.
///
/// Iteration follows load order. When a topic is inserted twice the later
/// record replaces the earlier one but keeps its position.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeStore {
    records: Vec<KnowledgeRecord>,
    index: HashMap<String, usize>,
}

impl KnowledgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = KnowledgeRecord>) -> Self {
        let mut store = Self::new();
        for record in records {
            store.insert(record);
        }
        store
    }

    /// Insert a record. Returns `true` when it replaced an existing topic.
    pub fn insert(&mut self, record: KnowledgeRecord) -> bool {
        match self.index.get(record.topic()) {
            Some(&pos) => {
                self.records[pos] = record;
                true
            }
            None => {
                self.index.insert(record.topic().to_string(), self.records.len());
                self.records.push(record);
                false
            }
        }
    }

    pub fn get(&self, topic: &str) -> Option<&KnowledgeRecord> {
        self.index.get(topic).map(|&pos| &self.records[pos])
    }

    pub fn iter(&self) -> impl Iterator<Item = &KnowledgeRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(KnowledgeRecord::topic)
    }
}

/// Shared handle to the live knowledge store.
///
/// Readers take a cheap [`snapshot`](Self::snapshot) and keep using it for the
/// whole turn; [`reload`](Self::reload) builds a fresh store off the async
/// runtime and swaps it in atomically.
pub struct KnowledgeBase {
    dir: PathBuf,
    current: RwLock<Arc<KnowledgeStore>>,
}

impl KnowledgeBase {
    /// Load every knowledge file under `dir`.
    ///
    /// Never fails: a missing or unreadable directory yields an empty store.
    pub fn load(dir: impl Into<PathBuf>) -> (Self, LoadReport) {
        let dir = dir.into();
        let (store, report) = load_dir(&dir);
        info!(
            dir = %dir.display(),
            records = report.records,
            files = report.files_loaded,
            skipped_files = report.files_skipped,
            skipped_records = report.records_skipped,
            "Knowledge base loaded"
        );
        let base = Self {
            dir,
            current: RwLock::new(Arc::new(store)),
        };
        (base, report)
    }

    /// Wrap an already-built store. [`reload`](Self::reload) reads from `dir`.
    pub fn from_store(dir: impl Into<PathBuf>, store: KnowledgeStore) -> Self {
        Self {
            dir: dir.into(),
            current: RwLock::new(Arc::new(store)),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The store as of now. Later reloads do not affect the returned value.
    pub fn snapshot(&self) -> Arc<KnowledgeStore> {
        self.current.read().clone()
    }

    /// Re-read the directory and replace the live store.
    pub async fn reload(&self) -> LoadReport {
        let dir = self.dir.clone();
        let loaded = tokio::task::spawn_blocking(move || load_dir(&dir)).await;

        match loaded {
            Ok((store, report)) => {
                *self.current.write() = Arc::new(store);
                info!(dir = %self.dir.display(), records = report.records, "Knowledge base reloaded");
                report
            }
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "Knowledge reload task failed, keeping previous store");
                LoadReport::default()
            }
        }
    }
}
