//! In-memory document store.
//!
//! Used for local runs (`store.backend = "memory"`) and as the base of test
//! doubles. Every operation runs under one lock, so batches and
//! read-modify-writes are atomic.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use stats_core::{Error, Result, StoreErrorCode};
use tracing::debug;

use crate::document::{merge_fields, Fields, Filter, Record, WriteOp};
use crate::traits::{DocumentStore, MergeFn, MAX_BATCH_OPS};

type Collection = BTreeMap<String, Fields>;

/// In-memory [`DocumentStore`].
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, Collection>>,
    /// Fixed clock; `None` means wall clock.
    clock: RwLock<Option<DateTime<Utc>>>,
    next_key: AtomicU64,
    query_calls: AtomicU64,
    batch_write_calls: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store whose `server_timestamp` is pinned to `now`.
    pub fn with_clock(now: DateTime<Utc>) -> Self {
        let store = Self::default();
        store.set_clock(now);
        store
    }

    pub fn set_clock(&self, now: DateTime<Utc>) {
        *self.clock.write() = Some(now);
    }

    /// Inserts a document under a generated key and returns the key.
    pub fn insert(&self, collection: &str, fields: Fields) -> String {
        let key = format!("doc-{:08}", self.next_key.fetch_add(1, Ordering::Relaxed));
        self.insert_with_key(collection, &key, fields);
        key
    }

    /// Inserts or replaces a document.
    pub fn insert_with_key(&self, collection: &str, key: &str, fields: Fields) {
        self.collections
            .lock()
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), fields);
    }

    pub fn document(&self, collection: &str, key: &str) -> Option<Fields> {
        self.collections
            .lock()
            .get(collection)
            .and_then(|docs| docs.get(key).cloned())
    }

    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .lock()
            .get(collection)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    /// Number of `query` calls served.
    pub fn query_calls(&self) -> u64 {
        self.query_calls.load(Ordering::Relaxed)
    }

    /// Number of successful `batch_write` calls.
    pub fn batch_write_calls(&self) -> u64 {
        self.batch_write_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn query(
        &self,
        collection: &str,
        filter: &Filter,
        limit: Option<usize>,
    ) -> Result<Vec<Record>> {
        self.query_calls.fetch_add(1, Ordering::Relaxed);

        let collections = self.collections.lock();
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let matching = docs
            .iter()
            .filter(|(_, fields)| filter.matches(fields))
            .map(|(key, fields)| Record::new(key.clone(), fields.clone()));

        let records: Vec<Record> = match limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        };

        debug!(collection, count = records.len(), "Memory store query");
        Ok(records)
    }

    async fn get(&self, collection: &str, key: &str) -> Result<Option<Record>> {
        Ok(self
            .document(collection, key)
            .map(|fields| Record::new(key, fields)))
    }

    async fn batch_write(&self, ops: Vec<WriteOp>) -> Result<()> {
        if ops.len() > MAX_BATCH_OPS {
            return Err(Error::store(
                StoreErrorCode::BatchTooLarge,
                format!("batch of {} exceeds {} operations", ops.len(), MAX_BATCH_OPS),
            ));
        }

        let mut collections = self.collections.lock();
        for op in ops {
            match op {
                WriteOp::SetMerge {
                    collection,
                    key,
                    fields,
                } => {
                    let doc = collections.entry(collection).or_default().entry(key).or_default();
                    merge_fields(doc, fields);
                }
                WriteOp::Delete { collection, key } => {
                    if let Some(docs) = collections.get_mut(&collection) {
                        docs.remove(&key);
                    }
                }
            }
        }

        self.batch_write_calls.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn merge_with(
        &self,
        collection: &str,
        key: &str,
        update: &MergeFn<'_>,
    ) -> Result<Record> {
        let mut collections = self.collections.lock();
        let docs = collections.entry(collection.to_string()).or_default();

        let current = docs.get(key).map(|fields| Record::new(key, fields.clone()));
        let changes = update(current.as_ref());

        let doc = docs.entry(key.to_string()).or_default();
        merge_fields(doc, changes);

        Ok(Record::new(key, doc.clone()))
    }

    fn server_timestamp(&self) -> DateTime<Utc> {
        (*self.clock.read()).unwrap_or_else(Utc::now)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
