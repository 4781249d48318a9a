//! [`DocumentStore`] backed by the ClickHouse `documents` table.
//!
//! Reads use `FINAL` so only the newest version of each document is seen.
//! A write batch becomes one INSERT of new versions (tombstones for deletes),
//! which ClickHouse applies as a single block.
//!
//! `merge_with` is read-then-insert. ClickHouse has no row transactions, so
//! this relies on the job runner being the only writer of stats documents.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clickhouse::Row;
use document_store::{
    merge_fields, DocumentStore, Fields, Filter, MergeFn, Record, WriteOp, MAX_BATCH_OPS,
};
use serde::{Deserialize, Serialize};
use stats_core::{Error, Result, StoreErrorCode};
use tracing::debug;

use crate::client::ClickHouseClient;
use crate::schema::DOCUMENTS_TABLE;

const COLUMNS: &str = "collection, key, body, version, deleted";

/// One version of one document.
#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct DocumentRow {
    pub collection: String,
    pub key: String,
    /// Document fields as a JSON object
    pub body: String,
    pub version: u64,
    pub deleted: u8,
}

impl DocumentRow {
    fn into_record(self) -> Result<Record> {
        let fields: Fields = serde_json::from_str(&self.body)?;
        Ok(Record::new(self.key, fields))
    }
}

pub struct ClickHouseStore {
    client: ClickHouseClient,
    last_version: AtomicU64,
}

impl ClickHouseStore {
    pub fn new(client: ClickHouseClient) -> Self {
        Self {
            client,
            last_version: AtomicU64::new(0),
        }
    }

    pub fn client(&self) -> &ClickHouseClient {
        &self.client
    }

    fn table(&self) -> String {
        format!("{}.{}", self.client.config().database, DOCUMENTS_TABLE)
    }

    /// Strictly increasing version, seeded from the wall clock.
    fn next_version(&self) -> u64 {
        let now = Utc::now().timestamp_nanos_opt().unwrap_or_default().max(0) as u64;
        let mut last = self.last_version.load(Ordering::Relaxed);
        loop {
            let next = now.max(last + 1);
            match self.last_version.compare_exchange_weak(
                last,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return next,
                Err(actual) => last = actual,
            }
        }
    }

    /// Current bodies for `keys` within one collection.
    async fn fetch_current(
        &self,
        collection: &str,
        keys: Vec<String>,
    ) -> Result<HashMap<String, Fields>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM {} FINAL WHERE collection = ? AND has(?, key) AND deleted = 0",
            self.table()
        );
        let query = self.client.inner().query(&sql).bind(collection).bind(keys);
        let rows: Vec<DocumentRow> = self.client.call("Query", query.fetch_all()).await?;

        rows.into_iter()
            .map(|row| row.into_record().map(|r| (r.key, r.fields)))
            .collect()
    }

    async fn insert_rows(&self, rows: Vec<DocumentRow>) -> Result<()> {
        let table = self.table();
        let client = self.client.inner().clone();
        let count = rows.len();

        self.client
            .call("Insert", async move {
                let mut insert = client.insert::<DocumentRow>(&table)?;
                for row in &rows {
                    insert.write(row).await?;
                }
                insert.end().await
            })
            .await?;

        debug!(count, "Inserted document versions");
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for ClickHouseStore {
    async fn query(
        &self,
        collection: &str,
        filter: &Filter,
        limit: Option<usize>,
    ) -> Result<Vec<Record>> {
        let mut sql = format!(
            "SELECT {COLUMNS} FROM {} FINAL \
             WHERE collection = ? AND deleted = 0 \
             AND parseDateTime64BestEffortOrNull(JSONExtractString(body, ?), 6, 'UTC') {} \
             fromUnixTimestamp64Micro(?, 'UTC')",
            self.table(),
            filter.op.as_sql()
        );
        if limit.is_some() {
            sql.push_str(" LIMIT ?");
        }

        let mut query = self
            .client
            .inner()
            .query(&sql)
            .bind(collection)
            .bind(filter.field.as_str())
            .bind(filter.value.timestamp_micros());
        if let Some(limit) = limit {
            query = query.bind(limit as u64);
        }

        let rows: Vec<DocumentRow> = self.client.call("Query", query.fetch_all()).await?;
        rows.into_iter().map(DocumentRow::into_record).collect()
    }

    async fn get(&self, collection: &str, key: &str) -> Result<Option<Record>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM {} FINAL WHERE collection = ? AND key = ? AND deleted = 0",
            self.table()
        );
        let query = self.client.inner().query(&sql).bind(collection).bind(key);
        let row: Option<DocumentRow> = self.client.call("Query", query.fetch_optional()).await?;

        row.map(DocumentRow::into_record).transpose()
    }

    async fn batch_write(&self, ops: Vec<WriteOp>) -> Result<()> {
        if ops.len() > MAX_BATCH_OPS {
            return Err(Error::store(
                StoreErrorCode::BatchTooLarge,
                format!("batch of {} exceeds {} operations", ops.len(), MAX_BATCH_OPS),
            ));
        }
        if ops.is_empty() {
            return Ok(());
        }

        // Set-merge needs the current bodies.
        let mut merge_keys: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for op in &ops {
            if let WriteOp::SetMerge { collection, key, .. } = op {
                merge_keys.entry(collection.as_str()).or_default().push(key.clone());
            }
        }

        let mut state: BTreeMap<(String, String), Option<Fields>> = BTreeMap::new();
        for (collection, keys) in merge_keys {
            for (key, fields) in self.fetch_current(collection, keys).await? {
                state.insert((collection.to_string(), key), Some(fields));
            }
        }

        for op in ops {
            match op {
                WriteOp::SetMerge {
                    collection,
                    key,
                    fields,
                } => {
                    let doc = state.entry((collection, key)).or_insert(None);
                    let mut merged = doc.take().unwrap_or_default();
                    merge_fields(&mut merged, fields);
                    *doc = Some(merged);
                }
                WriteOp::Delete { collection, key } => {
                    state.insert((collection, key), None);
                }
            }
        }

        let version = self.next_version();
        let rows = state
            .into_iter()
            .map(|((collection, key), doc)| {
                let (body, deleted) = match doc {
                    Some(fields) => (serde_json::to_string(&fields)?, 0),
                    None => ("{}".to_string(), 1),
                };
                Ok(DocumentRow {
                    collection,
                    key,
                    body,
                    version,
                    deleted,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        self.insert_rows(rows).await
    }

    async fn merge_with(
        &self,
        collection: &str,
        key: &str,
        update: &MergeFn<'_>,
    ) -> Result<Record> {
        let current = self.get(collection, key).await?;
        let changes = update(current.as_ref());

        let mut fields = current.map(|r| r.fields).unwrap_or_default();
        merge_fields(&mut fields, changes);

        let row = DocumentRow {
            collection: collection.to_string(),
            key: key.to_string(),
            body: serde_json::to_string(&fields)?,
            version: self.next_version(),
            deleted: 0,
        };
        self.insert_rows(vec![row]).await?;

        Ok(Record::new(key, fields))
    }

    fn server_timestamp(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn ping(&self) -> Result<()> {
        self.client
            .call("Ping", self.client.inner().query("SELECT 1").fetch_one::<u8>())
            .await
            .map(|_| ())
    }
}
