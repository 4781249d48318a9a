//! The store contract consumed by the pipeline.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use stats_core::Result;

use crate::document::{Fields, Filter, Record, WriteOp};

/// Maximum operations accepted by a single [`DocumentStore::batch_write`].
pub const MAX_BATCH_OPS: usize = 500;

/// Computes the fields to merge from the current document, if any.
pub type MergeFn<'a> = dyn Fn(Option<&Record>) -> Fields + Send + Sync + 'a;

/// Document store backing both the raw click log and the stats documents.
///
/// Implemented by [`crate::MemoryStore`] and by the ClickHouse store; tests
/// wrap either one to inject failures.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Range query on a timestamp field, capped at `limit` results when given.
    /// Result order is unspecified.
    async fn query(
        &self,
        collection: &str,
        filter: &Filter,
        limit: Option<usize>,
    ) -> Result<Vec<Record>>;

    /// Fetches a single document.
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Record>>;

    /// Applies all operations or none of them.
    async fn batch_write(&self, ops: Vec<WriteOp>) -> Result<()>;

    /// Read-modify-write of one document.
    ///
    /// `update` sees the current document and returns the fields to set-merge.
    /// Returns the document as written.
    async fn merge_with(
        &self,
        collection: &str,
        key: &str,
        update: &MergeFn<'_>,
    ) -> Result<Record>;

    /// Store clock, used as `now` for job runs.
    fn server_timestamp(&self) -> DateTime<Utc>;

    /// Cheap connectivity check.
    async fn ping(&self) -> Result<()>;
}
