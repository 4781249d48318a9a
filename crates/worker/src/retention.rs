//! Retention purger for raw click events.
//!
//! Deletes clicks older than the retention horizon in bounded batches:
//! 1. Fetch up to `batch_limit` clicks with `occurredAt < cutoff`
//! 2. Delete them in one atomic batch
//! 3. Repeat until a fetch comes back empty
//!
//! Each committed batch is durable progress. An interrupted or failed run
//! leaves a valid state that the next run picks up from.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use document_store::{DocumentStore, Filter, WriteOp};
use serde::{Deserialize, Serialize};
use stats_core::{Error, Result, RetentionPolicy, CLICKS_COLLECTION, FIELD_OCCURRED_AT};
use telemetry::metrics;
use tracing::{debug, error, info};

/// Outcome of one purge run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeResult {
    /// Click records deleted
    pub deleted: u64,
    /// Fetch/delete cycles that committed
    pub batches: u64,
    /// Records older than this were targeted
    pub cutoff: DateTime<Utc>,
}

/// Worker that enforces raw click retention by batched deletes.
pub struct RetentionPurger {
    store: Arc<dyn DocumentStore>,
    batch_limit: usize,
}

impl RetentionPurger {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_batch_limit(store, RetentionPolicy::default().batch_limit)
    }

    pub fn with_batch_limit(store: Arc<dyn DocumentStore>, batch_limit: usize) -> Self {
        Self { store, batch_limit }
    }

    /// Deletes every click older than `now - retention_days`.
    pub async fn purge(&self, now: DateTime<Utc>, retention_days: u32) -> Result<PurgeResult> {
        self.purge_tracked(now, retention_days, &AtomicU64::new(0)).await
    }

    /// Like [`purge`](Self::purge), publishing the committed delete count to
    /// `progress` after every batch so it stays readable if the run is dropped.
    pub async fn purge_tracked(
        &self,
        now: DateTime<Utc>,
        retention_days: u32,
        progress: &AtomicU64,
    ) -> Result<PurgeResult> {
        let policy = RetentionPolicy {
            retention_days,
            batch_limit: self.batch_limit,
        };
        policy.validate()?;

        let cutoff = policy.cutoff(now)?;
        let filter = Filter::lt(FIELD_OCCURRED_AT, cutoff);

        info!(
            cutoff = %cutoff,
            retention_days,
            batch_limit = policy.batch_limit,
            "Purging expired clicks"
        );

        let mut deleted = 0u64;
        let mut batches = 0u64;

        loop {
            let expired = self
                .store
                .query(CLICKS_COLLECTION, &filter, Some(policy.batch_limit))
                .await
                .inspect_err(|e| {
                    error!(deleted, error = %e, "Failed to fetch expired clicks");
                })?;

            if expired.is_empty() {
                break;
            }

            let count = expired.len() as u64;
            let ops = expired
                .into_iter()
                .map(|record| WriteOp::delete(CLICKS_COLLECTION, record.key))
                .collect();

            if let Err(e) = self.store.batch_write(ops).await {
                error!(deleted, batch = batches + 1, error = %e, "Delete batch failed");
                return Err(Error::batch_delete(deleted, e.to_string()));
            }

            deleted += count;
            batches += 1;
            progress.store(deleted, Ordering::Relaxed);
            metrics().events_purged.inc_by(count);
            metrics().purge_batches.inc();

            debug!(batch = batches, count, deleted, "Deleted expired clicks");
        }

        info!(deleted, batches, cutoff = %cutoff, "Purge complete");

        Ok(PurgeResult {
            deleted,
            batches,
            cutoff,
        })
    }
}
