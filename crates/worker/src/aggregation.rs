//! Weekly supplier click aggregation.
//!
//! Reads the trailing window of raw clicks, counts them per supplier and
//! merges the counts into each supplier's stats document:
//! 1. Fetch clicks with `occurredAt >= now - window`
//! 2. Count per supplier and channel, skipping malformed clicks
//! 3. Per supplier: read-modify-write the stats document
//!
//! A failed fetch fails the run. A failed per-supplier write is logged and the
//! run moves on to the next supplier.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use document_store::{DocumentStore, Filter, Record};
use serde::{Deserialize, Serialize};
use stats_core::{
    ClickEvent, Result, SupplierStats, WindowCounts, WindowPolicy, CLICKS_COLLECTION,
    FIELD_OCCURRED_AT, STATS_COLLECTION,
};
use telemetry::metrics;
use tracing::{debug, info, warn};

/// Outcome of one aggregation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationResult {
    /// Suppliers whose stats document was written
    pub entities_updated: u64,
    /// Raw clicks read from the window, valid or not
    pub events_scanned: u64,
    /// Clicks skipped for a blank supplier id or unknown type
    pub events_skipped: u64,
    /// Suppliers whose stats write failed
    pub entities_failed: Vec<String>,
}

/// Per-supplier window counts built in one pass over the window.
#[derive(Debug, Default)]
pub struct WindowFold {
    pub counts: BTreeMap<String, WindowCounts>,
    pub skipped: u64,
}

impl WindowFold {
    pub fn from_records(records: &[Record]) -> Self {
        let mut fold = Self::default();

        for record in records {
            match ClickEvent::from_fields(&record.fields) {
                Ok(event) => fold
                    .counts
                    .entry(event.supplier_id)
                    .or_default()
                    .record(event.event_type),
                Err(e) => {
                    debug!(key = %record.key, reason = %e, "Skipping click");
                    fold.skipped += 1;
                }
            }
        }

        fold
    }
}

/// Folds the trailing window of clicks into supplier stats.
pub struct Aggregator {
    store: Arc<dyn DocumentStore>,
    window: WindowPolicy,
}

impl Aggregator {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_window(store, WindowPolicy::default())
    }

    pub fn with_window(store: Arc<dyn DocumentStore>, window: WindowPolicy) -> Self {
        Self { store, window }
    }

    pub fn window(&self) -> WindowPolicy {
        self.window
    }

    /// Runs one aggregation pass ending at `now`.
    pub async fn aggregate(&self, now: DateTime<Utc>) -> Result<AggregationResult> {
        self.window.validate()?;
        let window_start = self.window.window_start(now)?;

        let records = self
            .store
            .query(
                CLICKS_COLLECTION,
                &Filter::gte(FIELD_OCCURRED_AT, window_start),
                None,
            )
            .await?;

        let events_scanned = records.len() as u64;
        let fold = WindowFold::from_records(&records);
        drop(records);

        metrics().events_scanned.inc_by(events_scanned);
        metrics().events_skipped.inc_by(fold.skipped);

        info!(
            window_start = %window_start,
            events_scanned,
            events_skipped = fold.skipped,
            suppliers = fold.counts.len(),
            "Aggregating click window"
        );

        let mut result = AggregationResult {
            events_scanned,
            events_skipped: fold.skipped,
            ..Default::default()
        };

        for (supplier_id, counts) in fold.counts {
            match self.write_stats(&supplier_id, counts, now).await {
                Ok(stats) => {
                    result.entities_updated += 1;
                    metrics().stats_written.inc();
                    debug!(
                        supplier_id = %supplier_id,
                        window_a = stats.window_count_a,
                        window_b = stats.window_count_b,
                        total_a = stats.total_count_a,
                        total_b = stats.total_count_b,
                        "Supplier stats updated"
                    );
                }
                Err(e) => {
                    metrics().stats_write_errors.inc();
                    warn!(supplier_id = %supplier_id, error = %e, "Failed to write supplier stats");
                    result.entities_failed.push(supplier_id);
                }
            }
        }

        Ok(result)
    }

    /// Atomic read-modify-write of one supplier's stats.
    async fn write_stats(
        &self,
        supplier_id: &str,
        counts: WindowCounts,
        now: DateTime<Utc>,
    ) -> Result<SupplierStats> {
        let fold = move |current: Option<&Record>| {
            SupplierStats::fold_window(current.map(|r| &r.fields), counts, now).to_fields()
        };

        let written = self
            .store
            .merge_with(STATS_COLLECTION, supplier_id, &fold)
            .await?;

        Ok(SupplierStats::from_fields(&written.fields))
    }
}
