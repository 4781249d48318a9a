//! Job runner shared by the scheduler and the on-demand triggers.
//!
//! Serializes runs of the same job, takes `now` from the store clock, applies
//! the wall-clock budget, and records the outcome in the `job_runs` collection.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use document_store::{DocumentStore, Fields, WriteOp};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stats_core::{Error, Result, RetentionPolicy, WindowPolicy};
use telemetry::{health, metrics};
use tokio::sync::Mutex;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::aggregation::{AggregationResult, Aggregator};
use crate::retention::{PurgeResult, RetentionPurger};

/// Collection holding one run-log document per job.
pub const JOB_RUNS_COLLECTION: &str = "job_runs";

/// Default wall-clock budget per run.
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(540);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Aggregate,
    Purge,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aggregate => "aggregate",
            Self::Purge => "purge",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "aggregate" => Ok(Self::Aggregate),
            "purge" => Ok(Self::Purge),
            other => Err(Error::validation(format!("unknown job: {other}"))),
        }
    }
}

/// Job configuration.
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub window: WindowPolicy,
    pub retention: RetentionPolicy,
    pub job_timeout: Duration,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            window: WindowPolicy::default(),
            retention: RetentionPolicy::default(),
            job_timeout: DEFAULT_JOB_TIMEOUT,
        }
    }
}

impl JobConfig {
    pub fn validate(&self) -> Result<()> {
        self.window.validate()?;
        self.retention.validate()?;
        if self.job_timeout.is_zero() {
            return Err(Error::config("job_timeout must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failed,
}

/// Last recorded outcome of a job, as stored in `job_runs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRunRecord {
    pub last_run: DateTime<Utc>,
    /// Suppliers updated or clicks deleted by the last successful run
    #[serde(default)]
    pub record_count: u64,
    pub status: RunStatus,
    #[serde(default)]
    pub error: Option<String>,
}

/// Runs aggregation and purge jobs against one store.
pub struct JobRunner {
    store: Arc<dyn DocumentStore>,
    aggregator: Aggregator,
    purger: RetentionPurger,
    config: JobConfig,
    aggregate_lock: Mutex<()>,
    purge_lock: Mutex<()>,
}

impl JobRunner {
    pub fn new(store: Arc<dyn DocumentStore>, config: JobConfig) -> Self {
        Self {
            aggregator: Aggregator::with_window(store.clone(), config.window),
            purger: RetentionPurger::with_batch_limit(store.clone(), config.retention.batch_limit),
            store,
            config,
            aggregate_lock: Mutex::new(()),
            purge_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Runs one aggregation. Waits for any in-flight aggregation first.
    pub async fn run_aggregate(&self) -> Result<AggregationResult> {
        let _guard = self.aggregate_lock.lock().await;
        let span = info_span!("job", job = %JobKind::Aggregate, run_id = %Uuid::new_v4());

        async {
            let now = self.store.server_timestamp();
            let started = Instant::now();
            metrics().aggregation_runs.inc();

            let outcome = self
                .with_budget(JobKind::Aggregate, self.aggregator.aggregate(now))
                .await;
            metrics()
                .aggregation_latency_ms
                .observe(started.elapsed().as_millis() as u64);

            match &outcome {
                Ok(result) => info!(
                    entities_updated = result.entities_updated,
                    events_scanned = result.events_scanned,
                    events_skipped = result.events_skipped,
                    entities_failed = result.entities_failed.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Aggregation finished"
                ),
                Err(e) => {
                    metrics().aggregation_failures.inc();
                    error!(error = %e, "Aggregation failed");
                }
            }

            let count = outcome.as_ref().map(|r| r.entities_updated);
            self.record_run(JobKind::Aggregate, now, count).await;
            outcome
        }
        .instrument(span)
        .await
    }

    /// Runs one purge. `retention_days` falls back to the configured horizon.
    pub async fn run_purge(&self, retention_days: Option<u32>) -> Result<PurgeResult> {
        let _guard = self.purge_lock.lock().await;
        let retention_days = retention_days.unwrap_or(self.config.retention.retention_days);
        let span = info_span!(
            "job",
            job = %JobKind::Purge,
            run_id = %Uuid::new_v4(),
            retention_days
        );

        async {
            let now = self.store.server_timestamp();
            let started = Instant::now();
            metrics().purge_runs.inc();

            let progress = AtomicU64::new(0);
            let outcome = match self
                .with_budget(
                    JobKind::Purge,
                    self.purger.purge_tracked(now, retention_days, &progress),
                )
                .await
            {
                Err(Error::Timeout { message, .. }) => {
                    let deleted = progress.load(Ordering::Relaxed);
                    Err(Error::purge_timeout(
                        deleted,
                        format!("{message} after deleting {deleted} records"),
                    ))
                }
                other => other,
            };
            metrics()
                .purge_latency_ms
                .observe(started.elapsed().as_millis() as u64);

            match &outcome {
                Ok(result) => info!(
                    deleted = result.deleted,
                    batches = result.batches,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Purge finished"
                ),
                Err(e) => {
                    metrics().purge_failures.inc();
                    error!(error = %e, "Purge failed");
                }
            }

            let count = outcome.as_ref().map(|r| r.deleted);
            self.record_run(JobKind::Purge, now, count).await;
            outcome
        }
        .instrument(span)
        .await
    }

    /// Reads the last recorded outcome of a job.
    pub async fn last_run(&self, job: JobKind) -> Result<Option<JobRunRecord>> {
        let Some(record) = self.store.get(JOB_RUNS_COLLECTION, job.as_str()).await? else {
            return Ok(None);
        };
        let run = serde_json::from_value(Value::Object(record.fields))?;
        Ok(Some(run))
    }

    /// Dropping the job future on expiry is safe: every committed batch or
    /// stats write is already durable.
    async fn with_budget<T>(
        &self,
        job: JobKind,
        run: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.config.job_timeout, run).await {
            Ok(outcome) => outcome,
            Err(_) => Err(Error::timeout(format!(
                "{} run exceeded its {}s budget",
                job,
                self.config.job_timeout.as_secs()
            ))),
        }
    }

    /// Best-effort run log write; also feeds the store health component.
    async fn record_run(
        &self,
        job: JobKind,
        now: DateTime<Utc>,
        outcome: std::result::Result<u64, &Error>,
    ) {
        let mut fields = Fields::new();
        fields.insert("lastRun".into(), Value::String(now.to_rfc3339()));

        match outcome {
            Ok(count) => {
                health().store.set_healthy();
                fields.insert("recordCount".into(), count.into());
                fields.insert("status".into(), "success".into());
                fields.insert("error".into(), Value::Null);
            }
            Err(e) => {
                if matches!(e, Error::Store { .. }) {
                    health().store.set_unhealthy(e.to_string());
                }
                fields.insert("status".into(), "failed".into());
                fields.insert("error".into(), Value::String(e.to_string()));
            }
        }

        let op = WriteOp::set_merge(JOB_RUNS_COLLECTION, job.as_str(), fields);
        if let Err(e) = self.store.batch_write(vec![op]).await {
            warn!(job = %job, error = %e, "Failed to record job run");
        }
    }
}
