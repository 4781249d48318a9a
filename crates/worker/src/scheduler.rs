//! Weekly job scheduler.
//!
//! Aggregation fires first; purge runs on the same cadence but offset later,
//! so a week's clicks are aggregated before any of them can expire.

use std::sync::Arc;
use std::time::Duration;

use stats_core::{Error, Result};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info};

use crate::runner::JobRunner;

const WEEK: Duration = Duration::from_secs(7 * 24 * 3600);

/// Worker scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Aggregation cadence
    pub aggregate_interval: Duration,
    /// Purge cadence
    pub purge_interval: Duration,
    /// Delay of the purge schedule relative to aggregation
    pub purge_offset: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            aggregate_interval: WEEK,
            purge_interval: WEEK,
            purge_offset: Duration::from_secs(3600), // 1 hour
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.aggregate_interval.is_zero() || self.purge_interval.is_zero() {
            return Err(Error::config("scheduler intervals must be positive"));
        }
        Ok(())
    }
}

/// Background job scheduler.
pub struct WorkerScheduler {
    config: SchedulerConfig,
    runner: Arc<JobRunner>,
}

impl WorkerScheduler {
    pub fn new(config: SchedulerConfig, runner: Arc<JobRunner>) -> Self {
        Self { config, runner }
    }

    /// Starts both job loops.
    pub fn start(self: Arc<Self>) -> Vec<tokio::task::JoinHandle<()>> {
        let mut handles = Vec::new();

        let scheduler = self.clone();
        handles.push(tokio::spawn(async move {
            scheduler.run_aggregate_worker().await;
        }));

        let scheduler = self.clone();
        handles.push(tokio::spawn(async move {
            scheduler.run_purge_worker().await;
        }));

        info!(
            aggregate_interval_secs = self.config.aggregate_interval.as_secs(),
            purge_interval_secs = self.config.purge_interval.as_secs(),
            purge_offset_secs = self.config.purge_offset.as_secs(),
            "Background workers started"
        );
        handles
    }

    async fn run_aggregate_worker(&self) {
        let mut ticker = interval_at(Instant::now(), self.config.aggregate_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            if let Err(e) = self.runner.run_aggregate().await {
                error!("Scheduled aggregation error: {}", e);
            }
        }
    }

    async fn run_purge_worker(&self) {
        let start = Instant::now() + self.config.purge_offset;
        let mut ticker = interval_at(start, self.config.purge_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            if let Err(e) = self.runner.run_purge(None).await {
                error!("Scheduled purge error: {}", e);
            }
        }
    }
}
