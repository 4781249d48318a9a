//! Retention policy for raw click events.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Raw click retention horizon in days.
pub const DEFAULT_RETENTION_DAYS: u32 = 360;

/// Maximum records fetched and deleted per purge batch.
pub const PURGE_BATCH_LIMIT: usize = 500;

/// Retention policy configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Events older than this many days are purged
    pub retention_days: u32,
    /// Records per fetch/delete cycle
    pub batch_limit: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            retention_days: DEFAULT_RETENTION_DAYS,
            batch_limit: PURGE_BATCH_LIMIT,
        }
    }
}

impl RetentionPolicy {
    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.retention_days = days;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.retention_days == 0 {
            return Err(Error::validation("retention_days must be at least 1"));
        }
        if self.batch_limit == 0 || self.batch_limit > PURGE_BATCH_LIMIT {
            return Err(Error::validation(format!(
                "batch_limit must be between 1 and {PURGE_BATCH_LIMIT}"
            )));
        }
        Ok(())
    }

    /// Events with `occurredAt` strictly before this instant are purgeable.
    pub fn cutoff(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        retention_cutoff(now, self.retention_days)
    }
}

/// `now - retention_days`, or a validation error when that is out of range.
pub fn retention_cutoff(now: DateTime<Utc>, retention_days: u32) -> Result<DateTime<Utc>> {
    Duration::try_days(i64::from(retention_days))
        .and_then(|span| now.checked_sub_signed(span))
        .ok_or_else(|| {
            Error::validation(format!(
                "retention_days {retention_days} reaches past the earliest representable time"
            ))
        })
}
