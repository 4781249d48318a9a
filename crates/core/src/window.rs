//! Aggregation window.
//!
//! The window is a fixed trailing span ending at the run's `now`. It does not
//! track when the previous run happened, so a skipped run leaves a gap.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Trailing aggregation window in days.
pub const AGGREGATION_WINDOW_DAYS: u32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowPolicy {
    pub window_days: u32,
}

impl Default for WindowPolicy {
    fn default() -> Self {
        Self {
            window_days: AGGREGATION_WINDOW_DAYS,
        }
    }
}

impl WindowPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.window_days == 0 {
            return Err(Error::validation("window_days must be at least 1"));
        }
        Ok(())
    }

    /// Inclusive lower bound of the window.
    pub fn window_start(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        Duration::try_days(i64::from(self.window_days))
            .and_then(|span| now.checked_sub_signed(span))
            .ok_or_else(|| {
                Error::validation(format!(
                    "window_days {} reaches past the earliest representable time",
                    self.window_days
                ))
            })
    }
}
