//! Background jobs for the click statistics pipeline.
//!
//! - Aggregation (trailing-window click counts → supplier stats)
//! - Retention (batched purge of expired raw clicks)
//! - Runner (run serialization, budget, run log)
//! - Scheduler (weekly cadence with the purge offset after aggregation)

pub mod aggregation;
pub mod retention;
pub mod runner;
pub mod scheduler;

pub use aggregation::{AggregationResult, Aggregator};
pub use retention::{PurgeResult, RetentionPurger};
pub use runner::*;
pub use scheduler::*;
