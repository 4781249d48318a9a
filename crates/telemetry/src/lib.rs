//! Internal telemetry for the click statistics pipeline.
//!
//! Metrics stay in-process and are served over HTTP; logs are structured
//! `tracing` events.

pub mod health;
pub mod metrics;
pub mod tracing_setup;

pub use health::*;
pub use metrics::*;
pub use tracing_setup::*;
