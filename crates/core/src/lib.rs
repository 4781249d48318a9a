//! Core types, windowing, and errors for the supplier click statistics pipeline.

pub mod error;
pub mod events;
pub mod retention;
pub mod stats;
pub mod window;

pub use error::{Error, JobErrorCode, Result, StoreErrorCode};
pub use events::*;
pub use retention::*;
pub use stats::*;
pub use window::*;
