//! Document store contract for the click statistics pipeline.
//!
//! The pipeline only ever talks to a [`DocumentStore`]: range queries on a
//! timestamp field, atomic write batches, and per-document read-modify-write.

pub mod document;
pub mod memory;
pub mod traits;

pub use document::*;
pub use memory::MemoryStore;
pub use traits::*;
