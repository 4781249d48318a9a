//! Shared support for the end-to-end tests.

pub mod containers;
pub mod setup;
