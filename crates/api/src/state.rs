//! Application state shared across handlers.

use std::sync::Arc;

use worker::JobRunner;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Runner shared with the scheduler, so on-demand and scheduled runs of
    /// the same job never overlap
    pub runner: Arc<JobRunner>,
}

impl AppState {
    pub fn new(runner: Arc<JobRunner>) -> Self {
        Self { runner }
    }
}
