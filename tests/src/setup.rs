//! Common test setup functions.

use std::sync::Arc;

use api::{router, AppState};
use axum::Router;
use axum_test::TestServer;
use document_store::{DocumentStore, MemoryStore};
use worker::{JobConfig, JobRunner};

use crate::fixtures;
use crate::mocks::FaultyStore;

/// Test context wiring the production router and runner onto an in-memory
/// store with failure injection.
///
/// - `memory` is the backing store, for seeding and inspecting documents
/// - `store` is the faulty wrapper every job call goes through
/// - `router` is the real axum router with all layers
pub struct TestContext {
    pub memory: Arc<MemoryStore>,
    pub store: Arc<FaultyStore>,
    pub runner: Arc<JobRunner>,
    pub router: Router,
}

impl TestContext {
    /// Create a context with default job settings and the store clock pinned
    /// to [`fixtures::now`].
    pub fn new() -> Self {
        Self::with_config(JobConfig::default())
    }

    pub fn with_config(config: JobConfig) -> Self {
        let memory = Arc::new(MemoryStore::with_clock(fixtures::now()));
        let store = Arc::new(FaultyStore::new(memory.clone()));
        let runner = Arc::new(JobRunner::new(
            store.clone() as Arc<dyn DocumentStore>,
            config,
        ));
        let router = router(AppState::new(runner.clone()));

        Self {
            memory,
            store,
            runner,
            router,
        }
    }

    /// Test server over the router.
    pub fn server(&self) -> TestServer {
        TestServer::new(self.router.clone()).expect("Failed to create test server")
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
