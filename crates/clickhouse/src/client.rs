//! ClickHouse client wrapper.

use crate::config::ClickHouseConfig;
use clickhouse::Client;
use stats_core::{Error, Result};
use std::future::Future;
use tracing::info;

/// ClickHouse client wrapper with a per-call timeout.
#[derive(Clone)]
pub struct ClickHouseClient {
    inner: Client,
    config: ClickHouseConfig,
}

impl ClickHouseClient {
    /// Creates a new ClickHouse client.
    pub fn new(config: ClickHouseConfig) -> Result<Self> {
        if config.timeout_secs == 0 {
            return Err(Error::config("clickhouse timeout_secs must be positive"));
        }

        let mut client = Client::default()
            .with_url(&config.url)
            .with_database(&config.database);

        if let Some(ref user) = config.username {
            client = client.with_user(user);
        }

        if let Some(ref pass) = config.password {
            client = client.with_password(pass);
        }

        info!(
            url = %config.url,
            database = %config.database,
            "Created ClickHouse client"
        );

        Ok(Self {
            inner: client,
            config,
        })
    }

    /// Returns the inner clickhouse client.
    pub fn inner(&self) -> &Client {
        &self.inner
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClickHouseConfig {
        &self.config
    }

    /// Runs one ClickHouse call under the configured timeout, mapping every
    /// failure to a `STORE_001` error.
    pub async fn call<T, F>(&self, what: &str, fut: F) -> Result<T>
    where
        F: Future<Output = clickhouse::error::Result<T>>,
    {
        match tokio::time::timeout(self.config.timeout(), fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(Error::store_unavailable(format!("{what} error: {e}"))),
            Err(_) => Err(Error::store_unavailable(format!(
                "{what} timed out after {}s",
                self.config.timeout_secs
            ))),
        }
    }
}
