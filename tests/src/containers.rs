//! Testcontainer setup for ClickHouse.

use std::time::{Duration, Instant};

use clickhouse_store::{check_connection, ClickHouseClient, ClickHouseConfig};
use testcontainers::{
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage, ImageExt,
};

const TEST_DATABASE: &str = "click_stats_test";

/// Container handle for ClickHouse.
pub struct TestContainers {
    #[allow(dead_code)]
    clickhouse: Option<ContainerAsync<GenericImage>>,
    pub config: ClickHouseConfig,
}

impl TestContainers {
    /// Start ClickHouse, or reuse the server at `CLICKSTATS_TEST_CLICKHOUSE_URL`.
    pub async fn start() -> Self {
        if let Some(url) = std::env::var("CLICKSTATS_TEST_CLICKHOUSE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
        {
            return Self {
                clickhouse: None,
                config: ClickHouseConfig {
                    url,
                    database: std::env::var("CLICKSTATS_TEST_CLICKHOUSE_DB")
                        .unwrap_or_else(|_| TEST_DATABASE.to_string()),
                    username: std::env::var("CLICKSTATS_TEST_CLICKHOUSE_USER").ok(),
                    password: std::env::var("CLICKSTATS_TEST_CLICKHOUSE_PASSWORD").ok(),
                    timeout_secs: 30,
                },
            };
        }

        let (clickhouse, url) = start_clickhouse().await;

        Self {
            clickhouse: Some(clickhouse),
            config: ClickHouseConfig {
                url,
                database: TEST_DATABASE.to_string(),
                username: Some("default".to_string()),
                password: None,
                timeout_secs: 30,
            },
        }
    }
}

/// Start ClickHouse container, return container and HTTP URL.
pub async fn start_clickhouse() -> (ContainerAsync<GenericImage>, String) {
    // CLICKHOUSE_DEFAULT_ACCESS_MANAGEMENT=1 allows creating users without password
    let image = GenericImage::new("clickhouse/clickhouse-server", "24.3")
        .with_wait_for(WaitFor::seconds(5))
        .with_exposed_port(8123.tcp())
        .with_env_var("CLICKHOUSE_DEFAULT_ACCESS_MANAGEMENT", "1")
        .with_env_var("CLICKHOUSE_USER", "default")
        .with_env_var("CLICKHOUSE_PASSWORD", "");

    let container = image.start().await.expect("Failed to start ClickHouse");

    let port = container.get_host_port_ipv4(8123).await.unwrap();
    let url = format!("http://127.0.0.1:{}", port);

    wait_for_clickhouse(&url, Duration::from_secs(30)).await;

    (container, url)
}

/// Poll `SELECT 1` until the server answers.
async fn wait_for_clickhouse(url: &str, timeout: Duration) {
    let client = ClickHouseClient::new(ClickHouseConfig {
        url: url.to_string(),
        database: "default".to_string(),
        username: Some("default".to_string()),
        password: None,
        timeout_secs: 2,
    })
    .expect("Failed to create ClickHouse client");

    let start = Instant::now();
    while start.elapsed() < timeout {
        if check_connection(&client).await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    panic!("ClickHouse at {} not ready after {:?}", url, timeout);
}
