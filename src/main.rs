//! Supplier click statistics pipeline
//!
//! Weekly batch jobs over the raw click log:
//! - Aggregation of the trailing window into per-supplier stats documents
//! - Retention purge of expired raw clicks in bounded batches
//! - On-demand HTTP triggers, health and metrics endpoints

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::signal;
use tracing::{error, info, warn};

use api::{router, AppState};
use clickhouse_store::{ClickHouseClient, ClickHouseConfig, ClickHouseStore};
use document_store::{DocumentStore, MemoryStore};
use stats_core::{RetentionPolicy, WindowPolicy};
use telemetry::{health, init_tracing_from_env};
use worker::{JobConfig, JobRunner, SchedulerConfig, WorkerScheduler};

/// Which [`DocumentStore`] backs the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum StoreBackend {
    Memory,
    Clickhouse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreConfig {
    #[serde(default = "default_backend")]
    backend: StoreBackend,
    #[serde(default)]
    clickhouse: ClickHouseConfig,
}

fn default_backend() -> StoreBackend {
    StoreBackend::Clickhouse
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            clickhouse: ClickHouseConfig::default(),
        }
    }
}

/// Job policy and schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct JobsConfig {
    window_days: u32,
    retention_days: u32,
    batch_limit: usize,
    aggregate_interval_secs: u64,
    purge_interval_secs: u64,
    purge_offset_secs: u64,
    job_timeout_secs: u64,
    scheduler_enabled: bool,
}

impl Default for JobsConfig {
    fn default() -> Self {
        let retention = RetentionPolicy::default();
        let schedule = SchedulerConfig::default();
        Self {
            window_days: WindowPolicy::default().window_days,
            retention_days: retention.retention_days,
            batch_limit: retention.batch_limit,
            aggregate_interval_secs: schedule.aggregate_interval.as_secs(),
            purge_interval_secs: schedule.purge_interval.as_secs(),
            purge_offset_secs: schedule.purge_offset.as_secs(),
            job_timeout_secs: worker::DEFAULT_JOB_TIMEOUT.as_secs(),
            scheduler_enabled: true,
        }
    }
}

impl JobsConfig {
    fn job_config(&self) -> JobConfig {
        JobConfig {
            window: WindowPolicy {
                window_days: self.window_days,
            },
            retention: RetentionPolicy {
                retention_days: self.retention_days,
                batch_limit: self.batch_limit,
            },
            job_timeout: Duration::from_secs(self.job_timeout_secs),
        }
    }

    fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            aggregate_interval: Duration::from_secs(self.aggregate_interval_secs),
            purge_interval: Duration::from_secs(self.purge_interval_secs),
            purge_offset: Duration::from_secs(self.purge_offset_secs),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Config {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,

    #[serde(default)]
    store: StoreConfig,

    #[serde(default)]
    jobs: JobsConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            store: StoreConfig::default(),
            jobs: JobsConfig::default(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing_from_env();

    info!("Starting click-stats v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;

    let job_config = config.jobs.job_config();
    job_config.validate().context("Invalid job configuration")?;
    let scheduler_config = config.jobs.scheduler_config();
    scheduler_config
        .validate()
        .context("Invalid scheduler configuration")?;

    let store = build_store(&config.store).await?;
    check_health(store.as_ref()).await;

    let runner = Arc::new(JobRunner::new(store, job_config));

    let _worker_handles = if config.jobs.scheduler_enabled {
        let scheduler = Arc::new(WorkerScheduler::new(scheduler_config, runner.clone()));
        scheduler.start()
    } else {
        info!("Scheduler disabled, jobs run on demand only");
        Vec::new()
    };

    let app = router(AppState::new(runner));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid server address")?;

    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&Config::default())?)
        // Load from config file if exists
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        // Override with environment variables, e.g. CLICKSTATS__JOBS__RETENTION_DAYS
        .add_source(
            config::Environment::with_prefix("CLICKSTATS")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let config: Config = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    info!(
        backend = ?config.store.backend,
        window_days = config.jobs.window_days,
        retention_days = config.jobs.retention_days,
        scheduler_enabled = config.jobs.scheduler_enabled,
        "Loaded configuration"
    );

    Ok(config)
}

async fn build_store(config: &StoreConfig) -> Result<Arc<dyn DocumentStore>> {
    match config.backend {
        StoreBackend::Memory => {
            warn!("Using the in-memory store; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Clickhouse => {
            let client = ClickHouseClient::new(config.clickhouse.clone())
                .context("Failed to create ClickHouse client")?;

            if let Err(e) = clickhouse_store::init_schema(&client).await {
                error!("Failed to initialize ClickHouse schema: {}", e);
                // Continue anyway - schema might already exist
            }

            Ok(Arc::new(ClickHouseStore::new(client)))
        }
    }
}

/// Check store health on startup.
async fn check_health(store: &dyn DocumentStore) {
    match store.ping().await {
        Ok(()) => {
            health().store.set_healthy();
            info!("Store connection: healthy");
        }
        Err(e) => {
            health().store.set_unhealthy(e.to_string());
            error!("Store connection: unhealthy: {}", e);
        }
    }
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
