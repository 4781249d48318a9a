//! ClickHouse health checks.

use crate::client::ClickHouseClient;
use stats_core::Result;
use tracing::{debug, error};

/// Check ClickHouse connection health.
pub async fn check_connection(client: &ClickHouseClient) -> bool {
    match client
        .call("Ping", client.inner().query("SELECT 1").fetch_one::<u8>())
        .await
    {
        Ok(_) => {
            debug!("ClickHouse connection healthy");
            true
        }
        Err(e) => {
            error!("ClickHouse health check failed: {}", e);
            false
        }
    }
}

/// Initialize database schema.
pub async fn init_schema(client: &ClickHouseClient) -> Result<()> {
    use crate::schema::all_tables;

    // The target database may not exist yet.
    let admin = client.inner().clone().with_database("default");

    for ddl in all_tables(&client.config().database) {
        client.call("DDL", admin.query(&ddl).execute()).await?;
    }

    debug!("ClickHouse schema initialized");
    Ok(())
}
