//! ClickHouse table schemas.
//!
//! Every collection lives in one `documents` table:
//! - (collection, key) identifies a document
//! - body holds the document fields as JSON
//! - ReplacingMergeTree(version, deleted) keeps the newest version; a delete
//!   is a tombstone row, so a write batch is a single INSERT

/// Name of the documents table.
pub const DOCUMENTS_TABLE: &str = "documents";

/// SQL for creating the database.
pub fn create_database(database: &str) -> String {
    format!("CREATE DATABASE IF NOT EXISTS {database}")
}

/// SQL for creating the documents table.
pub fn create_documents_table(database: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {database}.{DOCUMENTS_TABLE} (
    collection LowCardinality(String),
    key String,
    body String,
    version UInt64,
    deleted UInt8 DEFAULT 0
)
ENGINE = ReplacingMergeTree(version, deleted)
ORDER BY (collection, key)
SETTINGS index_granularity = 8192
"#
    )
}

/// All DDL statements in execution order.
pub fn all_tables(database: &str) -> Vec<String> {
    vec![create_database(database), create_documents_table(database)]
}
