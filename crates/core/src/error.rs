//! Unified error types for the click statistics pipeline.
//!
//! Coded errors:
//! - STORE_001-002: Store errors
//! - JOB_001-002: Job errors

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Store error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorCode {
    /// STORE_001: Fetch or write failed at the store/transport layer
    Unavailable,
    /// STORE_002: Batch exceeds the per-call operation limit
    BatchTooLarge,
}

impl StoreErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unavailable => "STORE_001",
            Self::BatchTooLarge => "STORE_002",
        }
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Unavailable => 503,
            Self::BatchTooLarge => 500,
        }
    }
}

/// Job error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobErrorCode {
    /// JOB_001: A purge delete batch failed
    BatchDeleteFailed,
    /// JOB_002: Run exceeded its wall-clock budget
    TimedOut,
}

impl JobErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::BatchDeleteFailed => "JOB_001",
            Self::TimedOut => "JOB_002",
        }
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::BatchDeleteFailed => 500,
            Self::TimedOut => 504,
        }
    }
}

/// Unified error type for the pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// Store error with code.
    #[error("[{code}] {message}")]
    Store {
        code: &'static str,
        message: String,
        http_status: u16,
    },

    /// A purge batch failed; earlier batches stay committed.
    #[error("[{code}] {message} ({deleted} records deleted before failure)")]
    BatchDelete {
        code: &'static str,
        message: String,
        deleted: u64,
        http_status: u16,
    },

    /// Run exceeded its wall-clock budget. Purge runs carry the count
    /// committed before the budget ran out.
    #[error("[{code}] {message}")]
    Timeout {
        code: &'static str,
        message: String,
        deleted: Option<u64>,
        http_status: u16,
    },

    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a store error.
    pub fn store(code: StoreErrorCode, msg: impl Into<String>) -> Self {
        Self::Store {
            code: code.code(),
            message: msg.into(),
            http_status: code.http_status(),
        }
    }

    /// Shorthand for a `STORE_001` error.
    pub fn store_unavailable(msg: impl Into<String>) -> Self {
        Self::store(StoreErrorCode::Unavailable, msg)
    }

    /// Create a batch delete failure carrying the count deleted so far.
    pub fn batch_delete(deleted: u64, msg: impl Into<String>) -> Self {
        let code = JobErrorCode::BatchDeleteFailed;
        Self::BatchDelete {
            code: code.code(),
            message: msg.into(),
            deleted,
            http_status: code.http_status(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(msg: impl Into<String>) -> Self {
        let code = JobErrorCode::TimedOut;
        Self::Timeout {
            code: code.code(),
            message: msg.into(),
            deleted: None,
            http_status: code.http_status(),
        }
    }

    /// Create a purge timeout carrying the count deleted so far.
    pub fn purge_timeout(deleted: u64, msg: impl Into<String>) -> Self {
        let code = JobErrorCode::TimedOut;
        Self::Timeout {
            code: code.code(),
            message: msg.into(),
            deleted: Some(deleted),
            http_status: code.http_status(),
        }
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedRecord(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Get the HTTP status code for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Store { http_status, .. } => *http_status,
            Self::BatchDelete { http_status, .. } => *http_status,
            Self::Timeout { http_status, .. } => *http_status,
            Self::MalformedRecord(_) => 422,
            Self::Validation(_) => 400,
            Self::Config(_) => 500,
            Self::Serialization(_) => 500,
            Self::Internal(_) => 500,
        }
    }

    /// Get the error code if this is a coded error.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            Self::Store { code, .. } => Some(code),
            Self::BatchDelete { code, .. } => Some(code),
            Self::Timeout { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Records deleted before a purge aborted, if this error came from one.
    pub fn partial_deleted(&self) -> Option<u64> {
        match self {
            Self::BatchDelete { deleted, .. } => Some(*deleted),
            Self::Timeout { deleted, .. } => *deleted,
            _ => None,
        }
    }
}
