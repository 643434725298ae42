//! Error types for tw-db

use std::time::Duration;
use thiserror::Error;

/// Database operation errors
#[derive(Error, Debug)]
pub enum DbError {
    /// Connection error (D001)
    #[error("[D001] Database connection failed: {0}")]
    ConnectionError(String),

    /// Query execution error (D002), with the warehouse error code when one exists
    #[error("[D002] SQL execution failed{}: {message}", code_suffix(.code))]
    ExecutionError {
        message: String,
        code: Option<String>,
    },

    /// Advisory lock not obtained within the bounded wait (D003)
    #[error("[D003] Timed out after {waited:?} waiting for lock '{name}'")]
    LockTimeout { name: String, waited: Duration },

    /// Mutex poisoned (D004)
    #[error("[D004] Database mutex poisoned: {0}")]
    MutexPoisoned(String),

    /// HTTP transport error talking to a remote warehouse (D005)
    #[error("[D005] Warehouse API request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Internal error (D006)
    #[error("[D006] Internal database error: {0}")]
    Internal(String),
}

fn code_suffix(code: &Option<String>) -> String {
    match code {
        Some(code) => format!(" ({code})"),
        None => String::new(),
    }
}

impl DbError {
    /// Short machine-readable kind, used as a structured log field
    pub fn kind(&self) -> &'static str {
        match self {
            DbError::ConnectionError(_) | DbError::Transport(_) => "connection",
            DbError::ExecutionError { .. } => "execution",
            DbError::LockTimeout { .. } => "lock_timeout",
            DbError::MutexPoisoned(_) | DbError::Internal(_) => "internal",
        }
    }

    /// Execution error without a warehouse code
    pub fn execution(message: impl Into<String>) -> Self {
        DbError::ExecutionError {
            message: message.into(),
            code: None,
        }
    }
}

/// Result type alias for DbError
pub type DbResult<T> = Result<T, DbError>;

impl From<duckdb::Error> for DbError {
    fn from(err: duckdb::Error) -> Self {
        DbError::execution(err.to_string())
    }
}
