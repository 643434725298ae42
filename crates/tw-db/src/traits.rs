//! Database trait definition

use crate::error::DbResult;
use crate::lock::AdvisoryLock;
use crate::value::Row;
use async_trait::async_trait;
use std::time::Duration;

/// Driver adapter used uniformly regardless of the target warehouse
///
/// Implementations must be Send + Sync for async operation.
#[async_trait]
pub trait Database: Send + Sync {
    /// Execute a single statement
    async fn execute(&self, sql: &str) -> DbResult<()>;

    /// Execute a body that may contain several statements
    async fn execute_batch(&self, sql: &str) -> DbResult<()>;

    /// Execute statements atomically: all of them or none
    async fn execute_transaction(&self, statements: &[String]) -> DbResult<()>;

    /// Run a query and collect its rows
    async fn query(&self, sql: &str) -> DbResult<Vec<Row>>;

    /// Take the advisory lock `name` for this database, waiting at most `timeout`
    async fn acquire_advisory_lock(&self, name: &str, timeout: Duration)
        -> DbResult<AdvisoryLock>;

    /// Database type identifier for logging
    fn db_type(&self) -> &'static str;
}
