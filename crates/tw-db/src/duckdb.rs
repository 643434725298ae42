//! DuckDB database backend implementation

use crate::error::{DbError, DbResult};
use crate::ident::{quote_ident, quote_literal};
use crate::lock::{AdvisoryLock, LockRegistry};
use crate::traits::Database;
use crate::value::{Row, Value};
use async_trait::async_trait;
use duckdb::types::Value as DuckValue;
use duckdb::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// DuckDB database backend
pub struct DuckDbBackend {
    conn: Mutex<Connection>,
    locks: Arc<LockRegistry>,
}

impl DuckDbBackend {
    /// Create a new in-memory DuckDB connection
    pub fn in_memory() -> DbResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(Self::from_connection(conn, LockRegistry::new()))
    }

    /// Create a new DuckDB connection from a file path.
    ///
    /// Backends opened on the same file share their advisory locks.
    pub fn from_path(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| DbError::ConnectionError(format!("{e}: {}", path.display())))?;
        let file = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let locks = LockRegistry::shared(&format!("duckdb:{}", file.display()));
        Ok(Self::from_connection(conn, locks))
    }

    /// Create from path string (handles :memory: special case)
    pub fn new(path: &str) -> DbResult<Self> {
        if path == ":memory:" {
            Self::in_memory()
        } else {
            Self::from_path(Path::new(path))
        }
    }

    fn from_connection(conn: Connection, locks: Arc<LockRegistry>) -> Self {
        Self {
            conn: Mutex::new(conn),
            locks,
        }
    }

    /// Make `schema` the session default, creating it if missing
    pub fn with_schema(self, schema: &str) -> DbResult<Self> {
        {
            let conn = self.lock_conn()?;
            conn.execute_batch(&format!(
                "CREATE SCHEMA IF NOT EXISTS {}; SET schema = {};",
                quote_ident(schema),
                quote_literal(schema)
            ))
            .map_err(|e| DbError::ConnectionError(format!("failed to use schema '{schema}': {e}")))?;
        }
        Ok(self)
    }

    fn lock_conn(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| DbError::MutexPoisoned(e.to_string()))
    }

    /// Execute SQL synchronously
    fn execute_sync(&self, sql: &str) -> DbResult<()> {
        let conn = self.lock_conn()?;
        conn.execute(sql, [])
            .map_err(|e| DbError::execution(format!("{e}: {sql}")))?;
        Ok(())
    }

    /// Execute batch SQL synchronously
    fn execute_batch_sync(&self, sql: &str) -> DbResult<()> {
        let conn = self.lock_conn()?;
        conn.execute_batch(sql)?;
        Ok(())
    }

    /// Run statements inside one transaction, rolled back on the first failure
    fn execute_transaction_sync(&self, statements: &[String]) -> DbResult<()> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;
        for statement in statements {
            tx.execute_batch(statement)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Query rows synchronously
    fn query_sync(&self, sql: &str) -> DbResult<Vec<Row>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query([])?;

        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let width = row.as_ref().column_count();
            let mut values = Vec::with_capacity(width);
            for idx in 0..width {
                let value: DuckValue = row.get(idx)?;
                values.push(convert_value(value));
            }
            out.push(Row::new(values));
        }
        Ok(out)
    }
}

fn convert_value(value: DuckValue) -> Value {
    match value {
        DuckValue::Null => Value::Null,
        DuckValue::Boolean(b) => Value::Bool(b),
        DuckValue::TinyInt(v) => Value::Int(v.into()),
        DuckValue::SmallInt(v) => Value::Int(v.into()),
        DuckValue::Int(v) => Value::Int(v.into()),
        DuckValue::BigInt(v) => Value::Int(v),
        DuckValue::UTinyInt(v) => Value::Int(v.into()),
        DuckValue::USmallInt(v) => Value::Int(v.into()),
        DuckValue::UInt(v) => Value::Int(v.into()),
        DuckValue::UBigInt(v) => match i64::try_from(v) {
            Ok(v) => Value::Int(v),
            Err(_) => Value::Text(v.to_string()),
        },
        DuckValue::HugeInt(v) => match i64::try_from(v) {
            Ok(v) => Value::Int(v),
            Err(_) => Value::Text(v.to_string()),
        },
        DuckValue::Float(v) => Value::Float(v.into()),
        DuckValue::Double(v) => Value::Float(v),
        DuckValue::Text(s) => Value::Text(s),
        other => Value::Text(format!("{other:?}")),
    }
}

#[async_trait]
impl Database for DuckDbBackend {
    async fn execute(&self, sql: &str) -> DbResult<()> {
        self.execute_sync(sql)
    }

    async fn execute_batch(&self, sql: &str) -> DbResult<()> {
        self.execute_batch_sync(sql)
    }

    async fn execute_transaction(&self, statements: &[String]) -> DbResult<()> {
        self.execute_transaction_sync(statements)
    }

    async fn query(&self, sql: &str) -> DbResult<Vec<Row>> {
        self.query_sync(sql)
    }

    async fn acquire_advisory_lock(
        &self,
        name: &str,
        timeout: Duration,
    ) -> DbResult<AdvisoryLock> {
        self.locks.acquire(name, timeout).await
    }

    fn db_type(&self) -> &'static str {
        "duckdb"
    }
}

#[cfg(test)]
#[path = "duckdb_test.rs"]
mod tests;
