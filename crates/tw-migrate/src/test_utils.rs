//! Shared test helpers for tw-migrate and its dependents.
//!
//! [`FaultyDatabase`] wraps a real backend and injects failures, delays and
//! cancellation at chosen statements.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tw_core::{MemorySource, MigrationSource, MigrationStep};
use tw_db::{AdvisoryLock, Database, DbError, DbResult, DuckDbBackend, Row};

/// Database wrapper that misbehaves on demand
pub struct FaultyDatabase {
    inner: Arc<dyn Database>,
    fail_batches: Vec<String>,
    fail_store: Option<String>,
    fail_transactions: bool,
    delay: Option<(String, Duration)>,
    cancel: Option<(String, CancellationToken)>,
    cancel_transaction: Option<(String, CancellationToken)>,
    batches: Mutex<Vec<String>>,
}

impl FaultyDatabase {
    pub fn new(inner: Arc<dyn Database>) -> Self {
        Self {
            inner,
            fail_batches: Vec::new(),
            fail_store: None,
            fail_transactions: false,
            delay: None,
            cancel: None,
            cancel_transaction: None,
            batches: Mutex::new(Vec::new()),
        }
    }

    /// Fail any migration body containing `marker`
    pub fn fail_batch(mut self, marker: &str) -> Self {
        self.fail_batches.push(marker.to_string());
        self
    }

    /// Fail every non-batch statement mentioning `table`
    pub fn fail_store(mut self, table: &str) -> Self {
        self.fail_store = Some(table.to_string());
        self
    }

    /// Fail every transaction, i.e. every record write
    pub fn fail_transactions(mut self) -> Self {
        self.fail_transactions = true;
        self
    }

    /// Sleep before running a body containing `marker`
    pub fn delay_batch(mut self, marker: &str, delay: Duration) -> Self {
        self.delay = Some((marker.to_string(), delay));
        self
    }

    /// Cancel `token` right after a body containing `marker` has run
    pub fn cancel_after_batch(mut self, marker: &str, token: CancellationToken) -> Self {
        self.cancel = Some((marker.to_string(), token));
        self
    }

    /// Cancel `token` right after a transaction with a statement containing
    /// `marker` has committed
    pub fn cancel_after_transaction(mut self, marker: &str, token: CancellationToken) -> Self {
        self.cancel_transaction = Some((marker.to_string(), token));
        self
    }

    /// Migration bodies sent to the database, in order
    pub fn batches(&self) -> Vec<String> {
        self.batches.lock().unwrap().clone()
    }

    fn check_store(&self, sql: &str) -> DbResult<()> {
        match &self.fail_store {
            Some(table) if sql.contains(table.as_str()) => Err(DbError::ExecutionError {
                message: format!("insufficient privileges on {table}"),
                code: Some("003001".to_string()),
            }),
            _ => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl Database for FaultyDatabase {
    async fn execute(&self, sql: &str) -> DbResult<()> {
        self.check_store(sql)?;
        self.inner.execute(sql).await
    }

    async fn execute_batch(&self, sql: &str) -> DbResult<()> {
        self.batches.lock().unwrap().push(sql.to_string());
        if let Some((marker, delay)) = &self.delay {
            if sql.contains(marker.as_str()) {
                tokio::time::sleep(*delay).await;
            }
        }
        if self.fail_batches.iter().any(|m| sql.contains(m.as_str())) {
            return Err(DbError::ExecutionError {
                message: format!("injected failure: {sql}"),
                code: Some("001003".to_string()),
            });
        }
        self.inner.execute_batch(sql).await?;
        if let Some((marker, token)) = &self.cancel {
            if sql.contains(marker.as_str()) {
                token.cancel();
            }
        }
        Ok(())
    }

    async fn execute_transaction(&self, statements: &[String]) -> DbResult<()> {
        if self.fail_transactions {
            return Err(DbError::ConnectionError("connection reset".to_string()));
        }
        for statement in statements {
            self.check_store(statement)?;
        }
        self.inner.execute_transaction(statements).await?;
        if let Some((marker, token)) = &self.cancel_transaction {
            if statements.iter().any(|s| s.contains(marker.as_str())) {
                token.cancel();
            }
        }
        Ok(())
    }

    async fn query(&self, sql: &str) -> DbResult<Vec<Row>> {
        self.check_store(sql)?;
        self.inner.query(sql).await
    }

    async fn acquire_advisory_lock(&self, name: &str, timeout: Duration) -> DbResult<AdvisoryLock> {
        self.inner.acquire_advisory_lock(name, timeout).await
    }

    fn db_type(&self) -> &'static str {
        self.inner.db_type()
    }
}

/// Fresh in-memory DuckDB backend
pub fn memory_db() -> Arc<dyn Database> {
    Arc::new(DuckDbBackend::in_memory().unwrap())
}

/// Reversible steps at `versions`, each creating table `t<version>`
pub fn numbered_steps(versions: &[u64]) -> Vec<MigrationStep> {
    versions
        .iter()
        .map(|v| {
            MigrationStep::new(*v, format!("create_t{v}"), format!("CREATE TABLE t{v} (id INT);"))
                .with_down(format!("DROP TABLE t{v};"))
        })
        .collect()
}

/// Boxed in-memory source over `steps`
pub fn source_of(steps: Vec<MigrationStep>) -> Box<dyn MigrationSource> {
    Box::new(MemorySource::new(steps).unwrap())
}

/// Whether `table` exists in the session's default schema
pub async fn table_exists(db: &Arc<dyn Database>, table: &str) -> bool {
    let rows = db
        .query(&format!(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = '{table}'"
        ))
        .await
        .unwrap();
    rows[0].get(0).unwrap().as_i64() == Some(1)
}
