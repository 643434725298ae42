//! Version store: the single-row bookkeeping table inside the target database

use crate::error::{MigrateError, MigrateResult};
use crate::record::VersionRecord;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tw_db::{qualified_name, Database, DbError, Row, Value};

/// Reads and writes the [`VersionRecord`]
pub struct VersionStore {
    db: Arc<dyn Database>,
    table: String,
    created: AtomicBool,
}

impl VersionStore {
    /// Store backed by `table`, qualified with `schema` when given
    pub fn new(db: Arc<dyn Database>, schema: Option<&str>, table: &str) -> Self {
        Self {
            db,
            table: qualified_name(schema, table),
            created: AtomicBool::new(false),
        }
    }

    /// Quoted, qualified table name
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Create the table if absent, once per store. Concurrent creation is harmless.
    async fn ensure_table(&self) -> MigrateResult<()> {
        if self.created.load(Ordering::Acquire) {
            return Ok(());
        }
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (version BIGINT, dirty BOOLEAN NOT NULL)",
            self.table
        );
        self.db
            .execute(&sql)
            .await
            .map_err(|e| unavailable(format!("cannot create {}", self.table), e))?;
        self.created.store(true, Ordering::Release);
        Ok(())
    }

    /// Current record. An empty table reads as unset and clean.
    ///
    /// Outside the migration lock this is a snapshot that may already be stale.
    pub async fn read(&self) -> MigrateResult<VersionRecord> {
        self.ensure_table().await?;
        let sql = format!("SELECT version, dirty FROM {}", self.table);
        let rows = self
            .db
            .query(&sql)
            .await
            .map_err(|e| unavailable(format!("cannot read {}", self.table), e))?;

        if rows.len() > 1 {
            log::warn!(
                "{} holds {} rows, expected one; using the first",
                self.table,
                rows.len()
            );
        }
        match rows.first() {
            Some(row) => parse_record(row)
                .map_err(|e| unavailable(format!("unreadable row in {}", self.table), e)),
            None => Ok(VersionRecord::unset()),
        }
    }

    /// Make sure the table holds its row, inserting unset/clean into an empty table.
    /// Call with the migration lock held.
    pub async fn initialize(&self) -> MigrateResult<VersionRecord> {
        self.ensure_table().await?;
        let sql = format!(
            "INSERT INTO {table} (version, dirty) SELECT NULL, FALSE \
             WHERE NOT EXISTS (SELECT 1 FROM {table})",
            table = self.table
        );
        self.db
            .execute(&sql)
            .await
            .map_err(|e| unavailable(format!("cannot initialize {}", self.table), e))?;
        self.read().await
    }

    /// Replace the record in one transaction. Call with the migration lock held.
    pub async fn write(&self, version: Option<u64>, dirty: bool) -> MigrateResult<VersionRecord> {
        self.ensure_table().await?;
        let version_sql = match version {
            Some(version) => version.to_string(),
            None => "NULL".to_string(),
        };
        let statements = [
            format!("DELETE FROM {}", self.table),
            format!(
                "INSERT INTO {} (version, dirty) VALUES ({}, {})",
                self.table,
                version_sql,
                if dirty { "TRUE" } else { "FALSE" }
            ),
        ];
        self.db
            .execute_transaction(&statements)
            .await
            .map_err(|e| unavailable(format!("cannot write {}", self.table), e))?;

        let record = VersionRecord { version, dirty };
        log::debug!("Version record set to {}", record);
        Ok(record)
    }

    /// Flip the dirty flag, keeping the version
    pub async fn set_dirty(&self, current: VersionRecord, dirty: bool) -> MigrateResult<VersionRecord> {
        self.write(current.version, dirty).await
    }
}

fn unavailable(message: String, source: DbError) -> MigrateError {
    MigrateError::StoreUnavailable {
        message,
        record: None,
        source,
    }
}

fn parse_record(row: &Row) -> Result<VersionRecord, DbError> {
    let version = match row.get(0)? {
        Value::Null => None,
        // Other tools mark "no version" with -1
        Value::Int(v) if *v < 0 => None,
        Value::Int(v) => Some(*v as u64),
        Value::Text(s) => Some(s.trim().parse::<u64>().map_err(|_| {
            DbError::Internal(format!("version '{s}' is not an integer"))
        })?),
        other => {
            return Err(DbError::Internal(format!(
                "unexpected version value {other:?}"
            )))
        }
    };
    let dirty = row.get(1)?.as_bool().ok_or_else(|| {
        DbError::Internal("dirty flag is not a boolean".to_string())
    })?;
    Ok(VersionRecord { version, dirty })
}

#[cfg(test)]
#[path = "version_store_test.rs"]
mod tests;
