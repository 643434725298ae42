//! Error types for tw-migrate
//!
//! Every fatal error carries the version record as it stood when the run
//! stopped, or `unknown` when the store could not be read.

use crate::record::VersionRecord;
use std::time::Duration;
use thiserror::Error;
use tw_db::DbError;

/// Migration engine errors
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Bookkeeping table could not be created, read or written (M001)
    #[error("[M001] Version store unavailable: {message} (record: {}): {source}", snapshot(.record))]
    StoreUnavailable {
        message: String,
        record: Option<VersionRecord>,
        #[source]
        source: DbError,
    },

    /// Migration lock not obtained within the bounded wait (M002)
    #[error("[M002] Timed out after {waited:?} waiting for migration lock '{name}' (record: {})", snapshot(.record))]
    LockTimeout {
        name: String,
        waited: Duration,
        record: Option<VersionRecord>,
    },

    /// Record is dirty; an operator must repair the schema and force a version (M003)
    #[error("[M003] Database is dirty at {record}; fix the schema manually, then force a version")]
    DirtyDatabase { record: VersionRecord },

    /// A migration body failed; the record is left dirty (M004)
    #[error("[M004] Migration {version}_{identifier} failed (record: {record}): {cause}")]
    StepFailed {
        version: u64,
        identifier: String,
        record: VersionRecord,
        #[source]
        cause: DbError,
    },

    /// Run stopped by the caller's cancellation (M005)
    #[error("[M005] Migration run cancelled (record: {})", snapshot(.record))]
    Cancelled { record: Option<VersionRecord> },

    /// Requested version is not in the migration source (M006)
    #[error("[M006] Version {version} is not in the migration source (record: {record})")]
    UnknownVersion { version: u64, record: VersionRecord },

    /// Requested movement cannot be satisfied (M007)
    #[error("[M007] {message} (record: {record})")]
    InvalidTarget {
        message: String,
        record: VersionRecord,
    },

    /// A step that would have to be reverted has no down body (M008)
    #[error("[M008] Migration {version} has no down migration (record: {record})")]
    IrreversibleStep { version: u64, record: VersionRecord },

    /// Driver failure outside step execution and store access (M009)
    #[error("[M009] Database error (record: {}): {source}", snapshot(.record))]
    Database {
        record: Option<VersionRecord>,
        #[source]
        source: DbError,
    },
}

fn snapshot(record: &Option<VersionRecord>) -> String {
    match record {
        Some(record) => record.to_string(),
        None => "unknown".to_string(),
    }
}

impl MigrateError {
    /// Short machine-readable kind, used as a structured log field
    pub fn kind(&self) -> &'static str {
        match self {
            MigrateError::StoreUnavailable { .. } => "store_unavailable",
            MigrateError::LockTimeout { .. } => "lock_timeout",
            MigrateError::DirtyDatabase { .. } => "dirty_database",
            MigrateError::StepFailed { .. } => "step_failed",
            MigrateError::Cancelled { .. } => "cancelled",
            MigrateError::UnknownVersion { .. } => "unknown_version",
            MigrateError::InvalidTarget { .. } => "invalid_target",
            MigrateError::IrreversibleStep { .. } => "irreversible_step",
            MigrateError::Database { .. } => "database",
        }
    }

    /// Record state at the time of failure, when known
    pub fn record(&self) -> Option<VersionRecord> {
        match self {
            MigrateError::StoreUnavailable { record, .. }
            | MigrateError::LockTimeout { record, .. }
            | MigrateError::Cancelled { record }
            | MigrateError::Database { record, .. } => *record,
            MigrateError::DirtyDatabase { record }
            | MigrateError::StepFailed { record, .. }
            | MigrateError::UnknownVersion { record, .. }
            | MigrateError::InvalidTarget { record, .. }
            | MigrateError::IrreversibleStep { record, .. } => Some(*record),
        }
    }

    /// Fill in the record on errors raised before it was known
    pub fn with_record(mut self, known: VersionRecord) -> Self {
        match &mut self {
            MigrateError::StoreUnavailable { record, .. }
            | MigrateError::LockTimeout { record, .. }
            | MigrateError::Cancelled { record }
            | MigrateError::Database { record, .. } => {
                record.get_or_insert(known);
            }
            _ => {}
        }
        self
    }

    /// Map a driver error raised while taking the lock
    pub(crate) fn from_lock(err: DbError) -> Self {
        match err {
            DbError::LockTimeout { name, waited } => MigrateError::LockTimeout {
                name,
                waited,
                record: None,
            },
            source => MigrateError::Database {
                record: None,
                source,
            },
        }
    }
}

/// Result type alias for MigrateError
pub type MigrateResult<T> = Result<T, MigrateError>;

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
