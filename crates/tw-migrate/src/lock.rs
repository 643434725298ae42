//! Lock manager serializing migration runs against one database+schema pair

use crate::error::{MigrateError, MigrateResult};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tw_db::{AdvisoryLock, Database};

/// Acquires the named migration lock through the driver
pub struct LockManager {
    db: Arc<dyn Database>,
    name: String,
    timeout: Duration,
}

/// Exclusive possession of the migration lock for one run.
///
/// Dropping the handle releases the lock, so every exit path gives it back.
#[derive(Debug)]
pub struct LockHandle {
    lock: AdvisoryLock,
    acquired_at: Instant,
}

impl LockHandle {
    pub fn name(&self) -> &str {
        self.lock.name()
    }

    pub fn is_released(&self) -> bool {
        self.lock.is_released()
    }
}

impl LockManager {
    pub fn new(db: Arc<dyn Database>, name: impl Into<String>, timeout: Duration) -> Self {
        Self {
            db,
            name: name.into(),
            timeout,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait up to the configured timeout for the lock
    pub async fn acquire(&self) -> MigrateResult<LockHandle> {
        log::debug!(
            "Acquiring migration lock '{}' (timeout {:?})",
            self.name,
            self.timeout
        );
        let lock = self
            .db
            .acquire_advisory_lock(&self.name, self.timeout)
            .await
            .map_err(MigrateError::from_lock)?;
        log::info!("Acquired migration lock '{}'", self.name);
        Ok(LockHandle {
            lock,
            acquired_at: Instant::now(),
        })
    }

    /// Give the lock back. Releasing twice is a no-op.
    pub fn release(&self, handle: &LockHandle) {
        if handle.lock.release() {
            log::info!(
                "Released migration lock '{}' after {:?}",
                handle.name(),
                handle.acquired_at.elapsed()
            );
        }
    }
}
