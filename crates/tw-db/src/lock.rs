//! Process-scoped advisory locks.
//!
//! Backends connected to the same database share one [`LockRegistry`] (see
//! [`LockRegistry::shared`]), so every backend instance in the process
//! competes for the same named locks. A lock lives exactly as long as its
//! [`AdvisoryLock`] guard, so a task that panics or is aborted never leaves an
//! orphaned lock behind. Other processes do not see these locks.

use crate::error::{DbError, DbResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);
const MAX_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Registries keyed by the database they guard
static SHARED: OnceLock<Mutex<HashMap<String, Arc<LockRegistry>>>> = OnceLock::new();

/// Named locks currently held, each tagged with its owner's token
#[derive(Debug, Default)]
pub struct LockRegistry {
    held: Mutex<HashMap<String, Uuid>>,
}

impl LockRegistry {
    /// Private registry, for a database no other backend can reach
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registry shared by every backend connected to the database `key`
    pub fn shared(key: &str) -> Arc<Self> {
        let mut registries = SHARED
            .get_or_init(Default::default)
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(registries.entry(key.to_string()).or_insert_with(Self::new))
    }

    /// Wait up to `timeout` for `name`, polling with exponential back-off
    pub async fn acquire(self: &Arc<Self>, name: &str, timeout: Duration) -> DbResult<AdvisoryLock> {
        let started = Instant::now();
        let deadline = started + timeout;
        let mut delay = MIN_POLL_INTERVAL;

        loop {
            if let Some(token) = self.try_acquire(name)? {
                log::debug!("Advisory lock '{}' acquired", name);
                return Ok(AdvisoryLock {
                    name: name.to_string(),
                    token,
                    registry: Arc::clone(self),
                    released: AtomicBool::new(false),
                });
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(DbError::LockTimeout {
                    name: name.to_string(),
                    waited: started.elapsed(),
                });
            }
            tokio::time::sleep(delay.min(deadline - now)).await;
            delay = (delay * 2).min(MAX_POLL_INTERVAL);
        }
    }

    /// Take `name` if free, returning the new owner token
    pub fn try_acquire(&self, name: &str) -> DbResult<Option<Uuid>> {
        let mut held = self
            .held
            .lock()
            .map_err(|e| DbError::MutexPoisoned(e.to_string()))?;
        if held.contains_key(name) {
            return Ok(None);
        }
        let token = Uuid::new_v4();
        held.insert(name.to_string(), token);
        Ok(Some(token))
    }

    /// Whether anyone holds `name`
    pub fn is_held(&self, name: &str) -> bool {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Free `name` if `token` still owns it. Returns whether anything was freed.
    fn release(&self, name: &str, token: Uuid) -> bool {
        // Called from Drop: recover a poisoned map instead of reporting it.
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        if held.get(name) == Some(&token) {
            held.remove(name);
            true
        } else {
            false
        }
    }
}

/// Exclusive possession of one named lock.
///
/// Released by [`release`](Self::release) or on drop, whichever comes first.
#[derive(Debug)]
pub struct AdvisoryLock {
    name: String,
    token: Uuid,
    registry: Arc<LockRegistry>,
    released: AtomicBool,
}

impl AdvisoryLock {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Give the lock back. Idempotent: later calls are no-ops.
    pub fn release(&self) -> bool {
        if self.released.swap(true, Ordering::AcqRel) {
            return false;
        }
        let freed = self.registry.release(&self.name, self.token);
        if freed {
            log::debug!("Advisory lock '{}' released", self.name);
        }
        freed
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}

impl Drop for AdvisoryLock {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
#[path = "lock_test.rs"]
mod tests;
