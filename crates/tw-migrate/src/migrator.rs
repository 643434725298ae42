//! Migration engine.
//!
//! Every mutating operation runs as one critical section:
//! acquire the lock, initialize and read the record, refuse a dirty record,
//! apply steps one at a time, release the lock. Each step is bracketed by two
//! record writes: dirty at the current version before the body runs, clean at
//! the step's target once the driver acknowledged the body. A failure in
//! between leaves the record dirty at the last clean version.

use crate::error::{MigrateError, MigrateResult};
use crate::lock::{LockHandle, LockManager};
use crate::record::{RunResult, VersionRecord};
use crate::version_store::VersionStore;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tw_core::config::{DEFAULT_LOCK_TIMEOUT_SECS, DEFAULT_MIGRATIONS_TABLE};
use tw_core::{is_blank_body, Config, Direction, MigrationSource, MigrationStep};
use tw_db::Database;

/// Engine settings, derived from [`Config`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigratorOptions {
    /// Bookkeeping table name
    pub table: String,
    /// Schema qualifying the table; `None` uses the session default
    pub schema: Option<String>,
    /// Advisory lock name for this database+schema pair
    pub lock_name: String,
    /// Bound on waiting for the lock
    pub lock_timeout: Duration,
}

impl Default for MigratorOptions {
    fn default() -> Self {
        Self {
            table: DEFAULT_MIGRATIONS_TABLE.to_string(),
            schema: None,
            lock_name: format!("tidewater:{DEFAULT_MIGRATIONS_TABLE}"),
            lock_timeout: Duration::from_secs(DEFAULT_LOCK_TIMEOUT_SECS),
        }
    }
}

impl MigratorOptions {
    /// Options for a configured run. Backends already default their session to
    /// the configured schema, so the table is left unqualified.
    pub fn from_config(config: &Config) -> Self {
        Self {
            table: config.migrations_table.clone(),
            schema: None,
            lock_name: config.lock_name(),
            lock_timeout: config.lock_timeout(),
        }
    }
}

/// Applied/pending state of one source step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepStatus {
    pub version: u64,
    pub identifier: String,
    pub applied: bool,
    pub reversible: bool,
}

/// Snapshot of the record and every step in the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    pub record: VersionRecord,
    pub steps: Vec<StepStatus>,
}

impl MigrationStatus {
    /// Number of steps not yet applied
    pub fn pending(&self) -> usize {
        self.steps.iter().filter(|s| !s.applied).count()
    }
}

/// One step of a run plan and the version recorded once it succeeds
struct Planned<'a> {
    step: &'a MigrationStep,
    target: Option<u64>,
}

impl<'a> Planned<'a> {
    fn up(step: &'a MigrationStep) -> Self {
        Self {
            step,
            target: Some(step.version),
        }
    }
}

/// Orchestrates migration runs against one database
pub struct Migrator {
    db: Arc<dyn Database>,
    source: Box<dyn MigrationSource>,
    store: VersionStore,
    locks: LockManager,
    cancel: CancellationToken,
}

impl Migrator {
    pub fn new(
        db: Arc<dyn Database>,
        source: Box<dyn MigrationSource>,
        options: &MigratorOptions,
    ) -> Self {
        let store = VersionStore::new(Arc::clone(&db), options.schema.as_deref(), &options.table);
        let locks = LockManager::new(Arc::clone(&db), &options.lock_name, options.lock_timeout);
        Self {
            db,
            source,
            store,
            locks,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop runs when `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn store(&self) -> &VersionStore {
        &self.store
    }

    /// Apply every pending step in ascending order
    pub async fn up(&self) -> MigrateResult<RunResult> {
        self.locked("up", false, |record| async move {
            let plan = self.pending_after(record.version).map(Planned::up).collect();
            self.run(record, plan, Direction::Up).await
        })
        .await
    }

    /// Revert steps in descending order until the record reaches `target`
    /// (`None` reverts everything)
    pub async fn down(&self, target: Option<u64>) -> MigrateResult<RunResult> {
        self.locked("down", false, |record| async move {
            let plan = self.plan_down(record, target, None)?;
            self.run(record, plan, Direction::Down).await
        })
        .await
    }

    /// Migrate up or down to exactly `target`
    pub async fn goto(&self, target: u64) -> MigrateResult<RunResult> {
        self.locked("goto", false, |record| async move {
            self.known_step(target, record)?;
            if record.version.is_some_and(|current| current >= target) {
                let plan = self.plan_down(record, Some(target), None)?;
                return self.run(record, plan, Direction::Down).await;
            }
            let plan = self
                .pending_after(record.version)
                .take_while(|step| step.version <= target)
                .map(Planned::up)
                .collect();
            self.run(record, plan, Direction::Up).await
        })
        .await
    }

    /// Apply `n` pending steps, or revert `|n|` applied steps when `n` is negative
    pub async fn steps(&self, n: i64) -> MigrateResult<RunResult> {
        self.locked("steps", false, |record| async move {
            let count = n.unsigned_abs() as usize;
            if n >= 0 {
                let plan: Vec<Planned> = self
                    .pending_after(record.version)
                    .take(count)
                    .map(Planned::up)
                    .collect();
                if plan.len() < count {
                    return Err(MigrateError::InvalidTarget {
                        message: format!("cannot apply {count} steps, only {} pending", plan.len()),
                        record,
                    });
                }
                self.run(record, plan, Direction::Up).await
            } else {
                let plan = self.plan_down(record, None, Some(count))?;
                if plan.len() < count {
                    return Err(MigrateError::InvalidTarget {
                        message: format!("cannot revert {count} steps, only {} applied", plan.len()),
                        record,
                    });
                }
                self.run(record, plan, Direction::Down).await
            }
        })
        .await
    }

    /// Overwrite the record with a clean `version` without running anything.
    /// The operator's way out of a dirty database.
    pub async fn force(&self, version: Option<u64>) -> MigrateResult<VersionRecord> {
        self.locked("force", true, |record| async move {
            if let Some(version) = version {
                if self.source.get(version).is_err() {
                    log::warn!(
                        "Forcing version {} which is not in {}",
                        version,
                        self.source.describe()
                    );
                }
            }
            let forced = self
                .interruptible(Some(record), self.store.write(version, false))
                .await?;
            log::warn!("Forced version record from {} to {}", record, forced);
            Ok(forced)
        })
        .await
    }

    /// Current record without taking the lock; may be stale
    pub async fn version(&self) -> MigrateResult<VersionRecord> {
        self.interruptible(None, self.store.read()).await
    }

    /// Current record plus every source step tagged applied or pending.
    /// Unlocked, like [`version`](Self::version).
    pub async fn status(&self) -> MigrateResult<MigrationStatus> {
        let record = self.version().await?;
        let steps = self
            .source
            .list()
            .iter()
            .map(|step| StepStatus {
                version: step.version,
                identifier: step.identifier.clone(),
                applied: record.version.is_some_and(|current| step.version <= current),
                reversible: step.has_down(),
            })
            .collect();
        Ok(MigrationStatus { record, steps })
    }

    /// Run `body` inside the critical section. The lock is released on every
    /// exit path; dropping the handle covers panics and aborted tasks.
    async fn locked<T, F, Fut>(&self, operation: &str, allow_dirty: bool, body: F) -> MigrateResult<T>
    where
        F: FnOnce(VersionRecord) -> Fut,
        Fut: Future<Output = MigrateResult<T>>,
    {
        let handle = self.acquire_lock().await?;
        let result = match self.begin(operation, allow_dirty).await {
            Ok(record) => body(record).await,
            Err(err) => Err(err),
        };
        self.locks.release(&handle);
        result
    }

    async fn acquire_lock(&self) -> MigrateResult<LockHandle> {
        match self.interruptible(None, self.locks.acquire()).await {
            Err(err @ (MigrateError::LockTimeout { .. } | MigrateError::Cancelled { .. })) => {
                Err(self.attach_stored_record(err).await)
            }
            other => other,
        }
    }

    async fn begin(&self, operation: &str, allow_dirty: bool) -> MigrateResult<VersionRecord> {
        let record = match self.interruptible(None, self.store.initialize()).await {
            Ok(record) => record,
            Err(err @ MigrateError::Cancelled { .. }) => {
                return Err(self.attach_stored_record(err).await)
            }
            Err(err) => return Err(err),
        };
        log::info!(
            "Starting {} at {} with {} migration(s) from {}",
            operation,
            record,
            self.source.list().len(),
            self.source.describe()
        );
        if record.dirty && !allow_dirty {
            return Err(MigrateError::DirtyDatabase { record });
        }
        Ok(record)
    }

    /// Best-effort read of the record for an error raised before it was known
    async fn attach_stored_record(&self, err: MigrateError) -> MigrateError {
        match self.store.read().await {
            Ok(record) => err.with_record(record),
            Err(_) => err,
        }
    }

    /// Await `operation` unless cancellation comes first
    async fn interruptible<T>(
        &self,
        record: Option<VersionRecord>,
        operation: impl Future<Output = MigrateResult<T>>,
    ) -> MigrateResult<T> {
        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(MigrateError::Cancelled { record: None }),
            result = operation => result,
        };
        match record {
            Some(record) => result.map_err(|e| e.with_record(record)),
            None => result,
        }
    }

    fn pending_after(&self, version: Option<u64>) -> impl Iterator<Item = &MigrationStep> + '_ {
        self.source
            .list()
            .iter()
            .filter(move |step| version.map_or(true, |current| step.version > current))
    }

    fn known_step(&self, version: u64, record: VersionRecord) -> MigrateResult<&MigrationStep> {
        self.source
            .get(version)
            .map_err(|_| MigrateError::UnknownVersion { version, record })
    }

    /// Steps to revert from the current version down to `target`, at most
    /// `limit` of them. Fails before anything runs if one is irreversible.
    fn plan_down(
        &self,
        record: VersionRecord,
        target: Option<u64>,
        limit: Option<usize>,
    ) -> MigrateResult<Vec<Planned<'_>>> {
        let Some(current) = record.version else {
            return Ok(Vec::new());
        };
        if let Some(target) = target {
            if target > current {
                return Err(MigrateError::InvalidTarget {
                    message: format!(
                        "cannot migrate down to {target}, it is above the current version {current}"
                    ),
                    record,
                });
            }
            self.known_step(target, record)?;
        }

        let mut plan = Vec::new();
        let mut version = current;
        while Some(version) != target && limit.map_or(true, |limit| plan.len() < limit) {
            let step = self.known_step(version, record)?;
            if !step.has_down() {
                return Err(MigrateError::IrreversibleStep { version, record });
            }
            let previous = self.source.prev(version).map(|step| step.version);
            plan.push(Planned {
                step,
                target: previous,
            });
            match previous {
                Some(previous) => version = previous,
                None => break,
            }
        }
        Ok(plan)
    }

    async fn run(
        &self,
        mut record: VersionRecord,
        plan: Vec<Planned<'_>>,
        direction: Direction,
    ) -> MigrateResult<RunResult> {
        if plan.is_empty() {
            log::info!("Database is already up-to-date at {}", record);
            return Ok(RunResult::no_change(record.version));
        }

        let mut applied = Vec::with_capacity(plan.len());
        for planned in plan {
            record = self
                .apply_step(record, planned.step, direction, planned.target)
                .await?;
            applied.push(planned.step.version);
        }
        log::info!(
            "Migrated {} {} step(s), now at {}",
            direction,
            applied.len(),
            record
        );
        Ok(RunResult::applied(applied, record.version))
    }

    async fn apply_step(
        &self,
        record: VersionRecord,
        step: &MigrationStep,
        direction: Direction,
        target: Option<u64>,
    ) -> MigrateResult<VersionRecord> {
        if self.cancel.is_cancelled() {
            return Err(MigrateError::Cancelled {
                record: Some(record),
            });
        }
        let body = step
            .body(direction)
            .ok_or(MigrateError::IrreversibleStep {
                version: step.version,
                record,
            })?;

        let dirty = self
            .interruptible(Some(record), self.store.set_dirty(record, true))
            .await?;
        if self.cancel.is_cancelled() {
            return Err(MigrateError::Cancelled {
                record: Some(dirty),
            });
        }

        let started = Instant::now();
        if is_blank_body(body) {
            log::info!("Recording empty migration {} ({})", step.label(), direction);
        } else {
            log::info!("Applying migration {} ({})", step.label(), direction);
            if let Err(cause) = self.db.execute_batch(body).await {
                log::error!(
                    "Migration {} ({}) failed after {:?}, record left at {}",
                    step.label(),
                    direction,
                    started.elapsed(),
                    dirty
                );
                return Err(MigrateError::StepFailed {
                    version: step.version,
                    identifier: step.identifier.clone(),
                    record: dirty,
                    cause,
                });
            }
        }

        // Once the body has run its clean record is written, cancelled or not
        let clean = self
            .store
            .write(target, false)
            .await
            .map_err(|e| e.with_record(dirty))?;
        log::info!(
            "Migrated {} ({}) in {:?}",
            step.label(),
            direction,
            started.elapsed()
        );
        Ok(clean)
    }
}

#[cfg(test)]
#[path = "migrator_test.rs"]
mod tests;
