//! tw-migrate - Migration engine for Tidewater
//!
//! Applies versioned migrations from a [`MigrationSource`](tw_core::MigrationSource)
//! to a [`Database`](tw_db::Database), one step at a time, under an advisory
//! lock. Progress is kept in a single-row bookkeeping table holding the
//! current version and a dirty flag; a step that does not finish leaves the
//! record dirty and blocks further runs until an operator forces a version.

pub mod error;
pub mod lock;
pub mod migrator;
pub mod record;
#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
pub mod version_store;

pub use error::{MigrateError, MigrateResult};
pub use lock::{LockHandle, LockManager};
pub use migrator::{MigrationStatus, Migrator, MigratorOptions, StepStatus};
pub use record::{RunResult, VersionRecord};
pub use version_store::VersionStore;
