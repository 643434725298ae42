//! Force command implementation
//!
//! Recovery path for a dirty database: after repairing the schema by hand,
//! the operator records the version it now matches.

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use crate::cli::{ForceArgs, GlobalArgs};
use crate::commands::common::format_record;
use crate::context::RuntimeContext;

/// Execute the force command
pub async fn execute(args: &ForceArgs, global: &GlobalArgs, cancel: &CancellationToken) -> Result<()> {
    let ctx = RuntimeContext::new(global, cancel)?;
    let record = ctx.migrator.force(args.version.0).await?;
    tracing::info!(version = %format_record(&record), "Version forced");
    Ok(())
}
