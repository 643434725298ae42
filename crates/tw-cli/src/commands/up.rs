//! Up command implementation

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use crate::cli::GlobalArgs;
use crate::commands::common::report_run;
use crate::context::RuntimeContext;

/// Execute the up command: apply every pending migration
pub async fn execute(global: &GlobalArgs, cancel: &CancellationToken) -> Result<()> {
    let ctx = RuntimeContext::new(global, cancel)?;
    let result = ctx.migrator.up().await?;
    report_run("up", &result);
    Ok(())
}
