//! Goto command implementation

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use crate::cli::{GlobalArgs, GotoArgs};
use crate::commands::common::report_run;
use crate::context::RuntimeContext;

/// Execute the goto command: migrate up or down to one version
pub async fn execute(args: &GotoArgs, global: &GlobalArgs, cancel: &CancellationToken) -> Result<()> {
    let ctx = RuntimeContext::new(global, cancel)?;
    let result = ctx.migrator.goto(args.version).await?;
    report_run("goto", &result);
    Ok(())
}
