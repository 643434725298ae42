//! Steps command implementation

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use crate::cli::{GlobalArgs, StepsArgs};
use crate::commands::common::report_run;
use crate::context::RuntimeContext;

/// Execute the steps command
pub async fn execute(args: &StepsArgs, global: &GlobalArgs, cancel: &CancellationToken) -> Result<()> {
    let ctx = RuntimeContext::new(global, cancel)?;
    let result = ctx.migrator.steps(args.n).await?;
    report_run("steps", &result);
    Ok(())
}
