//! Down command implementation

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use crate::cli::{DownArgs, GlobalArgs};
use crate::commands::common::report_run;
use crate::context::RuntimeContext;

/// Execute the down command
pub async fn execute(args: &DownArgs, global: &GlobalArgs, cancel: &CancellationToken) -> Result<()> {
    let ctx = RuntimeContext::new(global, cancel)?;
    let result = match (args.to, args.all) {
        (Some(target), _) => ctx.migrator.down(Some(target)).await?,
        (None, true) => ctx.migrator.down(None).await?,
        (None, false) => ctx.migrator.steps(-1).await?,
    };
    report_run("down", &result);
    Ok(())
}
