//! Version command implementation

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use crate::cli::GlobalArgs;
use crate::commands::common::format_record;
use crate::context::RuntimeContext;

/// Execute the version command: print the record without taking the lock
pub async fn execute(global: &GlobalArgs, cancel: &CancellationToken) -> Result<()> {
    let ctx = RuntimeContext::new(global, cancel)?;
    let record = ctx.migrator.version().await?;
    println!("{}", format_record(&record));
    Ok(())
}
