//! Tidewater CLI - versioned schema migrations for DuckDB and Snowflake

use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tw_core::CoreError;
use tw_db::DbError;
use tw_migrate::MigrateError;

mod cli;
mod commands;
mod context;
mod logging;

use cli::{Cli, Commands, GlobalArgs};
use commands::{down, force, goto, status, steps, up, version};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = logging::init(&cli.global.log_level, cli.global.log_format) {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    let cancel = CancellationToken::new();
    cancel_on_interrupt(cancel.clone());

    match dispatch(cli.command.as_ref(), &cli.global, &cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_error(&err);
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(
    command: Option<&Commands>,
    global: &GlobalArgs,
    cancel: &CancellationToken,
) -> Result<()> {
    match command {
        None | Some(Commands::Up) => up::execute(global, cancel).await,
        Some(Commands::Down(args)) => down::execute(args, global, cancel).await,
        Some(Commands::Goto(args)) => goto::execute(args, global, cancel).await,
        Some(Commands::Steps(args)) => steps::execute(args, global, cancel).await,
        Some(Commands::Force(args)) => force::execute(args, global, cancel).await,
        Some(Commands::Version) => version::execute(global, cancel).await,
        Some(Commands::Status(args)) => status::execute(args, global, cancel).await,
    }
}

/// First Ctrl-C stops the run after the step in flight
fn cancel_on_interrupt(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupt received, stopping after the current step");
            cancel.cancel();
        }
    });
}

/// Log the terminal error with its kind and the version record
fn report_error(err: &anyhow::Error) {
    let (kind, record) = if let Some(e) = err.downcast_ref::<MigrateError>() {
        let record = e
            .record()
            .map(|r| r.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        (e.kind(), record)
    } else if let Some(e) = err.downcast_ref::<CoreError>() {
        (e.kind(), "unknown".to_string())
    } else if let Some(e) = err.downcast_ref::<DbError>() {
        (e.kind(), "unknown".to_string())
    } else {
        ("internal", "unknown".to_string())
    };
    tracing::error!(kind, record = %record, error = %format!("{err:#}"), "Migration run failed");
}
