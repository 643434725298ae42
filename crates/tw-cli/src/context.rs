//! Runtime context for CLI commands

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tw_core::{open_source, Config, ConnectionConfig};
use tw_db::{Database, DuckDbBackend, SnowflakeBackend};
use tw_migrate::{Migrator, MigratorOptions};

use crate::cli::GlobalArgs;

/// Environment variable holding the Snowflake access token
pub const SNOWFLAKE_TOKEN_VAR: &str = "SNOWFLAKE_TOKEN";

/// Environment variable selecting the token type (default `OAUTH`)
pub const SNOWFLAKE_TOKEN_TYPE_VAR: &str = "SNOWFLAKE_TOKEN_TYPE";

/// Migrator wired to the configured source and target database
pub struct RuntimeContext {
    pub migrator: Migrator,
}

impl RuntimeContext {
    /// Load config, open the source, connect, and arm the run deadline
    pub fn new(args: &GlobalArgs, cancel: &CancellationToken) -> Result<Self> {
        let config = load_config(args)?;

        let uri = config.source_uri()?;
        let source = open_source(uri).with_context(|| format!("Failed to open migration source {uri}"))?;
        log::info!(
            "Loaded {} migration(s) from {}",
            source.list().len(),
            source.describe()
        );

        let db = connect(&config)?;
        log::info!(
            "Connected to {} database {}",
            db.db_type(),
            config.connection.database().unwrap_or("(default)")
        );

        if let Some(deadline) = config.run_timeout() {
            let token = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                log::warn!("Run timeout of {:?} reached, cancelling", deadline);
                token.cancel();
            });
        }

        let migrator = Migrator::new(db, source, &MigratorOptions::from_config(&config))
            .with_cancellation(cancel.clone());
        Ok(Self { migrator })
    }
}

/// Config file plus command-line overrides, validated
pub fn load_config(args: &GlobalArgs) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(Path::new(path))
            .with_context(|| format!("Failed to load configuration file {path}"))?,
        None => Config::load_from_dir(Path::new(".")).context("Failed to load configuration")?,
    };
    config.apply_overrides(args.overrides());
    config.validate()?;
    Ok(config)
}

/// Open the configured backend
pub fn connect(config: &Config) -> Result<Arc<dyn Database>> {
    match &config.connection {
        ConnectionConfig::DuckDb(duck) => {
            let mut backend = DuckDbBackend::new(&duck.path)
                .with_context(|| format!("Failed to open DuckDB database {}", duck.path))?;
            if let Some(schema) = &duck.schema {
                backend = backend.with_schema(schema)?;
            }
            Ok(Arc::new(backend))
        }
        ConnectionConfig::Snowflake(snow) => {
            let token = std::env::var(SNOWFLAKE_TOKEN_VAR)
                .with_context(|| format!("{SNOWFLAKE_TOKEN_VAR} must be set for Snowflake connections"))?;
            let mut backend = SnowflakeBackend::new(snow, token)?;
            if let Ok(token_type) = std::env::var(SNOWFLAKE_TOKEN_TYPE_VAR) {
                backend = backend.with_token_type(token_type);
            }
            Ok(Arc::new(backend))
        }
    }
}

#[cfg(test)]
#[path = "context_test.rs"]
mod tests;
