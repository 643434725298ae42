//! CLI argument definitions using clap derive API

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::str::FromStr;
use tw_core::{ConfigOverrides, DbType};

/// Tidewater - versioned schema migrations for DuckDB and Snowflake
#[derive(Parser, Debug)]
#[command(name = "tw")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute (default: up)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Global arguments available to all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Migration source, e.g. file://migrations
    #[arg(long, global = true, env = "TIDEWATER_SOURCE")]
    pub source: Option<String>,

    /// Target database (DuckDB: file path, Snowflake: database name)
    #[arg(long, global = true)]
    pub database: Option<String>,

    /// Schema holding the migrated objects and the bookkeeping table
    #[arg(long, global = true)]
    pub schema: Option<String>,

    /// Snowflake warehouse
    #[arg(long, global = true)]
    pub warehouse: Option<String>,

    /// Override config file path (default: tidewater.yml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Override connection type from the config file
    #[arg(long, global = true, value_enum)]
    pub connection_type: Option<ConnectionType>,

    /// Snowflake account identifier
    #[arg(long, global = true)]
    pub account: Option<String>,

    /// Bookkeeping table name
    #[arg(long, global = true)]
    pub migrations_table: Option<String>,

    /// Seconds to wait for the migration lock
    #[arg(long, global = true, value_name = "SECS")]
    pub lock_timeout: Option<u64>,

    /// Cancel the run after this many seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Log level or filter directive; RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value = "json")]
    pub log_format: LogFormat,
}

impl GlobalArgs {
    /// Flags that override the config file
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            source: self.source.clone(),
            connection_type: self.connection_type.map(DbType::from),
            database: self.database.clone(),
            schema: self.schema.clone(),
            warehouse: self.warehouse.clone(),
            account: self.account.clone(),
            migrations_table: self.migrations_table.clone(),
            lock_timeout_secs: self.lock_timeout,
            run_timeout_secs: self.timeout,
        }
    }
}

/// Connection types selectable on the command line
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionType {
    Duckdb,
    Snowflake,
}

impl From<ConnectionType> for DbType {
    fn from(value: ConnectionType) -> Self {
        match value {
            ConnectionType::Duckdb => DbType::DuckDb,
            ConnectionType::Snowflake => DbType::Snowflake,
        }
    }
}

/// Log output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line
    Json,
    /// Human-readable lines
    Text,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Apply all pending migrations
    Up,

    /// Revert applied migrations (one step unless --to or --all)
    Down(DownArgs),

    /// Migrate up or down to a specific version
    Goto(GotoArgs),

    /// Apply n pending migrations, or revert n when negative
    Steps(StepsArgs),

    /// Set the version record without running migrations, clearing the dirty flag
    Force(ForceArgs),

    /// Print the current version record
    Version,

    /// List migrations with their applied state
    Status(StatusArgs),
}

/// Arguments for the down command
#[derive(Args, Debug, Clone)]
pub struct DownArgs {
    /// Revert until this version is the current one
    #[arg(long, conflicts_with = "all")]
    pub to: Option<u64>,

    /// Revert every applied migration
    #[arg(long)]
    pub all: bool,
}

/// Arguments for the goto command
#[derive(Args, Debug, Clone)]
pub struct GotoArgs {
    /// Target version
    pub version: u64,
}

/// Arguments for the steps command
#[derive(Args, Debug, Clone)]
pub struct StepsArgs {
    /// Number of steps; negative reverts
    #[arg(allow_negative_numbers = true)]
    pub n: i64,
}

/// Arguments for the force command
#[derive(Args, Debug, Clone)]
pub struct ForceArgs {
    /// Version to record, or `none` for a fresh database
    pub version: ForceTarget,
}

/// Version accepted by `force`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForceTarget(pub Option<u64>);

impl FromStr for ForceTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "none" | "NONE" => Ok(ForceTarget(None)),
            other => other
                .parse()
                .map(|v| ForceTarget(Some(v)))
                .map_err(|_| format!("expected a version number or 'none', got '{other}'")),
        }
    }
}

/// Arguments for the status command
#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

/// Output formats for reporting commands
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;
