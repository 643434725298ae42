//! Configuration types and parsing for tidewater.yml

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default name of the bookkeeping table
pub const DEFAULT_MIGRATIONS_TABLE: &str = "schema_migrations";

/// Default bound on waiting for the migration lock
pub const DEFAULT_LOCK_TIMEOUT_SECS: u64 = 15;

/// Config file names looked up in the working directory, in order
pub const CONFIG_FILE_NAMES: &[&str] = &["tidewater.yml", "tidewater.yaml"];

/// Run configuration, built once and passed into the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Migration source URI (`file://<dir>`); required once overrides are applied
    #[serde(default)]
    pub source: Option<String>,

    /// Bookkeeping table holding the version record
    #[serde(default = "default_migrations_table")]
    pub migrations_table: String,

    /// Seconds to wait for the migration lock before giving up
    #[serde(default = "default_lock_timeout_secs")]
    pub lock_timeout_secs: u64,

    /// Optional overall deadline for a run, in seconds
    #[serde(default)]
    pub run_timeout_secs: Option<u64>,

    /// Target database connection
    #[serde(default)]
    pub connection: ConnectionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: None,
            migrations_table: default_migrations_table(),
            lock_timeout_secs: default_lock_timeout_secs(),
            run_timeout_secs: None,
            connection: ConnectionConfig::default(),
        }
    }
}

fn default_migrations_table() -> String {
    DEFAULT_MIGRATIONS_TABLE.to_string()
}

fn default_lock_timeout_secs() -> u64 {
    DEFAULT_LOCK_TIMEOUT_SECS
}

fn default_duckdb_path() -> String {
    ":memory:".to_string()
}

/// Database type selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DbType {
    /// DuckDB (default)
    #[default]
    DuckDb,
    /// Snowflake
    Snowflake,
}

impl std::fmt::Display for DbType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DbType::DuckDb => write!(f, "duckdb"),
            DbType::Snowflake => write!(f, "snowflake"),
        }
    }
}

/// Connection settings, tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ConnectionConfig {
    /// Local or in-memory DuckDB database
    DuckDb(DuckDbConfig),
    /// Snowflake account reached through the SQL API
    Snowflake(SnowflakeConfig),
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig::DuckDb(DuckDbConfig::default())
    }
}

impl ConnectionConfig {
    /// Empty connection settings for the given type
    pub fn for_type(db_type: DbType) -> Self {
        match db_type {
            DbType::DuckDb => ConnectionConfig::DuckDb(DuckDbConfig::default()),
            DbType::Snowflake => ConnectionConfig::Snowflake(SnowflakeConfig::default()),
        }
    }

    /// Type of this connection
    pub fn db_type(&self) -> DbType {
        match self {
            ConnectionConfig::DuckDb(_) => DbType::DuckDb,
            ConnectionConfig::Snowflake(_) => DbType::Snowflake,
        }
    }

    /// Schema migrations run in, if one is set
    pub fn schema(&self) -> Option<&str> {
        match self {
            ConnectionConfig::DuckDb(c) => c.schema.as_deref(),
            ConnectionConfig::Snowflake(c) => c.schema.as_deref(),
        }
    }

    /// Database the migrations target (DuckDB file path or Snowflake database)
    pub fn database(&self) -> Option<&str> {
        match self {
            ConnectionConfig::DuckDb(c) => Some(c.path.as_str()),
            ConnectionConfig::Snowflake(c) => c.database.as_deref(),
        }
    }
}

/// DuckDB connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DuckDbConfig {
    /// Database file path, or `:memory:`
    #[serde(default = "default_duckdb_path")]
    pub path: String,

    /// Default schema, created if missing
    #[serde(default)]
    pub schema: Option<String>,
}

impl Default for DuckDbConfig {
    fn default() -> Self {
        Self {
            path: default_duckdb_path(),
            schema: None,
        }
    }
}

/// Snowflake connection settings.
///
/// The access token is never read from the config file; it comes from the
/// `SNOWFLAKE_TOKEN` environment variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct SnowflakeConfig {
    /// Account identifier, e.g. `xy12345.eu-central-1`
    #[serde(default)]
    pub account: String,

    /// Database for the session
    #[serde(default)]
    pub database: Option<String>,

    /// Schema for the session
    #[serde(default)]
    pub schema: Option<String>,

    /// Warehouse executing the statements
    #[serde(default)]
    pub warehouse: Option<String>,

    /// Role for the session
    #[serde(default)]
    pub role: Option<String>,

    /// Override of `https://<account>.snowflakecomputing.com`
    #[serde(default)]
    pub base_url: Option<String>,

    /// Server-side timeout for each statement, in seconds
    #[serde(default)]
    pub statement_timeout_secs: Option<u64>,
}

impl SnowflakeConfig {
    /// Base URL of the SQL API for this account
    pub fn api_base_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}.snowflakecomputing.com", self.account),
        }
    }
}

/// Command-line overrides applied on top of the file configuration
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub source: Option<String>,
    pub connection_type: Option<DbType>,
    pub database: Option<String>,
    pub schema: Option<String>,
    pub warehouse: Option<String>,
    pub account: Option<String>,
    pub migrations_table: Option<String>,
    pub lock_timeout_secs: Option<u64>,
    pub run_timeout_secs: Option<u64>,
}

impl Config {
    /// Load configuration from a file path
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load `tidewater.yml` (or `.yaml`) from `dir`, falling back to defaults
    /// when neither exists
    pub fn load_from_dir(dir: &Path) -> CoreResult<Self> {
        for name in CONFIG_FILE_NAMES {
            let path = dir.join(name);
            if path.exists() {
                log::debug!("Loading config from {}", path.display());
                return Self::load(&path);
            }
        }
        Ok(Self::default())
    }

    /// Apply command-line overrides field by field
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(source) = overrides.source {
            self.source = Some(source);
        }
        if let Some(table) = overrides.migrations_table {
            self.migrations_table = table;
        }
        if let Some(secs) = overrides.lock_timeout_secs {
            self.lock_timeout_secs = secs;
        }
        if overrides.run_timeout_secs.is_some() {
            self.run_timeout_secs = overrides.run_timeout_secs;
        }
        if let Some(db_type) = overrides.connection_type {
            if db_type != self.connection.db_type() {
                self.connection = ConnectionConfig::for_type(db_type);
            }
        }

        match &mut self.connection {
            ConnectionConfig::DuckDb(duck) => {
                if let Some(path) = overrides.database {
                    duck.path = path;
                }
                if overrides.schema.is_some() {
                    duck.schema = overrides.schema;
                }
                if overrides.warehouse.is_some() {
                    log::warn!("--warehouse has no effect on a DuckDB connection");
                }
                if overrides.account.is_some() {
                    log::warn!("--account has no effect on a DuckDB connection");
                }
            }
            ConnectionConfig::Snowflake(snow) => {
                if overrides.database.is_some() {
                    snow.database = overrides.database;
                }
                if overrides.schema.is_some() {
                    snow.schema = overrides.schema;
                }
                if overrides.warehouse.is_some() {
                    snow.warehouse = overrides.warehouse;
                }
                if let Some(account) = overrides.account {
                    snow.account = account;
                }
            }
        }
    }

    /// Validate the configuration once all overrides are in
    pub fn validate(&self) -> CoreResult<()> {
        match self.source.as_deref() {
            None => {
                return Err(CoreError::ConfigInvalid {
                    message: "source is required (pass --source or set `source` in tidewater.yml)"
                        .to_string(),
                });
            }
            Some(s) if s.trim().is_empty() => {
                return Err(CoreError::ConfigInvalid {
                    message: "source must not be empty".to_string(),
                });
            }
            Some(_) => {}
        }

        validate_identifier("migrations_table", &self.migrations_table)?;
        if let Some(schema) = self.connection.schema() {
            validate_identifier("schema", schema)?;
        }

        if self.lock_timeout_secs == 0 {
            return Err(CoreError::ConfigInvalid {
                message: "lock_timeout_secs must be greater than zero".to_string(),
            });
        }

        if let ConnectionConfig::Snowflake(snow) = &self.connection {
            if snow.account.trim().is_empty() && snow.base_url.is_none() {
                return Err(CoreError::ConfigInvalid {
                    message: "snowflake connection requires an account".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Source URI, erroring when none was configured
    pub fn source_uri(&self) -> CoreResult<&str> {
        self.source.as_deref().ok_or_else(|| CoreError::ConfigInvalid {
            message: "source is required".to_string(),
        })
    }

    /// Lock wait bound
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }

    /// Overall run deadline, if any
    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_secs.map(Duration::from_secs)
    }

    /// Name of the advisory lock guarding this database+schema pair
    pub fn lock_name(&self) -> String {
        format!(
            "tidewater:{}:{}:{}",
            self.connection.database().unwrap_or(""),
            self.connection.schema().unwrap_or(""),
            self.migrations_table
        )
    }
}

/// Identifiers are quoted when used, so only quotes and control characters are refused
fn validate_identifier(field: &str, value: &str) -> CoreResult<()> {
    if value.is_empty() {
        return Err(CoreError::ConfigInvalid {
            message: format!("{field} must not be empty"),
        });
    }
    if value.contains('"') || value.chars().any(char::is_control) {
        return Err(CoreError::ConfigInvalid {
            message: format!("{field} '{value}' contains a quote or control character"),
        });
    }
    Ok(())
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
