//! Error types for tw-core

use thiserror::Error;

/// Core error type for Tidewater
#[derive(Error, Debug)]
pub enum CoreError {
    /// E001: Configuration file not found
    #[error("[E001] Config file not found: {path}")]
    ConfigNotFound { path: String },

    /// E002: Failed to parse configuration file
    #[error("[E002] Failed to parse config: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// E003: Invalid configuration value
    #[error("[E003] Invalid config: {message}")]
    ConfigInvalid { message: String },

    /// E004: Migration source directory not found
    #[error("[E004] Migration source not found: {path}")]
    SourceNotFound { path: String },

    /// E005: Source URI uses a scheme other than file://
    #[error("[E005] Unsupported migration source '{uri}': scheme '{scheme}' is not supported (only file:// is)")]
    UnsupportedSourceScheme { uri: String, scheme: String },

    /// E006: No migration with the requested version
    #[error("[E006] Migration version {version} not found in source")]
    MigrationNotFound { version: u64 },

    /// E007: Two migrations claim the same version and direction
    #[error("[E007] Duplicate migration version {version}: {first} and {second}")]
    DuplicateMigration {
        version: u64,
        first: String,
        second: String,
    },

    /// E008: Migration file is structurally invalid
    #[error("[E008] Invalid migration file '{path}': {reason}")]
    InvalidMigrationFile { path: String, reason: String },

    /// E009: IO error with file path context
    #[error("[E009] Failed to read '{path}': {source}")]
    IoWithPath {
        path: String,
        source: std::io::Error,
    },
}

impl CoreError {
    /// Short machine-readable kind, used as a structured log field
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::ConfigNotFound { .. }
            | CoreError::ConfigParse(_)
            | CoreError::ConfigInvalid { .. } => "config",
            CoreError::IoWithPath { .. } => "io",
            _ => "source",
        }
    }
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;
