//! tw-core - Core library for Tidewater
//!
//! This crate provides the shared migration types, the migration source
//! abstraction with its file and in-memory adapters, and configuration
//! parsing used across all Tidewater components.

pub mod config;
pub mod error;
pub mod migration;
pub mod source;

pub use config::{Config, ConfigOverrides, ConnectionConfig, DbType, DuckDbConfig, SnowflakeConfig};
pub use error::{CoreError, CoreResult};
pub use migration::{is_blank_body, Direction, MigrationStep};
pub use source::{open_source, FileSource, MemorySource, MigrationSource};
