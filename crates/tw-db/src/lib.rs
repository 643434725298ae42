//! tw-db - Database abstraction layer for Tidewater
//!
//! This crate provides the `Database` driver trait, the process-wide
//! advisory lock registry, and the DuckDB and Snowflake backends.

pub mod duckdb;
pub mod error;
pub mod ident;
pub mod lock;
pub mod snowflake;
pub mod traits;
pub mod value;

pub use self::duckdb::DuckDbBackend;
pub use error::{DbError, DbResult};
pub use ident::{qualified_name, quote_ident, quote_literal};
pub use lock::{AdvisoryLock, LockRegistry};
pub use snowflake::SnowflakeBackend;
pub use traits::Database;
pub use value::{Row, Value};
