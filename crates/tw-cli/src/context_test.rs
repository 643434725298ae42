use super::*;
use crate::cli::Cli;
use clap::Parser;
use std::fs;
use tempfile::TempDir;
use tw_core::DbType;

fn global(args: &[&str]) -> GlobalArgs {
    let mut argv = vec!["tw"];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).unwrap().global
}

fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    let migrations = dir.path().join("migrations");
    fs::create_dir(&migrations).unwrap();
    fs::write(
        migrations.join("1_create_users.up.sql"),
        "CREATE TABLE users (id BIGINT);",
    )
    .unwrap();
    fs::write(migrations.join("1_create_users.down.sql"), "DROP TABLE users;").unwrap();
    dir
}

#[test]
fn test_load_config_from_file_with_overrides() {
    let dir = project();
    let config_path = dir.path().join("tidewater.yml");
    fs::write(
        &config_path,
        "source: file://migrations\nlock_timeout_secs: 5\nconnection:\n  type: duckdb\n  path: from_file.duckdb\n",
    )
    .unwrap();

    let args = global(&[
        "--config",
        config_path.to_str().unwrap(),
        "--database",
        "override.duckdb",
        "--lock-timeout",
        "9",
    ]);
    let config = load_config(&args).unwrap();
    assert_eq!(config.connection.database(), Some("override.duckdb"));
    assert_eq!(config.lock_timeout_secs, 9);
    assert_eq!(config.source.as_deref(), Some("file://migrations"));
}

#[test]
fn test_load_config_requires_source() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("tidewater.yml");
    fs::write(&config_path, "migrations_table: versions\n").unwrap();

    let args = global(&["--config", config_path.to_str().unwrap()]);
    let err = load_config(&args).unwrap_err();
    assert!(format!("{err:#}").contains("source"));
}

#[test]
fn test_load_config_missing_file() {
    let args = global(&["--config", "/nonexistent/tidewater.yml"]);
    assert!(load_config(&args).is_err());
}

#[test]
fn test_connection_type_switch() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("tidewater.yml");
    fs::write(&config_path, "source: file://migrations\n").unwrap();

    let args = global(&[
        "--config",
        config_path.to_str().unwrap(),
        "--connection-type",
        "snowflake",
        "--account",
        "acme",
        "--database",
        "ANALYTICS",
    ]);
    let config = load_config(&args).unwrap();
    assert_eq!(config.connection.db_type(), DbType::Snowflake);
    assert_eq!(config.connection.database(), Some("ANALYTICS"));
}

#[tokio::test]
async fn test_connect_duckdb_with_schema() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("warehouse.duckdb");
    let config_path = dir.path().join("tidewater.yml");
    fs::write(&config_path, "source: file://migrations\n").unwrap();

    let args = global(&[
        "--config",
        config_path.to_str().unwrap(),
        "--database",
        db_path.to_str().unwrap(),
        "--schema",
        "analytics",
        "--warehouse",
        "IGNORED_WH",
    ]);
    let config = load_config(&args).unwrap();
    let db = connect(&config).unwrap();
    db.execute("CREATE TABLE t (id INT)").await.unwrap();
    let rows = db
        .query("SELECT table_schema FROM information_schema.tables WHERE table_name = 't'")
        .await
        .unwrap();
    assert_eq!(rows[0].get(0).unwrap().as_str(), Some("analytics"));
}

#[tokio::test]
async fn test_runtime_context_runs_migrations() {
    let dir = project();
    let source = format!("file://{}", dir.path().join("migrations").display());
    let db_path = dir.path().join("warehouse.duckdb");
    let config_path = dir.path().join("tidewater.yml");
    fs::write(&config_path, "lock_timeout_secs: 1\n").unwrap();

    let args = global(&[
        "--config",
        config_path.to_str().unwrap(),
        "--source",
        &source,
        "--database",
        db_path.to_str().unwrap(),
    ]);
    let ctx = RuntimeContext::new(&args, &CancellationToken::new()).unwrap();
    let result = ctx.migrator.up().await.unwrap();
    assert_eq!(result.applied, vec![1]);
}

#[tokio::test]
async fn test_runtime_context_rejects_other_schemes() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("tidewater.yml");
    fs::write(&config_path, "source: s3://bucket/migrations\n").unwrap();

    let args = global(&["--config", config_path.to_str().unwrap()]);
    assert!(RuntimeContext::new(&args, &CancellationToken::new()).is_err());
}
