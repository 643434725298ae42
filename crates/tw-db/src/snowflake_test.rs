use super::*;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> SnowflakeConfig {
    SnowflakeConfig {
        account: "acme".to_string(),
        database: Some("ANALYTICS".to_string()),
        schema: Some("CORE".to_string()),
        warehouse: Some("TRANSFORM_WH".to_string()),
        role: None,
        base_url: Some(server.uri()),
        statement_timeout_secs: None,
    }
}

fn backend_for(server: &MockServer) -> SnowflakeBackend {
    SnowflakeBackend::new(&config_for(server), "test-token")
        .unwrap()
        .with_poll_interval(Duration::from_millis(5))
}

fn success_body() -> serde_json::Value {
    json!({
        "code": "090001",
        "message": "Statement executed successfully.",
        "statementHandle": "01b2-0000",
        "resultSetMetaData": {
            "numRows": 1,
            "rowType": [{"name": "status", "type": "text"}],
            "partitionInfo": [{"rowCount": 1}]
        },
        "data": [["ok"]]
    })
}

#[test]
fn test_empty_token_rejected() {
    let config = SnowflakeConfig {
        account: "acme".to_string(),
        ..SnowflakeConfig::default()
    };
    let err = SnowflakeBackend::new(&config, "  ").err().unwrap();
    assert!(matches!(err, DbError::ConnectionError(_)));
}

#[test]
fn test_transaction_script() {
    let script = transaction_script(&[
        "DELETE FROM t;".to_string(),
        "INSERT INTO t VALUES (1)".to_string(),
    ]);
    assert_eq!(script, "BEGIN;\nDELETE FROM t;\nINSERT INTO t VALUES (1);\nCOMMIT;");
}

#[test]
fn test_convert_cell_by_row_type() {
    let fixed = ColumnType {
        kind: "fixed".to_string(),
        scale: Some(0),
    };
    let decimal = ColumnType {
        kind: "fixed".to_string(),
        scale: Some(2),
    };
    let boolean = ColumnType {
        kind: "boolean".to_string(),
        scale: None,
    };
    assert_eq!(convert_cell(Some(&fixed), Some("42".into())), Value::Int(42));
    assert_eq!(convert_cell(Some(&decimal), Some("1.25".into())), Value::Float(1.25));
    assert_eq!(convert_cell(Some(&boolean), Some("false".into())), Value::Bool(false));
    assert_eq!(convert_cell(Some(&fixed), None), Value::Null);
    assert_eq!(convert_cell(None, Some("x".into())), Value::Text("x".into()));
}

#[tokio::test]
async fn test_execute_sends_session_context() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v2/statements"))
        .and(header("authorization", "Bearer test-token"))
        .and(header("x-snowflake-authorization-token-type", "OAUTH"))
        .and(body_partial_json(json!({
            "statement": "CREATE TABLE t (id INT)",
            "database": "ANALYTICS",
            "schema": "CORE",
            "warehouse": "TRANSFORM_WH"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
        .expect(1)
        .mount(&server)
        .await;

    let db = backend_for(&server);
    db.execute("CREATE TABLE t (id INT)").await.unwrap();
    assert_eq!(db.db_type(), "snowflake");
}

#[tokio::test]
async fn test_execute_batch_enables_multi_statement() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v2/statements"))
        .and(body_partial_json(json!({
            "parameters": {"MULTI_STATEMENT_COUNT": "0"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
        .expect(1)
        .mount(&server)
        .await;

    let db = backend_for(&server);
    db.execute_batch("CREATE TABLE a (id INT); CREATE TABLE b (id INT);")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_query_converts_rows() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v2/statements"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": "090001",
            "statementHandle": "01b2-0001",
            "resultSetMetaData": {
                "numRows": 1,
                "rowType": [
                    {"name": "VERSION", "type": "fixed", "scale": 0},
                    {"name": "DIRTY", "type": "boolean"}
                ],
                "partitionInfo": [{"rowCount": 1}]
            },
            "data": [["3", "true"]]
        })))
        .mount(&server)
        .await;

    let db = backend_for(&server);
    let rows = db.query("SELECT version, dirty FROM t").await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get(0).unwrap(), &Value::Int(3));
    assert_eq!(rows[0].get(1).unwrap(), &Value::Bool(true));
}

#[tokio::test]
async fn test_sql_error_maps_to_execution_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v2/statements"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "code": "002003",
            "message": "SQL compilation error: Object 'T' does not exist or not authorized.",
            "sqlState": "02000",
            "statementHandle": "01b2-0002"
        })))
        .mount(&server)
        .await;

    let db = backend_for(&server);
    let err = db.execute("DROP TABLE t").await.unwrap_err();
    match err {
        DbError::ExecutionError { message, code } => {
            assert_eq!(code.as_deref(), Some("002003"));
            assert!(message.contains("does not exist"));
        }
        other => panic!("expected ExecutionError, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unauthorized_maps_to_connection_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v2/statements"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "code": "390303",
            "message": "Invalid OAuth access token."
        })))
        .mount(&server)
        .await;

    let db = backend_for(&server);
    let err = db.execute("SELECT 1").await.unwrap_err();
    assert!(matches!(err, DbError::ConnectionError(_)));
}

#[tokio::test]
async fn test_running_statement_is_polled() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v2/statements"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "code": "333334",
            "message": "Asynchronous execution in progress.",
            "statementHandle": "01b2-0003",
            "statementStatusUrl": "/api/v2/statements/01b2-0003"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/statements/01b2-0003"))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
        .expect(1)
        .mount(&server)
        .await;

    let db = backend_for(&server);
    let rows = db.query("SELECT 'ok'").await.unwrap();
    assert_eq!(rows[0].get(0).unwrap().as_str(), Some("ok"));
}

#[tokio::test]
async fn test_query_fetches_every_partition() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v2/statements"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": "090001",
            "statementHandle": "01b2-0004",
            "resultSetMetaData": {
                "numRows": 3,
                "rowType": [{"name": "N", "type": "fixed", "scale": 0}],
                "partitionInfo": [{"rowCount": 2}, {"rowCount": 1}]
            },
            "data": [["1"], ["2"]]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/statements/01b2-0004"))
        .and(query_param("partition", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [["3"]]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let db = backend_for(&server);
    let rows = db.query("SELECT n FROM numbers").await.unwrap();
    let numbers: Vec<i64> = rows
        .iter()
        .map(|r| r.get(0).unwrap().as_i64().unwrap())
        .collect();
    assert_eq!(numbers, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_advisory_lock_times_out_while_held() {
    let server = MockServer::start().await;
    let db = backend_for(&server);
    let _held = db
        .acquire_advisory_lock("tidewater:ANALYTICS:CORE", Duration::from_millis(10))
        .await
        .unwrap();
    let err = db
        .acquire_advisory_lock("tidewater:ANALYTICS:CORE", Duration::from_millis(20))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::LockTimeout { .. }));
}

#[tokio::test]
async fn test_statement_timeout_from_config() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v2/statements"))
        .and(body_partial_json(json!({
            "statement": "SELECT 1",
            "timeout": 90
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
        .expect(1)
        .mount(&server)
        .await;

    let config = SnowflakeConfig {
        statement_timeout_secs: Some(90),
        ..config_for(&server)
    };
    let db = SnowflakeBackend::new(&config, "test-token").unwrap();
    db.query("SELECT 1").await.unwrap();
}

#[tokio::test]
async fn test_backends_on_same_account_share_advisory_locks() {
    let server = MockServer::start().await;
    let first = backend_for(&server);
    let second = backend_for(&server);
    let _held = first
        .acquire_advisory_lock("tidewater:ANALYTICS:CORE", Duration::from_millis(10))
        .await
        .unwrap();
    let err = second
        .acquire_advisory_lock("tidewater:ANALYTICS:CORE", Duration::from_millis(20))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::LockTimeout { .. }));
}
