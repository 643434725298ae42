//! Snowflake database backend over the SQL API (`/api/v2/statements`).
//!
//! Every call is one HTTP request carrying the session context (database,
//! schema, warehouse, role). Statements that outlive the synchronous window
//! come back as HTTP 202 and are polled until they finish.
//!
//! Snowflake has no session-scoped advisory locks. Locking goes through the
//! [`LockRegistry`] shared by every backend on the same account in this
//! process; separate processes migrating one schema are not serialized.

use crate::error::{DbError, DbResult};
use crate::lock::{AdvisoryLock, LockRegistry};
use crate::traits::Database;
use crate::value::{Row, Value};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tw_core::SnowflakeConfig;

const STATEMENTS_PATH: &str = "/api/v2/statements";
const DEFAULT_TOKEN_TYPE: &str = "OAUTH";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
const USER_AGENT: &str = concat!("tidewater/", env!("CARGO_PKG_VERSION"));

/// Snowflake database backend
pub struct SnowflakeBackend {
    client: Client,
    base_url: String,
    token: String,
    token_type: String,
    session: SessionContext,
    statement_timeout: Option<u64>,
    poll_interval: Duration,
    locks: Arc<LockRegistry>,
}

#[derive(Debug, Clone, Default)]
struct SessionContext {
    database: Option<String>,
    schema: Option<String>,
    warehouse: Option<String>,
    role: Option<String>,
}

#[derive(Debug, Serialize)]
struct StatementRequest<'a> {
    statement: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    database: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    schema: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warehouse: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    parameters: HashMap<&'static str, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatementResponse {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    statement_handle: Option<String>,
    #[serde(default)]
    result_set_meta_data: Option<ResultSetMetaData>,
    #[serde(default)]
    data: Vec<Vec<Option<String>>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultSetMetaData {
    #[serde(default)]
    row_type: Vec<ColumnType>,
    #[serde(default)]
    partition_info: Vec<PartitionInfo>,
}

#[derive(Debug, Deserialize)]
struct ColumnType {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    scale: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PartitionInfo {
    #[serde(default)]
    row_count: u64,
}

/// Result of one API round-trip
enum Outcome {
    Done(StatementResponse),
    Running(String),
}

impl SnowflakeBackend {
    /// Create a backend for the configured account, authenticating with `token`
    pub fn new(config: &SnowflakeConfig, token: impl Into<String>) -> DbResult<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(DbError::ConnectionError(
                "Snowflake access token is empty (set SNOWFLAKE_TOKEN)".to_string(),
            ));
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| DbError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.api_base_url(),
            token,
            token_type: DEFAULT_TOKEN_TYPE.to_string(),
            session: SessionContext {
                database: config.database.clone(),
                schema: config.schema.clone(),
                warehouse: config.warehouse.clone(),
                role: config.role.clone(),
            },
            statement_timeout: config.statement_timeout_secs,
            poll_interval: DEFAULT_POLL_INTERVAL,
            locks: LockRegistry::shared(&format!(
                "snowflake:{}",
                config.api_base_url().to_lowercase()
            )),
        })
    }

    /// Token type sent in `X-Snowflake-Authorization-Token-Type`
    /// (`OAUTH`, `KEYPAIR_JWT` or `PROGRAMMATIC_ACCESS_TOKEN`)
    pub fn with_token_type(mut self, token_type: impl Into<String>) -> Self {
        self.token_type = token_type.into();
        self
    }

    /// Interval between status polls of a still-running statement
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Submit `sql` and wait for it to finish
    async fn run_statement(&self, sql: &str, multi_statement: bool) -> DbResult<StatementResponse> {
        let mut parameters = HashMap::new();
        if multi_statement {
            // 0 lets the request carry any number of statements
            parameters.insert("MULTI_STATEMENT_COUNT", "0".to_string());
        }
        let body = StatementRequest {
            statement: sql,
            timeout: self.statement_timeout,
            database: self.session.database.as_deref(),
            schema: self.session.schema.as_deref(),
            warehouse: self.session.warehouse.as_deref(),
            role: self.session.role.as_deref(),
            parameters,
        };

        let response = self
            .client
            .post(format!("{}{}", self.base_url, STATEMENTS_PATH))
            .bearer_auth(&self.token)
            .header("X-Snowflake-Authorization-Token-Type", &self.token_type)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await?;

        let mut outcome = read_outcome(response).await?;
        loop {
            match outcome {
                Outcome::Done(result) => return Ok(result),
                Outcome::Running(handle) => {
                    log::debug!("Snowflake statement {} still running", handle);
                    tokio::time::sleep(self.poll_interval).await;
                    outcome = read_outcome(self.get_statement(&handle, None).await?).await?;
                }
            }
        }
    }

    async fn get_statement(&self, handle: &str, partition: Option<usize>) -> DbResult<Response> {
        let mut request = self
            .client
            .get(format!("{}{}/{}", self.base_url, STATEMENTS_PATH, handle))
            .bearer_auth(&self.token)
            .header("X-Snowflake-Authorization-Token-Type", &self.token_type)
            .header(ACCEPT, "application/json");
        if let Some(partition) = partition {
            request = request.query(&[("partition", partition)]);
        }
        Ok(request.send().await?)
    }

    /// Rows of every partition of a finished statement
    async fn collect_rows(&self, first: StatementResponse) -> DbResult<Vec<Row>> {
        let meta = first.result_set_meta_data.unwrap_or_default();
        let mut rows = convert_rows(&meta.row_type, first.data);

        if meta.partition_info.len() > 1 {
            let handle = first.statement_handle.ok_or_else(|| {
                DbError::Internal("partitioned result without a statement handle".to_string())
            })?;
            for partition in 1..meta.partition_info.len() {
                let response = self.get_statement(&handle, Some(partition)).await?;
                match read_outcome(response).await? {
                    Outcome::Done(page) => rows.extend(convert_rows(&meta.row_type, page.data)),
                    Outcome::Running(_) => {
                        return Err(DbError::Internal(format!(
                            "partition {partition} of statement {handle} is not ready"
                        )));
                    }
                }
            }
            let expected: u64 = meta.partition_info.iter().map(|p| p.row_count).sum();
            if rows.len() as u64 != expected {
                log::warn!(
                    "Snowflake returned {} rows, partition info announced {}",
                    rows.len(),
                    expected
                );
            }
        }
        Ok(rows)
    }
}

/// Classify an API response by status code
async fn read_outcome(response: Response) -> DbResult<Outcome> {
    let status = response.status();
    let text = response.text().await?;
    let parsed: Option<StatementResponse> = serde_json::from_str(&text).ok();

    match status {
        StatusCode::OK => parsed.map(Outcome::Done).ok_or_else(|| {
            DbError::Internal(format!("unreadable Snowflake response: {text}"))
        }),
        StatusCode::ACCEPTED => parsed
            .and_then(|r| r.statement_handle)
            .map(Outcome::Running)
            .ok_or_else(|| {
                DbError::Internal(format!("running statement without a handle: {text}"))
            }),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            let message = parsed.and_then(|r| r.message).unwrap_or(text);
            Err(DbError::ConnectionError(format!(
                "Snowflake rejected the credentials ({status}): {message}"
            )))
        }
        _ => {
            let (message, code) = match parsed {
                Some(r) => (r.message.unwrap_or_else(|| text.clone()), r.code),
                None => (text, None),
            };
            Err(DbError::ExecutionError {
                message: format!("{message} (HTTP {status})"),
                code,
            })
        }
    }
}

fn convert_rows(row_type: &[ColumnType], data: Vec<Vec<Option<String>>>) -> Vec<Row> {
    data.into_iter()
        .map(|cells| {
            let values = cells
                .into_iter()
                .enumerate()
                .map(|(idx, cell)| convert_cell(row_type.get(idx), cell))
                .collect();
            Row::new(values)
        })
        .collect()
}

/// The SQL API returns every cell as a string; `rowType` says how to read it
fn convert_cell(column: Option<&ColumnType>, cell: Option<String>) -> Value {
    let Some(raw) = cell else {
        return Value::Null;
    };
    let Some(column) = column else {
        return Value::Text(raw);
    };

    match column.kind.to_ascii_lowercase().as_str() {
        "fixed" if column.scale.unwrap_or(0) == 0 => {
            raw.parse().map(Value::Int).unwrap_or(Value::Text(raw))
        }
        "fixed" | "real" => raw.parse().map(Value::Float).unwrap_or(Value::Text(raw)),
        "boolean" => match raw.to_ascii_lowercase().as_str() {
            "true" | "1" => Value::Bool(true),
            "false" | "0" => Value::Bool(false),
            _ => Value::Text(raw),
        },
        _ => Value::Text(raw),
    }
}

/// Wrap statements in one explicit transaction for a multi-statement request
fn transaction_script(statements: &[String]) -> String {
    let mut script = String::from("BEGIN;\n");
    for statement in statements {
        script.push_str(statement.trim().trim_end_matches(';'));
        script.push_str(";\n");
    }
    script.push_str("COMMIT;");
    script
}

#[async_trait]
impl Database for SnowflakeBackend {
    async fn execute(&self, sql: &str) -> DbResult<()> {
        self.run_statement(sql, false).await?;
        Ok(())
    }

    async fn execute_batch(&self, sql: &str) -> DbResult<()> {
        self.run_statement(sql, true).await?;
        Ok(())
    }

    async fn execute_transaction(&self, statements: &[String]) -> DbResult<()> {
        self.run_statement(&transaction_script(statements), true)
            .await?;
        Ok(())
    }

    async fn query(&self, sql: &str) -> DbResult<Vec<Row>> {
        let first = self.run_statement(sql, false).await?;
        self.collect_rows(first).await
    }

    async fn acquire_advisory_lock(
        &self,
        name: &str,
        timeout: Duration,
    ) -> DbResult<AdvisoryLock> {
        self.locks.acquire(name, timeout).await
    }

    fn db_type(&self) -> &'static str {
        "snowflake"
    }
}

#[cfg(test)]
#[path = "snowflake_test.rs"]
mod tests;
