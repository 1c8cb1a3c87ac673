//! Statement Executor
//!
//! Runs one statement on one host over a dedicated connection. Reads return
//! rows, everything else is committed and returns the affected-row count.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;
use sqlx::mysql::{MySql, MySqlArguments, MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, ConnectOptions, Connection, Row as _};
use tokio::time::timeout;

use crate::api::Row;
use crate::config::DatabaseConfig;
use crate::error::{Error, Result};
use crate::topology::host_port;

/// What a statement produced
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// Result set of a SELECT
    Rows(Vec<Row>),
    /// Affected-row count of anything else
    Affected(u64),
}

/// Executes a SQL statement against a specific host
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, host: &str, query: &str, args: &[Value]) -> Result<QueryOutcome>;
}

/// MySQL/MariaDB executor opening one connection per statement
pub struct MySqlExecutor {
    config: DatabaseConfig,
}

impl MySqlExecutor {
    pub fn new(config: DatabaseConfig) -> Self {
        Self { config }
    }

    fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.config.connect_timeout_secs)
    }

    fn statement_timeout(&self) -> Duration {
        Duration::from_secs(self.config.statement_timeout_secs)
    }

    fn connect_options(&self, host: &str) -> MySqlConnectOptions {
        let (addr, port) = host_port(host, self.config.port);
        let options = MySqlConnectOptions::new()
            .host(addr)
            .port(port)
            .username(&self.config.user)
            .password(&self.config.password);

        match &self.config.database {
            Some(db) => options.database(db),
            None => options,
        }
    }

    async fn connect(&self, host: &str) -> Result<MySqlConnection> {
        match timeout(self.connect_timeout(), self.connect_options(host).connect()).await {
            Ok(conn) => Ok(conn?),
            Err(_) => Err(Error::ConnectionTimeout(host.to_string())),
        }
    }
}

#[async_trait]
impl QueryExecutor for MySqlExecutor {
    async fn execute(&self, host: &str, query: &str, args: &[Value]) -> Result<QueryOutcome> {
        let mut conn = self.connect(host).await?;
        let finished = timeout(self.statement_timeout(), run_statement(&mut conn, query, args)).await;

        match finished {
            Ok(outcome) => {
                if let Err(e) = conn.close().await {
                    tracing::debug!("Error closing connection to {}: {}", host, e);
                }
                outcome
            }
            // Dropping the connection closes the socket without waiting on the server
            Err(_) => Err(Error::QueryExecution(format!(
                "Statement timed out after {:?} on {}",
                self.statement_timeout(),
                host
            ))),
        }
    }
}

async fn run_statement(conn: &mut MySqlConnection, query: &str, args: &[Value]) -> Result<QueryOutcome> {
    if returns_rows(query) {
        let rows = bind_args(sqlx::query(query), args)
            .fetch_all(&mut *conn)
            .await?;
        return Ok(QueryOutcome::Rows(rows.iter().map(row_to_json).collect()));
    }

    let mut tx = conn.begin().await?;
    let result = bind_args(sqlx::query(query), args)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(QueryOutcome::Affected(result.rows_affected()))
}

/// SELECT statements (locking or not) produce a result set
fn returns_rows(query: &str) -> bool {
    query.trim_start().to_uppercase().starts_with("SELECT")
}

/// Bind JSON arguments to `?` placeholders, in order
fn bind_args<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    args: &[Value],
) -> Query<'q, MySql, MySqlArguments> {
    for arg in args {
        query = match arg {
            Value::Null => query.bind(None::<String>),
            Value::Bool(b) => query.bind(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    query.bind(i)
                } else if let Some(u) = n.as_u64() {
                    query.bind(u)
                } else {
                    query.bind(n.as_f64())
                }
            }
            Value::String(s) => query.bind(s.clone()),
            Value::Array(_) | Value::Object(_) => query.bind(arg.to_string()),
        };
    }
    query
}

fn row_to_json(row: &MySqlRow) -> Row {
    row.columns()
        .iter()
        .map(|col| (col.name().to_string(), column_to_json(row, col.ordinal())))
        .collect()
}

/// Decode a column into JSON by trying the types MySQL commonly returns.
/// NULL decodes as `None` for any type, so the first attempt handles it.
fn column_to_json(row: &MySqlRow, idx: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<u64>, _>(idx) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f32>, _>(idx) {
        return v.map(|f| Value::from(f as f64)).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return v.map(Value::String).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<NaiveDateTime>, _>(idx) {
        return v
            .map(|d| Value::String(d.format("%Y-%m-%d %H:%M:%S").to_string()))
            .unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<NaiveDate>, _>(idx) {
        return v.map(|d| Value::String(d.to_string())).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<NaiveTime>, _>(idx) {
        return v.map(|t| Value::String(t.to_string())).unwrap_or(Value::Null);
    }
    // DECIMAL and JSON arrive as text
    if let Ok(v) = row.try_get_unchecked::<Option<String>, _>(idx) {
        return v.map(Value::String).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get_unchecked::<Option<Vec<u8>>, _>(idx) {
        return v
            .map(|b| Value::String(String::from_utf8_lossy(&b).into_owned()))
            .unwrap_or(Value::Null);
    }

    Value::Null
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Mutex;

    use super::*;

    /// Executor that records calls and answers without a database
    #[derive(Default)]
    pub struct RecordingExecutor {
        calls: Mutex<Vec<(String, String)>>,
        fail_with: Option<String>,
    }

    impl RecordingExecutor {
        pub fn new() -> Self {
            Self::default()
        }

        /// Every statement fails with the given driver message
        pub fn failing(message: &str) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_with: Some(message.to_string()),
            }
        }

        pub fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl QueryExecutor for RecordingExecutor {
        async fn execute(&self, host: &str, query: &str, _args: &[Value]) -> Result<QueryOutcome> {
            self.calls
                .lock()
                .unwrap()
                .push((host.to_string(), query.to_string()));

            if let Some(message) = &self.fail_with {
                return Err(Error::QueryExecution(message.clone()));
            }

            if returns_rows(query) {
                let mut row = Row::new();
                row.insert("host".into(), Value::String(host.to_string()));
                Ok(QueryOutcome::Rows(vec![row]))
            } else {
                Ok(QueryOutcome::Affected(1))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_returns_rows() {
        assert!(returns_rows("SELECT 1"));
        assert!(returns_rows("  select * from t for update"));
        assert!(!returns_rows("INSERT INTO t VALUES (1)"));
        assert!(!returns_rows("SHOW TABLES"));
    }

    #[test]
    fn test_connect_options_use_host_port() {
        let executor = MySqlExecutor::new(DatabaseConfig {
            user: "appuser".into(),
            password: "secret".into(),
            database: Some("sakila".into()),
            ..Default::default()
        });

        // building options must not panic for either host form
        let _ = executor.connect_options("10.0.0.4");
        let _ = executor.connect_options("10.0.0.4:3307");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_an_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let executor = MySqlExecutor::new(DatabaseConfig {
            port,
            connect_timeout_secs: 2,
            ..Default::default()
        });

        let result = executor.execute("127.0.0.1", "SELECT 1", &[]).await;
        assert!(result.is_err());
    }
}

/// Runs against a real server: `cargo test --features integration` with
/// `REPLGATE_TEST_MYSQL_HOST` (host or host:port) and optionally
/// `REPLGATE_TEST_MYSQL_USER`, `_PASSWORD`, `_DATABASE` set.
#[cfg(all(test, feature = "integration"))]
mod integration_tests {
    use serde_json::json;

    use super::*;

    fn mysql_from_env() -> Option<(String, MySqlExecutor)> {
        let host = std::env::var("REPLGATE_TEST_MYSQL_HOST").ok()?;
        let env = |key: &str, default: &str| {
            std::env::var(format!("REPLGATE_TEST_MYSQL_{}", key)).unwrap_or_else(|_| default.to_string())
        };

        let executor = MySqlExecutor::new(DatabaseConfig {
            user: env("USER", "root"),
            password: env("PASSWORD", ""),
            database: Some(env("DATABASE", "test")),
            ..Default::default()
        });
        Some((host, executor))
    }

    #[tokio::test]
    async fn test_argument_and_column_types() {
        let Some((host, executor)) = mysql_from_env() else {
            eprintln!("REPLGATE_TEST_MYSQL_HOST not set, skipping");
            return;
        };
        let table = format!("replgate_types_{}", uuid::Uuid::new_v4().simple());

        let create = format!(
            "CREATE TABLE {} (
                id INT AUTO_INCREMENT PRIMARY KEY,
                missing VARCHAR(10) NULL,
                flag TINYINT(1),
                small BIGINT,
                neg INT,
                ratio DOUBLE,
                label VARCHAR(32),
                list TEXT,
                obj TEXT,
                big BIGINT UNSIGNED,
                created DATETIME,
                price DECIMAL(10,2)
            )",
            table
        );
        executor.execute(&host, &create, &[]).await.unwrap();

        let insert = format!(
            "INSERT INTO {} (missing, flag, small, neg, ratio, label, list, obj, big, created, price)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, '2024-05-06 07:08:09', 12.50)",
            table
        );
        let args = [
            Value::Null,
            json!(true),
            json!(42),
            json!(-7),
            json!(3.5),
            json!("text"),
            json!([1, 2]),
            json!({"k": "v"}),
            json!(u64::MAX),
        ];
        let inserted = executor.execute(&host, &insert, &args).await;

        let selected = executor
            .execute(&host, &format!("SELECT * FROM {}", table), &[])
            .await;
        executor
            .execute(&host, &format!("DROP TABLE {}", table), &[])
            .await
            .unwrap();

        assert_eq!(inserted.unwrap(), QueryOutcome::Affected(1));
        let rows = match selected.unwrap() {
            QueryOutcome::Rows(rows) => rows,
            other => panic!("expected rows, got {:?}", other),
        };
        assert_eq!(rows.len(), 1);

        let row = &rows[0];
        assert_eq!(row["id"], json!(1));
        assert_eq!(row["missing"], Value::Null);
        assert_eq!(row["flag"], json!(1));
        assert_eq!(row["small"], json!(42));
        assert_eq!(row["neg"], json!(-7));
        assert_eq!(row["ratio"], json!(3.5));
        assert_eq!(row["label"], json!("text"));
        assert_eq!(row["list"], json!("[1,2]"));
        assert_eq!(row["obj"], json!(r#"{"k":"v"}"#));
        assert_eq!(row["big"], json!(u64::MAX));
        assert_eq!(row["created"], json!("2024-05-06 07:08:09"));
        assert_eq!(row["price"], json!("12.50"));
    }
}
