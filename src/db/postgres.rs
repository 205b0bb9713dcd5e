//! PostgreSQL session implementation.
//!
//! Each [`PgSession`] wraps exactly one `sqlx::PgConnection`; there is no pool.
//! The connection manager decides when a session is replaced.

use crate::config::{DatabaseConfig, TlsMode};
use crate::db::{next_session_id, ColumnInfo, Connector, QueryResult, Row, Session, Value};
use crate::error::{Result, TaskdeskError};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow, PgSslMode};
use sqlx::{Column as SqlxColumn, Connection, Executor, Row as SqlxRow, TypeInfo};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Query timeout in seconds.
const QUERY_TIMEOUT_SECS: u64 = 30;

/// Maximum rows to return from a query.
const MAX_ROWS: usize = 1000;

const APPLICATION_NAME: &str = "taskdesk";

/// Opens single-connection PostgreSQL sessions.
#[derive(Debug, Default, Clone, Copy)]
pub struct PgConnector;

impl PgConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for PgConnector {
    async fn establish(&self, config: &DatabaseConfig) -> Result<Arc<dyn Session>> {
        let session = PgSession::connect(config).await?;
        Ok(Arc::new(session))
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}

/// A single live PostgreSQL connection.
#[derive(Debug)]
pub struct PgSession {
    id: u64,
    conn: Mutex<Option<PgConnection>>,
    closed: AtomicBool,
}

impl PgSession {
    /// Opens a connection, bounded by the configured login timeout.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let options = connect_options(config);
        let login_timeout = config.login_timeout();

        let conn = tokio::time::timeout(login_timeout, PgConnection::connect_with(&options))
            .await
            .map_err(|_| {
                TaskdeskError::connection(format!(
                    "Connection to {}:{} timed out after {}s. The server may be overloaded or unreachable.",
                    config.host_or_default(),
                    config.port,
                    login_timeout.as_secs()
                ))
            })?
            .map_err(|e| map_connection_error(e, config))?;

        let id = next_session_id();
        debug!(session_id = id, "PostgreSQL connection opened");

        Ok(Self {
            id,
            conn: Mutex::new(Some(conn)),
            closed: AtomicBool::new(false),
        })
    }

    fn mark_closed(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Session for PgSession {
    fn id(&self) -> u64 {
        self.id
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn probe(&self, timeout: Duration) -> Result<bool> {
        let outcome = tokio::time::timeout(timeout, async {
            let mut guard = self.conn.lock().await;
            match guard.as_mut() {
                Some(conn) => conn.ping().await.map(|_| true),
                None => Ok(false),
            }
        })
        .await;

        match outcome {
            Ok(Ok(alive)) => Ok(alive),
            Ok(Err(e)) => {
                if is_disconnect(&e) {
                    self.mark_closed();
                }
                Err(TaskdeskError::validity_check(format!("Ping failed: {e}")))
            }
            Err(_) => {
                debug!(session_id = self.id, ?timeout, "Ping did not answer in time");
                Ok(false)
            }
        }
    }

    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        let mut guard = self.conn.lock().await;
        let conn = guard
            .as_mut()
            .ok_or_else(|| TaskdeskError::connection("Session is closed"))?;

        let start = Instant::now();

        let result = tokio::time::timeout(
            Duration::from_secs(QUERY_TIMEOUT_SECS),
            sqlx::query(sql).fetch_all(&mut *conn),
        )
        .await
        .map_err(|_| {
            TaskdeskError::query(format!(
                "Query timed out after {QUERY_TIMEOUT_SECS} seconds"
            ))
        })?;

        let result = match result {
            Ok(rows) => rows,
            Err(e) => {
                if is_disconnect(&e) {
                    self.mark_closed();
                }
                return Err(TaskdeskError::query(format_query_error(e)));
            }
        };

        let execution_time = start.elapsed();

        let columns: Vec<ColumnInfo> = match result.first() {
            Some(first_row) => column_info(first_row),
            // Empty result: ask the server for the statement's shape instead.
            None => match (&mut *conn).describe(sql).await {
                Ok(describe) => describe
                    .columns()
                    .iter()
                    .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
                    .collect(),
                Err(_) => Vec::new(),
            },
        };

        let total_rows = result.len();
        let was_truncated = total_rows > MAX_ROWS;

        if was_truncated {
            warn!(
                "Query returned {} rows, truncating to {} rows",
                total_rows, MAX_ROWS
            );
        }

        let rows: Vec<Row> = result.iter().take(MAX_ROWS).map(convert_row).collect();
        let row_count = rows.len();

        Ok(QueryResult {
            columns,
            rows,
            execution_time,
            row_count,
            total_rows: Some(total_rows),
            was_truncated,
        })
    }

    async fn close(&self) -> Result<()> {
        self.mark_closed();
        let conn = self.conn.lock().await.take();

        match conn {
            Some(conn) => {
                debug!(session_id = self.id, "Closing PostgreSQL connection");
                conn.close().await.map_err(|e| {
                    TaskdeskError::connection(format!("Failed to close session cleanly: {e}"))
                })
            }
            None => Ok(()),
        }
    }
}

/// Builds sqlx connect options from the configuration.
pub(crate) fn connect_options(config: &DatabaseConfig) -> PgConnectOptions {
    let mut options = PgConnectOptions::new()
        .host(config.host_or_default())
        .port(config.port)
        .ssl_mode(ssl_mode(config.tls_mode()))
        .application_name(APPLICATION_NAME);

    if let Some(database) = &config.database {
        options = options.database(database);
    }
    if let Some(user) = &config.user {
        options = options.username(user);
    }
    if let Some(password) = &config.password {
        options = options.password(password);
    }

    options
}

pub(crate) fn ssl_mode(mode: TlsMode) -> PgSslMode {
    match mode {
        TlsMode::Prefer => PgSslMode::Prefer,
        TlsMode::Require => PgSslMode::Require,
        TlsMode::VerifyFull => PgSslMode::VerifyFull,
    }
}

fn column_info(row: &PgRow) -> Vec<ColumnInfo> {
    row.columns()
        .iter()
        .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
        .collect()
}

/// Converts a sqlx PgRow to our Row type.
fn convert_row(row: &PgRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col.type_info().name()))
        .collect()
}

/// Decodes a single column by its server-side type name.
fn convert_value(row: &PgRow, index: usize, type_name: &str) -> Value {
    match type_name.to_uppercase().as_str() {
        "BOOL" | "BOOLEAN" => row
            .try_get::<Option<bool>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bool)
            .unwrap_or(Value::Null),

        "INT2" | "SMALLINT" => row
            .try_get::<Option<i16>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Int(v as i64))
            .unwrap_or(Value::Null),

        "INT4" | "INT" | "INTEGER" => row
            .try_get::<Option<i32>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Int(v as i64))
            .unwrap_or(Value::Null),

        "INT8" | "BIGINT" => row
            .try_get::<Option<i64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Int)
            .unwrap_or(Value::Null),

        "FLOAT4" | "REAL" => row
            .try_get::<Option<f32>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Float(v as f64))
            .unwrap_or(Value::Null),

        "FLOAT8" | "DOUBLE PRECISION" => row
            .try_get::<Option<f64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Float)
            .unwrap_or(Value::Null),

        "BYTEA" => row
            .try_get::<Option<Vec<u8>>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bytes)
            .unwrap_or(Value::Null),

        _ => row
            .try_get::<Option<String>, _>(index)
            .ok()
            .flatten()
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}

/// Whether an error means the underlying socket is gone.
fn is_disconnect(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Io(_) | sqlx::Error::Tls(_))
}

/// Maps sqlx connection errors to user-facing messages.
fn map_connection_error(error: sqlx::Error, config: &DatabaseConfig) -> TaskdeskError {
    let host = config.host_or_default();
    let port = config.port;
    let user = config.user.as_deref().unwrap_or("unknown");
    let database = config.database.as_deref().unwrap_or("unknown");

    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("could not connect") {
        TaskdeskError::connection(format!(
            "Cannot connect to {host}:{port}. Check that the server is running."
        ))
    } else if error_str.contains("password authentication failed")
        || error_str.contains("authentication failed")
    {
        TaskdeskError::connection(format!(
            "Authentication failed for user '{user}'. Check your credentials."
        ))
    } else if error_str.contains("does not exist") && error_str.contains("database") {
        TaskdeskError::connection(format!("Database '{database}' does not exist."))
    } else if error_str.contains("certificate") {
        TaskdeskError::connection(format!(
            "Server certificate for {host} was rejected. Set trust_server_certificate = true to accept it without verification."
        ))
    } else if error_str.contains("ssl") || error_str.contains("tls") {
        TaskdeskError::connection(format!(
            "TLS negotiation with {host}:{port} failed: {error}"
        ))
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        TaskdeskError::connection(format!(
            "Connection to {host}:{port} timed out. The server may be overloaded or unreachable."
        ))
    } else {
        TaskdeskError::connection(error.to_string())
    }
}

/// Formats a query error with PostgreSQL detail and hint when available.
fn format_query_error(error: sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };

    let mut result = format!("ERROR: {}", db_error.message());

    if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
        if let Some(detail) = pg_error.detail() {
            result.push_str("\n  DETAIL: ");
            result.push_str(detail);
        }
        if let Some(hint) = pg_error.hint() {
            result.push_str("\n  HINT: ");
            result.push_str(hint);
        }
        if let Some(constraint) = pg_error.constraint() {
            result.push_str("\n  CONSTRAINT: ");
            result.push_str(constraint);
        }
    }

    result
}
