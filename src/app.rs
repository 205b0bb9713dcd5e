//! Command execution against an injected connection manager.
//!
//! `main` builds the manager, and [`App`] runs one command through it. Every
//! database operation asks the manager for the session it needs, so a session
//! dropped between commands is replaced transparently.

use crate::cli::Command;
use crate::connection::ConnectionManager;
use crate::db::QueryResult;
use crate::error::{Result, TaskdeskError};
use crate::roles::Role;
use tracing::{debug, info};

/// Statement used by `status` to identify the server.
const SERVER_VERSION_SQL: &str = "SELECT version()";

/// Runs commands that need the database.
pub struct App<'a> {
    manager: &'a ConnectionManager,
}

impl<'a> App<'a> {
    pub fn new(manager: &'a ConnectionManager) -> Self {
        Self { manager }
    }

    /// Establishes the first session. Commands must not run if this fails.
    pub async fn startup(&self) -> Result<()> {
        self.manager.connect().await?;
        info!("Startup connection check passed");
        Ok(())
    }

    /// Executes a database command and returns its printable output.
    pub async fn execute(&self, command: &Command) -> Result<String> {
        match command {
            Command::Check => self.check().await,
            Command::Status => self.status().await,
            Command::Query { sql, json } => self.query(sql, *json).await,
            Command::Permissions { role } => Ok(permissions_report(*role)),
            Command::SetPassword { .. } => Err(TaskdeskError::internal(
                "set-password does not run against a session",
            )),
        }
    }

    async fn check(&self) -> Result<String> {
        let session = self.manager.get_connection().await?;
        let config = self.manager.config()?;
        Ok(format!(
            "OK: connected to {} (session {})",
            config.display_string(),
            session.id()
        ))
    }

    async fn status(&self) -> Result<String> {
        let session = self.manager.get_connection().await?;
        let result = session.execute_query(SERVER_VERSION_SQL).await?;
        let version = result
            .scalar()
            .map(|v| v.to_display_string())
            .unwrap_or_else(|| "unknown".to_string());

        let config = self.manager.config()?;
        Ok(format!(
            "Connection: {}\nSession:    {}\nServer:     {}",
            config.display_string(),
            session.id(),
            version
        ))
    }

    async fn query(&self, sql: &str, json: bool) -> Result<String> {
        let sql = sql.trim();
        if sql.is_empty() {
            return Err(TaskdeskError::query("No SQL given"));
        }

        let session = self.manager.get_connection().await?;
        debug!(session_id = session.id(), "Executing statement");
        let result = session.execute_query(sql).await?;

        if json {
            serde_json::to_string_pretty(&result)
                .map_err(|e| TaskdeskError::internal(format!("Failed to encode result: {e}")))
        } else {
            Ok(format_table(&result))
        }
    }
}

/// Renders a result as tab-separated rows followed by a summary line.
pub fn format_table(result: &QueryResult) -> String {
    let mut out = String::new();
    if !result.columns.is_empty() {
        out.push_str(&result.to_tsv());
        out.push('\n');
    }
    if let Some(warning) = result.truncation_warning() {
        out.push_str(&warning);
        out.push('\n');
    }

    let noun = if result.row_count == 1 { "row" } else { "rows" };
    out.push_str(&format!(
        "({} {}, {} ms)",
        result.row_count,
        noun,
        result.execution_time.as_millis()
    ));
    out
}

/// Lists the permissions a role holds, one per line.
pub fn permissions_report(role: Role) -> String {
    let mut out = format!("{role}:");
    for permission in role.permissions() {
        out.push_str("\n  ");
        out.push_str(permission.as_str());
    }
    out
}
