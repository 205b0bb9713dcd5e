//! Database session layer for taskdesk.
//!
//! A [`Connector`] opens [`Session`]s; the connection manager owns at most one
//! of them at a time. The PostgreSQL implementation talks to a real server,
//! the mock implementation backs tests and `--mock-db`.

mod mock;
mod postgres;
mod types;

pub use mock::{MockConnector, MockSession, ProbeBehavior};
pub use postgres::{PgConnector, PgSession};
pub use types::{ColumnInfo, QueryResult, Row, Value};

use crate::config::DatabaseConfig;
use crate::error::Result;
use async_trait::async_trait;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Allocates a process-unique session id.
pub(crate) fn next_session_id() -> u64 {
    NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed)
}

/// Opens new database sessions.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Establishes a fresh session.
    ///
    /// Fails with `Connection` if the endpoint is unreachable, credentials are
    /// rejected, or the login timeout elapses. Never returns a half-open session.
    async fn establish(&self, config: &DatabaseConfig) -> Result<Arc<dyn Session>>;

    /// Short backend name for logs.
    fn backend(&self) -> &'static str;
}

/// An open database session.
///
/// Consumers get one from the connection manager per operation and must not
/// keep it around: the manager may replace it between calls.
#[async_trait]
pub trait Session: Send + Sync + fmt::Debug {
    /// Process-unique identifier, stable for the lifetime of the session.
    fn id(&self) -> u64;

    /// Whether the session has been closed locally.
    fn is_closed(&self) -> bool;

    /// Actively checks that the server still answers within `timeout`.
    ///
    /// `Ok(false)` means the session is dead or the probe timed out.
    /// `Err(ValidityCheck)` means the probe itself failed.
    async fn probe(&self, timeout: Duration) -> Result<bool>;

    /// Executes a SQL statement and returns its rows.
    async fn execute_query(&self, sql: &str) -> Result<QueryResult>;

    /// Closes the session. Closing twice is a no-op.
    async fn close(&self) -> Result<()>;
}
