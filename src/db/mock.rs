//! In-memory connector for tests and `--mock-db`.
//!
//! Reachability, establishment latency and probe outcomes can be changed at
//! runtime to drive the connection manager through its failure paths.

use super::{next_session_id, ColumnInfo, Connector, QueryResult, Session, Value};
use crate::config::DatabaseConfig;
use crate::error::{Result, TaskdeskError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How a mock session answers liveness probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProbeBehavior {
    /// Answers immediately.
    #[default]
    Healthy,
    /// Answers that the session is dead.
    Invalid,
    /// The probe itself fails.
    Error,
    /// Never answers; the caller's timeout elapses.
    Hang,
}

/// A connector whose sessions live in memory.
#[derive(Debug)]
pub struct MockConnector {
    reachable: AtomicBool,
    latency: Mutex<Duration>,
    attempts: AtomicUsize,
    sessions: Mutex<Vec<Arc<MockSession>>>,
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConnector {
    /// Creates a reachable mock endpoint.
    pub fn new() -> Self {
        Self {
            reachable: AtomicBool::new(true),
            latency: Mutex::new(Duration::ZERO),
            attempts: AtomicUsize::new(0),
            sessions: Mutex::new(Vec::new()),
        }
    }

    /// Creates a mock endpoint that refuses connections until made reachable.
    pub fn unreachable() -> Self {
        let connector = Self::new();
        connector.set_reachable(false);
        connector
    }

    /// Delays every establishment by `latency`.
    pub fn with_latency(self, latency: Duration) -> Self {
        if let Ok(mut guard) = self.latency.lock() {
            *guard = latency;
        }
        self
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Number of establishment attempts, successful or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Every session established so far, oldest first.
    pub fn sessions(&self) -> Vec<Arc<MockSession>> {
        self.sessions
            .lock()
            .map(|sessions| sessions.clone())
            .unwrap_or_default()
    }

    pub fn last_session(&self) -> Option<Arc<MockSession>> {
        self.sessions().pop()
    }

    /// Number of established sessions that are not closed.
    pub fn open_sessions(&self) -> usize {
        self.sessions().iter().filter(|s| !s.is_closed()).count()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn establish(&self, config: &DatabaseConfig) -> Result<Arc<dyn Session>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let latency = self.latency.lock().map(|l| *l).unwrap_or_default();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if !self.reachable.load(Ordering::SeqCst) {
            return Err(TaskdeskError::connection(format!(
                "Cannot connect to {}:{}. Check that the server is running.",
                config.host_or_default(),
                config.port
            )));
        }

        let session = Arc::new(MockSession::new());
        self.sessions
            .lock()
            .map_err(|_| TaskdeskError::internal("mock session registry poisoned"))?
            .push(Arc::clone(&session));

        Ok(session)
    }

    fn backend(&self) -> &'static str {
        "mock"
    }
}

/// A mock session that returns canned results.
#[derive(Debug)]
pub struct MockSession {
    id: u64,
    closed: AtomicBool,
    close_calls: AtomicUsize,
    close_hangs: AtomicBool,
    probes: AtomicUsize,
    probe_behavior: Mutex<ProbeBehavior>,
}

impl MockSession {
    fn new() -> Self {
        Self {
            id: next_session_id(),
            closed: AtomicBool::new(false),
            close_calls: AtomicUsize::new(0),
            close_hangs: AtomicBool::new(false),
            probes: AtomicUsize::new(0),
            probe_behavior: Mutex::new(ProbeBehavior::Healthy),
        }
    }

    pub fn set_probe_behavior(&self, behavior: ProbeBehavior) {
        if let Ok(mut guard) = self.probe_behavior.lock() {
            *guard = behavior;
        }
    }

    /// Simulates the server dropping the session.
    pub fn close_externally(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Makes `close()` mark the session closed and then never return.
    pub fn set_close_hangs(&self, hangs: bool) {
        self.close_hangs.store(hangs, Ordering::SeqCst);
    }

    /// Number of probes answered so far.
    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    /// Number of times `close()` was called.
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Session for MockSession {
    fn id(&self) -> u64 {
        self.id
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn probe(&self, timeout: Duration) -> Result<bool> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if self.is_closed() {
            return Ok(false);
        }

        let behavior = self
            .probe_behavior
            .lock()
            .map(|b| *b)
            .unwrap_or_default();

        match behavior {
            ProbeBehavior::Healthy => Ok(true),
            ProbeBehavior::Invalid => Ok(false),
            ProbeBehavior::Error => Err(TaskdeskError::validity_check("mock probe failure")),
            ProbeBehavior::Hang => {
                let _ = tokio::time::timeout(timeout, std::future::pending::<()>()).await;
                Ok(false)
            }
        }
    }

    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        if self.is_closed() {
            return Err(TaskdeskError::connection("Session is closed"));
        }

        if sql.trim_start().to_uppercase().starts_with("SELECT") {
            Ok(QueryResult::with_data(
                vec![ColumnInfo::new("result", "text")],
                vec![vec![Value::String(format!("Mock result for: {sql}"))]],
            )
            .with_execution_time(Duration::from_millis(1)))
        } else {
            Ok(QueryResult::default().with_execution_time(Duration::from_millis(1)))
        }
    }

    async fn close(&self) -> Result<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        if self.close_hangs.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}
