//! Connection manager: one live session, validated on every access.
//!
//! The manager holds at most one [`Session`]. `get_connection` probes it and
//! transparently replaces it when it is absent, closed, or fails the probe.
//! A single async mutex covers the whole check-then-replace sequence, so
//! concurrent callers never race two replacements.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::DatabaseConfig;
use crate::db::{Connector, PgConnector, Session};
use crate::error::{Result, TaskdeskError};

/// Manages the lifecycle of the application's single database session.
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    /// Validated parameters, or the configuration problem to report on connect.
    config: std::result::Result<DatabaseConfig, TaskdeskError>,
    validation_timeout: Duration,
    current: Mutex<Option<Arc<dyn Session>>>,
}

impl ConnectionManager {
    /// Creates a manager that opens sessions with `connector`.
    ///
    /// No session is opened until [`connect`](Self::connect) or
    /// [`get_connection`](Self::get_connection) is called.
    pub fn new(connector: Arc<dyn Connector>, config: DatabaseConfig) -> Result<Self> {
        config.validate()?;
        let validation_timeout = config.validation_timeout();
        Ok(Self {
            connector,
            config: Ok(config),
            validation_timeout,
            current: Mutex::new(None),
        })
    }

    /// Creates a manager backed by PostgreSQL.
    pub fn postgres(config: DatabaseConfig) -> Result<Self> {
        Self::new(Arc::new(PgConnector::new()), config)
    }

    /// Creates a manager whose configuration could not be loaded.
    ///
    /// Construction succeeds; every connect attempt reports `error`.
    pub(crate) fn misconfigured(connector: Arc<dyn Connector>, error: TaskdeskError) -> Self {
        Self {
            connector,
            config: Err(error),
            validation_timeout: DatabaseConfig::default().validation_timeout(),
            current: Mutex::new(None),
        }
    }

    /// Overrides the liveness probe timeout.
    pub fn with_validation_timeout(mut self, timeout: Duration) -> Self {
        self.validation_timeout = timeout;
        self
    }

    /// Connection parameters in use.
    pub fn config(&self) -> Result<&DatabaseConfig> {
        self.config.as_ref().map_err(|e| e.clone())
    }

    pub fn validation_timeout(&self) -> Duration {
        self.validation_timeout
    }

    /// Ensures a valid session is held, establishing one if needed.
    ///
    /// On failure nothing is stored and the error is returned as-is
    /// (`Connection` or `Configuration`). No retry is attempted.
    pub async fn connect(&self) -> Result<()> {
        self.get_connection().await.map(|_| ())
    }

    /// Returns the current session, replacing it first if it is no longer valid.
    ///
    /// Never returns a dead session. Callers should use the result for one
    /// operation and call again for the next.
    pub async fn get_connection(&self) -> Result<Arc<dyn Session>> {
        let mut current = self.current.lock().await;

        if let Some(session) = current.as_ref() {
            if self.is_live(session.as_ref()).await {
                return Ok(Arc::clone(session));
            }
        }

        self.replace(&mut current).await
    }

    /// Closes and discards the current session. Idempotent.
    pub async fn close(&self) {
        let mut current = self.current.lock().await;
        if let Some(session) = current.take() {
            discard(session, self.validation_timeout).await;
        }
    }

    /// Application exit hook: closes the session. Idempotent.
    ///
    /// The manager stays usable; a later `get_connection` reconnects.
    pub async fn shutdown(&self) {
        self.close().await;
        info!("Connection manager shut down");
    }

    /// Whether a session is held and not known to be closed. Does not probe.
    pub async fn is_connected(&self) -> bool {
        self.current
            .lock()
            .await
            .as_ref()
            .is_some_and(|session| !session.is_closed())
    }

    /// Id of the held session, if any.
    pub async fn current_session_id(&self) -> Option<u64> {
        self.current.lock().await.as_ref().map(|session| session.id())
    }

    async fn is_live(&self, session: &dyn Session) -> bool {
        if session.is_closed() {
            debug!(session_id = session.id(), "Session reports closed");
            return false;
        }

        match session.probe(self.validation_timeout).await {
            Ok(true) => true,
            Ok(false) => {
                warn!(
                    session_id = session.id(),
                    timeout = ?self.validation_timeout,
                    "Session failed liveness probe"
                );
                false
            }
            Err(e) => {
                warn!(session_id = session.id(), error = %e, "Liveness probe errored");
                false
            }
        }
    }

    /// Drops whatever is in `slot` and stores a freshly established session.
    async fn replace(&self, slot: &mut Option<Arc<dyn Session>>) -> Result<Arc<dyn Session>> {
        if let Some(stale) = slot.take() {
            discard(stale, self.validation_timeout).await;
        }

        let config = self.config()?;
        info!(
            backend = self.connector.backend(),
            target = %config.display_string(),
            "Establishing database session"
        );

        let session = self.connector.establish(config).await.map_err(|e| match e {
            TaskdeskError::Connection(_) | TaskdeskError::Configuration(_) => e,
            other => TaskdeskError::connection(other.to_string()),
        })?;

        info!(session_id = session.id(), "Database session established");
        *slot = Some(Arc::clone(&session));
        Ok(session)
    }
}

/// Closes a session the manager no longer holds, waiting at most `timeout`.
/// Failures are only logged.
async fn discard(session: Arc<dyn Session>, timeout: Duration) {
    let id = session.id();
    match tokio::time::timeout(timeout, session.close()).await {
        Ok(Ok(())) => debug!(session_id = id, "Session closed"),
        Ok(Err(e)) => warn!(session_id = id, error = %e, "Failed to close session"),
        Err(_) => warn!(session_id = id, ?timeout, "Session close timed out; abandoning it"),
    }
}
