//! Process-wide connection manager.
//!
//! Code that is handed a [`ConnectionManager`] should use it directly. This
//! accessor exists for collaborators that cannot receive one, and always
//! refers to the same instance for the life of the process.

use std::sync::{Arc, OnceLock};

use tracing::warn;

use crate::config::DatabaseConfig;
use crate::connection::ConnectionManager;
use crate::db::{Connector, PgConnector};
use crate::error::{Result, TaskdeskError};

static INSTANCE: OnceLock<ConnectionManager> = OnceLock::new();

/// Returns the process-wide manager, building it from the environment on
/// first use.
///
/// Never fails: a configuration problem is kept and reported by the first
/// `connect` or `get_connection` call instead.
pub fn instance() -> &'static ConnectionManager {
    INSTANCE.get_or_init(from_env)
}

/// Installs an explicitly constructed manager as the process-wide instance.
///
/// Must run before the first [`instance`] call.
pub fn install(manager: ConnectionManager) -> Result<&'static ConnectionManager> {
    INSTANCE
        .set(manager)
        .map_err(|_| TaskdeskError::internal("Connection manager is already initialized"))?;
    Ok(instance())
}

/// Closes the process-wide session if the instance was ever created.
pub async fn shutdown() {
    if let Some(manager) = INSTANCE.get() {
        manager.shutdown().await;
    }
}

fn from_env() -> ConnectionManager {
    build(Arc::new(PgConnector::new()), DatabaseConfig::from_env())
}

/// Builds a manager, keeping any configuration error for the first connect.
fn build(connector: Arc<dyn Connector>, config: Result<DatabaseConfig>) -> ConnectionManager {
    let manager = config.and_then(|config| ConnectionManager::new(connector.clone(), config));

    match manager {
        Ok(manager) => manager,
        Err(e) => {
            warn!(error = %e, "Database configuration from environment is unusable");
            ConnectionManager::misconfigured(connector, e)
        }
    }
}
