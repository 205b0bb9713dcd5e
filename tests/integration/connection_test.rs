//! PostgreSQL connection tests.
//!
//! Tests connectivity, liveness probes and error mapping against a real server.

use std::sync::Arc;
use std::time::Duration;

use taskdesk::config::DatabaseConfig;
use taskdesk::connection::ConnectionManager;
use taskdesk::db::{Connector, PgConnector, PgSession, Session};
use taskdesk::error::TaskdeskError;

/// Helper to get test database URL from environment.
fn get_test_database_url() -> Option<String> {
    std::env::var("DATABASE_URL").ok()
}

fn get_test_config() -> Option<DatabaseConfig> {
    let url = get_test_database_url()?;
    DatabaseConfig::from_connection_string(&url).ok()
}

fn unreachable_config() -> DatabaseConfig {
    DatabaseConfig {
        host: Some("127.0.0.1".to_string()),
        port: 59999, // Unlikely to be in use
        database: Some("testdb".to_string()),
        user: Some("testuser".to_string()),
        password: Some("testpass".to_string()),
        encrypt: false,
        login_timeout_secs: 5,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_connect_with_valid_credentials() {
    let Some(config) = get_test_config() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let session = PgSession::connect(&config).await.unwrap();
    assert!(session.probe(Duration::from_secs(5)).await.unwrap());

    session.close().await.unwrap();
    session.close().await.unwrap();
    assert!(session.is_closed());
    assert!(!session.probe(Duration::from_secs(5)).await.unwrap());
}

#[tokio::test]
async fn test_select_one() {
    let Some(config) = get_test_config() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let session = PgConnector::new().establish(&config).await.unwrap();
    let result = session.execute_query("SELECT 1 AS one").await.unwrap();

    assert_eq!(result.row_count, 1);
    assert_eq!(result.columns[0].name, "one");
    assert_eq!(result.scalar().map(|v| v.to_display_string()), Some("1".to_string()));
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_query_error_is_reported() {
    let Some(config) = get_test_config() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let session = PgConnector::new().establish(&config).await.unwrap();
    let err = session
        .execute_query("SELECT * FROM table_that_does_not_exist")
        .await
        .unwrap_err();

    assert!(matches!(err, TaskdeskError::Query(_)));
    // A failed statement does not invalidate the session.
    assert!(session.probe(Duration::from_secs(5)).await.unwrap());
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_manager_replaces_terminated_backend() {
    let Some(config) = get_test_config() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let manager = ConnectionManager::postgres(config).unwrap();
    let first = manager.get_connection().await.unwrap();
    let pid = first
        .execute_query("SELECT pg_backend_pid()")
        .await
        .unwrap()
        .scalar()
        .map(|v| v.to_display_string())
        .unwrap();

    // Kill the backend from a second connection.
    let killer = PgConnector::new()
        .establish(manager.config().unwrap())
        .await
        .unwrap();
    killer
        .execute_query(&format!("SELECT pg_terminate_backend({pid})"))
        .await
        .unwrap();
    killer.close().await.unwrap();

    let second = manager.get_connection().await.unwrap();
    assert_ne!(first.id(), second.id());
    assert!(second.execute_query("SELECT 1").await.is_ok());

    manager.shutdown().await;
}

#[tokio::test(flavor = "current_thread")]
async fn test_connect_with_invalid_port() {
    let result = PgSession::connect(&unreachable_config()).await;

    let err = result.unwrap_err();
    assert!(matches!(err, TaskdeskError::Connection(_)), "got: {err}");
}

#[tokio::test(flavor = "current_thread")]
async fn test_manager_stores_nothing_when_unreachable() {
    let connector: Arc<dyn Connector> = Arc::new(PgConnector::new());
    let manager = ConnectionManager::new(connector, unreachable_config()).unwrap();

    let err = manager.connect().await.unwrap_err();
    assert_eq!(err.category(), "Connection Error");
    assert!(!manager.is_connected().await);
    assert!(manager.current_session_id().await.is_none());

    manager.shutdown().await;
}
