//! Session lifecycle tests through the public API, using the mock connector.

use std::sync::Arc;
use std::time::Duration;

use taskdesk::app::App;
use taskdesk::cli::Command;
use taskdesk::config::DatabaseConfig;
use taskdesk::connection::ConnectionManager;
use taskdesk::db::{MockConnector, ProbeBehavior};

fn test_config() -> DatabaseConfig {
    DatabaseConfig {
        host: Some("db.test".to_string()),
        database: Some("tasks".to_string()),
        user: Some("app".to_string()),
        ..Default::default()
    }
}

fn setup() -> (Arc<MockConnector>, ConnectionManager) {
    let connector = Arc::new(MockConnector::new());
    let manager = ConnectionManager::new(connector.clone(), test_config())
        .unwrap()
        .with_validation_timeout(Duration::from_millis(50));
    (connector, manager)
}

#[tokio::test]
async fn test_session_survives_many_commands() {
    let (connector, manager) = setup();
    let app = App::new(&manager);

    app.startup().await.unwrap();
    for _ in 0..10 {
        app.execute(&Command::Status).await.unwrap();
    }

    assert_eq!(connector.attempts(), 1);
    let session = connector.last_session().unwrap();
    // One probe per get_connection after the first establishment.
    assert_eq!(session.probe_count(), 10);
}

#[tokio::test]
async fn test_dropped_session_replaced_between_commands() {
    let (connector, manager) = setup();
    let app = App::new(&manager);

    app.startup().await.unwrap();
    let first = manager.current_session_id().await.unwrap();

    connector
        .last_session()
        .unwrap()
        .set_probe_behavior(ProbeBehavior::Hang);

    app.execute(&Command::Check).await.unwrap();
    let second = manager.current_session_id().await.unwrap();

    assert_ne!(first, second);
    assert_eq!(connector.open_sessions(), 1);
}

#[tokio::test]
async fn test_shutdown_closes_held_session() {
    let (connector, manager) = setup();
    let app = App::new(&manager);

    app.startup().await.unwrap();
    manager.shutdown().await;

    assert_eq!(connector.open_sessions(), 0);
    assert_eq!(connector.last_session().unwrap().close_calls(), 1);
}

#[tokio::test]
async fn test_endpoint_recovery() {
    let connector = Arc::new(MockConnector::unreachable());
    let manager = ConnectionManager::new(connector.clone(), test_config()).unwrap();
    let app = App::new(&manager);

    assert!(app.startup().await.is_err());
    assert!(manager.current_session_id().await.is_none());

    connector.set_reachable(true);
    app.startup().await.unwrap();
    assert!(manager.is_connected().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_concurrent_callers_share_one_session() {
    let connector = Arc::new(MockConnector::new().with_latency(Duration::from_millis(20)));
    let manager = Arc::new(ConnectionManager::new(connector.clone(), test_config()).unwrap());

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.get_connection().await.map(|s| s.id()) })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap());
    }

    assert!(ids.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(connector.attempts(), 1);
    assert_eq!(connector.open_sessions(), 1);
}
