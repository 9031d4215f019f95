//! Connection manager state machine and schema setup.

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use acceptance::config::SAMPLE_TABLE;
use acceptance::store::schema::{ensure_sample_table, SchemaStatus};
use acceptance::store::{ConnectionManager, ConnectionState, Driver, SampleRecord, StoreError};
use common::{manager, manager_with_keepalive, wait_for_state, Backend, MemoryDriver};

#[tokio::test]
async fn test_schema_setup_is_idempotent() {
    let backend = Backend::new();
    let driver = MemoryDriver {
        backend: backend.clone(),
    };
    let mut session = driver.connect().await.unwrap();

    let first = ensure_sample_table(&mut *session).await.unwrap();
    let second = ensure_sample_table(&mut *session).await.unwrap();

    assert_eq!(first, SchemaStatus::Created);
    assert_eq!(second, SchemaStatus::Existing);
    assert_eq!(backend.creates.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_connect_creates_sample_table_once_across_reconnects() {
    let backend = Backend::new();
    let store = manager(&backend);
    assert_eq!(store.state(), ConnectionState::Unconfigured);

    store.spawn();
    wait_for_state(&store, ConnectionState::Connected).await;
    // waits for schema setup, which holds the session
    assert!(store.read_table(SAMPLE_TABLE).await.unwrap().is_empty());

    backend.break_sessions();
    assert!(store.ping().await.is_err());
    wait_for_state(&store, ConnectionState::Connected).await;
    store.ping().await.unwrap();

    assert_eq!(backend.connects.load(Ordering::SeqCst), 2);
    assert_eq!(backend.creates.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_connects_are_retried_until_success() {
    let backend = Backend::new();
    backend.refuse(true);
    let store = manager(&backend);

    store.spawn();
    wait_for_state(&store, ConnectionState::Failed).await;
    assert!(!store.is_connected());

    // several more attempts on the retry delay
    tokio::time::timeout(Duration::from_secs(5), async {
        while backend.connects.load(Ordering::SeqCst) < 3 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    backend.refuse(false);
    wait_for_state(&store, ConnectionState::Connected).await;
    assert!(store.ping().await.is_ok());
}

#[tokio::test]
async fn test_connection_error_drops_session_and_reconnects() {
    let backend = Backend::new();
    let store = manager(&backend);
    store.spawn();
    wait_for_state(&store, ConnectionState::Connected).await;

    backend.break_sessions();
    backend.refuse(true);

    let record = SampleRecord::new("lost", "2024-01-01 10:00").unwrap();
    let err = store.insert_sample(&record).await.unwrap_err();
    assert!(err.is_connection_lost());
    assert!(!store.is_connected());

    // no session until the supervisor gets one
    wait_for_state(&store, ConnectionState::Failed).await;
    assert!(matches!(
        store.insert_sample(&record).await,
        Err(StoreError::NotReady)
    ));

    backend.refuse(false);
    wait_for_state(&store, ConnectionState::Connected).await;
    store.insert_sample(&record).await.unwrap();
    assert_eq!(backend.rows(SAMPLE_TABLE), vec![record]);
}

#[tokio::test]
async fn test_query_errors_keep_the_session() {
    let backend = Backend::new();
    let store = manager(&backend);
    store.spawn();
    wait_for_state(&store, ConnectionState::Connected).await;

    let err = store.read_table("Missing").await.unwrap_err();
    assert!(matches!(err, StoreError::Query(_)));
    assert!(store.is_connected());
    assert_eq!(backend.connects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_schema_check_stops_the_supervisor() {
    let backend = Backend::new();
    backend.fail_schema_check.store(true, Ordering::SeqCst);
    let store = manager(&backend);

    let handle = store.spawn().unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();

    assert!(matches!(result, Err(StoreError::SchemaCheck(_))));
    assert_eq!(backend.creates.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unconfigured_manager_never_connects() {
    let store = ConnectionManager::unconfigured();

    assert!(store.spawn().is_none());
    assert!(!store.is_configured());
    assert_eq!(store.state(), ConnectionState::Unconfigured);
    assert!(matches!(
        store.read_table(SAMPLE_TABLE).await,
        Err(StoreError::NotConfigured)
    ));
    assert!(matches!(store.ping().await, Err(StoreError::NotConfigured)));
}

#[tokio::test]
async fn test_invalid_table_name_is_rejected_before_any_statement() {
    let backend = Backend::new();
    let store = manager(&backend);
    store.spawn();
    wait_for_state(&store, ConnectionState::Connected).await;
    store.ping().await.unwrap();
    let before = backend.statements();

    let err = store.read_table("x`; DROP TABLE y").await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidTable(_)));
    assert_eq!(backend.statements(), before);
}

#[tokio::test]
async fn test_keepalive_notices_idle_breakage_and_reconnects() {
    let backend = Backend::new();
    let store = manager_with_keepalive(&backend, Duration::from_millis(20));
    store.spawn();
    wait_for_state(&store, ConnectionState::Connected).await;

    backend.break_sessions();
    backend.refuse(true);
    // nothing uses the session; the supervisor's own ping must find it
    wait_for_state(&store, ConnectionState::Failed).await;
    assert!(!store.is_connected());

    backend.refuse(false);
    wait_for_state(&store, ConnectionState::Connected).await;
    store.ping().await.unwrap();
    assert!(backend.connects.load(Ordering::SeqCst) >= 3);
    assert_eq!(backend.creates.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_keepalive_leaves_a_healthy_session_alone() {
    let backend = Backend::new();
    let store = manager_with_keepalive(&backend, Duration::from_millis(10));
    store.spawn();
    wait_for_state(&store, ConnectionState::Connected).await;

    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(store.is_connected());
    assert_eq!(backend.connects.load(Ordering::SeqCst), 1);
    // table check, create, then at least one ping
    assert!(backend.statements() > 2);
}
