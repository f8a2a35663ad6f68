//! Session registry lifecycle tests: idempotent creation, connection state
//! transitions, terminal logout handling, reconnect exhaustion, idle
//! sweeping, and auto-reconnect from persisted credentials.

mod test_utils;

use std::sync::Arc;

use intake::config::SessionConfig;
use intake::messaging::{ConnectionEvent, ConnectionState, DisconnectReason};
use intake::repositories::{AuthKeyRepository, CredentialRepository};
use intake::session::SessionRegistry;
use serde_json::json;

use test_utils::{
    ScriptedConnector, setup_db, test_crypto_key, test_session_config, wait_until,
};

fn open_event() -> ConnectionEvent {
    ConnectionEvent::ConnectionUpdate {
        state: ConnectionState::Open,
        login_challenge: None,
        disconnect: None,
    }
}

fn closed_event(reason: DisconnectReason) -> ConnectionEvent {
    ConnectionEvent::ConnectionUpdate {
        state: ConnectionState::Closed,
        login_challenge: None,
        disconnect: Some(reason),
    }
}

async fn registry_with(
    connector: Arc<ScriptedConnector>,
    config: SessionConfig,
) -> (Arc<SessionRegistry>, Arc<sea_orm::DatabaseConnection>) {
    let db = setup_db().await;
    let registry = SessionRegistry::new(
        db.clone(),
        test_crypto_key(),
        connector,
        config,
        60,
    );
    (registry, db)
}

#[tokio::test]
async fn get_or_create_is_idempotent() {
    let connector = ScriptedConnector::new(vec![]);
    let (registry, _db) = registry_with(connector, test_session_config()).await;

    let first = registry.get_or_create("tenant-a").await;
    let second = registry.get_or_create("tenant-a").await;

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(registry.len(), 1);

    let other = registry.get_or_create("tenant-b").await;
    assert!(!Arc::ptr_eq(&first, &other));
    assert_eq!(registry.len(), 2);
}

#[tokio::test]
async fn connect_reaches_open_and_clears_challenge() {
    let connector = ScriptedConnector::new(vec![Ok(vec![
        ConnectionEvent::ConnectionUpdate {
            state: ConnectionState::Connecting,
            login_challenge: Some("scan-me".to_string()),
            disconnect: None,
        },
        open_event(),
    ])]);
    let (registry, _db) = registry_with(connector.clone(), test_session_config()).await;

    let session = registry.get_or_create("tenant-a").await;
    session.request_connect();

    assert!(
        wait_until(|| async { session.status().await.connected }).await,
        "session never reached open"
    );

    let status = session.status().await;
    assert_eq!(status.status, "connected");
    assert!(!status.qr_pending);
    assert!(status.login_challenge.is_none());
    assert_eq!(connector.open_count(), 1);
}

#[tokio::test]
async fn terminal_logout_purges_credentials_and_evicts() {
    let connector = ScriptedConnector::new(vec![Ok(vec![
        open_event(),
        closed_event(DisconnectReason::LoggedOut),
    ])]);
    let (registry, db) = registry_with(connector, test_session_config()).await;

    // Seed persisted state that the logout must purge.
    let credential_repo = CredentialRepository::new(db.clone(), test_crypto_key());
    credential_repo
        .save("tenant-a", &json!({"registration_id": 7}))
        .await
        .expect("seed credentials");

    let session = registry.get_or_create("tenant-a").await;
    session.request_connect();

    assert!(
        wait_until(|| async { registry.get_if_exists("tenant-a").is_none() }).await,
        "session was not evicted after logout"
    );

    assert!(
        !credential_repo.exists("tenant-a").await.expect("exists query"),
        "credentials survived logout"
    );

    let keys = AuthKeyRepository::new(db, test_crypto_key())
        .load_all("tenant-a")
        .await
        .expect("load keys");
    assert!(keys.is_empty());
}

#[tokio::test]
async fn transient_failures_exhaust_into_reconnect_required() {
    // Both open attempts fail; the cap of 2 attempts is reached.
    let connector = ScriptedConnector::new(vec![Err(()), Err(())]);
    let (registry, _db) = registry_with(connector.clone(), test_session_config()).await;

    let session = registry.get_or_create("tenant-a").await;
    session.request_connect();

    assert!(
        wait_until(|| async { session.status().await.status == "reconnect_required" }).await,
        "session never surfaced reconnect_required"
    );
    assert_eq!(connector.open_count(), 2);

    // The session stays registered; only a manual reconnect revives it.
    assert!(registry.get_if_exists("tenant-a").is_some());
}

#[tokio::test]
async fn transient_disconnect_triggers_reconnect() {
    let connector = ScriptedConnector::new(vec![
        Ok(vec![
            open_event(),
            closed_event(DisconnectReason::ConnectionLost),
        ]),
        Ok(vec![open_event()]),
    ]);
    let (registry, _db) = registry_with(connector.clone(), test_session_config()).await;

    let session = registry.get_or_create("tenant-a").await;
    session.request_connect();

    assert!(
        wait_until(|| async {
            connector.open_count() == 2 && session.status().await.connected
        })
        .await,
        "session did not reconnect after transient disconnect"
    );
}

#[tokio::test]
async fn sweep_spares_active_connected_sessions() {
    let connector = ScriptedConnector::new(vec![Ok(vec![open_event()])]);
    let mut config = test_session_config();
    // Everything not connected is instantly idle; connected sessions have a
    // generous budget.
    config.idle_unconnected_seconds = 0;
    config.idle_connected_seconds = 86400;
    let (registry, _db) = registry_with(connector, config).await;

    let session = registry.get_or_create("tenant-a").await;
    session.request_connect();
    assert!(wait_until(|| async { session.status().await.connected }).await);

    session.touch();
    registry.sweep_now().await;

    assert!(
        registry.get_if_exists("tenant-a").is_some(),
        "active connected session must not be evicted"
    );
}

#[tokio::test]
async fn sweep_evicts_idle_disconnected_sessions() {
    let connector = ScriptedConnector::new(vec![]);
    let mut config = test_session_config();
    config.idle_unconnected_seconds = 0;
    let (registry, _db) = registry_with(connector, config).await;

    registry.get_or_create("tenant-a").await;
    registry.sweep_now().await;

    assert!(
        registry.get_if_exists("tenant-a").is_none(),
        "idle disconnected session should be evicted"
    );
}

#[tokio::test]
async fn sweep_spares_sessions_awaiting_login_challenge() {
    let connector = ScriptedConnector::new(vec![Ok(vec![ConnectionEvent::ConnectionUpdate {
        state: ConnectionState::Connecting,
        login_challenge: Some("pending-scan".to_string()),
        disconnect: None,
    }])]);
    let mut config = test_session_config();
    config.idle_unconnected_seconds = 0;
    let (registry, _db) = registry_with(connector, config).await;

    let session = registry.get_or_create("tenant-a").await;
    session.request_connect();
    assert!(wait_until(|| async { session.status().await.qr_pending }).await);

    registry.sweep_now().await;

    assert!(
        registry.get_if_exists("tenant-a").is_some(),
        "session awaiting a login challenge must not be evicted"
    );
}

#[tokio::test]
async fn persisted_credentials_trigger_auto_reconnect() {
    let connector = ScriptedConnector::new(vec![Ok(vec![open_event()])]);
    let db = setup_db().await;

    CredentialRepository::new(db.clone(), test_crypto_key())
        .save("tenant-a", &json!({"registration_id": 99}))
        .await
        .expect("seed credentials");

    let registry = SessionRegistry::new(
        db,
        test_crypto_key(),
        connector.clone(),
        test_session_config(),
        60,
    );

    let session = registry.get_or_create("tenant-a").await;

    assert!(
        wait_until(|| async { session.status().await.connected }).await,
        "auto-reconnect from persisted credentials did not happen"
    );
    assert_eq!(connector.open_count(), 1);
}

#[tokio::test]
async fn evict_is_idempotent_for_absent_tenants() {
    let connector = ScriptedConnector::new(vec![]);
    let (registry, _db) = registry_with(connector, test_session_config()).await;

    // No session exists; this must be a no-op.
    registry.evict("ghost-tenant").await;
    assert!(registry.is_empty());
}

#[tokio::test]
async fn shutdown_all_tears_down_every_session() {
    let connector = ScriptedConnector::new(vec![
        Ok(vec![open_event()]),
        Ok(vec![open_event()]),
    ]);
    let (registry, _db) = registry_with(connector, test_session_config()).await;

    let a = registry.get_or_create("tenant-a").await;
    let b = registry.get_or_create("tenant-b").await;
    a.request_connect();
    b.request_connect();
    assert!(wait_until(|| async { a.status().await.connected }).await);
    assert!(wait_until(|| async { b.status().await.connected }).await);

    registry.shutdown_all().await;

    assert!(registry.is_empty());
    assert!(!a.status().await.connected);
    assert!(!b.status().await.connected);
}
