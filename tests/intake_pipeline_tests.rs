//! Message intake pipeline tests: group gating, relevance filtering,
//! content-hash deduplication, and durable storage of qualifying messages.

mod test_utils;

use std::sync::Arc;

use chrono::Utc;
use intake::messaging::{
    ConnectionEvent, ConnectionState, InboundMessage, MessageContent,
};
use intake::repositories::{GroupPreferenceRepository, MessageRepository};
use intake::session::SessionRegistry;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

use test_utils::{ScriptedConnector, setup_db, test_crypto_key, test_session_config, wait_until};

fn open_event() -> ConnectionEvent {
    ConnectionEvent::ConnectionUpdate {
        state: ConnectionState::Open,
        login_challenge: None,
        disconnect: None,
    }
}

fn text_message(group_id: &str, sender: &str, body: &str) -> InboundMessage {
    InboundMessage {
        group_id: group_id.to_string(),
        group_name: format!("group {}", group_id),
        sender: sender.to_string(),
        content: MessageContent::Text {
            body: body.to_string(),
        },
        sent_at: Utc::now(),
        payload: None,
    }
}

const LISTING_TEXT: &str = "3BHK flat for rent, 15000/month, near metro, contact 9876543210";

struct Harness {
    connector: Arc<ScriptedConnector>,
    registry: Arc<SessionRegistry>,
    db: Arc<sea_orm::DatabaseConnection>,
}

async fn connected_session(tenant_id: &str, enabled_groups: &[&str]) -> Harness {
    let db = setup_db().await;

    let prefs = GroupPreferenceRepository::new(db.clone());
    for group_id in enabled_groups {
        prefs
            .upsert(tenant_id, group_id, &format!("group {}", group_id), true)
            .await
            .expect("seed group preference");
    }

    let connector = ScriptedConnector::new(vec![Ok(vec![open_event()])]);
    let registry = SessionRegistry::new(
        db.clone(),
        test_crypto_key(),
        connector.clone(),
        test_session_config(),
        60,
    );

    let session = registry.get_or_create(tenant_id).await;
    session.request_connect();
    assert!(
        wait_until(|| async { session.status().await.connected }).await,
        "session never connected"
    );

    Harness {
        connector,
        registry,
        db,
    }
}

async fn stored_count(db: &sea_orm::DatabaseConnection, tenant_id: &str) -> u64 {
    use sea_orm::PaginatorTrait;
    intake::models::Message::find()
        .filter(intake::models::message::Column::TenantId.eq(tenant_id))
        .count(db)
        .await
        .expect("count messages")
}

#[tokio::test]
async fn relevant_message_is_stored() {
    let harness = connected_session("tenant-a", &["group-1"]).await;

    harness
        .connector
        .push_event(ConnectionEvent::MessagesReceived(vec![text_message(
            "group-1",
            "919876543210",
            LISTING_TEXT,
        )]))
        .await;

    let db = harness.db.clone();
    assert!(
        wait_until(|| {
            let db = db.clone();
            async move { stored_count(&db, "tenant-a").await == 1 }
        })
        .await,
        "relevant message was not stored"
    );

    let stored = intake::models::Message::find()
        .one(&*harness.db)
        .await
        .expect("query")
        .expect("row");
    assert_eq!(stored.body, LISTING_TEXT);
    assert_eq!(stored.group_id, "group-1");
    assert!(!stored.processed);
    assert_eq!(stored.content_hash.len(), 64);

    harness.registry.shutdown_all().await;
}

#[tokio::test]
async fn irrelevant_chatter_is_dropped() {
    let harness = connected_session("tenant-a", &["group-1"]).await;

    harness
        .connector
        .push_event(ConnectionEvent::MessagesReceived(vec![
            text_message("group-1", "919876543210", "good morning"),
            text_message("group-1", "919876543210", "thanks everyone!"),
        ]))
        .await;

    // Follow with a relevant message so we can tell processing finished.
    harness
        .connector
        .push_event(ConnectionEvent::MessagesReceived(vec![text_message(
            "group-1",
            "919876543210",
            LISTING_TEXT,
        )]))
        .await;

    let db = harness.db.clone();
    assert!(
        wait_until(|| {
            let db = db.clone();
            async move { stored_count(&db, "tenant-a").await == 1 }
        })
        .await
    );

    assert_eq!(stored_count(&harness.db, "tenant-a").await, 1);
    harness.registry.shutdown_all().await;
}

#[tokio::test]
async fn messages_from_unmonitored_groups_are_ignored() {
    let harness = connected_session("tenant-a", &["group-1"]).await;

    harness
        .connector
        .push_event(ConnectionEvent::MessagesReceived(vec![
            text_message("group-other", "919876543210", LISTING_TEXT),
            text_message("group-1", "919876543210", LISTING_TEXT),
        ]))
        .await;

    let db = harness.db.clone();
    assert!(
        wait_until(|| {
            let db = db.clone();
            async move { stored_count(&db, "tenant-a").await == 1 }
        })
        .await
    );

    let stored = intake::models::Message::find()
        .one(&*harness.db)
        .await
        .expect("query")
        .expect("row");
    assert_eq!(stored.group_id, "group-1");
    harness.registry.shutdown_all().await;
}

#[tokio::test]
async fn duplicate_listings_are_stored_once() {
    let harness = connected_session("tenant-a", &["group-1"]).await;

    // Same sender, text differing only in case and punctuation.
    harness
        .connector
        .push_event(ConnectionEvent::MessagesReceived(vec![
            text_message("group-1", "919876543210", LISTING_TEXT),
            text_message(
                "group-1",
                "919876543210",
                "3bhk FLAT for rent, 15000/month, near metro!! contact 9876543210",
            ),
        ]))
        .await;

    // A distinct message afterwards marks the batch as fully processed.
    harness
        .connector
        .push_event(ConnectionEvent::MessagesReceived(vec![text_message(
            "group-1",
            "918888888888",
            "2BHK apartment for sale, 65 lakh, 1100 sqft, contact 9811111111",
        )]))
        .await;

    let db = harness.db.clone();
    assert!(
        wait_until(|| {
            let db = db.clone();
            async move { stored_count(&db, "tenant-a").await == 2 }
        })
        .await,
        "expected exactly two stored messages (one duplicate collapsed)"
    );

    assert_eq!(stored_count(&harness.db, "tenant-a").await, 2);
    harness.registry.shutdown_all().await;
}

#[tokio::test]
async fn same_listing_from_different_senders_is_kept() {
    let harness = connected_session("tenant-a", &["group-1"]).await;

    harness
        .connector
        .push_event(ConnectionEvent::MessagesReceived(vec![
            text_message("group-1", "919876543210", LISTING_TEXT),
            text_message("group-1", "918888888888", LISTING_TEXT),
        ]))
        .await;

    let db = harness.db.clone();
    assert!(
        wait_until(|| {
            let db = db.clone();
            async move { stored_count(&db, "tenant-a").await == 2 }
        })
        .await,
        "hash must include the sender"
    );

    harness.registry.shutdown_all().await;
}

#[tokio::test]
async fn duplicate_check_is_tenant_scoped() {
    let db = setup_db().await;
    let messages = MessageRepository::new(db.clone());

    let base = intake::repositories::message::NewMessage {
        tenant_id: "tenant-a".to_string(),
        group_id: "group-1".to_string(),
        group_name: "group one".to_string(),
        sender: "919876543210".to_string(),
        body: LISTING_TEXT.to_string(),
        payload: None,
        content_hash: intake::dedup::content_hash("919876543210", LISTING_TEXT),
        sent_at: Utc::now(),
    };

    assert!(messages.insert_if_new(base.clone()).await.unwrap().is_some());
    // Same hash, same tenant: rejected.
    assert!(messages.insert_if_new(base.clone()).await.unwrap().is_none());

    // Same hash, another tenant: stored.
    let other_tenant = intake::repositories::message::NewMessage {
        tenant_id: "tenant-b".to_string(),
        ..base
    };
    assert!(
        messages
            .insert_if_new(other_tenant)
            .await
            .unwrap()
            .is_some()
    );
}
