//! Shared helpers for integration tests: in-memory database setup, a
//! scripted messaging connector, and a mock inference client.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sea_orm::{Database, DatabaseConnection};
use tokio::sync::mpsc;

use intake::config::SessionConfig;
use intake::crypto::CryptoKey;
use intake::extraction::{InferenceClient, InferenceError, MessageInference};
use intake::messaging::{
    AuthStore, ChatConnector, ChatControl, ChatHandle, ConnectionEvent, ConnectorError,
    GroupMetadata,
};
use migration::{Migrator, MigratorTrait};

/// Fresh in-memory SQLite database with all migrations applied.
pub async fn setup_db() -> Arc<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("connect to in-memory db");
    Migrator::up(&db, None).await.expect("apply migrations");
    Arc::new(db)
}

/// Deterministic 32-byte crypto key for tests.
pub fn test_crypto_key() -> CryptoKey {
    CryptoKey::new(vec![42u8; 32]).expect("32-byte key")
}

/// Session configuration tuned for fast tests.
pub fn test_session_config() -> SessionConfig {
    SessionConfig {
        sweep_interval_seconds: 3600,
        idle_unconnected_seconds: 600,
        idle_connected_seconds: 86400,
        reconnect_delay_seconds: 0,
        reconnect_max_attempts: 2,
        shutdown_timeout_seconds: 5,
        key_flush_chunk_size: 50,
    }
}

/// Poll `cond` until it holds or a ~2 second budget elapses.
pub async fn wait_until<F, Fut>(mut cond: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if cond().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

struct NoopControl;

#[async_trait]
impl ChatControl for NoopControl {
    async fn fetch_group_metadata(
        &self,
        group_id: &str,
    ) -> Result<GroupMetadata, ConnectorError> {
        Ok(GroupMetadata {
            group_id: group_id.to_string(),
            name: format!("group {}", group_id),
            participant_count: None,
        })
    }

    async fn fetch_participating_groups(&self) -> Result<Vec<GroupMetadata>, ConnectorError> {
        Ok(Vec::new())
    }

    async fn close(&self) {}
}

/// One scripted `open()` outcome: either a sequence of events to deliver, or
/// an open failure.
pub type OpenScript = Result<Vec<ConnectionEvent>, ()>;

/// Connector that replays scripted event sequences, one script per `open()`
/// call, in order. The event sender for each connection is retained so the
/// channel stays alive (and tests can push further events) until
/// `drop_senders` is called.
pub struct ScriptedConnector {
    scripts: Mutex<VecDeque<OpenScript>>,
    senders: Mutex<Vec<mpsc::Sender<ConnectionEvent>>>,
    open_count: AtomicUsize,
}

impl ScriptedConnector {
    pub fn new(scripts: Vec<OpenScript>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            senders: Mutex::new(Vec::new()),
            open_count: AtomicUsize::new(0),
        })
    }

    /// How many times `open()` has been called.
    pub fn open_count(&self) -> usize {
        self.open_count.load(Ordering::SeqCst)
    }

    /// Push an event into the most recent live connection.
    pub async fn push_event(&self, event: ConnectionEvent) {
        let sender = {
            let senders = self.senders.lock().expect("senders lock");
            senders.last().cloned()
        };
        sender
            .expect("no live connection")
            .send(event)
            .await
            .expect("event channel closed");
    }

    /// Drop all retained senders, closing every live event channel.
    pub fn drop_senders(&self) {
        self.senders.lock().expect("senders lock").clear();
    }
}

#[async_trait]
impl ChatConnector for ScriptedConnector {
    async fn open(
        &self,
        _tenant_id: &str,
        _auth: Arc<dyn AuthStore>,
    ) -> Result<ChatHandle, ConnectorError> {
        self.open_count.fetch_add(1, Ordering::SeqCst);

        let script = self
            .scripts
            .lock()
            .expect("scripts lock")
            .pop_front()
            .unwrap_or(Err(()));

        match script {
            Ok(events) => {
                let (tx, rx) = mpsc::channel(64);
                for event in events {
                    tx.send(event).await.expect("scripted event send");
                }
                self.senders.lock().expect("senders lock").push(tx);
                Ok(ChatHandle {
                    events: rx,
                    control: Arc::new(NoopControl),
                })
            }
            Err(()) => Err(ConnectorError::OpenFailed("scripted failure".to_string())),
        }
    }
}

/// Inference client that replays queued responses and records every call.
pub struct MockInference {
    responses: Mutex<VecDeque<Result<Vec<MessageInference>, InferenceError>>>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl MockInference {
    pub fn new(responses: Vec<Result<Vec<MessageInference>, InferenceError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// The text batches passed to `batch_infer`, in call order.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl InferenceClient for MockInference {
    async fn batch_infer(&self, texts: &[String]) -> Result<Vec<MessageInference>, InferenceError> {
        self.calls
            .lock()
            .expect("calls lock")
            .push(texts.to_vec());
        self.responses
            .lock()
            .expect("responses lock")
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}
