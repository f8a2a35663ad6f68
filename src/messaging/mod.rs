//! Messaging connector capability
//!
//! Defines the interface between tenant sessions and the external real-time
//! messaging network. The wire protocol and its encryption are implemented
//! elsewhere; this module only fixes the contract: open a session against an
//! auth store, receive a stream of connection/message events, and query group
//! metadata. Tests substitute a scripted in-memory connector.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tokio::sync::mpsc;

/// Connector-level error types
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("failed to open connection: {0}")]
    OpenFailed(String),
    #[error("connection is not open")]
    NotConnected,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("auth store error: {0}")]
    AuthStore(String),
}

/// Connection lifecycle state as reported by the connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Closed,
    Connecting,
    Open,
}

/// Why a connection reached `Closed`.
///
/// Terminal reasons purge credentials and suppress reconnect; everything else
/// is treated as transient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The tenant explicitly logged out on another device.
    LoggedOut,
    /// Another client claimed this session; ours was superseded.
    SessionReplaced,
    /// Network-level drop; safe to reconnect.
    ConnectionLost,
    /// The server asked the client to restart the socket.
    Restarting,
    /// Anything the connector could not classify.
    Other(String),
}

impl DisconnectReason {
    /// Terminal reasons require re-provisioning before another connection.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DisconnectReason::LoggedOut | DisconnectReason::SessionReplaced
        )
    }
}

/// Payload of an inbound message, keyed by the message kinds the network
/// actually delivers, with an explicit fallback for everything else.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageContent {
    /// Plain conversation text
    Text { body: String },
    /// Text with quoting/mention context attached
    ExtendedText { body: String, context: JsonValue },
    /// Media message carrying a caption
    MediaCaption { media_kind: String, caption: String },
    /// Unrecognized message kind; raw payload retained for storage
    Unknown,
}

impl MessageContent {
    /// Extract the human-readable text, if this content kind carries any.
    pub fn text(&self) -> Option<&str> {
        match self {
            MessageContent::Text { body } => Some(body),
            MessageContent::ExtendedText { body, .. } => Some(body),
            MessageContent::MediaCaption { caption, .. } => Some(caption),
            MessageContent::Unknown => None,
        }
    }
}

/// One inbound group message as delivered by the connector.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// External group identifier the message arrived from
    pub group_id: String,
    /// Group display name at delivery time
    pub group_name: String,
    /// Sender identifier within the group
    pub sender: String,
    /// Parsed message content
    pub content: MessageContent,
    /// Timestamp reported by the network
    pub sent_at: DateTime<Utc>,
    /// Raw structured payload for archival, when available
    pub payload: Option<JsonValue>,
}

/// Events emitted by an open connection, delivered strictly in order.
#[derive(Debug)]
pub enum ConnectionEvent {
    /// Connection state changed; may carry a login challenge while pairing,
    /// and a disconnect reason when the state is `Closed`.
    ConnectionUpdate {
        state: ConnectionState,
        login_challenge: Option<String>,
        disconnect: Option<DisconnectReason>,
    },
    /// The connector rotated its mutable credential state; the new blob must
    /// be persisted before the connection proceeds.
    CredentialsRotated { credentials: JsonValue },
    /// A batch of inbound messages.
    MessagesReceived(Vec<InboundMessage>),
}

/// Metadata for one external group.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct GroupMetadata {
    pub group_id: String,
    pub name: String,
    pub participant_count: Option<u32>,
}

/// Key mutation batch: key_type -> key_id -> new value (`None` deletes).
pub type KeyMutations = HashMap<String, HashMap<String, Option<JsonValue>>>;

/// Credential/key access the connector needs while a session is live.
///
/// Implemented by the session keystore. `apply_key_mutations` must persist
/// durably before returning; the connector's own retry logic depends on it.
#[async_trait]
pub trait AuthStore: Send + Sync {
    /// Current mutable credential state (serialized form).
    async fn credentials(&self) -> JsonValue;

    /// Fetch present entries for the requested ids; absent ids are omitted.
    async fn get_keys(&self, key_type: &str, ids: &[String]) -> HashMap<String, JsonValue>;

    /// Apply inserts/updates/deletes and flush them to durable storage.
    async fn apply_key_mutations(&self, mutations: KeyMutations) -> Result<(), ConnectorError>;

    /// Persist a rotated credential blob.
    async fn save_credentials(&self, credentials: JsonValue) -> Result<(), ConnectorError>;
}

/// Control surface of one open connection.
#[async_trait]
pub trait ChatControl: Send + Sync {
    /// Fetch metadata for a single group.
    async fn fetch_group_metadata(&self, group_id: &str)
    -> Result<GroupMetadata, ConnectorError>;

    /// Fetch all groups the account participates in.
    async fn fetch_participating_groups(&self) -> Result<Vec<GroupMetadata>, ConnectorError>;

    /// Close the connection. Idempotent.
    async fn close(&self);
}

/// One opened connection: an ordered event stream plus its control surface.
pub struct ChatHandle {
    pub events: mpsc::Receiver<ConnectionEvent>,
    pub control: Arc<dyn ChatControl>,
}

/// Factory for per-tenant connections.
#[async_trait]
pub trait ChatConnector: Send + Sync {
    /// Open a connection for the tenant using the provided auth store.
    ///
    /// The connector reads credentials and key material through `auth` and
    /// writes rotations back through it for durable persistence.
    async fn open(
        &self,
        tenant_id: &str,
        auth: Arc<dyn AuthStore>,
    ) -> Result<ChatHandle, ConnectorError>;
}

/// Connector used when no protocol implementation is configured.
///
/// Every open attempt fails, so sessions surface as disconnected instead of
/// panicking. Deployments link a real connector and pass it to the server.
pub struct DisabledConnector;

#[async_trait]
impl ChatConnector for DisabledConnector {
    async fn open(
        &self,
        tenant_id: &str,
        _auth: Arc<dyn AuthStore>,
    ) -> Result<ChatHandle, ConnectorError> {
        tracing::warn!(tenant_id, "No messaging connector configured");
        Err(ConnectorError::OpenFailed(
            "no messaging connector configured".to_string(),
        ))
    }
}
