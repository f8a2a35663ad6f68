//! # Tenant Session
//!
//! Owns one external messaging connection for one tenant: the connection
//! state machine, the fixed-delay reconnect policy, and the inbound message
//! pipeline (group filter, relevance filter, dedup, durable store).
//!
//! Events for a single tenant are processed strictly in the order the
//! connector delivers them. Cancellation is only observed between events, so
//! eviction never interrupts an in-flight pipeline write.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::counter;
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;

use crate::dedup::content_hash;
use crate::filter::classify_with_threshold;
use crate::messaging::{
    ChatConnector, ChatControl, ConnectionEvent, ConnectionState, ConnectorError,
    DisconnectReason, GroupMetadata, InboundMessage,
};
use crate::repositories::message::NewMessage;
use crate::repositories::{GroupPreferenceRepository, MessageRepository};
use crate::session::keystore::KeyStore;

/// Narrow notifier interface the registry hands to each session at
/// construction, replacing ad hoc logout closures.
#[async_trait]
pub trait SessionEvents: Send + Sync {
    /// The session hit a terminal logout/conflict and purged its credentials.
    async fn on_logout(&self, tenant_id: &str);
}

/// Observable status surface, recomputed on every state transition so status
/// queries never need their own synchronization.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct StatusSnapshot {
    /// Whether the underlying connection is open
    pub connected: bool,
    /// Whether a login challenge is awaiting out-of-band confirmation
    pub qr_pending: bool,
    /// Pending login challenge payload, when one exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_challenge: Option<String>,
    /// Machine-readable state name
    pub status: String,
    /// Human-readable detail, when one applies
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

struct SessionState {
    connection: ConnectionState,
    login_challenge: Option<String>,
    authenticated: bool,
    enabled_groups: HashSet<String>,
    reconnect_attempts: u32,
    reconnect_exhausted: bool,
    logged_out: bool,
}

impl SessionState {
    fn initial() -> Self {
        Self {
            connection: ConnectionState::Closed,
            login_challenge: None,
            authenticated: false,
            enabled_groups: HashSet::new(),
            reconnect_attempts: 0,
            reconnect_exhausted: false,
            logged_out: false,
        }
    }
}

fn compute_status(state: &SessionState) -> StatusSnapshot {
    let (status, message) = match state.connection {
        ConnectionState::Open => ("connected", None),
        ConnectionState::Connecting if state.login_challenge.is_some() => (
            "qr_pending",
            Some("scan the login challenge to authorize this connection".to_string()),
        ),
        ConnectionState::Connecting => ("connecting", None),
        ConnectionState::Closed if state.logged_out => (
            "logged_out",
            Some("credentials purged, re-provisioning required".to_string()),
        ),
        ConnectionState::Closed if state.reconnect_exhausted => (
            "reconnect_required",
            Some("automatic reconnect attempts exhausted".to_string()),
        ),
        ConnectionState::Closed if state.authenticated => (
            "reconnecting",
            Some("connection lost, reconnect scheduled".to_string()),
        ),
        ConnectionState::Closed => ("disconnected", None),
    };

    StatusSnapshot {
        connected: state.connection == ConnectionState::Open,
        qr_pending: state.login_challenge.is_some(),
        login_challenge: state.login_challenge.clone(),
        status: status.to_string(),
        message,
    }
}

enum ConnectionOutcome {
    /// Logout or superseding session; credentials purged, no reconnect.
    Terminal,
    /// Transient failure; eligible for a fixed-delay reconnect.
    Transient,
    /// Cancelled by eviction or shutdown.
    Cancelled,
}

/// One tenant's session: connection, state machine, and intake pipeline.
pub struct TenantSession {
    tenant_id: String,
    connector: Arc<dyn ChatConnector>,
    keystore: Arc<KeyStore>,
    group_prefs: GroupPreferenceRepository,
    messages: MessageRepository,
    filter_threshold: u32,
    reconnect_delay: Duration,
    reconnect_max_attempts: u32,
    notifier: Weak<dyn SessionEvents>,
    // Weak handle to our own Arc so `&self` methods can spawn tasks that
    // keep the session alive.
    self_ref: Weak<TenantSession>,
    state: RwLock<SessionState>,
    status: RwLock<StatusSnapshot>,
    control: Mutex<Option<Arc<dyn ChatControl>>>,
    loop_task: Mutex<Option<JoinHandle<()>>>,
    last_activity: Mutex<Instant>,
    cancel: CancellationToken,
}

impl TenantSession {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tenant_id: String,
        connector: Arc<dyn ChatConnector>,
        keystore: Arc<KeyStore>,
        group_prefs: GroupPreferenceRepository,
        messages: MessageRepository,
        filter_threshold: u32,
        reconnect_delay: Duration,
        reconnect_max_attempts: u32,
        notifier: Weak<dyn SessionEvents>,
    ) -> Arc<Self> {
        let state = SessionState::initial();
        let status = compute_status(&state);
        Arc::new_cyclic(|self_ref| Self {
            tenant_id,
            connector,
            keystore,
            group_prefs,
            messages,
            filter_threshold,
            reconnect_delay,
            reconnect_max_attempts,
            notifier,
            self_ref: self_ref.clone(),
            state: RwLock::new(state),
            status: RwLock::new(status),
            control: Mutex::new(None),
            loop_task: Mutex::new(None),
            last_activity: Mutex::new(Instant::now()),
            cancel: CancellationToken::new(),
        })
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// Current status surface.
    pub async fn status(&self) -> StatusSnapshot {
        self.status.read().await.clone()
    }

    /// Hydrate the keystore from the durable store. Returns `true` when
    /// persisted credentials were restored.
    pub async fn hydrate(&self) -> bool {
        self.keystore.load().await
    }

    /// Record owner activity now.
    pub fn touch(&self) {
        *self.last_activity.lock().expect("activity lock") = Instant::now();
    }

    /// Time since the last owner activity.
    pub fn idle_for(&self) -> Duration {
        self.last_activity.lock().expect("activity lock").elapsed()
    }

    /// Start (or restart) the background connection loop. Non-blocking;
    /// repeated calls while a loop is live are no-ops.
    pub fn request_connect(&self) {
        let mut guard = self.loop_task.lock().expect("loop task lock");
        if let Some(task) = guard.as_ref()
            && !task.is_finished()
        {
            debug!(tenant_id = %self.tenant_id, "Connection loop already running");
            return;
        }

        let Some(session) = self.self_ref.upgrade() else {
            return;
        };
        *guard = Some(tokio::spawn(async move {
            // A manual connect resets the reconnect budget.
            session
                .transition(|state| {
                    state.reconnect_attempts = 0;
                    state.reconnect_exhausted = false;
                    state.logged_out = false;
                })
                .await;
            session.connection_loop().await;
        }));
    }

    /// Reload the enabled-group set from the store, picking up preference
    /// changes without a reconnect.
    pub async fn refresh_enabled_groups(&self) {
        match self.group_prefs.enabled_group_ids(&self.tenant_id).await {
            Ok(groups) => {
                self.transition(|state| state.enabled_groups = groups).await;
            }
            Err(err) => {
                warn!(
                    tenant_id = %self.tenant_id,
                    error = %err,
                    "Failed to refresh enabled groups, keeping previous set"
                );
            }
        }
    }

    /// Groups the connected account participates in.
    pub async fn participating_groups(&self) -> Result<Vec<GroupMetadata>, ConnectorError> {
        let control = self
            .control
            .lock()
            .expect("control lock")
            .clone()
            .ok_or(ConnectorError::NotConnected)?;
        control.fetch_participating_groups().await
    }

    /// Purge all cached and persisted credentials/keys for this tenant.
    pub async fn purge_credentials(&self) -> anyhow::Result<()> {
        self.keystore.purge().await?;
        self.transition(|state| {
            state.logged_out = true;
            state.authenticated = false;
        })
        .await;
        Ok(())
    }

    /// Stop the connection loop and close the connection.
    ///
    /// Waits for the loop task to finish so an in-flight message batch is
    /// fully written before the session is released. Idempotent.
    pub async fn teardown(&self) {
        self.cancel.cancel();

        let control = self.control.lock().expect("control lock").take();
        if let Some(control) = control {
            control.close().await;
        }

        let task = self.loop_task.lock().expect("loop task lock").take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                if !err.is_cancelled() {
                    error!(tenant_id = %self.tenant_id, error = %err, "Connection loop panicked");
                }
            }
        }

        self.transition(|state| {
            state.connection = ConnectionState::Closed;
            state.login_challenge = None;
        })
        .await;
    }

    async fn transition<F>(&self, apply: F)
    where
        F: FnOnce(&mut SessionState),
    {
        let snapshot = {
            let mut state = self.state.write().await;
            apply(&mut state);
            compute_status(&state)
        };
        *self.status.write().await = snapshot;
    }

    async fn connection_loop(&self) {
        loop {
            match self.run_connection_once().await {
                ConnectionOutcome::Cancelled => break,
                ConnectionOutcome::Terminal => {
                    self.handle_terminal_close().await;
                    break;
                }
                ConnectionOutcome::Transient => {
                    let attempts = {
                        let mut state = self.state.write().await;
                        state.reconnect_attempts += 1;
                        state.reconnect_attempts
                    };

                    if attempts >= self.reconnect_max_attempts {
                        warn!(
                            tenant_id = %self.tenant_id,
                            attempts,
                            "Reconnect attempts exhausted, manual reconnect required"
                        );
                        self.transition(|state| state.reconnect_exhausted = true)
                            .await;
                        counter!("session_reconnects_exhausted_total").increment(1);
                        break;
                    }

                    info!(
                        tenant_id = %self.tenant_id,
                        attempt = attempts,
                        delay_seconds = self.reconnect_delay.as_secs(),
                        "Scheduling reconnect"
                    );
                    counter!("session_reconnects_scheduled_total").increment(1);

                    tokio::select! {
                        _ = self.cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.reconnect_delay) => {}
                    }
                }
            }
        }
    }

    async fn run_connection_once(&self) -> ConnectionOutcome {
        self.transition(|state| {
            state.connection = ConnectionState::Connecting;
        })
        .await;

        self.refresh_enabled_groups().await;

        let auth: Arc<dyn crate::messaging::AuthStore> = self.keystore.clone();
        let mut handle = match self.connector.open(&self.tenant_id, auth).await {
            Ok(handle) => handle,
            Err(err) => {
                warn!(tenant_id = %self.tenant_id, error = %err, "Connection open failed");
                self.transition(|state| state.connection = ConnectionState::Closed)
                    .await;
                return ConnectionOutcome::Transient;
            }
        };

        *self.control.lock().expect("control lock") = Some(handle.control.clone());

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    handle.control.close().await;
                    self.transition(|state| state.connection = ConnectionState::Closed)
                        .await;
                    return ConnectionOutcome::Cancelled;
                }
                event = handle.events.recv() => match event {
                    Some(event) => {
                        if let Some(outcome) = self.handle_event(event).await {
                            return outcome;
                        }
                    }
                    None => {
                        // Event channel gone without a close event: treat as
                        // a transient connection loss.
                        self.transition(|state| state.connection = ConnectionState::Closed)
                            .await;
                        return ConnectionOutcome::Transient;
                    }
                }
            }
        }
    }

    async fn handle_event(&self, event: ConnectionEvent) -> Option<ConnectionOutcome> {
        match event {
            ConnectionEvent::ConnectionUpdate {
                state,
                login_challenge,
                disconnect,
            } => self.handle_connection_update(state, login_challenge, disconnect).await,
            ConnectionEvent::CredentialsRotated { credentials } => {
                use crate::messaging::AuthStore;
                if let Err(err) = self.keystore.save_credentials(credentials).await {
                    // The cache holds the rotated blob; the next rotation or
                    // flush retries persistence.
                    error!(
                        tenant_id = %self.tenant_id,
                        error = %err,
                        "Failed to persist rotated credentials"
                    );
                    counter!("session_credential_persist_failures_total").increment(1);
                }
                None
            }
            ConnectionEvent::MessagesReceived(batch) => {
                self.process_messages(batch).await;
                None
            }
        }
    }

    async fn handle_connection_update(
        &self,
        state: ConnectionState,
        login_challenge: Option<String>,
        disconnect: Option<DisconnectReason>,
    ) -> Option<ConnectionOutcome> {
        match state {
            ConnectionState::Open => {
                info!(tenant_id = %self.tenant_id, "Connection open");
                counter!("session_connections_opened_total").increment(1);
                self.transition(|st| {
                    st.connection = ConnectionState::Open;
                    st.login_challenge = None;
                    st.authenticated = true;
                    st.reconnect_attempts = 0;
                    st.reconnect_exhausted = false;
                    st.logged_out = false;
                })
                .await;
                None
            }
            ConnectionState::Connecting => {
                if let Some(challenge) = login_challenge {
                    debug!(tenant_id = %self.tenant_id, "Login challenge received");
                    self.transition(|st| {
                        st.connection = ConnectionState::Connecting;
                        st.login_challenge = Some(challenge);
                    })
                    .await;
                }
                None
            }
            ConnectionState::Closed => {
                let reason = disconnect.unwrap_or(DisconnectReason::ConnectionLost);
                if reason.is_terminal() {
                    warn!(
                        tenant_id = %self.tenant_id,
                        ?reason,
                        "Terminal disconnect, purging credentials"
                    );
                    self.transition(|st| {
                        st.connection = ConnectionState::Closed;
                        st.authenticated = false;
                        st.login_challenge = None;
                        st.logged_out = true;
                    })
                    .await;
                    Some(ConnectionOutcome::Terminal)
                } else {
                    info!(tenant_id = %self.tenant_id, ?reason, "Transient disconnect");
                    // Still paired; only the socket is gone.
                    self.transition(|st| st.connection = ConnectionState::Closed)
                        .await;
                    Some(ConnectionOutcome::Transient)
                }
            }
        }
    }

    async fn handle_terminal_close(&self) {
        if let Err(err) = self.keystore.purge().await {
            error!(
                tenant_id = %self.tenant_id,
                error = %err,
                "Credential purge after terminal disconnect failed"
            );
        }
        counter!("session_logouts_total").increment(1);

        if let Some(notifier) = self.notifier.upgrade() {
            notifier.on_logout(&self.tenant_id).await;
        }
    }

    /// Run every inbound message through the intake pipeline. No error here
    /// may terminate the event loop; failures are logged per message.
    async fn process_messages(&self, batch: Vec<InboundMessage>) {
        let enabled_groups = {
            let state = self.state.read().await;
            state.enabled_groups.clone()
        };

        for message in batch {
            counter!("intake_messages_received_total").increment(1);

            if !enabled_groups.contains(&message.group_id) {
                continue;
            }

            let Some(text) = message.content.text() else {
                counter!("intake_messages_without_text_total").increment(1);
                continue;
            };

            let classification = classify_with_threshold(text, self.filter_threshold);
            if !classification.is_relevant {
                counter!("intake_messages_filtered_total").increment(1);
                continue;
            }

            let hash = content_hash(&message.sender, text);
            let new_message = NewMessage {
                tenant_id: self.tenant_id.clone(),
                group_id: message.group_id.clone(),
                group_name: message.group_name.clone(),
                sender: message.sender.clone(),
                body: text.to_string(),
                payload: message.payload.clone(),
                content_hash: hash,
                sent_at: message.sent_at,
            };

            match self.messages.insert_if_new(new_message).await {
                Ok(Some(_)) => {
                    counter!("intake_messages_stored_total").increment(1);
                    debug!(
                        tenant_id = %self.tenant_id,
                        group_id = %message.group_id,
                        confidence = classification.confidence,
                        "Stored relevant message"
                    );
                }
                Ok(None) => {
                    counter!("intake_messages_duplicate_total").increment(1);
                }
                Err(err) => {
                    counter!("intake_message_store_failures_total").increment(1);
                    error!(
                        tenant_id = %self.tenant_id,
                        group_id = %message.group_id,
                        error = %err,
                        "Failed to store message"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with(f: impl FnOnce(&mut SessionState)) -> SessionState {
        let mut state = SessionState::initial();
        f(&mut state);
        state
    }

    #[test]
    fn initial_status_is_disconnected() {
        let status = compute_status(&SessionState::initial());
        assert!(!status.connected);
        assert!(!status.qr_pending);
        assert_eq!(status.status, "disconnected");
    }

    #[test]
    fn connecting_with_challenge_reports_qr_pending() {
        let status = compute_status(&state_with(|s| {
            s.connection = ConnectionState::Connecting;
            s.login_challenge = Some("challenge-token".to_string());
        }));
        assert!(status.qr_pending);
        assert_eq!(status.status, "qr_pending");
        assert_eq!(status.login_challenge.as_deref(), Some("challenge-token"));
    }

    #[test]
    fn open_state_reports_connected() {
        let status = compute_status(&state_with(|s| {
            s.connection = ConnectionState::Open;
            s.authenticated = true;
        }));
        assert!(status.connected);
        assert!(!status.qr_pending);
        assert_eq!(status.status, "connected");
    }

    #[test]
    fn logout_takes_precedence_over_reconnect_exhaustion() {
        let status = compute_status(&state_with(|s| {
            s.logged_out = true;
            s.reconnect_exhausted = true;
        }));
        assert_eq!(status.status, "logged_out");
    }

    #[test]
    fn exhausted_reconnects_surface_as_reconnect_required() {
        let status = compute_status(&state_with(|s| {
            s.reconnect_exhausted = true;
        }));
        assert_eq!(status.status, "reconnect_required");
    }

    #[test]
    fn paired_but_closed_reports_reconnecting() {
        let status = compute_status(&state_with(|s| {
            s.authenticated = true;
        }));
        assert!(!status.connected);
        assert_eq!(status.status, "reconnecting");
    }
}
