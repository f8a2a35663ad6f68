//! # Session Registry
//!
//! Single authoritative map from tenant identity to live session, with
//! lifecycle and idle management. One sweep loop serves every session's idle
//! deadline instead of one runtime timer per tenant, which keeps cancellation
//! a single token at shutdown.

use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use metrics::{counter, gauge};
use sea_orm::DatabaseConnection;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::crypto::CryptoKey;
use crate::messaging::ChatConnector;
use crate::repositories::{
    AuthKeyRepository, CredentialRepository, GroupPreferenceRepository, MessageRepository,
};
use crate::session::keystore::KeyStore;
use crate::session::tenant::{SessionEvents, TenantSession};

/// Registry of live tenant sessions.
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<TenantSession>>,
    connector: Arc<dyn ChatConnector>,
    credential_repo: CredentialRepository,
    auth_key_repo: AuthKeyRepository,
    group_prefs: GroupPreferenceRepository,
    messages: MessageRepository,
    config: SessionConfig,
    filter_threshold: u32,
    // Weak handle to our own Arc, used as the session notifier and by the
    // sweeper task.
    self_ref: Weak<SessionRegistry>,
    sweep_cancel: CancellationToken,
}

impl SessionRegistry {
    pub fn new(
        db: Arc<DatabaseConnection>,
        crypto_key: CryptoKey,
        connector: Arc<dyn ChatConnector>,
        config: SessionConfig,
        filter_threshold: u32,
    ) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            sessions: DashMap::new(),
            connector,
            credential_repo: CredentialRepository::new(db.clone(), crypto_key.clone()),
            auth_key_repo: AuthKeyRepository::new(db.clone(), crypto_key),
            group_prefs: GroupPreferenceRepository::new(db.clone()),
            messages: MessageRepository::new(db),
            config,
            filter_threshold,
            self_ref: self_ref.clone(),
            sweep_cancel: CancellationToken::new(),
        })
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the registry holds no sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Return the existing session for the tenant or construct a new one.
    ///
    /// A new session is hydrated from the store before it is returned; when
    /// persisted credentials exist, a background connection attempt starts
    /// immediately (opportunistic auto-reconnect). Records owner activity.
    pub async fn get_or_create(&self, tenant_id: &str) -> Arc<TenantSession> {
        if let Some(existing) = self.sessions.get(tenant_id) {
            existing.touch();
            return existing.clone();
        }

        let session = self.build_session(tenant_id);
        let entry = self
            .sessions
            .entry(tenant_id.to_string())
            .or_insert_with(|| session.clone())
            .clone();

        if Arc::ptr_eq(&entry, &session) {
            gauge!("session_registry_sessions").set(self.sessions.len() as f64);
            counter!("session_registry_created_total").increment(1);

            let restored = session.hydrate().await;
            if restored {
                info!(tenant_id, "Persisted credentials found, auto-reconnecting");
                session.request_connect();
            }
        } else {
            // Lost the insert race; the winner already hydrated.
            debug!(tenant_id, "Session creation raced, using existing session");
        }

        entry.touch();
        entry
    }

    /// Read-only lookup that refreshes owner activity when found.
    pub fn get_if_exists(&self, tenant_id: &str) -> Option<Arc<TenantSession>> {
        let session = self.sessions.get(tenant_id)?.clone();
        session.touch();
        Some(session)
    }

    /// Tear down and remove the tenant's session. Evicting an absent tenant
    /// is a no-op.
    pub async fn evict(&self, tenant_id: &str) {
        let Some((_, session)) = self.sessions.remove(tenant_id) else {
            return;
        };

        session.teardown().await;
        gauge!("session_registry_sessions").set(self.sessions.len() as f64);
        counter!("session_registry_evicted_total").increment(1);
        info!(tenant_id, "Session evicted");
    }

    /// Force-logout path: purge the tenant's credentials, then evict.
    pub async fn handle_logout(&self, tenant_id: &str) {
        if let Some(session) = self.get_if_exists(tenant_id) {
            if let Err(err) = session.purge_credentials().await {
                warn!(tenant_id, error = %err, "Credential purge during logout failed");
            }
        }
        self.evict(tenant_id).await;
    }

    /// Spawn the idle sweep loop. Cancelled by [`SessionRegistry::shutdown_all`].
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let registry = self.self_ref.upgrade().expect("registry alive");
        let cancel = self.sweep_cancel.clone();
        tokio::spawn(async move {
            let interval = Duration::from_secs(registry.config.sweep_interval_seconds);
            info!(interval_seconds = interval.as_secs(), "Idle sweeper started");

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {
                        registry.sweep_idle_sessions().await;
                    }
                }
            }

            info!("Idle sweeper stopped");
        })
    }

    /// Run one idle sweep immediately, outside the timer.
    pub async fn sweep_now(&self) {
        self.sweep_idle_sessions().await;
    }

    /// One sweep over all sessions.
    ///
    /// Two thresholds apply: a short one frees abandoned onboarding attempts
    /// (not connected, no pending login challenge), a long one bounds
    /// connected-but-unused sessions. State is re-read immediately before
    /// eviction, so a session that reconnected moments earlier is spared
    /// until a later sweep.
    async fn sweep_idle_sessions(&self) {
        let idle_unconnected = Duration::from_secs(self.config.idle_unconnected_seconds);
        let idle_connected = Duration::from_secs(self.config.idle_connected_seconds);

        let candidates: Vec<(String, Arc<TenantSession>)> = self
            .sessions
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        for (tenant_id, session) in candidates {
            let status = session.status().await;
            let idle = session.idle_for();

            let should_evict = if status.connected {
                idle >= idle_connected
            } else {
                !status.qr_pending && idle >= idle_unconnected
            };

            if should_evict {
                info!(
                    tenant_id = %tenant_id,
                    idle_seconds = idle.as_secs(),
                    connected = status.connected,
                    "Evicting idle session"
                );
                counter!("session_registry_idle_evictions_total").increment(1);
                self.evict(&tenant_id).await;
            }
        }
    }

    /// Cancel the sweeper and tear down every session concurrently, bounded
    /// by the configured shutdown timeout. Called on process shutdown so no
    /// dangling external connections outlive the process.
    pub async fn shutdown_all(&self) {
        self.sweep_cancel.cancel();

        let tenants: Vec<String> = self
            .sessions
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        let total = tenants.len();

        let mut teardowns = JoinSet::new();
        for tenant_id in tenants {
            if let Some((_, session)) = self.sessions.remove(&tenant_id) {
                teardowns.spawn(async move {
                    session.teardown().await;
                    tenant_id
                });
            }
        }

        let timeout = Duration::from_secs(self.config.shutdown_timeout_seconds);
        let deadline = tokio::time::Instant::now() + timeout;
        let mut completed = 0usize;

        loop {
            match tokio::time::timeout_at(deadline, teardowns.join_next()).await {
                Ok(Some(Ok(tenant_id))) => {
                    completed += 1;
                    debug!(tenant_id = %tenant_id, "Session torn down");
                }
                Ok(Some(Err(err))) => warn!(error = %err, "Session teardown task failed"),
                Ok(None) => break,
                Err(_) => break,
            }
        }

        if completed < total {
            warn!(
                completed,
                total, "Shutdown timeout reached before all sessions tore down"
            );
        } else {
            info!(total, "All sessions torn down");
        }
    }

    fn build_session(&self, tenant_id: &str) -> Arc<TenantSession> {
        let keystore = Arc::new(KeyStore::new(
            tenant_id.to_string(),
            self.credential_repo.clone(),
            self.auth_key_repo.clone(),
            self.config.key_flush_chunk_size,
        ));

        let notifier: Weak<dyn SessionEvents> = self.self_ref.clone();

        TenantSession::new(
            tenant_id.to_string(),
            self.connector.clone(),
            keystore,
            self.group_prefs.clone(),
            self.messages.clone(),
            self.filter_threshold,
            Duration::from_secs(self.config.reconnect_delay_seconds),
            self.config.reconnect_max_attempts,
            notifier,
        )
    }
}

#[async_trait]
impl SessionEvents for SessionRegistry {
    /// Invoked from a session's own event loop after a terminal disconnect.
    /// Only removes the map entry; the loop is already unwinding and the
    /// connection is closed, so a full teardown (which joins the loop task)
    /// would deadlock here.
    async fn on_logout(&self, tenant_id: &str) {
        if self.sessions.remove(tenant_id).is_some() {
            gauge!("session_registry_sessions").set(self.sessions.len() as f64);
            counter!("session_registry_logout_evictions_total").increment(1);
            info!(tenant_id, "Session removed after logout");
        }
    }
}
