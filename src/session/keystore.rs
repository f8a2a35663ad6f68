//! # Credential/Key Synchronizer
//!
//! Keeps the messaging connector's credential blob and key material
//! consistent between an in-memory cache (hot path, consulted on every
//! cryptographic key lookup) and the durable store (cold path, survives
//! process restarts).
//!
//! The cache is the source of truth while a session is live. Key mutations
//! are applied to the cache first and flushed to the store immediately; the
//! connector's own retry logic may depend on keys being durable before it
//! proceeds, so there is no write-behind delay.

use std::collections::HashMap;

use async_trait::async_trait;
use metrics::counter;
use rand::Rng;
use serde_json::{Value as JsonValue, json};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::messaging::{AuthStore, ConnectorError, KeyMutations};
use crate::repositories::auth_key::KeySlot;
use crate::repositories::{AuthKeyRepository, CredentialRepository};

struct CacheState {
    credentials: JsonValue,
    keys: HashMap<KeySlot, JsonValue>,
}

/// Per-tenant credential and key cache with immediate write-through.
///
/// Owned exclusively by one tenant session; the session's event handlers are
/// the only writers, so the lock is uncontended in practice.
pub struct KeyStore {
    tenant_id: String,
    credential_repo: CredentialRepository,
    auth_key_repo: AuthKeyRepository,
    flush_chunk_size: usize,
    state: RwLock<CacheState>,
}

impl KeyStore {
    /// Create a keystore with freshly initialized credentials. Call
    /// [`KeyStore::load`] to hydrate it from the store.
    pub fn new(
        tenant_id: String,
        credential_repo: CredentialRepository,
        auth_key_repo: AuthKeyRepository,
        flush_chunk_size: usize,
    ) -> Self {
        Self {
            tenant_id,
            credential_repo,
            auth_key_repo,
            flush_chunk_size,
            state: RwLock::new(CacheState {
                credentials: fresh_credentials(),
                keys: HashMap::new(),
            }),
        }
    }

    /// Hydrate the cache from the durable store.
    ///
    /// A missing credential row is the normal first-time-login path and
    /// initializes fresh credentials. A failed load is logged and also falls
    /// back to fresh state rather than blocking session startup.
    ///
    /// Returns `true` when persisted credentials were restored.
    pub async fn load(&self) -> bool {
        let credentials = match self.credential_repo.load(&self.tenant_id).await {
            Ok(Some(credentials)) => Some(credentials),
            Ok(None) => None,
            Err(err) => {
                warn!(
                    tenant_id = %self.tenant_id,
                    error = %err,
                    "Credential load failed, starting with fresh credentials"
                );
                None
            }
        };

        let keys = match self.auth_key_repo.load_all(&self.tenant_id).await {
            Ok(keys) => keys,
            Err(err) => {
                warn!(
                    tenant_id = %self.tenant_id,
                    error = %err,
                    "Key material load failed, starting with empty key cache"
                );
                HashMap::new()
            }
        };

        let restored = credentials.is_some();
        let mut state = self.state.write().await;
        state.credentials = credentials.unwrap_or_else(fresh_credentials);
        state.keys = keys;

        debug!(
            tenant_id = %self.tenant_id,
            restored,
            key_count = state.keys.len(),
            "Keystore hydrated"
        );

        restored
    }

    /// Purge all cached and persisted secrets for the tenant.
    ///
    /// The cache is reset to fresh credentials so a later re-provisioning
    /// attempt starts from a clean slate.
    pub async fn purge(&self) -> anyhow::Result<()> {
        self.credential_repo.purge(&self.tenant_id).await?;
        self.auth_key_repo.purge(&self.tenant_id).await?;

        let mut state = self.state.write().await;
        state.credentials = fresh_credentials();
        state.keys.clear();

        counter!("keystore_purges_total").increment(1);
        Ok(())
    }

    async fn flush_keys(&self) -> anyhow::Result<()> {
        let snapshot = {
            let state = self.state.read().await;
            state.keys.clone()
        };

        self.auth_key_repo
            .replace_all(&self.tenant_id, &snapshot, self.flush_chunk_size)
            .await
    }
}

#[async_trait]
impl AuthStore for KeyStore {
    async fn credentials(&self) -> JsonValue {
        self.state.read().await.credentials.clone()
    }

    async fn get_keys(&self, key_type: &str, ids: &[String]) -> HashMap<String, JsonValue> {
        let state = self.state.read().await;
        ids.iter()
            .filter_map(|id| {
                state
                    .keys
                    .get(&(key_type.to_string(), id.clone()))
                    .map(|value| (id.clone(), value.clone()))
            })
            .collect()
    }

    async fn apply_key_mutations(&self, mutations: KeyMutations) -> Result<(), ConnectorError> {
        {
            let mut state = self.state.write().await;
            for (key_type, entries) in mutations {
                for (key_id, value) in entries {
                    let slot = (key_type.clone(), key_id);
                    match value {
                        Some(value) => {
                            state.keys.insert(slot, value);
                        }
                        None => {
                            state.keys.remove(&slot);
                        }
                    }
                }
            }
        }

        // Immediate flush; the cache keeps the applied mutations even when
        // the flush fails, so a later retry can still converge.
        self.flush_keys().await.map_err(|err| {
            counter!("keystore_flush_failures_total").increment(1);
            warn!(
                tenant_id = %self.tenant_id,
                error = %err,
                "Key flush failed, cache preserved for retry"
            );
            ConnectorError::AuthStore(err.to_string())
        })?;

        counter!("keystore_flushes_total").increment(1);
        Ok(())
    }

    async fn save_credentials(&self, credentials: JsonValue) -> Result<(), ConnectorError> {
        {
            let mut state = self.state.write().await;
            state.credentials = credentials.clone();
        }

        self.credential_repo
            .save(&self.tenant_id, &credentials)
            .await
            .map_err(|err| {
                warn!(
                    tenant_id = %self.tenant_id,
                    error = %err,
                    "Credential save failed, cache preserved for retry"
                );
                ConnectorError::AuthStore(err.to_string())
            })?;

        counter!("keystore_credential_saves_total").increment(1);
        Ok(())
    }
}

/// Seed credentials for a tenant that has never paired.
///
/// The connector owns the full credential schema; we only provide the random
/// registration identity the network expects on first contact.
fn fresh_credentials() -> JsonValue {
    let registration_id: u32 = rand::thread_rng().gen_range(1..=16383);
    json!({
        "registration_id": registration_id,
        "advertised": false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_credentials_have_registration_id() {
        let creds = fresh_credentials();
        let registration_id = creds["registration_id"].as_u64().expect("registration id");
        assert!((1..=16383).contains(&registration_id));
        assert_eq!(creds["advertised"], json!(false));
    }
}
