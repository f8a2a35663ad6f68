//! Auth key repository for database operations
//!
//! Mirrors the session keystore's in-memory key cache. The cache is the
//! source of truth while a session is live; `replace_all` reconciles the
//! remote rows to match it by computing the symmetric difference between the
//! stored key set and the cache.

use anyhow::{Result, anyhow};
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

use crate::crypto::{CryptoKey, decrypt_key_material, encrypt_key_material};
use crate::models::auth_key::{self, Entity as AuthKey};

/// (key_type, key_id) pair addressing one slot of key material.
pub type KeySlot = (String, String);

/// Repository for auth key database operations
#[derive(Debug, Clone)]
pub struct AuthKeyRepository {
    /// Database connection pool
    pub db: Arc<DatabaseConnection>,
    /// Crypto key for key-material encryption
    pub crypto_key: CryptoKey,
}

impl AuthKeyRepository {
    /// Creates a new AuthKeyRepository instance
    pub fn new(db: Arc<DatabaseConnection>, crypto_key: CryptoKey) -> Self {
        Self { db, crypto_key }
    }

    /// Bulk-load and decrypt every key row for the tenant.
    pub async fn load_all(&self, tenant_id: &str) -> Result<HashMap<KeySlot, JsonValue>> {
        let rows = AuthKey::find()
            .filter(auth_key::Column::TenantId.eq(tenant_id))
            .all(&*self.db)
            .await?;

        let mut entries = HashMap::with_capacity(rows.len());
        for row in rows {
            let plaintext = decrypt_key_material(
                &self.crypto_key,
                tenant_id,
                &row.key_type,
                &row.key_id,
                &row.key_ciphertext,
            )
            .map_err(|e| {
                tracing::error!(
                    tenant_id,
                    key_type = %row.key_type,
                    key_id = %row.key_id,
                    "Key material decryption failed"
                );
                anyhow!("key material decryption failed: {}", e)
            })?;
            let value: JsonValue = serde_json::from_slice(&plaintext)?;
            entries.insert((row.key_type, row.key_id), value);
        }

        Ok(entries)
    }

    /// Reconcile the remote key set to match `entries`.
    ///
    /// Rows present remotely but absent from the cache are deleted; cache
    /// entries are upserted in chunks of `chunk_size` rows to respect
    /// statement size limits.
    pub async fn replace_all(
        &self,
        tenant_id: &str,
        entries: &HashMap<KeySlot, JsonValue>,
        chunk_size: usize,
    ) -> Result<()> {
        let remote_slots: HashSet<KeySlot> = AuthKey::find()
            .filter(auth_key::Column::TenantId.eq(tenant_id))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|row| (row.key_type, row.key_id))
            .collect();

        // Remote-only slots are stale and get deleted.
        let stale: Vec<&KeySlot> = remote_slots
            .iter()
            .filter(|slot| !entries.contains_key(*slot))
            .collect();

        for (key_type, key_id) in &stale {
            AuthKey::delete_many()
                .filter(auth_key::Column::TenantId.eq(tenant_id))
                .filter(auth_key::Column::KeyType.eq(key_type.as_str()))
                .filter(auth_key::Column::KeyId.eq(key_id.as_str()))
                .exec(&*self.db)
                .await?;
        }

        let now = Utc::now();
        let mut models = Vec::with_capacity(entries.len());
        for ((key_type, key_id), value) in entries {
            let plaintext = serde_json::to_vec(value)?;
            let ciphertext = encrypt_key_material(
                &self.crypto_key,
                tenant_id,
                key_type,
                key_id,
                &plaintext,
            )
            .map_err(|e| anyhow!("key material encryption failed: {}", e))?;

            models.push(auth_key::ActiveModel {
                id: Set(Uuid::new_v4()),
                tenant_id: Set(tenant_id.to_string()),
                key_type: Set(key_type.clone()),
                key_id: Set(key_id.clone()),
                key_ciphertext: Set(ciphertext),
                created_at: Set(now.into()),
                updated_at: Set(now.into()),
            });
        }

        let chunk_size = chunk_size.max(1);
        for chunk in models.chunks(chunk_size) {
            AuthKey::insert_many(chunk.to_vec())
                .on_conflict(
                    OnConflict::columns([
                        auth_key::Column::TenantId,
                        auth_key::Column::KeyType,
                        auth_key::Column::KeyId,
                    ])
                    .update_columns([
                        auth_key::Column::KeyCiphertext,
                        auth_key::Column::UpdatedAt,
                    ])
                    .to_owned(),
                )
                .exec(&*self.db)
                .await?;
        }

        tracing::debug!(
            tenant_id,
            upserted = entries.len(),
            deleted = stale.len(),
            "Reconciled auth key set"
        );

        Ok(())
    }

    /// Delete every key row for the tenant. Idempotent.
    pub async fn purge(&self, tenant_id: &str) -> Result<()> {
        AuthKey::delete_many()
            .filter(auth_key::Column::TenantId.eq(tenant_id))
            .exec(&*self.db)
            .await?;
        Ok(())
    }
}
