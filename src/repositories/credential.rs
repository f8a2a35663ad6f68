//! Credential repository for database operations
//!
//! Persists one encrypted credential blob per tenant. The write path is an
//! upsert that tolerates a concurrent insert of the same tenant row by
//! falling back to an update keyed on tenant_id.

use anyhow::{Result, anyhow};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use uuid::Uuid;

use crate::crypto::{CryptoKey, decrypt_credential_blob, encrypt_credential_blob};
use crate::error::db_err_is_unique_violation;
use crate::models::credential::{self, Entity as Credential};

/// Repository for credential database operations
#[derive(Debug, Clone)]
pub struct CredentialRepository {
    /// Database connection pool
    pub db: Arc<DatabaseConnection>,
    /// Crypto key for blob encryption
    pub crypto_key: CryptoKey,
}

impl CredentialRepository {
    /// Creates a new CredentialRepository instance
    pub fn new(db: Arc<DatabaseConnection>, crypto_key: CryptoKey) -> Self {
        Self { db, crypto_key }
    }

    /// Load and decrypt the tenant's credential blob, if one exists.
    pub async fn load(&self, tenant_id: &str) -> Result<Option<JsonValue>> {
        let Some(model) = Credential::find()
            .filter(credential::Column::TenantId.eq(tenant_id))
            .one(&*self.db)
            .await?
        else {
            return Ok(None);
        };

        let plaintext = decrypt_credential_blob(
            &self.crypto_key,
            tenant_id,
            &model.credential_ciphertext,
        )
        .map_err(|e| {
            tracing::error!(tenant_id, "Credential decryption failed");
            anyhow!("credential decryption failed: {}", e)
        })?;

        let credentials = serde_json::from_slice(&plaintext)?;
        Ok(Some(credentials))
    }

    /// Encrypt and upsert the tenant's credential blob.
    ///
    /// An insert racing with another writer of the same tenant row is
    /// resolved by retrying as an update keyed on tenant_id.
    pub async fn save(&self, tenant_id: &str, credentials: &JsonValue) -> Result<()> {
        let plaintext = serde_json::to_vec(credentials)?;
        let ciphertext = encrypt_credential_blob(&self.crypto_key, tenant_id, &plaintext)
            .map_err(|e| anyhow!("credential encryption failed: {}", e))?;

        let now = Utc::now();

        if let Some(existing) = Credential::find()
            .filter(credential::Column::TenantId.eq(tenant_id))
            .one(&*self.db)
            .await?
        {
            let active = credential::ActiveModel {
                id: Set(existing.id),
                credential_ciphertext: Set(ciphertext),
                updated_at: Set(now.into()),
                ..Default::default()
            };
            active.update(&*self.db).await?;
            return Ok(());
        }

        let active = credential::ActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(tenant_id.to_string()),
            credential_ciphertext: Set(ciphertext.clone()),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        match active.insert(&*self.db).await {
            Ok(_) => Ok(()),
            Err(err) if db_err_is_unique_violation(&err) => {
                // Another writer created the row first; update it instead.
                tracing::debug!(tenant_id, "Credential insert raced, updating existing row");
                let existing = Credential::find()
                    .filter(credential::Column::TenantId.eq(tenant_id))
                    .one(&*self.db)
                    .await?
                    .ok_or_else(|| anyhow!("credential row vanished during upsert race"))?;

                let active = credential::ActiveModel {
                    id: Set(existing.id),
                    credential_ciphertext: Set(ciphertext),
                    updated_at: Set(now.into()),
                    ..Default::default()
                };
                active.update(&*self.db).await?;
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Whether the tenant has a persisted credential blob.
    pub async fn exists(&self, tenant_id: &str) -> Result<bool> {
        let found = Credential::find()
            .filter(credential::Column::TenantId.eq(tenant_id))
            .one(&*self.db)
            .await?;
        Ok(found.is_some())
    }

    /// Delete the tenant's credential row. Idempotent.
    pub async fn purge(&self, tenant_id: &str) -> Result<()> {
        Credential::delete_many()
            .filter(credential::Column::TenantId.eq(tenant_id))
            .exec(&*self.db)
            .await?;
        Ok(())
    }
}
