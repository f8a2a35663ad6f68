//! Credential entity model
//!
//! SeaORM entity for the credentials table, which stores one encrypted
//! connector-credential blob per tenant.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

/// Credential record holding a tenant's serialized connector secrets
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "credentials")]
pub struct Model {
    /// Unique identifier for the record (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Tenant identifier (unique, one credential row per tenant)
    pub tenant_id: String,

    /// AES-256-GCM ciphertext of the serialized credential state
    pub credential_ciphertext: Vec<u8>,

    /// Timestamp when the record was created
    pub created_at: DateTimeWithTimeZone,

    /// Timestamp when the record was last updated
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
