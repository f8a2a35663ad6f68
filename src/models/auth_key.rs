//! Auth key entity model
//!
//! SeaORM entity for the auth_keys table, which mirrors the connector's
//! in-memory key cache. Rows are reconciled as a set on every mutation batch,
//! unique per (tenant_id, key_type, key_id).

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

/// One piece of connector key material for a tenant
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "auth_keys")]
pub struct Model {
    /// Unique identifier for the record (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Tenant identifier
    pub tenant_id: String,

    /// Key category as named by the connector (e.g. "session", "pre-key")
    pub key_type: String,

    /// Connector-assigned identifier within the key category
    pub key_id: String,

    /// AES-256-GCM ciphertext of the key's JSON serialization
    pub key_ciphertext: Vec<u8>,

    /// Timestamp when the record was created
    pub created_at: DateTimeWithTimeZone,

    /// Timestamp when the record was last updated
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
