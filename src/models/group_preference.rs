//! Group preference entity model
//!
//! SeaORM entity for the group_preferences table, which records the external
//! groups a tenant monitors, unique per (tenant_id, group_id).

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

/// Monitoring preference for one external group
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "group_preferences")]
pub struct Model {
    /// Unique identifier for the record (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Tenant identifier
    pub tenant_id: String,

    /// External group identifier
    pub group_id: String,

    /// Human-readable group name as reported by the connector
    pub group_name: String,

    /// Whether inbound messages from this group are processed
    pub enabled: bool,

    /// Timestamp when the record was created
    pub created_at: DateTimeWithTimeZone,

    /// Timestamp when the record was last updated
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
