//! Message entity model
//!
//! SeaORM entity for the messages table: relevance-filtered inbound group
//! messages awaiting (or past) extraction. Deduplicated per tenant by
//! content hash.

use super::extracted_property::Entity as ExtractedProperty;
use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Stored inbound group message
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "messages")]
pub struct Model {
    /// Unique identifier for the message (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Tenant identifier
    pub tenant_id: String,

    /// External group the message arrived from
    pub group_id: String,

    /// Group name at the time of receipt
    pub group_name: String,

    /// Sender identifier within the group
    pub sender: String,

    /// Extracted message text
    pub body: String,

    /// Opaque structured payload from the connector (varies by message kind)
    #[sea_orm(column_type = "JsonBinary")]
    pub payload: Option<JsonValue>,

    /// Digest over normalized text + sender, unique per tenant
    pub content_hash: String,

    /// Whether the extraction job has attempted enrichment
    pub processed: bool,

    /// Timestamp the connector reported for the message
    pub sent_at: DateTimeWithTimeZone,

    /// Timestamp when the row was created
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "ExtractedProperty")]
    ExtractedProperty,
}

impl Related<ExtractedProperty> for Entity {
    fn to() -> RelationDef {
        Relation::ExtractedProperty.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
