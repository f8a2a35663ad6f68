//! Extracted property entity model
//!
//! SeaORM entity for the extracted_properties table: normalized listing
//! records produced by the extraction job. Always references an existing
//! message row; zero or more rows per message.

use super::message::Entity as Message;
use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Structured listing extracted from a stored message
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "extracted_properties")]
pub struct Model {
    /// Unique identifier for the record (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Owning message row
    pub message_id: Uuid,

    /// Tenant identifier
    pub tenant_id: String,

    /// Recognized listing classification (sale|rental|lease)
    pub listing_type: String,

    /// Property category; unrecognized values fall back to "other"
    pub property_type: Option<String>,

    /// Free-text location as mentioned in the message
    pub location: Option<String>,

    /// Asking price or rent in whole currency units
    pub price: Option<i64>,

    /// Declared bedroom count
    pub bedrooms: Option<i32>,

    /// Declared bathroom count
    pub bathrooms: Option<i32>,

    /// Declared area in square feet
    pub area_sqft: Option<i32>,

    /// Furnishing state (furnished|semi_furnished|unfurnished)
    pub furnishing: Option<String>,

    /// Whether parking is available
    pub parking: Option<bool>,

    /// Number of parking slots when declared as a count
    pub parking_count: Option<i32>,

    /// Contact number mentioned in the message
    pub contact: Option<String>,

    /// Parsing confidence reported by the inference service, clamped to [0,1]
    pub confidence: f32,

    /// Raw per-message inference response for auditing
    #[sea_orm(column_type = "JsonBinary")]
    pub raw_response: Option<JsonValue>,

    /// Timestamp when the record was created
    pub created_at: DateTimeWithTimeZone,

    /// Timestamp when the record was last updated
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "Message",
        from = "Column::MessageId",
        to = "super::message::Column::Id"
    )]
    Message,
}

impl Related<Message> for Entity {
    fn to() -> RelationDef {
        Relation::Message.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
