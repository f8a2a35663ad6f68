//! Extracted property repository for database operations
//!
//! Write path for the extraction job and the tenant-scoped, cursor-paginated
//! search used by the properties endpoint.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::extracted_property::{self, Entity as ExtractedProperty};

/// Keyset cursor over (created_at, id), descending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CursorData {
    pub created_at: DateTime<Utc>,
    pub id: Uuid,
}

/// Fields for one new extracted property row.
#[derive(Debug, Clone)]
pub struct NewExtractedProperty {
    pub message_id: Uuid,
    pub tenant_id: String,
    pub listing_type: String,
    pub property_type: Option<String>,
    pub location: Option<String>,
    pub price: Option<i64>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub area_sqft: Option<i32>,
    pub furnishing: Option<String>,
    pub parking: Option<bool>,
    pub parking_count: Option<i32>,
    pub contact: Option<String>,
    pub confidence: f32,
    pub raw_response: Option<JsonValue>,
}

/// Search filters for the properties endpoint.
#[derive(Debug, Clone, Default)]
pub struct PropertySearch {
    pub listing_type: Option<String>,
    pub property_type: Option<String>,
    pub location: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub bedrooms: Option<i32>,
    pub min_parking_count: Option<i32>,
    pub min_confidence: Option<f32>,
}

/// Aggregate counters for the extraction status endpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtractionAggregates {
    pub total_records: u64,
    pub mean_confidence: Option<f64>,
}

/// Repository for extracted property database operations
#[derive(Debug, Clone)]
pub struct ExtractedPropertyRepository {
    /// Database connection pool
    pub db: Arc<DatabaseConnection>,
}

impl ExtractedPropertyRepository {
    /// Creates a new ExtractedPropertyRepository instance
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Insert one extracted property row.
    pub async fn insert(&self, new: NewExtractedProperty) -> Result<extracted_property::Model> {
        let now = Utc::now();
        let active = extracted_property::ActiveModel {
            id: Set(Uuid::new_v4()),
            message_id: Set(new.message_id),
            tenant_id: Set(new.tenant_id),
            listing_type: Set(new.listing_type),
            property_type: Set(new.property_type),
            location: Set(new.location),
            price: Set(new.price),
            bedrooms: Set(new.bedrooms),
            bathrooms: Set(new.bathrooms),
            area_sqft: Set(new.area_sqft),
            furnishing: Set(new.furnishing),
            parking: Set(new.parking),
            parking_count: Set(new.parking_count),
            contact: Set(new.contact),
            confidence: Set(new.confidence),
            raw_response: Set(new.raw_response),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };
        Ok(active.insert(&*self.db).await?)
    }

    /// Tenant-scoped search with keyset pagination, newest first.
    ///
    /// Returns up to `limit` rows and, when more rows remain, the cursor for
    /// the next page.
    pub async fn search(
        &self,
        tenant_id: &str,
        filters: &PropertySearch,
        limit: u64,
        cursor: Option<CursorData>,
    ) -> Result<(Vec<extracted_property::Model>, Option<CursorData>)> {
        let mut query = ExtractedProperty::find()
            .filter(extracted_property::Column::TenantId.eq(tenant_id));

        if let Some(listing_type) = &filters.listing_type {
            query = query.filter(extracted_property::Column::ListingType.eq(listing_type.as_str()));
        }
        if let Some(property_type) = &filters.property_type {
            query = query
                .filter(extracted_property::Column::PropertyType.eq(property_type.as_str()));
        }
        if let Some(location) = &filters.location {
            query = query.filter(extracted_property::Column::Location.contains(location.as_str()));
        }
        if let Some(min_price) = filters.min_price {
            query = query.filter(extracted_property::Column::Price.gte(min_price));
        }
        if let Some(max_price) = filters.max_price {
            query = query.filter(extracted_property::Column::Price.lte(max_price));
        }
        if let Some(bedrooms) = filters.bedrooms {
            query = query.filter(extracted_property::Column::Bedrooms.eq(bedrooms));
        }
        if let Some(min_parking) = filters.min_parking_count {
            query = query.filter(extracted_property::Column::ParkingCount.gte(min_parking));
        }
        if let Some(min_confidence) = filters.min_confidence {
            query = query.filter(extracted_property::Column::Confidence.gte(min_confidence));
        }

        if let Some(cursor) = cursor {
            let created_at: sea_orm::prelude::DateTimeWithTimeZone = cursor.created_at.into();
            query = query.filter(
                Condition::any()
                    .add(extracted_property::Column::CreatedAt.lt(created_at))
                    .add(
                        Condition::all()
                            .add(extracted_property::Column::CreatedAt.eq(created_at))
                            .add(extracted_property::Column::Id.lt(cursor.id)),
                    ),
            );
        }

        // Fetch one extra row to decide whether a next page exists.
        let mut rows = query
            .order_by_desc(extracted_property::Column::CreatedAt)
            .order_by_desc(extracted_property::Column::Id)
            .limit(limit + 1)
            .all(&*self.db)
            .await?;

        let next_cursor = if rows.len() as u64 > limit {
            rows.truncate(limit as usize);
            rows.last().map(|row| CursorData {
                created_at: row.created_at.with_timezone(&Utc),
                id: row.id,
            })
        } else {
            None
        };

        Ok((rows, next_cursor))
    }

    /// Aggregates over the whole table, computed in the store so they are
    /// accurate across process restarts.
    pub async fn aggregates(&self) -> Result<ExtractionAggregates> {
        let total_records = ExtractedProperty::find().count(&*self.db).await?;

        let mean_confidence: Option<f64> = ExtractedProperty::find()
            .select_only()
            .expr_as(
                Func::avg(Expr::col((
                    extracted_property::Entity,
                    extracted_property::Column::Confidence,
                ))),
                "mean_confidence",
            )
            .into_tuple()
            .one(&*self.db)
            .await?
            .flatten();

        Ok(ExtractionAggregates {
            total_records,
            mean_confidence,
        })
    }
}
