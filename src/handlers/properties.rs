//! # Property Search API Handlers
//!
//! Tenant-scoped search over extracted property records with keyset
//! pagination.

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::cursor::{decode_cursor, encode_cursor};
use crate::error::{ApiError, validation_error};
use crate::repositories::ExtractedPropertyRepository;
use crate::repositories::extracted_property::PropertySearch;
use crate::server::AppState;

const DEFAULT_LIMIT: u64 = 50;
const MAX_LIMIT: u64 = 100;

/// Query parameters for property search
#[derive(Debug, Deserialize, IntoParams)]
pub struct SearchQuery {
    /// Filter by listing type (sale|rental|lease)
    pub listing_type: Option<String>,
    /// Filter by property type (apartment|house|villa|plot|commercial|other)
    pub property_type: Option<String>,
    /// Case-sensitive location substring
    pub location: Option<String>,
    /// Minimum price, inclusive
    pub min_price: Option<i64>,
    /// Maximum price, inclusive
    pub max_price: Option<i64>,
    /// Exact bedroom count
    pub bedrooms: Option<i32>,
    /// Minimum parking slot count, inclusive
    pub min_parking: Option<i32>,
    /// Minimum parsing confidence, inclusive
    pub min_confidence: Option<f32>,
    /// Maximum rows to return (default: 50, max: 100)
    pub limit: Option<u64>,
    /// Opaque cursor for pagination continuation
    pub cursor: Option<String>,
}

/// One extracted property in API form
#[derive(Debug, Serialize, ToSchema)]
pub struct PropertyInfo {
    #[schema(value_type = String)]
    pub id: Uuid,
    #[schema(value_type = String)]
    pub message_id: Uuid,
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
    pub created_at: String,
}

impl From<crate::models::extracted_property::Model> for PropertyInfo {
    fn from(model: crate::models::extracted_property::Model) -> Self {
        let created_at: DateTime<Utc> = model.created_at.with_timezone(&Utc);
        Self {
            id: model.id,
            message_id: model.message_id,
            listing_type: model.listing_type,
            property_type: model.property_type,
            location: model.location,
            price: model.price,
            bedrooms: model.bedrooms,
            bathrooms: model.bathrooms,
            area_sqft: model.area_sqft,
            furnishing: model.furnishing,
            parking: model.parking,
            parking_count: model.parking_count,
            contact: model.contact,
            confidence: model.confidence,
            created_at: created_at.to_rfc3339(),
        }
    }
}

/// Search results with pagination cursor
#[derive(Debug, Serialize, ToSchema)]
pub struct PropertiesResponse {
    pub tenant_id: String,
    pub properties: Vec<PropertyInfo>,
    /// Cursor for the next page (null on the last page)
    pub next_cursor: Option<String>,
}

/// Search extracted properties for a tenant
#[utoipa::path(
    get,
    path = "/tenants/{tenant_id}/properties",
    params(("tenant_id" = String, Path, description = "Tenant identifier"), SearchQuery),
    responses(
        (status = 200, description = "Matching properties", body = PropertiesResponse),
        (status = 400, description = "Invalid filters or cursor", body = ApiError)
    ),
    tag = "properties"
)]
pub async fn search(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<PropertiesResponse>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    if limit == 0 || limit > MAX_LIMIT {
        return Err(validation_error(
            "limit out of range",
            serde_json::json!({"limit": format!("must be between 1 and {}", MAX_LIMIT)}),
        ));
    }

    if let (Some(min), Some(max)) = (query.min_price, query.max_price)
        && min > max
    {
        return Err(validation_error(
            "min_price must not exceed max_price",
            serde_json::json!({"min_price": "greater than max_price"}),
        ));
    }

    if let Some(confidence) = query.min_confidence
        && !(0.0..=1.0).contains(&confidence)
    {
        return Err(validation_error(
            "min_confidence out of range",
            serde_json::json!({"min_confidence": "must be between 0.0 and 1.0"}),
        ));
    }

    let cursor = query.cursor.as_deref().map(decode_cursor).transpose()?;

    let filters = PropertySearch {
        listing_type: query.listing_type,
        property_type: query.property_type,
        location: query.location,
        min_price: query.min_price,
        max_price: query.max_price,
        bedrooms: query.bedrooms,
        min_parking_count: query.min_parking,
        min_confidence: query.min_confidence,
    };

    let repo = ExtractedPropertyRepository::new(state.db.clone());
    let (rows, next_cursor) = repo
        .search(&tenant_id, &filters, limit, cursor)
        .await
        .map_err(ApiError::from)?;

    Ok(Json(PropertiesResponse {
        tenant_id,
        properties: rows.into_iter().map(PropertyInfo::from).collect(),
        next_cursor: next_cursor.as_ref().map(encode_cursor),
    }))
}
