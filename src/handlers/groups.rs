//! # Group Preference API Handlers
//!
//! Get/set which external groups a tenant monitors, plus discovery of the
//! groups the connected account participates in.

use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{ApiError, validation_error};
use crate::messaging::GroupMetadata;
use crate::repositories::GroupPreferenceRepository;
use crate::server::AppState;

/// One group monitoring preference
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GroupPreferenceInfo {
    /// External group identifier
    pub group_id: String,
    /// Group display name
    pub group_name: String,
    /// Whether inbound messages from this group are processed
    pub enabled: bool,
}

impl From<crate::models::group_preference::Model> for GroupPreferenceInfo {
    fn from(model: crate::models::group_preference::Model) -> Self {
        Self {
            group_id: model.group_id,
            group_name: model.group_name,
            enabled: model.enabled,
        }
    }
}

/// Group preference listing for one tenant
#[derive(Debug, Serialize, ToSchema)]
pub struct GroupPreferencesResponse {
    pub tenant_id: String,
    pub groups: Vec<GroupPreferenceInfo>,
}

/// Request body for updating group preferences
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateGroupPreferencesRequest {
    pub groups: Vec<GroupPreferenceInfo>,
}

/// Groups the connected account participates in
#[derive(Debug, Serialize, ToSchema)]
pub struct AvailableGroupsResponse {
    pub tenant_id: String,
    pub groups: Vec<GroupMetadata>,
}

/// List the tenant's group monitoring preferences
#[utoipa::path(
    get,
    path = "/tenants/{tenant_id}/groups",
    params(("tenant_id" = String, Path, description = "Tenant identifier")),
    responses(
        (status = 200, description = "Group preferences", body = GroupPreferencesResponse)
    ),
    tag = "groups"
)]
pub async fn list(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> Result<Json<GroupPreferencesResponse>, ApiError> {
    let repo = GroupPreferenceRepository::new(state.db.clone());
    let groups = repo
        .list(&tenant_id)
        .await
        .map_err(ApiError::from)?
        .into_iter()
        .map(GroupPreferenceInfo::from)
        .collect();

    Ok(Json(GroupPreferencesResponse { tenant_id, groups }))
}

/// Replace or add group monitoring preferences
#[utoipa::path(
    put,
    path = "/tenants/{tenant_id}/groups",
    params(("tenant_id" = String, Path, description = "Tenant identifier")),
    request_body = UpdateGroupPreferencesRequest,
    responses(
        (status = 200, description = "Updated preferences", body = GroupPreferencesResponse),
        (status = 400, description = "Invalid request", body = ApiError)
    ),
    tag = "groups"
)]
pub async fn update(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
    Json(request): Json<UpdateGroupPreferencesRequest>,
) -> Result<Json<GroupPreferencesResponse>, ApiError> {
    if request.groups.is_empty() {
        return Err(validation_error(
            "at least one group is required",
            serde_json::json!({"groups": "must not be empty"}),
        ));
    }
    for group in &request.groups {
        if group.group_id.trim().is_empty() {
            return Err(validation_error(
                "group_id must not be empty",
                serde_json::json!({"group_id": "required"}),
            ));
        }
    }

    let repo = GroupPreferenceRepository::new(state.db.clone());
    for group in &request.groups {
        repo.upsert(&tenant_id, &group.group_id, &group.group_name, group.enabled)
            .await
            .map_err(ApiError::from)?;
    }

    // A live session picks the new set up without a reconnect.
    if let Some(session) = state.registry.get_if_exists(&tenant_id) {
        session.refresh_enabled_groups().await;
    }

    let groups = repo
        .list(&tenant_id)
        .await
        .map_err(ApiError::from)?
        .into_iter()
        .map(GroupPreferenceInfo::from)
        .collect();

    Ok(Json(GroupPreferencesResponse { tenant_id, groups }))
}

/// Discover groups the connected account participates in
#[utoipa::path(
    get,
    path = "/tenants/{tenant_id}/groups/available",
    params(("tenant_id" = String, Path, description = "Tenant identifier")),
    responses(
        (status = 200, description = "Participating groups", body = AvailableGroupsResponse),
        (status = 404, description = "No session for this tenant", body = ApiError),
        (status = 409, description = "Session not connected", body = ApiError)
    ),
    tag = "groups"
)]
pub async fn available(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> Result<Json<AvailableGroupsResponse>, ApiError> {
    let Some(session) = state.registry.get_if_exists(&tenant_id) else {
        return Err(ApiError::new(
            axum::http::StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "No session for this tenant",
        ));
    };

    let groups = session.participating_groups().await?;

    Ok(Json(AvailableGroupsResponse { tenant_id, groups }))
}
