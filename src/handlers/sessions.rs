//! # Session API Handlers
//!
//! Per-tenant connect/status/disconnect/logout. These endpoints are a thin
//! layer over the session registry; all lifecycle logic lives there.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::{ApiError, validation_error};
use crate::server::AppState;
use crate::session::StatusSnapshot;

/// Session status payload for one tenant
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionStatusResponse {
    /// Tenant the status belongs to
    pub tenant_id: String,
    /// Current observable session status
    pub session: StatusSnapshot,
}

/// Acknowledgement for session removal endpoints
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionRemovedResponse {
    pub tenant_id: String,
    pub removed: bool,
}

fn require_tenant_id(tenant_id: &str) -> Result<(), ApiError> {
    if tenant_id.trim().is_empty() {
        return Err(validation_error(
            "tenant_id must not be empty",
            serde_json::json!({"tenant_id": "required"}),
        ));
    }
    Ok(())
}

/// Create (or reuse) the tenant's session and start a connection attempt
#[utoipa::path(
    post,
    path = "/tenants/{tenant_id}/session/connect",
    params(("tenant_id" = String, Path, description = "Tenant identifier")),
    responses(
        (status = 200, description = "Session status after scheduling the connect", body = SessionStatusResponse),
        (status = 400, description = "Invalid tenant id", body = ApiError)
    ),
    tag = "sessions"
)]
pub async fn connect(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> Result<Json<SessionStatusResponse>, ApiError> {
    require_tenant_id(&tenant_id)?;

    let session = state.registry.get_or_create(&tenant_id).await;
    session.request_connect();

    Ok(Json(SessionStatusResponse {
        session: session.status().await,
        tenant_id,
    }))
}

/// Current session status; refreshes the tenant's activity timestamp
#[utoipa::path(
    get,
    path = "/tenants/{tenant_id}/session",
    params(("tenant_id" = String, Path, description = "Tenant identifier")),
    responses(
        (status = 200, description = "Current session status", body = SessionStatusResponse),
        (status = 404, description = "No session for this tenant", body = ApiError)
    ),
    tag = "sessions"
)]
pub async fn status(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> Result<Json<SessionStatusResponse>, ApiError> {
    require_tenant_id(&tenant_id)?;

    let Some(session) = state.registry.get_if_exists(&tenant_id) else {
        return Err(ApiError::new(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "No session for this tenant",
        ));
    };

    Ok(Json(SessionStatusResponse {
        session: session.status().await,
        tenant_id,
    }))
}

/// Disconnect and evict the tenant's session
#[utoipa::path(
    delete,
    path = "/tenants/{tenant_id}/session",
    params(("tenant_id" = String, Path, description = "Tenant identifier")),
    responses(
        (status = 200, description = "Session torn down (no-op when absent)", body = SessionRemovedResponse)
    ),
    tag = "sessions"
)]
pub async fn disconnect(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> Result<Json<SessionRemovedResponse>, ApiError> {
    require_tenant_id(&tenant_id)?;

    let existed = state.registry.get_if_exists(&tenant_id).is_some();
    state.registry.evict(&tenant_id).await;

    Ok(Json(SessionRemovedResponse {
        tenant_id,
        removed: existed,
    }))
}

/// Force-logout: purge all credentials and evict the session
#[utoipa::path(
    post,
    path = "/tenants/{tenant_id}/session/logout",
    params(("tenant_id" = String, Path, description = "Tenant identifier")),
    responses(
        (status = 200, description = "Credentials purged and session removed", body = SessionRemovedResponse)
    ),
    tag = "sessions"
)]
pub async fn logout(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> Result<Json<SessionRemovedResponse>, ApiError> {
    require_tenant_id(&tenant_id)?;

    let existed = state.registry.get_if_exists(&tenant_id).is_some();
    state.registry.handle_logout(&tenant_id).await;

    Ok(Json(SessionRemovedResponse {
        tenant_id,
        removed: existed,
    }))
}
