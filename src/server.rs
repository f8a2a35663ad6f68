//! # Server Configuration
//!
//! Router assembly, shared application state, and the serve loop with
//! graceful shutdown: on ctrl-c the extraction job stops, then every tenant
//! session is torn down (bounded by the configured timeout) so no external
//! connections dangle past process exit.

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;
use crate::crypto::CryptoKey;
use crate::extraction::{ExtractionJob, HttpInferenceClient, InferenceClient};
use crate::handlers;
use crate::messaging::ChatConnector;
use crate::repositories::{ExtractedPropertyRepository, MessageRepository};
use crate::session::SessionRegistry;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub registry: Arc<SessionRegistry>,
    pub extraction: Arc<ExtractionJob>,
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .route(
            "/tenants/{tenant_id}/session/connect",
            post(handlers::sessions::connect),
        )
        .route(
            "/tenants/{tenant_id}/session",
            get(handlers::sessions::status).delete(handlers::sessions::disconnect),
        )
        .route(
            "/tenants/{tenant_id}/session/logout",
            post(handlers::sessions::logout),
        )
        .route(
            "/tenants/{tenant_id}/groups",
            get(handlers::groups::list).put(handlers::groups::update),
        )
        .route(
            "/tenants/{tenant_id}/groups/available",
            get(handlers::groups::available),
        )
        .route(
            "/tenants/{tenant_id}/properties",
            get(handlers::properties::search),
        )
        .route("/extraction/start", post(handlers::extraction::start))
        .route("/extraction/stop", post(handlers::extraction::stop))
        .route("/extraction/run", post(handlers::extraction::run))
        .route("/extraction/status", get(handlers::extraction::status))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
}

/// Build the shared services and serve until shutdown.
pub async fn run_server(
    config: AppConfig,
    db: DatabaseConnection,
    connector: Arc<dyn ChatConnector>,
) -> Result<(), Box<dyn std::error::Error>> {
    let crypto_key_bytes = config
        .crypto_key
        .clone()
        .ok_or("crypto key is required to start the server")?;
    let crypto_key =
        CryptoKey::new(crypto_key_bytes).map_err(|e| format!("invalid crypto key: {}", e))?;

    let db = Arc::new(db);

    let registry = SessionRegistry::new(
        db.clone(),
        crypto_key,
        connector,
        config.session.clone(),
        config.filter.score_threshold,
    );
    let sweeper = registry.spawn_sweeper();

    let inference: Arc<dyn InferenceClient> = Arc::new(
        HttpInferenceClient::new(&config.inference)
            .map_err(|e| format!("failed to build inference client: {}", e))?,
    );
    let extraction = ExtractionJob::new(
        MessageRepository::new(db.clone()),
        ExtractedPropertyRepository::new(db.clone()),
        inference,
        config.extraction.clone(),
    );

    if config.extraction.autostart {
        extraction.start(None);
    }

    let state = AppState {
        db,
        registry: registry.clone(),
        extraction: extraction.clone(),
    };
    let app = create_app(state);

    let addr = config
        .bind_addr()
        .map_err(|e| format!("Invalid server address: {}", e))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, profile = %config.profile, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Orderly teardown: stop the extraction timer, then close every tenant
    // connection before the process exits.
    info!("Shutting down background services");
    extraction.stop();
    registry.shutdown_all().await;
    sweeper.abort();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::healthz,
        crate::handlers::sessions::connect,
        crate::handlers::sessions::status,
        crate::handlers::sessions::disconnect,
        crate::handlers::sessions::logout,
        crate::handlers::groups::list,
        crate::handlers::groups::update,
        crate::handlers::groups::available,
        crate::handlers::properties::search,
        crate::handlers::extraction::start,
        crate::handlers::extraction::stop,
        crate::handlers::extraction::run,
        crate::handlers::extraction::status,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::error::ApiError,
            crate::session::StatusSnapshot,
            crate::handlers::sessions::SessionStatusResponse,
            crate::handlers::sessions::SessionRemovedResponse,
            crate::handlers::groups::GroupPreferenceInfo,
            crate::handlers::groups::GroupPreferencesResponse,
            crate::handlers::groups::UpdateGroupPreferencesRequest,
            crate::handlers::groups::AvailableGroupsResponse,
            crate::messaging::GroupMetadata,
            crate::handlers::extraction::JobControlResponse,
            crate::extraction::PassSummary,
            crate::extraction::JobStatus,
            crate::handlers::properties::PropertyInfo,
            crate::handlers::properties::PropertiesResponse,
        )
    ),
    info(
        title = "Listing Intake API",
        description = "Multi-tenant messaging intake and listing extraction",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
