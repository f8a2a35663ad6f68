//! # Listing Intake Main Entry Point
//!
//! Loads configuration, initializes logging and the database, applies
//! migrations, and starts the server.

use std::sync::Arc;

use intake::messaging::DisabledConnector;
use intake::{config::ConfigLoader, db::init_pool, logging, server::run_server};
use migration::{Migrator, MigratorTrait};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_loader = ConfigLoader::new();
    let config = config_loader.load()?;

    logging::init_tracing(&config);

    tracing::info!(profile = %config.profile, "Loaded configuration");
    if let Ok(redacted_json) = config.redacted_json() {
        tracing::debug!(config = %redacted_json, "Effective configuration");
    }

    let db = init_pool(&config).await?;
    Migrator::up(&db, None).await?;

    run_server(config, db, Arc::new(DisabledConnector)).await
}
