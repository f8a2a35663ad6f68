//! Database migrations for the Listing Intake service.
//!
//! This module contains all database migrations using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2025_11_10_000001_create_credentials;
mod m2025_11_10_000002_create_auth_keys;
mod m2025_11_10_000003_create_group_preferences;
mod m2025_11_10_000004_create_messages;
mod m2025_11_10_000005_create_extracted_properties;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2025_11_10_000001_create_credentials::Migration),
            Box::new(m2025_11_10_000002_create_auth_keys::Migration),
            Box::new(m2025_11_10_000003_create_group_preferences::Migration),
            Box::new(m2025_11_10_000004_create_messages::Migration),
            Box::new(m2025_11_10_000005_create_extracted_properties::Migration),
        ]
    }
}
