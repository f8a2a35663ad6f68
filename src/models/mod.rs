//! # Data Models
//!
//! This module contains all the data models used throughout the Listing
//! Intake service.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod auth_key;
pub mod credential;
pub mod extracted_property;
pub mod group_preference;
pub mod message;

pub use auth_key::Entity as AuthKey;
pub use credential::Entity as Credential;
pub use extracted_property::Entity as ExtractedProperty;
pub use group_preference::Entity as GroupPreference;
pub use message::Entity as Message;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "listing-intake".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
