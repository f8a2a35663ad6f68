//! # Repositories
//!
//! Data-access layer for the Listing Intake service. Each repository wraps a
//! shared SeaORM connection pool with tenant-aware methods for one table.

pub mod auth_key;
pub mod credential;
pub mod extracted_property;
pub mod group_preference;
pub mod message;

pub use auth_key::AuthKeyRepository;
pub use credential::CredentialRepository;
pub use extracted_property::ExtractedPropertyRepository;
pub use group_preference::GroupPreferenceRepository;
pub use message::MessageRepository;
