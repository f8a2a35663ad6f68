//! # Multi-Tenant Session Management
//!
//! Per-tenant connection lifecycle: the registry that creates, monitors, and
//! evicts sessions; each session's connection state machine and message
//! intake pipeline; and the credential/key synchronizer backing the
//! connector's auth state.

pub mod keystore;
pub mod registry;
pub mod tenant;

pub use keystore::KeyStore;
pub use registry::SessionRegistry;
pub use tenant::{SessionEvents, StatusSnapshot, TenantSession};
