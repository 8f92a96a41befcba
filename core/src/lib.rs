//! Network-free building blocks shared by the Confluence MCP runtime:
//! deployment profile resolution, the auth strategy per deployment mode,
//! endpoint construction, response shaping helpers and typed wire bodies.

pub mod auth;
pub mod cql;
pub mod endpoint;
pub mod entities;
pub mod error;
pub mod format;
pub mod profile;

pub use error::GatewayError;
pub use profile::{DeploymentMode, DeploymentProfile, ProfileSource};
