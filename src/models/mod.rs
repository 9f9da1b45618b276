//! # Data Models
//!
//! This module contains the data models shared by the OAuth gateway.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod credentials;
pub mod integration;
pub mod setup;

pub use credentials::{Credentials, TokenExchangeResult};
pub use integration::{AuthorizationMethod, BodyFormat, IntegrationConfig, IntegrationDefaults};
pub use setup::{ClientCredentials, SetupDetails};

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
            service: "oauth-gateway".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
