//! Integrations known to the gateway.

pub mod registry;

pub use registry::{Integration, IntegrationRegistry, RegistryError};
