//! Integration registry
//!
//! In-memory map from integration name to its setup details and provider
//! configuration, optionally loaded from a JSON file at startup.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tracing::info;
use url::Url;

use crate::models::{IntegrationConfig, SetupDetails};

/// Error type for registry operations
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Integration '{name}' not found")]
    IntegrationNotFound { name: String },
    #[error("failed to read integrations file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse integrations: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("integration '{name}' has an invalid {field} '{value}'")]
    InvalidUrl {
        name: String,
        field: &'static str,
        value: String,
    },
}

/// Everything the authorization code strategy needs for one integration
#[derive(Debug, Clone, Deserialize)]
pub struct Integration {
    pub setup: SetupDetails,
    pub config: IntegrationConfig,
}

#[derive(Deserialize)]
struct IntegrationsFile {
    #[serde(default)]
    integrations: BTreeMap<String, Integration>,
}

/// Registry of configured integrations, keyed by name
#[derive(Debug, Clone, Default)]
pub struct IntegrationRegistry {
    integrations: BTreeMap<String, Arc<Integration>>,
}

impl IntegrationRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a registry document of the form `{"integrations": {"<name>": {"setup": .., "config": ..}}}`
    pub fn from_json_str(raw: &str) -> Result<Self, RegistryError> {
        let file: IntegrationsFile = serde_json::from_str(raw)?;
        let mut registry = Self::new();
        for (name, integration) in file.integrations {
            registry.register(name, integration)?;
        }
        Ok(registry)
    }

    /// Load a registry document from disk
    pub fn load_from_path(path: &Path) -> Result<Self, RegistryError> {
        let raw = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let registry = Self::from_json_str(&raw)?;
        info!(
            path = %path.display(),
            integrations = registry.len(),
            "Loaded integration registry"
        );
        Ok(registry)
    }

    /// Register an integration, replacing any previous entry with the same name
    pub fn register(
        &mut self,
        name: impl Into<String>,
        integration: Integration,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        validate_absolute_url(&name, "authorization URL", &integration.config.authorization_url)?;
        validate_absolute_url(&name, "token URL", &integration.config.token_url)?;
        if let Some(callback_url) = &integration.config.callback_url {
            validate_absolute_url(&name, "callback URL", callback_url)?;
        }
        self.integrations.insert(name, Arc::new(integration));
        Ok(())
    }

    /// Get an integration by name
    pub fn get(&self, name: &str) -> Result<Arc<Integration>, RegistryError> {
        self.integrations
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::IntegrationNotFound {
                name: name.to_string(),
            })
    }

    /// Registered integration names in sorted order
    pub fn names(&self) -> Vec<&str> {
        self.integrations.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.integrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.integrations.is_empty()
    }
}

fn validate_absolute_url(name: &str, field: &'static str, value: &str) -> Result<(), RegistryError> {
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        _ => Err(RegistryError::InvalidUrl {
            name: name.to_string(),
            field,
            value: value.to_string(),
        }),
    }
}
