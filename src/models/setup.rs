//! # Setup Details Model
//!
//! Client registration details for an integration: the OAuth client credentials
//! and the scopes requested on behalf of the user.

use std::fmt;

use serde::Deserialize;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// OAuth client credentials registered with the provider
#[derive(Clone, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct ClientCredentials {
    /// Public client identifier
    pub client_id: String,
    /// Client secret; never logged
    pub client_secret: String,
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Setup details attached to the request context by the integration resolver
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupDetails {
    pub credentials: ClientCredentials,
    /// Scopes requested for this setup; empty means "use the integration defaults"
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl SetupDetails {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            credentials: ClientCredentials {
                client_id: client_id.into(),
                client_secret: client_secret.into(),
            },
            scopes: Vec::new(),
        }
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }
}
