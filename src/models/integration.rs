//! # Integration Configuration Model
//!
//! Provider endpoints and request shaping for one OAuth2 integration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// How the client authenticates against the token endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorizationMethod {
    /// `client_id` and `client_secret` are sent as token request parameters
    #[default]
    Body,
    /// `client_id` and `client_secret` are sent as an HTTP Basic `Authorization` header
    Header,
}

/// Encoding of the token request body
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyFormat {
    /// `application/x-www-form-urlencoded`
    #[default]
    Form,
    /// `application/json`
    Json,
}

/// Optional per-integration defaults for the authorization redirect
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationDefaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Vec<String>>,
}

/// Integration configuration attached to the request context by the integration resolver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationConfig {
    #[serde(rename = "authorizationURL", alias = "authorizationUrl")]
    pub authorization_url: String,
    #[serde(default)]
    pub authorization_method: AuthorizationMethod,
    /// Extra query parameters appended to the authorization redirect
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub authorization_params: BTreeMap<String, String>,
    #[serde(default)]
    pub body_format: BodyFormat,
    #[serde(rename = "tokenURL", alias = "tokenUrl")]
    pub token_url: String,
    /// Extra parameters merged into the token request
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub token_params: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<IntegrationDefaults>,
    /// Callback URL registered with this provider, used verbatim when set
    #[serde(
        rename = "callbackURL",
        alias = "callbackUrl",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub callback_url: Option<String>,
}

impl IntegrationConfig {
    pub fn new(authorization_url: impl Into<String>, token_url: impl Into<String>) -> Self {
        Self {
            authorization_url: authorization_url.into(),
            authorization_method: AuthorizationMethod::default(),
            authorization_params: BTreeMap::new(),
            body_format: BodyFormat::default(),
            token_url: token_url.into(),
            token_params: BTreeMap::new(),
            config: None,
            callback_url: None,
        }
    }

    /// State value configured for the redirect, if any
    pub fn default_state(&self) -> Option<&str> {
        self.config.as_ref().and_then(|defaults| defaults.state.as_deref())
    }

    /// Scope list configured for the redirect, if any
    pub fn default_scope(&self) -> Option<&[String]> {
        self.config
            .as_ref()
            .and_then(|defaults| defaults.scope.as_deref())
    }
}
