//! Errors raised by authentication strategies and their HTTP mapping.

use axum::http::{StatusCode, request::Parts};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

use crate::auth::IntegrationName;
use crate::error::{ApiError, internal_error, provider_error};
use crate::oauth_client::OAuthClientError;

use super::CallbackQuery;

/// The provider reported an error on the OAuth callback
#[derive(Debug, Clone, Serialize)]
pub struct AuthenticationFailed {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

impl AuthenticationFailed {
    /// Captures the diagnostic context of a failed OAuth callback request
    pub fn from_oauth_request(parts: &Parts, detail: Option<Value>) -> Self {
        let query = CallbackQuery::from_uri(&parts.uri);

        Self {
            path: parts.uri.path().to_string(),
            integration: parts
                .extensions
                .get::<IntegrationName>()
                .map(|name| name.0.clone()),
            error: query.error,
            error_description: query.error_description,
            detail,
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authentication failed: {}", .0.error.as_deref().unwrap_or("unknown error"))]
    AuthenticationFailed(AuthenticationFailed),

    #[error("OAuth request for '{integration}' failed: {source}")]
    OAuthClient {
        integration: String,
        #[source]
        source: OAuthClientError,
    },

    #[error("{0} missing from request context")]
    MissingContext(&'static str),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::AuthenticationFailed(failure) => ApiError::new(
                StatusCode::UNAUTHORIZED,
                "AUTHENTICATION_FAILED",
                "The provider rejected the authorization request",
            )
            .with_details(json!(failure)),
            AuthError::OAuthClient {
                integration,
                source,
            } => oauth_client_error(&integration, source),
            AuthError::MissingContext(what) => {
                tracing::error!(missing = what, "Authorization code strategy ran without context");
                internal_error("Integration context missing from request")
            }
        }
    }
}

fn oauth_client_error(integration: &str, source: OAuthClientError) -> ApiError {
    if source.is_configuration_error() {
        tracing::error!(integration = %integration, error = %source, "Integration is misconfigured");
        return internal_error("Integration is misconfigured");
    }

    let status = source.upstream_status();
    match source {
        OAuthClientError::TokenEndpoint { status, body } => provider_error(
            integration,
            Some(status),
            body,
            &format!("Token endpoint returned HTTP {}", status),
        ),
        OAuthClientError::GrantRejected { error, description } => {
            let snippet = match description {
                Some(description) => format!("{}: {}", error, description),
                None => error,
            };
            provider_error(
                integration,
                status,
                Some(snippet),
                "Token endpoint rejected the authorization code",
            )
        }
        other => provider_error(integration, status, None, &other.to_string()),
    }
}
