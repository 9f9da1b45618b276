//! # API Handlers
//!
//! This module contains the HTTP endpoint handlers for the OAuth gateway.

use axum::response::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::{IntegrationName, TokenResponse};
use crate::models::{Credentials, ServiceInfo};

/// Root handler that returns basic service information
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service information", body = ServiceInfo)
    ),
    tag = "root"
)]
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo::default())
}

/// Summary of a completed authorization; token values are never echoed
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConnectedResponse {
    /// Integration that was authorized
    pub integration: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Access token lifetime in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    pub has_refresh_token: bool,
    pub has_id_token: bool,
    /// Scope granted by the provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Top-level keys of the provider token response
    pub response_fields: Vec<String>,
}

/// Start or complete the authorization code flow for an integration
///
/// A first visit redirects to the provider. The provider's callback is
/// exchanged for a token and this handler reports the outcome.
#[utoipa::path(
    get,
    path = "/auth/{integration}",
    params(
        ("integration" = String, Path, description = "Integration name"),
        ("code" = Option<String>, Query, description = "Authorization code returned by the provider"),
        ("spapi_oauth_code" = Option<String>, Query, description = "Amazon Selling Partner authorization code"),
        ("error" = Option<String>, Query, description = "Error reported by the provider")
    ),
    responses(
        (status = 200, description = "Authorization completed", body = ConnectedResponse),
        (status = 302, description = "Redirect to the provider authorization endpoint"),
        (status = 401, description = "Provider rejected the authorization", body = crate::error::ApiError),
        (status = 404, description = "Unknown integration", body = crate::error::ApiError),
        (status = 502, description = "Token endpoint failure", body = crate::error::ApiError)
    ),
    tag = "auth"
)]
pub async fn connected(
    IntegrationName(integration): IntegrationName,
    credentials: Credentials,
    TokenResponse(token_response): TokenResponse,
) -> Json<ConnectedResponse> {
    let response_fields = token_response
        .as_object()
        .map(|fields| fields.keys().cloned().collect())
        .unwrap_or_default();

    Json(ConnectedResponse {
        integration,
        token_type: credentials.token_type.clone(),
        expires_in: credentials.expires_in,
        has_refresh_token: credentials.refresh_token.is_some(),
        has_id_token: credentials.id_token.is_some(),
        scope: credentials.scope.clone(),
        response_fields,
    })
}
