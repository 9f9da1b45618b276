//! # Integration Context
//!
//! Middleware that resolves the integration a request targets and attaches its
//! setup details and provider configuration to the request extensions, plus
//! extractors that read those values (and the credentials produced by the
//! authorization code strategy) back out in handlers.

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts, Path, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use serde_json::Value;

use crate::config::AppConfig;
use crate::error::{ApiError, internal_error, not_found};
use crate::integrations::{IntegrationRegistry, RegistryError};
use crate::models::{Credentials, IntegrationConfig, SetupDetails};
use crate::server::AppState;

/// Name of the integration resolved for the current request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrationName(pub String);

/// Decoded token endpoint response, attached next to [`Credentials`]
#[derive(Debug, Clone, PartialEq)]
pub struct TokenResponse(pub Value);

impl FromRef<AppState> for Arc<AppConfig> {
    fn from_ref(app_state: &AppState) -> Self {
        Arc::clone(&app_state.config)
    }
}

impl FromRef<AppState> for Arc<IntegrationRegistry> {
    fn from_ref(app_state: &AppState) -> Self {
        Arc::clone(&app_state.registry)
    }
}

/// Resolves the integration named by the `{integration}` path segment
pub async fn resolve_named_integration(
    State(registry): State<Arc<IntegrationRegistry>>,
    Path(name): Path<String>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let request = attach_integration(&registry, &name, request)?;
    Ok(next.run(request).await)
}

/// Resolves the integration served by the shared `/auth/callback` route
pub async fn resolve_callback_integration(
    State(config): State<Arc<AppConfig>>,
    State(registry): State<Arc<IntegrationRegistry>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(name) = config.callback_integration.as_deref() else {
        tracing::warn!("Callback received but no callback integration is configured");
        return Err(not_found("No integration is configured for /auth/callback"));
    };

    let request = attach_integration(&registry, name, request)?;
    Ok(next.run(request).await)
}

fn attach_integration(
    registry: &IntegrationRegistry,
    name: &str,
    mut request: Request,
) -> Result<Request, ApiError> {
    let integration = registry.get(name).map_err(|err| match err {
        RegistryError::IntegrationNotFound { .. } => {
            tracing::debug!(integration = %name, "Unknown integration requested");
            not_found(&format!("Integration '{}' not found", name))
        }
        other => {
            tracing::error!(error = %other, "Integration lookup failed");
            internal_error("Integration lookup failed")
        }
    })?;

    let extensions = request.extensions_mut();
    extensions.insert(integration.setup.clone());
    extensions.insert(integration.config.clone());
    extensions.insert(IntegrationName(name.to_string()));

    Ok(request)
}

fn missing_context(what: &str) -> ApiError {
    tracing::error!(missing = what, "Request context not populated by upstream middleware");
    internal_error(&format!("{} missing from request context", what))
}

impl<S> FromRequestParts<S> for IntegrationName
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<IntegrationName>()
            .cloned()
            .ok_or_else(|| missing_context("Integration name"))
    }
}

impl<S> FromRequestParts<S> for SetupDetails
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SetupDetails>()
            .cloned()
            .ok_or_else(|| missing_context("Setup details"))
    }
}

impl<S> FromRequestParts<S> for IntegrationConfig
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<IntegrationConfig>()
            .cloned()
            .ok_or_else(|| missing_context("Integration config"))
    }
}

impl<S> FromRequestParts<S> for Credentials
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Credentials>()
            .cloned()
            .ok_or_else(|| missing_context("Credentials"))
    }
}

impl<S> FromRequestParts<S> for TokenResponse
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<TokenResponse>()
            .cloned()
            .ok_or_else(|| missing_context("Token response"))
    }
}
