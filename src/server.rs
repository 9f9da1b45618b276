//! # Server Configuration
//!
//! This module contains the server setup and configuration for the OAuth gateway.

use std::sync::Arc;

use anyhow::Context;
use axum::{Router, middleware, routing::get};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::{resolve_callback_integration, resolve_named_integration};
use crate::config::AppConfig;
use crate::handlers;
use crate::integrations::IntegrationRegistry;
use crate::oauth_client::HttpTokenClient;
use crate::strategies::{AuthorizationCodeHandler, authenticate};
use crate::telemetry;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub registry: Arc<IntegrationRegistry>,
    pub auth_code: Arc<AuthorizationCodeHandler>,
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    // The last layer added runs first: resolve the integration, then authenticate.
    let named = get(handlers::connected)
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state.auth_code),
            authenticate,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            resolve_named_integration,
        ));

    let callback = get(handlers::connected)
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state.auth_code),
            authenticate,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            resolve_callback_integration,
        ));

    Router::new()
        .route("/", get(handlers::root))
        .route("/auth/callback", callback)
        .route("/auth/{integration}", named)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(telemetry::trace_context))
}

/// Builds the shared state from configuration: loads the integration
/// registry and the token endpoint client.
pub fn build_state(config: AppConfig) -> anyhow::Result<AppState> {
    let registry = match &config.integrations_path {
        Some(path) => IntegrationRegistry::load_from_path(path)
            .with_context(|| format!("loading integrations from {}", path.display()))?,
        None => {
            tracing::warn!("No integrations file configured; every auth route will return 404");
            IntegrationRegistry::new()
        }
    };

    if let Some(name) = &config.callback_integration
        && registry.get(name).is_err()
    {
        anyhow::bail!("callback integration '{}' is not defined in the registry", name);
    }

    let token_client = HttpTokenClient::new(config.token_request_timeout())
        .context("building token endpoint client")?;
    if config.callback_integration.is_none() && config.auth_callback_url.is_some() {
        tracing::warn!(
            "Callback URL override is set without a callback integration; every integration is called back on /auth/{{integration}}"
        );
    }

    let auth_code =
        AuthorizationCodeHandler::new(config.auth_callback_url.clone(), Arc::new(token_client))
            .with_callback_integration(config.callback_integration.clone());

    Ok(AppState {
        config: Arc::new(config),
        registry: Arc::new(registry),
        auth_code: Arc::new(auth_code),
    })
}

/// Starts the server with the given configuration
pub async fn run_server(config: AppConfig) -> anyhow::Result<()> {
    let addr = config.bind_addr().context("invalid server address")?;
    let profile = config.profile.clone();

    let state = build_state(config)?;
    tracing::info!(
        integrations = ?state.registry.names(),
        callback_integration = state.config.callback_integration.as_deref().unwrap_or("-"),
        "Integration registry ready"
    );
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    tracing::info!(%addr, %profile, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::connected,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::handlers::ConnectedResponse,
            crate::error::ApiError,
            crate::error::ProviderError,
        )
    ),
    info(
        title = "OAuth Gateway API",
        description = "OAuth2 authorization code flows for third-party integrations",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
