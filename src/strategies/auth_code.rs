//! OAuth2 authorization code strategy.
//!
//! Runs as middleware in front of an auth route. A first visit is redirected to
//! the provider's authorization endpoint; the provider's callback is exchanged
//! for a token, the resulting [`Credentials`] and [`TokenResponse`] are attached
//! to the request and the inner handler runs; a callback carrying an `error`
//! fails with [`AuthenticationFailed`].

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::counter;
use tracing::{debug, info, warn};

use crate::auth::{IntegrationName, TokenResponse};
use crate::error::ApiError;
use crate::models::{Credentials, IntegrationConfig, SetupDetails};
use crate::oauth_client::{
    AuthorizationRequest, TokenExchanger, TokenRequest, build_authorization_redirect_url,
};

use super::{AuthError, AuthenticationFailed, CallbackOutcome, CallbackQuery};

/// State sent to the provider when the integration configures none
pub const DEFAULT_STATE: &str = "none";

const CALLBACK_PATH: &str = "/auth/callback";

pub struct AuthorizationCodeHandler {
    callback_url_override: Option<String>,
    callback_integration: Option<String>,
    token_client: Arc<dyn TokenExchanger>,
}

impl AuthorizationCodeHandler {
    pub fn new(callback_url_override: Option<String>, token_client: Arc<dyn TokenExchanger>) -> Self {
        Self {
            callback_url_override,
            callback_integration: None,
            token_client,
        }
    }

    /// Integration served by the shared `/auth/callback` route
    pub fn with_callback_integration(mut self, name: Option<String>) -> Self {
        self.callback_integration = name;
        self
    }

    /// Callback URL registered with the provider.
    ///
    /// An integration's own `callbackURL` is returned verbatim. The integration
    /// behind the shared callback route gets the configured override, or
    /// `{scheme}://{host}/auth/callback` derived from the request. Every other
    /// integration is called back on `{scheme}://{host}/auth/{integration}`.
    /// `x-forwarded-proto` is honored when a proxy sets it.
    pub fn callback_url(&self, parts: &Parts) -> String {
        if let Some(url) = parts
            .extensions
            .get::<IntegrationConfig>()
            .and_then(|config| config.callback_url.as_ref())
        {
            return url.clone();
        }

        let integration = parts
            .extensions
            .get::<IntegrationName>()
            .map(|name| name.0.as_str());
        let shared = match integration {
            Some(name) => self.callback_integration.as_deref() == Some(name),
            None => true,
        };

        if shared && let Some(url) = &self.callback_url_override {
            return url.clone();
        }

        let scheme = forwarded_proto(&parts.headers)
            .or_else(|| parts.uri.scheme_str())
            .unwrap_or("http");
        let host = parts
            .headers
            .get(header::HOST)
            .and_then(|value| value.to_str().ok())
            .or_else(|| parts.uri.authority().map(|authority| authority.as_str()))
            .unwrap_or("localhost");

        match integration {
            Some(name) if !shared => format!("{}://{}/auth/{}", scheme, host, name),
            _ => format!("{}://{}{}", scheme, host, CALLBACK_PATH),
        }
    }

    /// Run the strategy for one request.
    pub async fn handle(&self, request: Request, next: Next) -> Result<Response, AuthError> {
        let (mut parts, body) = request.into_parts();

        let callback_url = self.callback_url(&parts);
        let setup = parts
            .extensions
            .get::<SetupDetails>()
            .cloned()
            .ok_or(AuthError::MissingContext("setup details"))?;
        let outcome = CallbackQuery::from_uri(&parts.uri).outcome();
        let config = parts
            .extensions
            .get::<IntegrationConfig>()
            .cloned()
            .ok_or(AuthError::MissingContext("integration config"))?;
        let integration = parts
            .extensions
            .get::<IntegrationName>()
            .map(|name| name.0.clone())
            .unwrap_or_default();

        match outcome {
            CallbackOutcome::Rejected { error, description } => {
                counter!("oauth_callbacks_total", "outcome" => "rejected").increment(1);
                warn!(
                    integration = %integration,
                    error = %error,
                    error_description = description.as_deref().unwrap_or(""),
                    "Provider rejected the authorization request"
                );
                Err(AuthError::AuthenticationFailed(
                    AuthenticationFailed::from_oauth_request(&parts, None),
                ))
            }
            CallbackOutcome::GrantReceived { code } => {
                let token_request = TokenRequest {
                    authorization_method: config.authorization_method,
                    body_format: config.body_format,
                    client_id: &setup.credentials.client_id,
                    client_secret: &setup.credentials.client_secret,
                    code: &code,
                    token_params: &config.token_params,
                    token_url: &config.token_url,
                    callback_url: &callback_url,
                };
                debug!(integration = %integration, token_url = %config.token_url, "Exchanging authorization code");

                let result = match self.token_client.exchange_code_for_token(&token_request).await {
                    Ok(result) => result,
                    Err(source) => {
                        counter!("oauth_callbacks_total", "outcome" => "exchange_failed")
                            .increment(1);
                        warn!(integration = %integration, error = %source, "Token exchange failed");
                        return Err(AuthError::OAuthClient {
                            integration,
                            source,
                        });
                    }
                };

                counter!("oauth_callbacks_total", "outcome" => "authenticated").increment(1);
                info!(
                    integration = %integration,
                    has_refresh_token = result.refresh_token.is_some(),
                    expires_in = result.expires_in,
                    "Authorization code exchanged"
                );

                let credentials = Credentials::from(&result);
                parts.extensions.insert(credentials);
                parts
                    .extensions
                    .insert(TokenResponse(result.decoded_response));

                Ok(next.run(Request::from_parts(parts, body)).await)
            }
            CallbackOutcome::InitialVisit => {
                let state = resolve_state(&config);
                let scope = resolve_scope(&setup, &config);
                let url = build_authorization_redirect_url(&AuthorizationRequest {
                    authorization_params: &config.authorization_params,
                    authorization_url: &config.authorization_url,
                    client_id: &setup.credentials.client_id,
                    state,
                    scope,
                    callback_url: &callback_url,
                })
                .map_err(|source| AuthError::OAuthClient {
                    integration: integration.clone(),
                    source,
                })?;

                counter!("oauth_redirects_total").increment(1);
                info!(integration = %integration, callback_url = %callback_url, "Redirecting to provider");

                Ok((StatusCode::FOUND, [(header::LOCATION, url.to_string())]).into_response())
            }
        }
    }
}

/// Middleware entry point for the authorization code strategy
pub async fn authenticate(
    State(handler): State<Arc<AuthorizationCodeHandler>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    handler.handle(request, next).await.map_err(ApiError::from)
}

fn resolve_state(config: &IntegrationConfig) -> &str {
    config.default_state().unwrap_or(DEFAULT_STATE)
}

fn resolve_scope<'a>(setup: &'a SetupDetails, config: &'a IntegrationConfig) -> &'a [String] {
    if !setup.scopes.is_empty() {
        return &setup.scopes;
    }
    config.default_scope().unwrap_or(&[])
}

fn forwarded_proto(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|proto| !proto.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::{Extension, Json, Router, body::Body, http::Request, routing::get};
    use serde_json::{Value, json};
    use tower::ServiceExt;
    use url::Url;

    use crate::models::IntegrationDefaults;
    use crate::server::test_support::RecordingExchanger;

    #[derive(Clone)]
    struct Downstream {
        calls: Arc<AtomicUsize>,
    }

    async fn downstream(
        Extension(counter): Extension<Downstream>,
        credentials: Credentials,
        TokenResponse(token): TokenResponse,
    ) -> Json<Value> {
        counter.calls.fetch_add(1, Ordering::SeqCst);
        Json(json!({
            "access_token": credentials.access_token,
            "token_type": credentials.token_type,
            "raw": token,
        }))
    }

    struct Harness {
        exchanger: Arc<RecordingExchanger>,
        downstream_calls: Arc<AtomicUsize>,
        router: Router,
    }

    fn harness(
        setup: SetupDetails,
        config: IntegrationConfig,
        callback_override: Option<&str>,
        exchanger: Arc<RecordingExchanger>,
    ) -> Harness {
        harness_for("github", "github", setup, config, callback_override, exchanger)
    }

    fn harness_for(
        integration: &str,
        callback_integration: &str,
        setup: SetupDetails,
        config: IntegrationConfig,
        callback_override: Option<&str>,
        exchanger: Arc<RecordingExchanger>,
    ) -> Harness {
        let handler = Arc::new(
            AuthorizationCodeHandler::new(callback_override.map(str::to_owned), exchanger.clone())
                .with_callback_integration(Some(callback_integration.to_string())),
        );
        let downstream_calls = Arc::new(AtomicUsize::new(0));

        let router = Router::new()
            .route(
                "/auth/{integration}",
                get(downstream).layer(axum::middleware::from_fn_with_state(handler, authenticate)),
            )
            .layer(Extension(Downstream {
                calls: downstream_calls.clone(),
            }))
            .layer(Extension(IntegrationName(integration.to_string())))
            .layer(Extension(config))
            .layer(Extension(setup));

        Harness {
            exchanger,
            downstream_calls,
            router,
        }
    }

    fn github_setup() -> SetupDetails {
        SetupDetails::new("gh-client", "gh-secret")
    }

    fn github_config() -> IntegrationConfig {
        IntegrationConfig::new(
            "https://github.com/login/oauth/authorize",
            "https://github.com/login/oauth/access_token",
        )
    }

    async fn get_uri(router: Router, uri: &str) -> Response {
        router
            .oneshot(
                Request::builder()
                    .uri(uri)
                    .header(header::HOST, "gateway.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    fn location(response: &Response) -> Url {
        Url::parse(
            response
                .headers()
                .get(header::LOCATION)
                .unwrap()
                .to_str()
                .unwrap(),
        )
        .unwrap()
    }

    fn query(url: &Url) -> HashMap<String, String> {
        url.query_pairs().into_owned().collect()
    }

    async fn body_json(response: Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn initial_visit_redirects_to_provider_with_defaults() {
        let h = harness(
            github_setup(),
            github_config(),
            None,
            RecordingExchanger::succeeding(),
        );

        let response = get_uri(h.router, "/auth/github").await;

        assert_eq!(response.status(), StatusCode::FOUND);
        let url = location(&response);
        assert_eq!(url.host_str(), Some("github.com"));
        let params = query(&url);
        assert_eq!(params["client_id"], "gh-client");
        assert_eq!(params["redirect_uri"], "http://gateway.example/auth/callback");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["state"], DEFAULT_STATE);
        assert!(!params.contains_key("scope"));
        assert!(h.exchanger.calls().is_empty());
        assert_eq!(h.downstream_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn initial_visit_uses_configured_state_and_scope() {
        let mut config = github_config();
        config.config = Some(IntegrationDefaults {
            state: Some("xyz".to_string()),
            scope: Some(vec!["read".to_string(), "write".to_string()]),
        });
        let h = harness(
            github_setup(),
            config,
            Some("https://gw.example/auth/callback"),
            RecordingExchanger::succeeding(),
        );

        let response = get_uri(h.router, "/auth/github").await;

        let params = query(&location(&response));
        assert_eq!(params["state"], "xyz");
        assert_eq!(params["scope"], "read write");
        assert_eq!(params["client_id"], "gh-client");
        assert_eq!(params["redirect_uri"], "https://gw.example/auth/callback");
    }

    #[tokio::test]
    async fn setup_scopes_take_priority_over_configured_scope() {
        let mut config = github_config();
        config.config = Some(IntegrationDefaults {
            state: None,
            scope: Some(vec!["read".to_string()]),
        });
        let h = harness(
            github_setup().with_scopes(["repo", "user:email"]),
            config,
            None,
            RecordingExchanger::succeeding(),
        );

        let response = get_uri(h.router, "/auth/github").await;

        assert_eq!(query(&location(&response))["scope"], "repo user:email");
    }

    #[tokio::test]
    async fn redirect_ignores_request_supplied_params() {
        let h = harness(
            github_setup(),
            github_config(),
            None,
            RecordingExchanger::succeeding(),
        );

        let response = get_uri(h.router, "/auth/github?client_id=evil&state=evil").await;

        let params = query(&location(&response));
        assert_eq!(params["client_id"], "gh-client");
        assert_eq!(params["state"], DEFAULT_STATE);
    }

    #[tokio::test]
    async fn code_is_exchanged_and_downstream_runs_once() {
        let h = harness(
            github_setup(),
            github_config(),
            None,
            RecordingExchanger::succeeding(),
        );

        let response = get_uri(h.router, "/auth/github?code=abc123").await;

        assert_eq!(response.status(), StatusCode::OK);
        let calls = h.exchanger.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].code, "abc123");
        assert_eq!(calls[0].client_id, "gh-client");
        assert_eq!(calls[0].token_url, "https://github.com/login/oauth/access_token");
        assert_eq!(calls[0].callback_url, "http://gateway.example/auth/callback");
        assert_eq!(h.downstream_calls.load(Ordering::SeqCst), 1);

        let body = body_json(response).await;
        assert_eq!(body["access_token"], "access-abc123");
        assert_eq!(body["token_type"], "bearer");
        assert_eq!(body["raw"]["scope"], "repo");
    }

    #[tokio::test]
    async fn vendor_code_field_is_exchanged() {
        let h = harness(
            github_setup(),
            github_config(),
            None,
            RecordingExchanger::succeeding(),
        );

        get_uri(h.router, "/auth/github?spapi_oauth_code=amzn1").await;

        assert_eq!(h.exchanger.calls()[0].code, "amzn1");
    }

    #[tokio::test]
    async fn vendor_code_field_wins_when_both_present() {
        let h = harness(
            github_setup(),
            github_config(),
            None,
            RecordingExchanger::succeeding(),
        );

        get_uri(h.router, "/auth/github?code=std&spapi_oauth_code=vendor").await;

        let calls = h.exchanger.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].code, "vendor");
    }

    #[tokio::test]
    async fn provider_error_fails_without_side_effects() {
        let h = harness(
            github_setup(),
            github_config(),
            None,
            RecordingExchanger::succeeding(),
        );

        let response = get_uri(h.router, "/auth/github?error=access_denied&code=abc").await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(header::LOCATION).is_none());
        assert!(h.exchanger.calls().is_empty());
        assert_eq!(h.downstream_calls.load(Ordering::SeqCst), 0);

        let body = body_json(response).await;
        assert_eq!(body["code"], "AUTHENTICATION_FAILED");
        assert_eq!(body["details"]["error"], "access_denied");
        assert_eq!(body["details"]["integration"], "github");
    }

    #[tokio::test]
    async fn failed_exchange_propagates_and_skips_downstream() {
        let h = harness(
            github_setup(),
            github_config(),
            None,
            RecordingExchanger::failing(500),
        );

        let response = get_uri(h.router, "/auth/github?code=abc123").await;

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(h.exchanger.calls().len(), 1);
        assert_eq!(h.downstream_calls.load(Ordering::SeqCst), 0);
        assert_eq!(body_json(response).await["code"], "PROVIDER_ERROR");
    }

    #[tokio::test]
    async fn missing_setup_details_is_an_internal_error() {
        let handler = Arc::new(AuthorizationCodeHandler::new(
            None,
            RecordingExchanger::succeeding(),
        ));
        let router = Router::new().route(
            "/auth/github",
            get(|| async { "unreachable" })
                .layer(axum::middleware::from_fn_with_state(handler, authenticate)),
        );

        let response = get_uri(router, "/auth/github?code=abc").await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn other_integrations_are_called_back_on_their_own_route() {
        let h = harness_for(
            "amazon",
            "github",
            SetupDetails::new("amzn-client", "amzn-secret"),
            IntegrationConfig::new(
                "https://sellercentral.amazon.com/apps/authorize/consent",
                "https://api.amazon.com/auth/o2/token",
            ),
            Some("https://gw.example/auth/callback"),
            RecordingExchanger::succeeding(),
        );

        let response = get_uri(h.router.clone(), "/auth/amazon").await;
        assert_eq!(
            query(&location(&response))["redirect_uri"],
            "http://gateway.example/auth/amazon"
        );

        let response = get_uri(h.router, "/auth/amazon?spapi_oauth_code=amzn-code").await;
        assert_eq!(response.status(), StatusCode::OK);
        let calls = h.exchanger.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].client_id, "amzn-client");
        assert_eq!(calls[0].token_url, "https://api.amazon.com/auth/o2/token");
        assert_eq!(calls[0].callback_url, "http://gateway.example/auth/amazon");
    }

    #[tokio::test]
    async fn integration_callback_url_takes_priority() {
        let mut config = github_config();
        config.callback_url = Some("https://gh.gw.example/oauth/return".to_string());
        let h = harness(
            github_setup(),
            config,
            Some("https://gw.example/auth/callback"),
            RecordingExchanger::succeeding(),
        );

        let response = get_uri(h.router.clone(), "/auth/github").await;
        assert_eq!(
            query(&location(&response))["redirect_uri"],
            "https://gh.gw.example/oauth/return"
        );

        get_uri(h.router, "/auth/github?code=abc").await;
        assert_eq!(
            h.exchanger.calls()[0].callback_url,
            "https://gh.gw.example/oauth/return"
        );
    }

    #[test]
    fn callback_url_override_is_returned_verbatim() {
        let handler = AuthorizationCodeHandler::new(
            Some("https://gw.example/custom/cb?x=1".to_string()),
            RecordingExchanger::succeeding(),
        );
        let (parts, _) = Request::builder()
            .uri("/auth/github")
            .header(header::HOST, "other.example")
            .body(())
            .unwrap()
            .into_parts();

        assert_eq!(
            handler.callback_url(&parts),
            "https://gw.example/custom/cb?x=1"
        );
    }

    #[test]
    fn callback_url_honors_forwarded_proto() {
        let handler = AuthorizationCodeHandler::new(None, RecordingExchanger::succeeding());
        let (parts, _) = Request::builder()
            .uri("/auth/github")
            .header(header::HOST, "gw.example:8443")
            .header("x-forwarded-proto", "https, http")
            .body(())
            .unwrap()
            .into_parts();

        assert_eq!(
            handler.callback_url(&parts),
            "https://gw.example:8443/auth/callback"
        );
    }

    #[test]
    fn callback_url_falls_back_to_localhost() {
        let handler = AuthorizationCodeHandler::new(None, RecordingExchanger::succeeding());
        let (parts, _) = Request::builder()
            .uri("/auth/github")
            .body(())
            .unwrap()
            .into_parts();

        assert_eq!(handler.callback_url(&parts), "http://localhost/auth/callback");
    }
}
