//! Authorization code exchange against a provider token endpoint.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::{Map, Value};
use url::Url;

use super::{OAuthClientError, body_snippet};
use crate::models::{AuthorizationMethod, BodyFormat, TokenExchangeResult};

/// Inputs for an authorization code exchange
#[derive(Clone, Copy)]
pub struct TokenRequest<'a> {
    pub authorization_method: AuthorizationMethod,
    pub body_format: BodyFormat,
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub code: &'a str,
    pub token_params: &'a BTreeMap<String, String>,
    pub token_url: &'a str,
    pub callback_url: &'a str,
}

impl fmt::Debug for TokenRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRequest")
            .field("authorization_method", &self.authorization_method)
            .field("body_format", &self.body_format)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("code", &"[REDACTED]")
            .field("token_params", &self.token_params.keys().collect::<Vec<_>>())
            .field("token_url", &self.token_url)
            .field("callback_url", &self.callback_url)
            .finish()
    }
}

/// Exchanges authorization codes for tokens
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    /// Exchange `request.code` at `request.token_url`.
    async fn exchange_code_for_token(
        &self,
        request: &TokenRequest<'_>,
    ) -> Result<TokenExchangeResult, OAuthClientError>;
}

/// [`TokenExchanger`] backed by a shared `reqwest` client
#[derive(Debug, Clone)]
pub struct HttpTokenClient {
    client: reqwest::Client,
}

impl HttpTokenClient {
    /// Create a client whose requests time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self, OAuthClientError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("oauth-gateway/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl TokenExchanger for HttpTokenClient {
    async fn exchange_code_for_token(
        &self,
        request: &TokenRequest<'_>,
    ) -> Result<TokenExchangeResult, OAuthClientError> {
        let token_url =
            Url::parse(request.token_url).map_err(|source| OAuthClientError::InvalidUrl {
                field: "token URL",
                value: request.token_url.to_string(),
                source,
            })?;

        let mut params: BTreeMap<String, String> = BTreeMap::new();
        params.insert("code".to_string(), request.code.to_string());
        params.insert("grant_type".to_string(), "authorization_code".to_string());
        params.insert("redirect_uri".to_string(), request.callback_url.to_string());
        for (key, value) in request.token_params {
            params.insert(key.clone(), value.clone());
        }

        let mut builder = self
            .client
            .post(token_url)
            .header(ACCEPT, "application/json");

        match request.authorization_method {
            AuthorizationMethod::Header => {
                builder = builder.basic_auth(request.client_id, Some(request.client_secret));
            }
            AuthorizationMethod::Body => {
                params.insert("client_id".to_string(), request.client_id.to_string());
                params.insert(
                    "client_secret".to_string(),
                    request.client_secret.to_string(),
                );
            }
        }

        builder = match request.body_format {
            BodyFormat::Form => builder.form(&params),
            BodyFormat::Json => builder.json(&params),
        };

        tracing::debug!(
            token_url = %request.token_url,
            authorization_method = ?request.authorization_method,
            body_format = ?request.body_format,
            "Exchanging authorization code"
        );

        let response = builder.send().await?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let body = response.text().await?;

        if !status.is_success() {
            tracing::warn!(
                token_url = %request.token_url,
                status = status.as_u16(),
                "Token endpoint returned an error status"
            );
            return Err(OAuthClientError::TokenEndpoint {
                status: status.as_u16(),
                body: body_snippet(&body),
            });
        }

        let decoded = decode_token_body(content_type.as_deref(), &body)?;
        token_result_from_decoded(decoded)
    }
}

/// Decode a token endpoint body as JSON, or as form fields when the provider says so.
/// `text/plain` bodies are tried as JSON first.
fn decode_token_body(content_type: Option<&str>, body: &str) -> Result<Value, OAuthClientError> {
    let mime = content_type
        .and_then(|value| value.split(';').next())
        .map(str::trim)
        .unwrap_or_default();

    if mime.eq_ignore_ascii_case("application/x-www-form-urlencoded") {
        return Ok(decode_form(body));
    }

    match serde_json::from_str(body) {
        Ok(value) => Ok(value),
        Err(_) if mime.eq_ignore_ascii_case("text/plain") => Ok(decode_form(body)),
        Err(err) => Err(err.into()),
    }
}

fn decode_form(body: &str) -> Value {
    let fields: Map<String, Value> = url::form_urlencoded::parse(body.as_bytes())
        .into_owned()
        .map(|(key, value)| (key, Value::String(value)))
        .collect();
    Value::Object(fields)
}

fn token_result_from_decoded(decoded: Value) -> Result<TokenExchangeResult, OAuthClientError> {
    // Some providers answer 200 with an OAuth error payload
    if let Some(error) = decoded.get("error").and_then(Value::as_str) {
        return Err(OAuthClientError::GrantRejected {
            error: error.to_string(),
            description: decoded
                .get("error_description")
                .and_then(Value::as_str)
                .map(str::to_owned),
        });
    }

    let text_field = |key: &str| {
        decoded
            .get(key)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
            .map(str::to_owned)
    };

    let access_token = text_field("access_token").ok_or(OAuthClientError::InvalidTokenResponse)?;
    let refresh_token = text_field("refresh_token");
    let id_token = text_field("id_token");
    let expires_in = decoded.get("expires_in").and_then(|value| {
        value
            .as_u64()
            .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
    });

    Ok(TokenExchangeResult {
        access_token,
        refresh_token,
        id_token,
        expires_in,
        decoded_response: decoded,
    })
}
