//! # Credentials Model
//!
//! Token endpoint results and the normalized credentials handed to downstream handlers.

use std::fmt;

use serde_json::Value;

/// Parsed result of an authorization code exchange
#[derive(Clone)]
pub struct TokenExchangeResult {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    pub expires_in: Option<u64>,
    /// Token endpoint payload exactly as decoded
    pub decoded_response: Value,
}

impl fmt::Debug for TokenExchangeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenExchangeResult")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("id_token", &self.id_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_in", &self.expires_in)
            .finish_non_exhaustive()
    }
}

/// Normalized access credentials attached to the request context
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    /// Lifetime in seconds as reported by the provider
    pub expires_in: Option<u64>,
    pub token_type: Option<String>,
    /// Scope actually granted, when the provider reports it
    pub scope: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("id_token", &self.id_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .finish()
    }
}

impl From<&TokenExchangeResult> for Credentials {
    fn from(result: &TokenExchangeResult) -> Self {
        let text_field = |key: &str| {
            result
                .decoded_response
                .get(key)
                .and_then(Value::as_str)
                .filter(|value| !value.is_empty())
                .map(str::to_owned)
        };

        Self {
            access_token: result.access_token.clone(),
            refresh_token: result.refresh_token.clone(),
            id_token: result.id_token.clone(),
            expires_in: result.expires_in,
            token_type: text_field("token_type"),
            scope: text_field("scope"),
        }
    }
}
