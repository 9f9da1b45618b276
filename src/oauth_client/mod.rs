//! OAuth2 client helpers used by the authorization code strategy.
//!
//! [`redirect`] builds the provider authorization URL; [`token`] exchanges an
//! authorization code at the provider token endpoint.

use thiserror::Error;

pub mod redirect;
pub mod token;

pub use redirect::{AuthorizationRequest, build_authorization_redirect_url};
pub use token::{HttpTokenClient, TokenExchanger, TokenRequest};

/// Maximum number of characters of an upstream body kept for diagnostics
pub(crate) const BODY_SNIPPET_CHARS: usize = 200;

/// Errors raised while talking to an OAuth2 provider
#[derive(Debug, Error)]
pub enum OAuthClientError {
    #[error("invalid {field} '{value}': {source}")]
    InvalidUrl {
        field: &'static str,
        value: String,
        source: url::ParseError,
    },

    #[error("token endpoint returned HTTP {status}")]
    TokenEndpoint { status: u16, body: Option<String> },

    #[error("token endpoint rejected the grant: {error}")]
    GrantRejected {
        error: String,
        description: Option<String>,
    },

    #[error("token endpoint response is missing an access token")]
    InvalidTokenResponse,

    #[error("token request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("failed to decode token response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl OAuthClientError {
    /// Upstream HTTP status associated with this error, if any
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            OAuthClientError::TokenEndpoint { status, .. } => Some(*status),
            OAuthClientError::Network(err) => err.status().map(|status| status.as_u16()),
            _ => None,
        }
    }

    /// Whether the failure originates from a misconfigured integration rather than the provider
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, OAuthClientError::InvalidUrl { .. })
    }
}

/// Truncate an upstream body to a bounded, UTF-8 safe snippet
pub(crate) fn body_snippet(body: &str) -> Option<String> {
    if body.is_empty() {
        return None;
    }

    if body.chars().count() > BODY_SNIPPET_CHARS {
        let truncated: String = body.chars().take(BODY_SNIPPET_CHARS).collect();
        Some(format!("{}...", truncated))
    } else {
        Some(body.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_snippet_truncates_on_char_boundaries() {
        let body = "é".repeat(BODY_SNIPPET_CHARS + 10);
        let snippet = body_snippet(&body).unwrap();

        assert!(snippet.ends_with("..."));
        assert_eq!(snippet.chars().count(), BODY_SNIPPET_CHARS + 3);
    }

    #[test]
    fn body_snippet_skips_empty_bodies() {
        assert_eq!(body_snippet(""), None);
        assert_eq!(body_snippet("oops").as_deref(), Some("oops"));
    }

    #[test]
    fn only_url_errors_are_configuration_errors() {
        let url_error = OAuthClientError::InvalidUrl {
            field: "token URL",
            value: "not a url".to_string(),
            source: url::Url::parse("not a url").unwrap_err(),
        };
        let upstream = OAuthClientError::TokenEndpoint {
            status: 500,
            body: None,
        };

        assert!(url_error.is_configuration_error());
        assert!(!upstream.is_configuration_error());
        assert_eq!(upstream.upstream_status(), Some(500));
        assert_eq!(url_error.upstream_status(), None);
    }
}
