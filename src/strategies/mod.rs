//! Authentication strategies run as route middleware.
//!
//! Only the OAuth2 authorization code strategy exists; [`CallbackQuery`]
//! classifies an inbound request into the three outcomes that strategy handles.

use axum::http::Uri;

pub mod auth_code;
pub mod errors;

pub use auth_code::{AuthorizationCodeHandler, DEFAULT_STATE, authenticate};
pub use errors::{AuthError, AuthenticationFailed};

/// OAuth callback query parameters. Empty values are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackQuery {
    pub code: Option<String>,
    /// Amazon Selling Partner API code field
    pub spapi_oauth_code: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// What an inbound request to an auth route represents
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// The provider redirected back with an error
    Rejected {
        error: String,
        description: Option<String>,
    },
    /// The provider redirected back with an authorization code
    GrantReceived { code: String },
    /// The user-agent has not been sent to the provider yet
    InitialVisit,
}

impl CallbackQuery {
    /// Parses the query string of `uri`; the first occurrence of a key wins
    pub fn from_uri(uri: &Uri) -> Self {
        let mut query = Self::default();
        let Some(raw) = uri.query() else {
            return query;
        };

        for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
            if value.is_empty() {
                continue;
            }
            let slot = match key.as_ref() {
                "code" => &mut query.code,
                "spapi_oauth_code" => &mut query.spapi_oauth_code,
                "error" => &mut query.error,
                "error_description" => &mut query.error_description,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }

        query
    }

    /// Classifies the request. A provider error beats any code, and the
    /// vendor-specific code field beats the standard one.
    pub fn outcome(self) -> CallbackOutcome {
        if let Some(error) = self.error {
            return CallbackOutcome::Rejected {
                error,
                description: self.error_description,
            };
        }

        match self.spapi_oauth_code.or(self.code) {
            Some(code) => CallbackOutcome::GrantReceived { code },
            None => CallbackOutcome::InitialVisit,
        }
    }
}
