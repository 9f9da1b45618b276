//! Authorization redirect URL construction.

use std::collections::BTreeMap;

use url::Url;

use super::OAuthClientError;

/// Parameters set by the flow itself; extra authorization params cannot override them
const RESERVED_PARAMS: [&str; 5] = ["client_id", "redirect_uri", "response_type", "scope", "state"];

/// Inputs for the authorization redirect
#[derive(Debug, Clone, Copy)]
pub struct AuthorizationRequest<'a> {
    pub authorization_params: &'a BTreeMap<String, String>,
    pub authorization_url: &'a str,
    pub client_id: &'a str,
    pub state: &'a str,
    pub scope: &'a [String],
    pub callback_url: &'a str,
}

/// Build the provider authorization URL the user-agent is redirected to.
///
/// Extra `authorization_params` come first, followed by `client_id`,
/// `redirect_uri`, `response_type=code`, the space-separated `scope` (omitted
/// when empty) and `state`. Query pairs already present on the configured
/// authorization URL are preserved.
pub fn build_authorization_redirect_url(
    request: &AuthorizationRequest<'_>,
) -> Result<Url, OAuthClientError> {
    let mut url =
        Url::parse(request.authorization_url).map_err(|source| OAuthClientError::InvalidUrl {
            field: "authorization URL",
            value: request.authorization_url.to_string(),
            source,
        })?;

    {
        let mut query = url.query_pairs_mut();

        for (key, value) in request.authorization_params {
            if RESERVED_PARAMS.contains(&key.as_str()) {
                tracing::debug!(param = %key, "Ignoring authorization param reserved by the flow");
                continue;
            }
            query.append_pair(key, value);
        }

        query
            .append_pair("client_id", request.client_id)
            .append_pair("redirect_uri", request.callback_url)
            .append_pair("response_type", "code");

        if !request.scope.is_empty() {
            query.append_pair("scope", &request.scope.join(" "));
        }

        query.append_pair("state", request.state);
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn query_map(url: &Url) -> HashMap<String, String> {
        url.query_pairs().into_owned().collect()
    }

    #[test]
    fn builds_standard_authorization_url() {
        let params = BTreeMap::new();
        let scope = vec!["repo".to_string(), "read:org".to_string()];
        let url = build_authorization_redirect_url(&AuthorizationRequest {
            authorization_params: &params,
            authorization_url: "https://provider.example/oauth/authorize",
            client_id: "client-123",
            state: "xyz",
            scope: &scope,
            callback_url: "https://gateway.example/auth/callback",
        })
        .unwrap();

        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_str(), Some("provider.example"));
        assert_eq!(url.path(), "/oauth/authorize");

        let query = query_map(&url);
        assert_eq!(query["client_id"], "client-123");
        assert_eq!(query["redirect_uri"], "https://gateway.example/auth/callback");
        assert_eq!(query["response_type"], "code");
        assert_eq!(query["scope"], "repo read:org");
        assert_eq!(query["state"], "xyz");
    }

    #[test]
    fn extra_params_are_appended_but_cannot_override_flow_params() {
        let mut params = BTreeMap::new();
        params.insert("access_type".to_string(), "offline".to_string());
        params.insert("state".to_string(), "attacker".to_string());

        let url = build_authorization_redirect_url(&AuthorizationRequest {
            authorization_params: &params,
            authorization_url: "https://provider.example/authorize",
            client_id: "client-123",
            state: "none",
            scope: &[],
            callback_url: "http://localhost:8080/auth/callback",
        })
        .unwrap();

        let states: Vec<_> = url
            .query_pairs()
            .filter(|(key, _)| key == "state")
            .map(|(_, value)| value.into_owned())
            .collect();
        assert_eq!(states, vec!["none".to_string()]);
        assert_eq!(query_map(&url)["access_type"], "offline");
    }

    #[test]
    fn empty_scope_is_omitted() {
        let params = BTreeMap::new();
        let url = build_authorization_redirect_url(&AuthorizationRequest {
            authorization_params: &params,
            authorization_url: "https://provider.example/authorize",
            client_id: "client-123",
            state: "none",
            scope: &[],
            callback_url: "http://localhost:8080/auth/callback",
        })
        .unwrap();

        assert!(!query_map(&url).contains_key("scope"));
    }

    #[test]
    fn existing_query_on_authorization_url_is_preserved() {
        let params = BTreeMap::new();
        let url = build_authorization_redirect_url(&AuthorizationRequest {
            authorization_params: &params,
            authorization_url: "https://sellercentral.example/apps/authorize/consent?version=beta",
            client_id: "amzn-client",
            state: "none",
            scope: &[],
            callback_url: "http://localhost:8080/auth/callback",
        })
        .unwrap();

        let query = query_map(&url);
        assert_eq!(query["version"], "beta");
        assert_eq!(query["client_id"], "amzn-client");
    }

    #[test]
    fn invalid_authorization_url_is_a_configuration_error() {
        let params = BTreeMap::new();
        let err = build_authorization_redirect_url(&AuthorizationRequest {
            authorization_params: &params,
            authorization_url: "not a url",
            client_id: "client-123",
            state: "none",
            scope: &[],
            callback_url: "http://localhost:8080/auth/callback",
        })
        .unwrap_err();

        assert!(err.is_configuration_error());
    }
}
