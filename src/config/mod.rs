//! Configuration loading for the OAuth gateway.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `OAUTH_GATEWAY_`, producing a typed [`AppConfig`].

use std::{collections::BTreeMap, env, net::SocketAddr, path::PathBuf, time::Duration};

use serde::Serialize;
use thiserror::Error;
use url::Url;

/// Prefix shared by every environment variable the gateway reads.
pub const ENV_PREFIX: &str = "OAUTH_GATEWAY_";

const MIN_TOKEN_REQUEST_TIMEOUT_MS: u64 = 100;
const MAX_TOKEN_REQUEST_TIMEOUT_MS: u64 = 120_000;

/// Application configuration derived from `OAUTH_GATEWAY_*` environment variables.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AppConfig {
    pub profile: String,
    pub api_bind_addr: String,
    pub log_level: String,
    pub log_format: String,
    /// Callback URL for the shared callback integration, used verbatim; derived from the request when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_callback_url: Option<String>,
    /// JSON file holding the integration registry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integrations_path: Option<PathBuf>,
    /// Integration served by the shared `/auth/callback` route
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_integration: Option<String>,
    pub token_request_timeout_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            api_bind_addr: default_api_bind_addr(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            auth_callback_url: None,
            integrations_path: None,
            callback_integration: None,
            token_request_timeout_ms: default_token_request_timeout_ms(),
        }
    }
}

impl AppConfig {
    /// Returns the configured bind address as a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.api_bind_addr.parse()
    }

    /// Timeout applied to every token endpoint request.
    pub fn token_request_timeout(&self) -> Duration {
        Duration::from_millis(self.token_request_timeout_ms)
    }

    /// Returns a redacted JSON representation suitable for startup logs.
    /// The callback URL query string is masked.
    pub fn redacted_json(&self) -> serde_json::Result<String> {
        let mut config = self.clone();
        if let Some(callback) = config.auth_callback_url.as_mut()
            && let Ok(mut url) = Url::parse(callback)
            && url.query().is_some()
        {
            url.set_query(Some("[REDACTED]"));
            *callback = url.to_string();
        }
        serde_json::to_string_pretty(&config)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr()
            .map_err(|source| ConfigError::InvalidBindAddr {
                value: self.api_bind_addr.clone(),
                source,
            })?;

        if !matches!(self.log_format.as_str(), "json" | "pretty") {
            return Err(ConfigError::InvalidLogFormat {
                value: self.log_format.clone(),
            });
        }

        if let Some(callback) = &self.auth_callback_url {
            let url = Url::parse(callback).map_err(|source| ConfigError::InvalidCallbackUrl {
                value: callback.clone(),
                reason: source.to_string(),
            })?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(ConfigError::InvalidCallbackUrl {
                    value: callback.clone(),
                    reason: format!("unsupported scheme '{}'", url.scheme()),
                });
            }
        }

        if !(MIN_TOKEN_REQUEST_TIMEOUT_MS..=MAX_TOKEN_REQUEST_TIMEOUT_MS)
            .contains(&self.token_request_timeout_ms)
        {
            return Err(ConfigError::InvalidTokenRequestTimeout {
                value: self.token_request_timeout_ms,
            });
        }

        Ok(())
    }
}

fn default_profile() -> String {
    "local".to_string()
}

fn default_api_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_token_request_timeout_ms() -> u64 {
    10_000
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load environment file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
    #[error("invalid api bind address '{value}': {source}")]
    InvalidBindAddr {
        value: String,
        source: std::net::AddrParseError,
    },
    #[error("log format must be 'json' or 'pretty', got '{value}'")]
    InvalidLogFormat { value: String },
    #[error("invalid auth callback URL '{value}': {reason}")]
    InvalidCallbackUrl { value: String, reason: String },
    #[error("token request timeout must be between 100 and 120000 ms, got {value}")]
    InvalidTokenRequestTimeout { value: u64 },
    #[error("token request timeout must be an integer number of milliseconds, got '{value}'")]
    UnparseableTokenRequestTimeout { value: String },
}

/// Loads configuration using layered `.env` files and `OAUTH_GATEWAY_*` env vars.
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    /// Creates a new loader rooted at the current working directory.
    pub fn new() -> Self {
        Self {
            base_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Creates a loader rooted at the provided directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Loads and validates configuration. Process environment wins over any file.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let (mut layered, profile_hint) = self.collect_layered_env()?;

        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                layered.insert(stripped.to_string(), value);
            }
        }

        let mut take = |key: &str| layered.remove(key).filter(|v| !v.trim().is_empty());

        let profile = take("PROFILE").unwrap_or(profile_hint);
        let api_bind_addr = take("API_BIND_ADDR").unwrap_or_else(default_api_bind_addr);
        let log_level = take("LOG_LEVEL").unwrap_or_else(default_log_level);
        let log_format = take("LOG_FORMAT")
            .map(|v| v.to_ascii_lowercase())
            .unwrap_or_else(default_log_format);
        let auth_callback_url = take("AUTH_CALLBACK_URL").map(|v| v.trim().to_string());
        let integrations_path = take("INTEGRATIONS_PATH").map(|path| {
            let path = PathBuf::from(path);
            if path.is_relative() {
                self.base_dir.join(path)
            } else {
                path
            }
        });
        let callback_integration = take("CALLBACK_INTEGRATION");
        let token_request_timeout_ms = match take("TOKEN_REQUEST_TIMEOUT_MS") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::UnparseableTokenRequestTimeout { value: raw })?,
            None => default_token_request_timeout_ms(),
        };

        let config = AppConfig {
            profile,
            api_bind_addr,
            log_level,
            log_format,
            auth_callback_url,
            integrations_path,
            callback_integration,
            token_request_timeout_ms,
        };

        config.validate()?;
        Ok(config)
    }

    fn collect_layered_env(&self) -> Result<(BTreeMap<String, String>, String), ConfigError> {
        let mut values = BTreeMap::new();

        self.merge_dotenv(self.base_dir.join(".env"), &mut values)?;
        self.merge_dotenv(self.base_dir.join(".env.local"), &mut values)?;

        let profile = env::var(format!("{ENV_PREFIX}PROFILE"))
            .ok()
            .filter(|v| !v.is_empty())
            .or_else(|| values.get("PROFILE").cloned())
            .unwrap_or_else(default_profile);

        self.merge_dotenv(self.base_dir.join(format!(".env.{profile}")), &mut values)?;
        self.merge_dotenv(
            self.base_dir.join(format!(".env.{profile}.local")),
            &mut values,
        )?;

        Ok((values, profile))
    }

    fn merge_dotenv(
        &self,
        path: PathBuf,
        values: &mut BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        match dotenvy::from_path_iter(&path) {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                        path: path.clone(),
                        source,
                    })?;
                    if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                        values.insert(stripped.to_string(), value);
                    }
                }
                Ok(())
            }
            Err(dotenvy::Error::Io(ref io_err))
                if io_err.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(())
            }
            Err(err) => Err(ConfigError::EnvFile { path, source: err }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
