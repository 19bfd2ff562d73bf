// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.

use std::env;
use std::time::Duration;

/// OAuth client registration for one calendar provider.
#[derive(Debug, Clone, Default)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,
    /// Where the OAuth exchange endpoint sends the browser afterwards
    pub frontend_url: String,
    /// sqlx connection string
    pub database_url: String,
    /// Origins allowed by CORS
    pub allowed_origins: Vec<String>,
    /// Mark the session cookie `Secure`
    pub secure_cookies: bool,
    /// Create the demo host on startup
    pub seed_demo: bool,

    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    pub session_issuer: String,
    pub session_ttl: Duration,
    /// HMAC key for the OAuth `state` parameter
    pub oauth_state_key: Vec<u8>,

    pub google: OAuthClientConfig,
    pub microsoft: OAuthClientConfig,
    /// Azure AD tenant used for Microsoft authorization
    pub microsoft_tenant: String,
    /// Fallback TTL for provider discovery/JWKS documents
    pub provider_metadata_ttl: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let jwt_signing_key = env::var("JWT_SIGNING_KEY")
            .map(|v| v.trim().to_string())
            .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
            .into_bytes();
        let oauth_state_key = env::var("OAUTH_STATE_KEY")
            .map(|v| v.trim().as_bytes().to_vec())
            .unwrap_or_else(|_| jwt_signing_key.clone());

        Ok(Self {
            port: parse_or("PORT", 8000),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:8000/fe/".to_string()),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://calbook.db".to_string()),
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3000,http://localhost:8000".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            secure_cookies: parse_or("SECURE_COOKIES", false),
            seed_demo: parse_or("SEED_DEMO", false),

            jwt_signing_key,
            session_issuer: env::var("SESSION_ISSUER").unwrap_or_else(|_| "calbook".to_string()),
            session_ttl: Duration::from_secs(60 * parse_or("SESSION_TTL_MINUTES", 30u64)),
            oauth_state_key,

            google: oauth_client("GOOGLE"),
            microsoft: oauth_client("MICROSOFT"),
            microsoft_tenant: env::var("MICROSOFT_TENANT").unwrap_or_else(|_| "common".to_string()),
            provider_metadata_ttl: Duration::from_secs(parse_or(
                "PROVIDER_METADATA_TTL_SECS",
                300u64,
            )),
        })
    }

    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            port: 8000,
            frontend_url: "http://localhost:8000/fe/".to_string(),
            database_url: "sqlite::memory:".to_string(),
            allowed_origins: vec!["http://localhost:3000".to_string()],
            secure_cookies: false,
            seed_demo: false,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            session_issuer: "calbook".to_string(),
            session_ttl: Duration::from_secs(30 * 60),
            oauth_state_key: b"test_oauth_state_key".to_vec(),
            google: OAuthClientConfig {
                client_id: "google-client".to_string(),
                client_secret: "google-secret".to_string(),
                redirect_uri: "http://localhost:8000/api/v1/profile/google/exchange".to_string(),
            },
            microsoft: OAuthClientConfig {
                client_id: "microsoft-client".to_string(),
                client_secret: "microsoft-secret".to_string(),
                redirect_uri: "http://localhost:8000/api/v1/profile/microsoft/exchange"
                    .to_string(),
            },
            microsoft_tenant: "common".to_string(),
            provider_metadata_ttl: Duration::from_secs(300),
        }
    }
}

fn oauth_client(prefix: &str) -> OAuthClientConfig {
    let var = |name: &str| env::var(format!("{prefix}_{name}")).unwrap_or_default();
    OAuthClientConfig {
        client_id: var("CLIENT_ID"),
        client_secret: var("CLIENT_SECRET").trim().to_string(),
        redirect_uri: var("REDIRECT_URI"),
    }
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        env::set_var("JWT_SIGNING_KEY", "test_jwt_key_32_bytes_minimum!!");
        env::set_var("GOOGLE_CLIENT_ID", "gid");
        env::set_var("SESSION_TTL_MINUTES", "45");
        env::set_var("ALLOWED_ORIGINS", "https://a.example, https://b.example,");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.google.client_id, "gid");
        assert_eq!(config.session_ttl, Duration::from_secs(45 * 60));
        assert_eq!(
            config.allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert_eq!(config.oauth_state_key, config.jwt_signing_key);
    }
}
