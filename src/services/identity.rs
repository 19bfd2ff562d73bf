// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OpenID Connect id_token verification for connected providers.
//!
//! Discovery documents and signing keys are cached process-wide in
//! [`TtlCache`]s. TTLs follow the response's `Cache-Control: max-age` when
//! present. A token signed with an unknown `kid` forces one key refresh.

use crate::config::Config;
use crate::error::AppError;
use crate::models::ProviderKind;
use crate::services::metadata_cache::TtlCache;
use crate::services::provider::OAuthToken;
use crate::time_utils::Clock;
use anyhow::Context;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::header::CACHE_CONTROL;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

const GOOGLE_DISCOVERY_URL: &str = "https://accounts.google.com/.well-known/openid-configuration";
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);
const CLOCK_SKEW_SECS: u64 = 60;
/// Placeholder in multi-tenant issuer templates.
const TENANT_PLACEHOLDER: &str = "{tenantid}";

/// Where to discover a provider's keys and which audience to expect.
#[derive(Debug, Clone)]
pub struct OidcIssuer {
    pub discovery_url: String,
    pub client_id: String,
}

/// Identity asserted by a verified id_token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifiedIdentity {
    pub provider: ProviderKind,
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub issuer: String,
}

#[derive(Debug, Clone, Deserialize)]
struct Discovery {
    issuer: String,
    jwks_uri: String,
}

type KeySet = Arc<HashMap<String, Arc<DecodingKey>>>;

/// Verifier for provider-issued OIDC id_tokens.
pub struct IdentityVerifier {
    http_client: reqwest::Client,
    google: OidcIssuer,
    microsoft: OidcIssuer,
    discovery_cache: TtlCache<ProviderKind, Discovery>,
    jwks_cache: TtlCache<String, KeySet>,
    refresh_lock: Mutex<()>,
}

impl IdentityVerifier {
    pub fn new(
        google: OidcIssuer,
        microsoft: OidcIssuer,
        default_ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .context("failed building OIDC HTTP client")?;

        Ok(Self {
            http_client,
            google,
            microsoft,
            discovery_cache: TtlCache::new(default_ttl, clock.clone()),
            jwks_cache: TtlCache::new(default_ttl, clock),
            refresh_lock: Mutex::new(()),
        })
    }

    pub fn from_config(config: &Config, clock: Arc<dyn Clock>) -> anyhow::Result<Self> {
        Self::new(
            OidcIssuer {
                discovery_url: GOOGLE_DISCOVERY_URL.to_string(),
                client_id: config.google.client_id.clone(),
            },
            OidcIssuer {
                discovery_url: format!(
                    "https://login.microsoftonline.com/{}/v2.0/.well-known/openid-configuration",
                    config.microsoft_tenant
                ),
                client_id: config.microsoft.client_id.clone(),
            },
            config.provider_metadata_ttl,
            clock,
        )
    }

    fn issuer(&self, kind: ProviderKind) -> &OidcIssuer {
        match kind {
            ProviderKind::Google => &self.google,
            ProviderKind::Microsoft => &self.microsoft,
        }
    }

    /// Verify the id_token kept alongside a stored access token.
    pub async fn verify_stored(
        &self,
        kind: ProviderKind,
        token: &OAuthToken,
    ) -> Result<VerifiedIdentity, AppError> {
        let id_token = token
            .id_token
            .as_deref()
            .ok_or_else(|| AppError::provider_unauthorized(kind, "no id_token stored"))?;
        self.verify(kind, id_token).await
    }

    pub async fn verify(
        &self,
        kind: ProviderKind,
        id_token: &str,
    ) -> Result<VerifiedIdentity, AppError> {
        let reject = |reason: String| AppError::provider_unauthorized(kind, reason);

        let header =
            decode_header(id_token).map_err(|e| reject(format!("invalid JWT header: {e}")))?;
        if header.alg != Algorithm::RS256 {
            return Err(reject(format!("unexpected JWT alg: {:?}", header.alg)));
        }
        let kid = header
            .kid
            .ok_or_else(|| reject("missing JWT kid".to_string()))?;

        let (decoding_key, discovery) = self.decoding_key_for_kid(kind, &kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.set_audience(&[self.issuer(kind).client_id.as_str()]);
        validation.leeway = CLOCK_SKEW_SECS;

        let claims = decode::<IdTokenClaims>(id_token, &decoding_key, &validation)
            .map_err(|e| reject(format!("JWT validation failed: {e}")))?
            .claims;

        if !issuer_matches(&discovery.issuer, &claims.iss) {
            return Err(reject(format!("unexpected issuer: {}", claims.iss)));
        }

        tracing::info!(provider = %kind, subject = %claims.sub, "Verified provider identity");

        Ok(VerifiedIdentity {
            provider: kind,
            subject: claims.sub,
            email: claims.email.or(claims.preferred_username),
            issuer: claims.iss,
        })
    }

    async fn decoding_key_for_kid(
        &self,
        kind: ProviderKind,
        kid: &str,
    ) -> Result<(Arc<DecodingKey>, Discovery), AppError> {
        let discovery = self.discovery(kind, false).await?;
        if let Some(key) = self.lookup_cached_key(&discovery.jwks_uri, kid) {
            return Ok((key, discovery));
        }

        for force_refresh in [false, true] {
            let discovery = self.refresh_jwks(kind, force_refresh).await?;
            if let Some(key) = self.lookup_cached_key(&discovery.jwks_uri, kid) {
                return Ok((key, discovery));
            }
        }

        Err(AppError::provider_unauthorized(
            kind,
            format!("JWT kid not found in JWKS after refresh: {kid}"),
        ))
    }

    fn lookup_cached_key(&self, jwks_uri: &str, kid: &str) -> Option<Arc<DecodingKey>> {
        self.jwks_cache
            .get(&jwks_uri.to_string())
            .and_then(|keys| keys.get(kid).cloned())
    }

    async fn discovery(&self, kind: ProviderKind, force_refresh: bool) -> Result<Discovery, AppError> {
        if !force_refresh {
            if let Some(discovery) = self.discovery_cache.get(&kind) {
                return Ok(discovery);
            }
        }

        let url = &self.issuer(kind).discovery_url;
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::external(kind, format!("OIDC discovery request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::external(
                kind,
                format!("OIDC discovery returned status {}", response.status()),
            ));
        }

        let ttl = cache_ttl_from_headers(response.headers(), self.discovery_cache.default_ttl());
        let discovery: Discovery = response
            .json()
            .await
            .map_err(|e| AppError::external(kind, format!("invalid discovery JSON: {e}")))?;

        self.discovery_cache
            .insert_with_ttl(kind, discovery.clone(), ttl);
        Ok(discovery)
    }

    async fn refresh_jwks(
        &self,
        kind: ProviderKind,
        force_refresh: bool,
    ) -> Result<Discovery, AppError> {
        let _guard = self.refresh_lock.lock().await;

        let discovery = self.discovery(kind, force_refresh).await?;
        if !force_refresh && self.jwks_cache.get(&discovery.jwks_uri).is_some() {
            return Ok(discovery);
        }
        self.jwks_cache.invalidate(&discovery.jwks_uri);

        tracing::debug!(provider = %kind, jwks_uri = %discovery.jwks_uri, "Refreshing JWKS cache");

        let response = self
            .http_client
            .get(&discovery.jwks_uri)
            .send()
            .await
            .map_err(|e| AppError::external(kind, format!("JWKS request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::external(
                kind,
                format!("JWKS request returned status {}", response.status()),
            ));
        }

        let ttl = cache_ttl_from_headers(response.headers(), self.jwks_cache.default_ttl());
        let jwks: Jwks = response
            .json()
            .await
            .map_err(|e| AppError::external(kind, format!("invalid JWKS JSON: {e}")))?;

        let keys_by_kid = usable_keys(jwks);
        if keys_by_kid.is_empty() {
            return Err(AppError::external(
                kind,
                "JWKS response did not include any usable RSA keys",
            ));
        }

        self.jwks_cache
            .insert_with_ttl(discovery.jwks_uri.clone(), Arc::new(keys_by_kid), ttl);

        tracing::debug!(provider = %kind, ttl_secs = ttl.as_secs(), "JWKS cache refreshed");
        Ok(discovery)
    }
}

#[derive(Debug, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    alg: Option<String>,
    n: Option<String>,
    e: Option<String>,
    #[serde(rename = "use")]
    use_: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    iss: String,
    sub: String,
    email: Option<String>,
    /// Microsoft puts the sign-in address here
    preferred_username: Option<String>,
}

fn usable_keys(jwks: Jwks) -> HashMap<String, Arc<DecodingKey>> {
    let mut keys_by_kid = HashMap::new();

    for jwk in jwks.keys {
        if jwk.kty != "RSA" || jwk.kid.trim().is_empty() {
            continue;
        }
        if jwk.alg.as_deref().is_some_and(|alg| alg != "RS256") {
            continue;
        }
        if jwk.use_.as_deref().is_some_and(|use_| use_ != "sig") {
            continue;
        }
        let (Some(n), Some(e)) = (jwk.n.as_deref(), jwk.e.as_deref()) else {
            continue;
        };

        match DecodingKey::from_rsa_components(n, e) {
            Ok(key) => {
                keys_by_kid.insert(jwk.kid, Arc::new(key));
            }
            Err(e) => {
                tracing::warn!(error = %e, kid = %jwk.kid, "Skipping invalid RSA JWKS key");
            }
        }
    }

    keys_by_kid
}

/// Exact match, scheme-less Google form, or a `{tenantid}` template.
fn issuer_matches(expected: &str, actual: &str) -> bool {
    if expected == actual {
        return true;
    }
    if expected.strip_prefix("https://") == Some(actual) {
        return true;
    }
    match expected.split_once(TENANT_PLACEHOLDER) {
        Some((prefix, suffix)) => actual
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_suffix(suffix))
            .is_some_and(|tenant| !tenant.is_empty() && !tenant.contains('/')),
        None => false,
    }
}

fn cache_ttl_from_headers(headers: &reqwest::header::HeaderMap, fallback: Duration) -> Duration {
    headers
        .get(CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_cache_control_max_age)
        .map(Duration::from_secs)
        .unwrap_or(fallback)
}

fn parse_cache_control_max_age(value: &str) -> Option<u64> {
    value
        .split(',')
        .filter_map(|directive| directive.trim().strip_prefix("max-age="))
        .find_map(|raw| raw.trim_matches('"').parse::<u64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_cache_control_max_age_valid() {
        assert_eq!(
            parse_cache_control_max_age("public, max-age=3600"),
            Some(3600)
        );
        assert_eq!(parse_cache_control_max_age("max-age=60"), Some(60));
        assert_eq!(parse_cache_control_max_age("max-age=\"120\""), Some(120));
    }

    #[test]
    fn parse_cache_control_max_age_invalid() {
        assert_eq!(parse_cache_control_max_age("public, immutable"), None);
        assert_eq!(parse_cache_control_max_age("max-age=abc"), None);
        assert_eq!(parse_cache_control_max_age(""), None);
    }

    #[test]
    fn issuer_templates() {
        assert!(issuer_matches(
            "https://accounts.google.com",
            "accounts.google.com"
        ));
        assert!(issuer_matches(
            "https://login.microsoftonline.com/{tenantid}/v2.0",
            "https://login.microsoftonline.com/9188040d-6c67-4c5b-b112-36a304b66dad/v2.0"
        ));
        assert!(!issuer_matches(
            "https://login.microsoftonline.com/{tenantid}/v2.0",
            "https://evil.example/abc/v2.0"
        ));
        assert!(!issuer_matches(
            "https://login.microsoftonline.com/{tenantid}/v2.0",
            "https://login.microsoftonline.com//v2.0"
        ));
    }

    #[test]
    fn non_rsa_and_encryption_keys_are_skipped() {
        let jwks: Jwks = serde_json::from_str(
            r#"{"keys":[
                {"kid":"ec","kty":"EC"},
                {"kid":"enc","kty":"RSA","use":"enc","n":"AQAB","e":"AQAB"},
                {"kid":"","kty":"RSA","n":"AQAB","e":"AQAB"}
            ]}"#,
        )
        .unwrap();
        assert!(usable_keys(jwks).is_empty());
    }
}
