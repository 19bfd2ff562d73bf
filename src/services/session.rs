// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Signed session tokens (HS256 JWT).

use crate::error::AuthError;
use crate::time_utils::{Clock, SystemClock};
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Wire form of the token body.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    iss: String,
    iat: i64,
    exp: i64,
    payload: ClaimPayload,
}

#[derive(Debug, Serialize, Deserialize)]
struct ClaimPayload {
    id: i64,
    username: String,
}

/// Identity of the caller, placed in request extensions by `require_auth`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClaim {
    pub user_id: i64,
    pub username: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues and validates session tokens.
#[derive(Clone)]
pub struct SessionService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    clock: Arc<dyn Clock>,
}

impl SessionService {
    pub fn new(signing_key: &[u8], issuer: impl Into<String>) -> Self {
        Self::with_clock(signing_key, issuer, Arc::new(SystemClock))
    }

    pub fn with_clock(signing_key: &[u8], issuer: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(signing_key),
            decoding_key: DecodingKey::from_secret(signing_key),
            issuer: issuer.into(),
            clock,
        }
    }

    pub fn issue(
        &self,
        user_id: i64,
        username: &str,
        ttl: Duration,
    ) -> anyhow::Result<IssuedSession> {
        let now = self.clock.now();
        let expires_at = now + chrono::Duration::from_std(ttl)?;

        let claims = Claims {
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            payload: ClaimPayload {
                id: user_id,
                username: username.to_string(),
            },
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        Ok(IssuedSession { token, expires_at })
    }

    /// `None` means no token was presented.
    pub fn validate(&self, token: Option<&str>) -> Result<SessionClaim, AuthError> {
        let token = token.filter(|t| !t.is_empty()).ok_or(AuthError::Missing)?;

        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against the injected clock below.
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "iss"]);
        validation.set_issuer(&[self.issuer.as_str()]);

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            tracing::debug!(error = %e, "Rejected session token");
            AuthError::Invalid
        })?;
        let claims = data.claims;

        let issued_at = DateTime::from_timestamp(claims.iat, 0).ok_or(AuthError::Invalid)?;
        let expires_at = DateTime::from_timestamp(claims.exp, 0).ok_or(AuthError::Invalid)?;

        if self.clock.now() > expires_at {
            return Err(AuthError::Expired);
        }

        Ok(SessionClaim {
            user_id: claims.payload.id,
            username: claims.payload.username,
            issued_at,
            expires_at,
        })
    }
}
