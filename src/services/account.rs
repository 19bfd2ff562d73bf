// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Login and profile lookup.

use crate::db::SqliteDb;
use crate::error::AppError;
use crate::models::{LoginForm, User, UserProfile};
use crate::services::session::{IssuedSession, SessionClaim, SessionService};
use serde::Serialize;
use std::time::Duration;
use validator::Validate;

#[derive(Debug, Serialize)]
pub struct LoginResult {
    #[serde(rename = "type")]
    pub token_type: &'static str,
    pub token: String,
    /// Seconds
    pub expires_in: u64,
}

#[derive(Clone)]
pub struct AccountService {
    db: SqliteDb,
    sessions: SessionService,
    session_ttl: Duration,
}

impl AccountService {
    pub fn new(db: SqliteDb, sessions: SessionService, session_ttl: Duration) -> Self {
        Self {
            db,
            sessions,
            session_ttl,
        }
    }

    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    /// Check credentials and issue a session.
    pub async fn login(&self, form: &LoginForm) -> Result<LoginResult, AppError> {
        form.validate()?;

        let user = self
            .db
            .find_user_by_username(&form.username)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        if !verify_password(&form.password, &user.password_hash).await? {
            tracing::info!(username = %form.username, "Rejected login");
            return Err(AppError::InvalidCredentials);
        }

        let IssuedSession { token, .. } = self
            .sessions
            .issue(user.id, &user.username, self.session_ttl)?;

        tracing::info!(user_id = user.id, "Session issued");
        Ok(LoginResult {
            token_type: "Bearer",
            token,
            expires_in: self.session_ttl.as_secs(),
        })
    }

    /// The authenticated user's profile.
    pub async fn profile(&self, claim: &SessionClaim) -> Result<User, AppError> {
        self.db
            .find_user_by_id(claim.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {}", claim.user_id)))
    }

    pub async fn public_profile(&self, claim: &SessionClaim) -> Result<UserProfile, AppError> {
        Ok(UserProfile::from(&self.profile(claim).await?))
    }
}

/// bcrypt runs on the blocking pool.
async fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let password = password.to_string();
    let hash = hash.to_string();
    let verified = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AppError::Internal(e.into()))?;

    // A malformed stored hash can never match.
    Ok(verified.unwrap_or(false))
}

pub async fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AppError::Internal(e.into()))?
        .map_err(|e| AppError::Internal(e.into()))
}
