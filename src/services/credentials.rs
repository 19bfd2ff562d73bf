// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-user, per-provider OAuth token storage.

use crate::db::SqliteDb;
use crate::error::AppError;
use crate::models::{ProviderCredentials, ProviderKind};
use crate::services::provider::OAuthToken;

/// Reads and writes token blobs. Blobs are opaque here; decoding happens at
/// the point of use.
#[derive(Clone)]
pub struct CredentialStore {
    db: SqliteDb,
}

impl CredentialStore {
    pub fn new(db: SqliteDb) -> Self {
        Self { db }
    }

    pub async fn get(&self, user_id: i64) -> Result<ProviderCredentials, AppError> {
        self.db
            .find_credentials(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {user_id}")))
    }

    /// Store a token, replacing whatever was there.
    pub async fn put(
        &self,
        user_id: i64,
        kind: ProviderKind,
        token: &OAuthToken,
    ) -> Result<(), AppError> {
        self.put_blob(user_id, kind, &token.to_blob()).await
    }

    pub async fn put_blob(
        &self,
        user_id: i64,
        kind: ProviderKind,
        blob: &str,
    ) -> Result<(), AppError> {
        self.db.update_token(user_id, kind, blob).await?;
        tracing::info!(user_id, provider = %kind, "Stored provider token");
        Ok(())
    }
}
