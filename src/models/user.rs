// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User model for storage and API.

use super::{EventType, ProviderCredentials, ProviderKind};
use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// A host account as stored in the `users` table.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    /// bcrypt hash; never leaves the server
    pub password_hash: String,
    pub credentials: ProviderCredentials,
}

/// Public view of a user.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserProfile {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub id: i64,
    pub username: String,
    pub google_connected: bool,
    pub microsoft_connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_types: Option<Vec<EventType>>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            google_connected: user.credentials.is_connected(ProviderKind::Google),
            microsoft_connected: user.credentials.is_connected(ProviderKind::Microsoft),
            event_types: None,
        }
    }
}
