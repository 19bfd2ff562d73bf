// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Connected-calendar overview across both providers.
//!
//! Runs in two phases. First both stored token blobs are decoded in
//! parallel. Then each provider is queried in parallel: a provider without a
//! token contributes only its authorization URL, Google contributes profile
//! and upcoming events, Microsoft contributes profile. Each branch returns its
//! own outcome value and the outcomes are merged once both are done.

use crate::db::SqliteDb;
use crate::error::AppError;
use crate::models::ProviderKind;
use crate::services::provider::{CalendarEvent, OAuthToken, ProviderProfile, Providers};
use crate::services::session::SessionClaim;
use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Merged result. A provider's fields are empty when it is not connected or
/// when its fetch failed; failures are reported in `*_error`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CalendarOverview {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "binding-generation", ts(type = "Array<unknown> | undefined"))]
    pub google_scheduled: Option<Vec<CalendarEvent>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_auth_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub microsoft_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub microsoft_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub microsoft_auth_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub microsoft_error: Option<String>,
}

/// Result of decoding one stored blob.
#[derive(Debug)]
enum TokenState {
    Absent,
    Present(OAuthToken),
    Unreadable(String),
}

/// What one provider branch produced.
#[derive(Debug)]
enum ProviderOutcome {
    NotConnected {
        auth_url: String,
    },
    Unreadable {
        auth_url: String,
        error: String,
    },
    Fetched {
        profile: Result<ProviderProfile, AppError>,
        events: Option<Result<Vec<CalendarEvent>, AppError>>,
    },
}

/// Provider-side fields of the overview, before they are named per provider.
#[derive(Default)]
struct ProviderFields {
    name: Option<String>,
    email: Option<String>,
    scheduled: Option<Vec<CalendarEvent>>,
    auth_url: Option<String>,
    error: Option<String>,
}

impl ProviderOutcome {
    fn into_fields(self, kind: ProviderKind) -> ProviderFields {
        match self {
            ProviderOutcome::NotConnected { auth_url } => ProviderFields {
                auth_url: Some(auth_url),
                ..Default::default()
            },
            ProviderOutcome::Unreadable { auth_url, error } => ProviderFields {
                auth_url: Some(auth_url),
                error: Some(error),
                ..Default::default()
            },
            ProviderOutcome::Fetched { profile, events } => {
                let mut fields = ProviderFields::default();
                let mut errors = Vec::new();

                match profile {
                    Ok(profile) => {
                        fields.name = Some(profile.name);
                        fields.email = Some(profile.email);
                    }
                    Err(e) => errors.push(e.to_string()),
                }
                match events {
                    Some(Ok(events)) => fields.scheduled = Some(events),
                    Some(Err(e)) => errors.push(e.to_string()),
                    None => {}
                }

                if !errors.is_empty() {
                    tracing::warn!(provider = %kind, errors = ?errors, "Calendar fetch failed");
                    fields.error = Some(errors.join("; "));
                }
                fields
            }
        }
    }
}

#[derive(Clone)]
pub struct CalendarAggregator {
    db: SqliteDb,
    providers: Providers,
}

impl CalendarAggregator {
    pub fn new(db: SqliteDb, providers: Providers) -> Self {
        Self { db, providers }
    }

    pub async fn overview(&self, claim: &SessionClaim) -> Result<CalendarOverview, AppError> {
        let user = self
            .db
            .find_user_by_id(claim.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {}", claim.user_id)))?;

        let (google_token, microsoft_token) = tokio::join!(
            decode_token(user.credentials.google.clone()),
            decode_token(user.credentials.microsoft.clone()),
        );

        let (google, microsoft) = tokio::join!(
            self.query(ProviderKind::Google, google_token),
            self.query(ProviderKind::Microsoft, microsoft_token),
        );

        let google = google.into_fields(ProviderKind::Google);
        let microsoft = microsoft.into_fields(ProviderKind::Microsoft);

        Ok(CalendarOverview {
            google_name: google.name,
            google_email: google.email,
            google_scheduled: google.scheduled,
            google_auth_url: google.auth_url,
            google_error: google.error,
            microsoft_name: microsoft.name,
            microsoft_email: microsoft.email,
            microsoft_auth_url: microsoft.auth_url,
            microsoft_error: microsoft.error,
        })
    }

    async fn query(&self, kind: ProviderKind, state: TokenState) -> ProviderOutcome {
        let provider = self.providers.get(kind);

        let token = match state {
            TokenState::Absent => {
                return ProviderOutcome::NotConnected {
                    auth_url: provider.build_auth_url(),
                }
            }
            TokenState::Unreadable(error) => {
                tracing::warn!(provider = %kind, error = %error, "Stored token unreadable");
                return ProviderOutcome::Unreadable {
                    auth_url: provider.build_auth_url(),
                    error,
                };
            }
            TokenState::Present(token) => token,
        };

        match kind {
            ProviderKind::Google => {
                let (profile, events) = tokio::join!(
                    provider.fetch_profile(&token),
                    provider.fetch_upcoming_events(&token),
                );
                ProviderOutcome::Fetched {
                    profile,
                    events: Some(events),
                }
            }
            ProviderKind::Microsoft => ProviderOutcome::Fetched {
                profile: provider.fetch_profile(&token).await,
                events: None,
            },
        }
    }
}

async fn decode_token(blob: Option<String>) -> TokenState {
    let Some(blob) = blob else {
        return TokenState::Absent;
    };

    match tokio::task::spawn_blocking(move || OAuthToken::from_blob(&blob)).await {
        Ok(Ok(token)) => TokenState::Present(token),
        Ok(Err(e)) => TokenState::Unreadable(e),
        Err(e) => TokenState::Unreadable(format!("token decode task failed: {e}")),
    }
}
