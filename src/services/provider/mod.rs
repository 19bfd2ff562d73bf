// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Calendar provider clients.
//!
//! Both providers expose the same capability set through
//! [`CalendarProvider`]; callers pick one with [`ProviderKind`] via
//! [`Providers`].

pub mod google;
pub mod microsoft;

pub use google::{GoogleCalendarClient, GoogleEndpoints};
pub use microsoft::{MicrosoftCalendarClient, MicrosoftEndpoints};

use crate::config::Config;
use crate::error::AppError;
use crate::models::ProviderKind;
use crate::time_utils::{compose_meeting_window, MeetingWindow};
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use hmac::{Hmac, Mac};
use rand::{distr::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Length of the per-creation conferencing request id.
pub const REQUEST_ID_LEN: usize = 12;

const HTTP_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// What every calendar provider can do.
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Deterministic authorization URL for connecting this provider.
    fn build_auth_url(&self) -> String;

    async fn exchange_code(&self, code: &str) -> Result<OAuthToken, AppError>;

    async fn fetch_profile(&self, token: &OAuthToken) -> Result<ProviderProfile, AppError>;

    /// Up to ten future events, ascending by start.
    async fn fetch_upcoming_events(&self, token: &OAuthToken)
        -> Result<Vec<CalendarEvent>, AppError>;

    async fn create_event(
        &self,
        token: &OAuthToken,
        request: &MeetingRequest,
    ) -> Result<RemoteEvent, AppError>;
}

/// Both provider clients, selectable by kind.
#[derive(Clone)]
pub struct Providers {
    google: Arc<dyn CalendarProvider>,
    microsoft: Arc<dyn CalendarProvider>,
}

impl Providers {
    pub fn new(google: Arc<dyn CalendarProvider>, microsoft: Arc<dyn CalendarProvider>) -> Self {
        Self { google, microsoft }
    }

    /// Real HTTP clients pointed at the public provider endpoints.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self::new(
            Arc::new(GoogleCalendarClient::new(
                http.clone(),
                config.google.clone(),
                GoogleEndpoints::default(),
                config.oauth_state_key.clone(),
            )),
            Arc::new(MicrosoftCalendarClient::new(
                http,
                config.microsoft.clone(),
                MicrosoftEndpoints::for_tenant(&config.microsoft_tenant),
                config.oauth_state_key.clone(),
            )),
        ))
    }

    pub fn get(&self, kind: ProviderKind) -> &Arc<dyn CalendarProvider> {
        match kind {
            ProviderKind::Google => &self.google,
            ProviderKind::Microsoft => &self.microsoft,
        }
    }
}

// ─── Tokens ────────────────────────────────────────────────────

/// OAuth token as persisted in a user's credential blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthToken {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
    /// OpenID Connect id_token, when the provider issued one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

impl OAuthToken {
    /// Decode a stored blob. Fails if it is not a token or has no access token.
    pub fn from_blob(blob: &str) -> Result<Self, String> {
        let token: OAuthToken =
            serde_json::from_str(blob).map_err(|e| format!("malformed token: {e}"))?;
        if token.access_token.is_empty() {
            return Err("token has no access_token".to_string());
        }
        Ok(token)
    }

    pub fn to_blob(&self) -> String {
        // A struct of strings and timestamps always serializes.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Token endpoint response shared by both providers.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    id_token: Option<String>,
}

impl TokenResponse {
    pub(crate) fn into_token(self, now: DateTime<Utc>) -> OAuthToken {
        OAuthToken {
            access_token: self.access_token,
            token_type: self.token_type,
            refresh_token: self.refresh_token,
            expiry: self.expires_in.map(|secs| now + Duration::seconds(secs)),
            id_token: self.id_token,
        }
    }
}

// ─── Payloads ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderProfile {
    pub name: String,
    pub email: String,
}

/// An entry from a host's calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarEvent {
    pub id: String,
    pub summary: String,
    pub start: String,
    pub end: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

/// Everything a provider needs to create a meeting.
#[derive(Debug, Clone)]
pub struct MeetingRequest {
    pub summary: String,
    pub description: String,
    pub timezone: Tz,
    pub organizer_email: String,
    pub invitee_name: String,
    pub invitee_email: String,
    pub epoch_date: i64,
    pub hhmm: u32,
    pub duration_minutes: u32,
}

impl MeetingRequest {
    pub fn window(&self) -> Result<MeetingWindow, AppError> {
        compose_meeting_window(self.epoch_date, self.hhmm, self.timezone, self.duration_minutes)
            .ok_or_else(|| AppError::Validation(format!("date {} is out of range", self.epoch_date)))
    }
}

/// The event a provider created, with its raw response kept for storage.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteEvent {
    pub id: String,
    pub meeting_url: Option<String>,
    pub payload: serde_json::Value,
}

/// Random alphanumeric id for conferencing create requests.
pub fn new_request_id() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(REQUEST_ID_LEN)
        .map(char::from)
        .collect()
}

// ─── OAuth state ───────────────────────────────────────────────

/// `state` for the authorization URL: base64url("provider|hex(hmac)").
pub fn sign_state(kind: ProviderKind, key: &[u8]) -> String {
    let payload = kind.as_str();
    let signed = format!("{}|{}", payload, hex::encode(state_mac(payload, key)));
    URL_SAFE_NO_PAD.encode(signed.as_bytes())
}

/// Check a `state` value returned to the exchange endpoint.
pub fn verify_state(state: &str, kind: ProviderKind, key: &[u8]) -> bool {
    let Some(decoded) = URL_SAFE_NO_PAD
        .decode(state)
        .ok()
        .and_then(|b| String::from_utf8(b).ok())
    else {
        return false;
    };

    let Some((payload, signature_hex)) = decoded.split_once('|') else {
        return false;
    };
    if payload != kind.as_str() {
        return false;
    }

    let expected = hex::encode(state_mac(payload, key));
    expected.as_bytes().ct_eq(signature_hex.as_bytes()).into()
}

fn state_mac(payload: &str, key: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length.
    let mut mac = match HmacSha256::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => return Vec::new(),
    };
    mac.update(payload.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

// ─── HTTP helpers ──────────────────────────────────────────────

/// Check response status and parse the JSON body.
pub(crate) async fn check_response_json<T: for<'de> Deserialize<'de>>(
    kind: ProviderKind,
    response: reqwest::Response,
) -> Result<T, AppError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();

        if status.as_u16() == 429 {
            tracing::warn!(provider = %kind, "Provider rate limit hit (429)");
            return Err(AppError::external(kind, "rate limited"));
        }

        // Expired or revoked token
        if status.as_u16() == 401 {
            return Err(AppError::external(kind, "access token rejected"));
        }

        return Err(AppError::external(kind, format!("HTTP {}: {}", status, body)));
    }

    response
        .json()
        .await
        .map_err(|e| AppError::external(kind, format!("JSON parse error: {}", e)))
}

pub(crate) fn transport_error(kind: ProviderKind, err: reqwest::Error) -> AppError {
    AppError::external(kind, format!("request failed: {err}"))
}

/// Sort ascending by start and keep the first ten.
pub(crate) fn upcoming(mut events: Vec<(DateTime<Utc>, CalendarEvent)>) -> Vec<CalendarEvent> {
    events.sort_by_key(|(start, _)| *start);
    events.into_iter().take(10).map(|(_, e)| e).collect()
}
