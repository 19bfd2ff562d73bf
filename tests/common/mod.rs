// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Response;
use calbook::config::Config;
use calbook::db::SqliteDb;
use calbook::error::AppError;
use calbook::models::{AvailabilityDay, ProviderKind};
use calbook::routes::create_router;
use calbook::services::account::hash_password;
use calbook::services::provider::{
    sign_state, CalendarEvent, CalendarProvider, MeetingRequest, OAuthToken, ProviderProfile,
    Providers, RemoteEvent,
};
use calbook::AppState;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Monday 2024-01-15 12:00 UTC.
pub const MONDAY: i64 = 1_705_320_000;

/// Scripted calendar provider that counts calls.
pub struct FakeProvider {
    kind: ProviderKind,
    state_key: Vec<u8>,
    failing: AtomicBool,
    pub profile_calls: AtomicUsize,
    pub events_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub exchange_calls: AtomicUsize,
    pub last_request: Mutex<Option<MeetingRequest>>,
}

impl FakeProvider {
    pub fn new(kind: ProviderKind, state_key: &[u8]) -> Arc<Self> {
        Arc::new(Self {
            kind,
            state_key: state_key.to_vec(),
            failing: AtomicBool::new(false),
            profile_calls: AtomicUsize::new(0),
            events_calls: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
            exchange_calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        })
    }

    /// Make every remote call fail from now on.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn fetch_calls(&self) -> usize {
        self.profile_calls.load(Ordering::SeqCst) + self.events_calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), AppError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::external(self.kind, "HTTP 500: upstream unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl CalendarProvider for FakeProvider {
    fn build_auth_url(&self) -> String {
        format!(
            "https://auth.example/{}?state={}",
            self.kind,
            sign_state(self.kind, &self.state_key)
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<OAuthToken, AppError> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(token(&format!("{}-{code}", self.kind)))
    }

    async fn fetch_profile(&self, _token: &OAuthToken) -> Result<ProviderProfile, AppError> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(ProviderProfile {
            name: format!("Alice ({})", self.kind),
            email: format!("alice@{}.example", self.kind),
        })
    }

    async fn fetch_upcoming_events(
        &self,
        _token: &OAuthToken,
    ) -> Result<Vec<CalendarEvent>, AppError> {
        self.events_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(vec![CalendarEvent {
            id: "evt-upcoming".to_string(),
            summary: "Standup".to_string(),
            start: "2024-01-16T09:00:00-05:00".to_string(),
            end: "2024-01-16T09:15:00-05:00".to_string(),
            link: None,
        }])
    }

    async fn create_event(
        &self,
        _token: &OAuthToken,
        request: &MeetingRequest,
    ) -> Result<RemoteEvent, AppError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        self.check()?;

        let window = request.window()?;
        let payload = serde_json::json!({
            "id": "remote-1",
            "summary": request.summary,
            "start": window.start_rfc3339(),
            "end": window.end_rfc3339(),
        });
        Ok(RemoteEvent {
            id: "remote-1".to_string(),
            meeting_url: Some(format!("https://meet.{}.example/remote-1", self.kind)),
            payload,
        })
    }
}

pub fn token(access_token: &str) -> OAuthToken {
    OAuthToken {
        access_token: access_token.to_string(),
        token_type: "Bearer".to_string(),
        refresh_token: Some("refresh".to_string()),
        expiry: None,
        id_token: None,
    }
}

pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub db: SqliteDb,
    pub google: Arc<FakeProvider>,
    pub microsoft: Arc<FakeProvider>,
}

/// Create a test app over an in-memory database and fake providers.
pub async fn create_test_app() -> TestApp {
    create_test_app_with_config(Config::test_default()).await
}

pub async fn create_test_app_with_config(config: Config) -> TestApp {
    let db = SqliteDb::new_in_memory()
        .await
        .expect("in-memory database should open");

    let google = FakeProvider::new(ProviderKind::Google, &config.oauth_state_key);
    let microsoft = FakeProvider::new(ProviderKind::Microsoft, &config.oauth_state_key);
    let providers = Providers::new(google.clone(), microsoft.clone());

    let state = Arc::new(AppState::new(config, db.clone(), providers).expect("state should build"));

    TestApp {
        router: create_router(state.clone()),
        state,
        db,
        google,
        microsoft,
    }
}

pub struct Seeded {
    pub user_id: i64,
    pub availability_id: i64,
    pub event_type_id: i64,
}

pub const ALICE_PASSWORD: &str = "correct horse";

/// Host "alice": Microsoft connected, Google not; "30min-intro" in
/// America/New_York; Monday 09:00-17:00 enabled, other days disabled.
pub async fn seed_alice(db: &SqliteDb) -> Seeded {
    let hash = hash_password(ALICE_PASSWORD, 4).await.unwrap();
    let user_id = db.create_user("alice", &hash).await.unwrap();

    let days: Vec<AvailabilityDay> = (0..7)
        .map(|day| AvailabilityDay {
            day,
            enabled: day == 1,
            start_time: if day == 1 { 900 } else { 0 },
            end_time: if day == 1 { 1700 } else { 0 },
        })
        .collect();
    let availability_id = db
        .create_availability(user_id, "Working hours", "America/New_York", &days)
        .await
        .unwrap();
    let event_type_id = db
        .create_event_type(
            user_id,
            availability_id,
            "30min-intro",
            "Intro call",
            30,
            true,
        )
        .await
        .unwrap();

    db.update_token(
        user_id,
        ProviderKind::Microsoft,
        &token("ms-access").to_blob(),
    )
    .await
    .unwrap();

    Seeded {
        user_id,
        availability_id,
        event_type_id,
    }
}

/// Signed session token for a user.
pub fn create_test_jwt(state: &AppState, user_id: i64, username: &str) -> String {
    state
        .sessions
        .issue(user_id, username, Duration::from_secs(30 * 60))
        .unwrap()
        .token
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
