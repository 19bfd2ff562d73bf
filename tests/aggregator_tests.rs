// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Connected-calendar overview tests.

use calbook::models::ProviderKind;
use calbook::services::SessionClaim;
use chrono::Utc;
use std::sync::atomic::Ordering;

mod common;
use common::{create_test_app, seed_alice, token};

fn claim(user_id: i64) -> SessionClaim {
    SessionClaim {
        user_id,
        username: "alice".to_string(),
        issued_at: Utc::now(),
        expires_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_missing_token_yields_auth_url_without_fetching() {
    let app = create_test_app().await;
    let seeded = seed_alice(&app.db).await;

    let overview = app
        .state
        .aggregator
        .overview(&claim(seeded.user_id))
        .await
        .unwrap();

    assert!(overview
        .google_auth_url
        .as_deref()
        .unwrap()
        .starts_with("https://auth.example/google"));
    assert_eq!(overview.google_name, None);
    assert_eq!(overview.google_scheduled, None);
    assert_eq!(app.google.fetch_calls(), 0);

    assert_eq!(overview.microsoft_name.as_deref(), Some("Alice (microsoft)"));
    assert_eq!(
        overview.microsoft_email.as_deref(),
        Some("alice@microsoft.example")
    );
    assert_eq!(overview.microsoft_auth_url, None);
    assert_eq!(app.microsoft.profile_calls.load(Ordering::SeqCst), 1);
    // Microsoft contributes only a profile.
    assert_eq!(app.microsoft.events_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_both_connected() {
    let app = create_test_app().await;
    let seeded = seed_alice(&app.db).await;
    app.state
        .credentials
        .put(seeded.user_id, ProviderKind::Google, &token("g-access"))
        .await
        .unwrap();

    let overview = app
        .state
        .aggregator
        .overview(&claim(seeded.user_id))
        .await
        .unwrap();

    assert_eq!(overview.google_email.as_deref(), Some("alice@google.example"));
    assert_eq!(overview.google_scheduled.as_ref().map(Vec::len), Some(1));
    assert_eq!(overview.google_auth_url, None);
    assert_eq!(overview.microsoft_auth_url, None);
    assert_eq!(app.google.profile_calls.load(Ordering::SeqCst), 1);
    assert_eq!(app.google.events_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_provider_failure_is_reported_inline() {
    let app = create_test_app().await;
    let seeded = seed_alice(&app.db).await;
    app.state
        .credentials
        .put(seeded.user_id, ProviderKind::Google, &token("g-access"))
        .await
        .unwrap();
    app.google.set_failing(true);

    let overview = app
        .state
        .aggregator
        .overview(&claim(seeded.user_id))
        .await
        .expect("partial failure still succeeds");

    assert!(overview.google_error.as_deref().unwrap().contains("google"));
    assert_eq!(overview.google_name, None);
    assert_eq!(overview.google_scheduled, None);
    assert_eq!(overview.microsoft_name.as_deref(), Some("Alice (microsoft)"));
    assert_eq!(overview.microsoft_error, None);
}

#[tokio::test]
async fn test_unreadable_token_offers_reconnect() {
    let app = create_test_app().await;
    let seeded = seed_alice(&app.db).await;
    app.db
        .update_token(seeded.user_id, ProviderKind::Microsoft, "garbage")
        .await
        .unwrap();

    let overview = app
        .state
        .aggregator
        .overview(&claim(seeded.user_id))
        .await
        .unwrap();

    assert!(overview.microsoft_error.is_some());
    assert!(overview.microsoft_auth_url.is_some());
    assert_eq!(app.microsoft.fetch_calls(), 0);
}

#[tokio::test]
async fn test_serialized_field_names() {
    let app = create_test_app().await;
    let seeded = seed_alice(&app.db).await;

    let overview = app
        .state
        .aggregator
        .overview(&claim(seeded.user_id))
        .await
        .unwrap();
    let json = serde_json::to_value(&overview).unwrap();

    assert!(json.get("google_auth_url").is_some());
    assert!(json.get("microsoft_name").is_some());
    assert!(json.get("microsoft_email").is_some());
    assert!(json.get("google_scheduled").is_none());
}
