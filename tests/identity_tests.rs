// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! id_token verification against a mock OIDC issuer.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use calbook::config::Config;
use calbook::db::SqliteDb;
use calbook::error::AppError;
use calbook::models::ProviderKind;
use calbook::routes::create_router;
use calbook::services::provider::Providers;
use calbook::services::{IdentityVerifier, OAuthToken, OidcIssuer};
use calbook::time_utils::SystemClock;
use calbook::AppState;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;
use common::{body_json, create_test_jwt, seed_alice, FakeProvider};

const SIGNING_KEY_PEM: &str = include_str!("fixtures/oidc_signing_key.pem");
const SIGNING_KEY_N: &str = include_str!("fixtures/oidc_signing_key.n");

fn jwk(kid: &str) -> serde_json::Value {
    serde_json::json!({
        "kid": kid,
        "kty": "RSA",
        "alg": "RS256",
        "use": "sig",
        "n": SIGNING_KEY_N.trim(),
        "e": "AQAB"
    })
}

fn sign(kid: &str, claims: serde_json::Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());
    let key = EncodingKey::from_rsa_pem(SIGNING_KEY_PEM.as_bytes()).unwrap();
    encode(&header, &claims, &key).unwrap()
}

fn claims(issuer: &str, audience: &str) -> serde_json::Value {
    let now = chrono::Utc::now().timestamp();
    serde_json::json!({
        "iss": issuer,
        "sub": "1234567890",
        "aud": audience,
        "iat": now,
        "exp": now + 600,
        "email": "alice@example.com"
    })
}

/// Mock issuer serving discovery at `/.well-known/openid-configuration` and
/// keys at `/jwks`.
async fn mock_issuer(issuer: &str, kids: &[&str]) -> MockServer {
    let server = MockServer::start().await;
    mount_discovery(&server, issuer).await;
    let keys: Vec<serde_json::Value> = kids.iter().map(|kid| jwk(kid)).collect();
    Mock::given(method("GET"))
        .and(path("/jwks"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Cache-Control", "public, max-age=3600")
                .set_body_json(serde_json::json!({ "keys": keys })),
        )
        .mount(&server)
        .await;
    server
}

async fn mount_discovery(server: &MockServer, issuer: &str) {
    let issuer = issuer.replace("{base}", &server.uri());
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "issuer": issuer,
            "jwks_uri": format!("{}/jwks", server.uri())
        })))
        .mount(server)
        .await;
}

fn verifier(server: &MockServer) -> IdentityVerifier {
    let discovery_url = format!("{}/.well-known/openid-configuration", server.uri());
    IdentityVerifier::new(
        OidcIssuer {
            discovery_url: discovery_url.clone(),
            client_id: "google-client".to_string(),
        },
        OidcIssuer {
            discovery_url,
            client_id: "microsoft-client".to_string(),
        },
        Duration::from_secs(300),
        Arc::new(SystemClock),
    )
    .unwrap()
}

async fn requests_to(server: &MockServer, wanted: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == wanted)
        .count()
}

#[tokio::test]
async fn test_valid_token_is_verified_and_cached() {
    let server = mock_issuer("{base}", &["k1"]).await;
    let verifier = verifier(&server);
    let token = sign("k1", claims(&server.uri(), "google-client"));

    for _ in 0..3 {
        let identity = verifier.verify(ProviderKind::Google, &token).await.unwrap();
        assert_eq!(identity.subject, "1234567890");
        assert_eq!(identity.email.as_deref(), Some("alice@example.com"));
        assert_eq!(identity.provider, ProviderKind::Google);
    }

    assert_eq!(
        requests_to(&server, "/.well-known/openid-configuration").await,
        1
    );
    assert_eq!(requests_to(&server, "/jwks").await, 1);
}

#[tokio::test]
async fn test_wrong_audience_is_rejected() {
    let server = mock_issuer("{base}", &["k1"]).await;
    let verifier = verifier(&server);
    let token = sign("k1", claims(&server.uri(), "someone-else"));

    let err = verifier
        .verify(ProviderKind::Google, &token)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::ProviderUnauthorized {
            provider: ProviderKind::Google,
            ..
        }
    ));
}

#[tokio::test]
async fn test_wrong_issuer_is_rejected() {
    let server = mock_issuer("{base}", &["k1"]).await;
    let verifier = verifier(&server);
    let token = sign("k1", claims("https://evil.example", "google-client"));

    assert!(matches!(
        verifier.verify(ProviderKind::Google, &token).await,
        Err(AppError::ProviderUnauthorized { .. })
    ));
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let server = mock_issuer("{base}", &["k1"]).await;
    let verifier = verifier(&server);
    let mut expired = claims(&server.uri(), "google-client");
    let past = chrono::Utc::now().timestamp() - 3600;
    expired["iat"] = (past - 600).into();
    expired["exp"] = past.into();
    let token = sign("k1", expired);

    assert!(matches!(
        verifier.verify(ProviderKind::Google, &token).await,
        Err(AppError::ProviderUnauthorized { .. })
    ));
}

#[tokio::test]
async fn test_symmetric_alg_is_rejected() {
    let server = mock_issuer("{base}", &["k1"]).await;
    let verifier = verifier(&server);
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some("k1".to_string());
    let token = encode(
        &header,
        &claims(&server.uri(), "google-client"),
        &EncodingKey::from_secret(b"shared"),
    )
    .unwrap();

    assert!(matches!(
        verifier.verify(ProviderKind::Google, &token).await,
        Err(AppError::ProviderUnauthorized { .. })
    ));
    // Rejected before any metadata fetch.
    assert_eq!(server.received_requests().await.unwrap().len(), 0);
}

#[tokio::test]
async fn test_unknown_kid_forces_one_refresh() {
    let server = MockServer::start().await;
    mount_discovery(&server, "{base}").await;
    // First key set lacks the rotated key; later fetches include it.
    Mock::given(method("GET"))
        .and(path("/jwks"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "keys": [jwk("k1")] })),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/jwks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            serde_json::json!({ "keys": [jwk("k1"), jwk("k2")] }),
        ))
        .mount(&server)
        .await;

    let verifier = verifier(&server);
    let first = sign("k1", claims(&server.uri(), "google-client"));
    verifier.verify(ProviderKind::Google, &first).await.unwrap();
    assert_eq!(requests_to(&server, "/jwks").await, 1);

    let rotated = sign("k2", claims(&server.uri(), "google-client"));
    verifier
        .verify(ProviderKind::Google, &rotated)
        .await
        .unwrap();
    assert_eq!(requests_to(&server, "/jwks").await, 2);

    // Now cached.
    verifier
        .verify(ProviderKind::Google, &rotated)
        .await
        .unwrap();
    assert_eq!(requests_to(&server, "/jwks").await, 2);
}

#[tokio::test]
async fn test_missing_kid_after_refresh() {
    let server = mock_issuer("{base}", &["k1"]).await;
    let verifier = verifier(&server);
    let token = sign("nope", claims(&server.uri(), "google-client"));

    let err = verifier
        .verify(ProviderKind::Google, &token)
        .await
        .unwrap_err();
    match err {
        AppError::ProviderUnauthorized { reason, .. } => assert!(reason.contains("nope")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_metadata_outage_is_external() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let verifier = verifier(&server);
    let token = sign("k1", claims(&server.uri(), "google-client"));
    assert!(matches!(
        verifier.verify(ProviderKind::Google, &token).await,
        Err(AppError::ExternalService { .. })
    ));
}

#[tokio::test]
async fn test_microsoft_tenant_issuer_template() {
    let server = mock_issuer("{base}/{tenantid}/v2.0", &["k1"]).await;
    let verifier = verifier(&server);
    let mut microsoft = claims(
        &format!("{}/72f988bf-86f1-41af-91ab-2d7cd011db47/v2.0", server.uri()),
        "microsoft-client",
    );
    microsoft["email"] = serde_json::Value::Null;
    microsoft["preferred_username"] = "alice@contoso.example".into();
    let token = sign("k1", microsoft);

    let identity = verifier
        .verify(ProviderKind::Microsoft, &token)
        .await
        .unwrap();
    assert_eq!(identity.email.as_deref(), Some("alice@contoso.example"));
}

#[tokio::test]
async fn test_identity_endpoint() {
    let server = mock_issuer("{base}", &["k1"]).await;
    let config = Config::test_default();
    let db = SqliteDb::new_in_memory().await.unwrap();
    let seeded = seed_alice(&db).await;

    let providers = Providers::new(
        FakeProvider::new(ProviderKind::Google, &config.oauth_state_key),
        FakeProvider::new(ProviderKind::Microsoft, &config.oauth_state_key),
    );
    let state = Arc::new(AppState::with_identity(
        config,
        db,
        providers,
        Arc::new(SystemClock),
        Arc::new(verifier(&server)),
    ));

    let stored = OAuthToken {
        access_token: "g-access".to_string(),
        token_type: "Bearer".to_string(),
        refresh_token: None,
        expiry: None,
        id_token: Some(sign("k1", claims(&server.uri(), "google-client"))),
    };
    state
        .credentials
        .put(seeded.user_id, ProviderKind::Google, &stored)
        .await
        .unwrap();

    let session = create_test_jwt(&state, seeded.user_id, "alice");
    let response = create_router(state)
        .oneshot(
            Request::builder()
                .uri("/api/v1/profile/google/identity")
                .header(header::AUTHORIZATION, format!("Bearer {session}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["provider"], "google");
    assert_eq!(json["data"]["subject"], "1234567890");
    assert_eq!(json["data"]["email"], "alice@example.com");
}
