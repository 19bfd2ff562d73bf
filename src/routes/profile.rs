// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authenticated host endpoints.

use super::ApiResponse;
use crate::error::{AppError, Result};
use crate::models::{Availability, EventType, ProviderKind, UserProfile};
use crate::services::provider::{verify_state, OAuthToken};
use crate::services::{CalendarOverview, SessionClaim, VerifiedIdentity};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    response::Redirect,
    routing::get,
    Extension, Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/profile", get(profile))
        .route("/profile/availabilities", get(availability))
        .route("/profile/event-types", get(event_types))
        .route("/profile/events", get(calendar_overview))
        .route("/profile/{provider}/exchange", get(exchange))
        .route("/profile/{provider}/identity", get(identity))
}

async fn profile(
    State(state): State<Arc<AppState>>,
    Extension(claim): Extension<SessionClaim>,
) -> Result<Json<ApiResponse<UserProfile>>> {
    let profile = state.accounts.public_profile(&claim).await?;
    Ok(ApiResponse::json(profile))
}

async fn availability(
    State(state): State<Arc<AppState>>,
    Extension(claim): Extension<SessionClaim>,
) -> Result<Json<ApiResponse<Availability>>> {
    let availability = state.scheduling.availability(claim.user_id).await?;
    Ok(ApiResponse::json(availability))
}

async fn event_types(
    State(state): State<Arc<AppState>>,
    Extension(claim): Extension<SessionClaim>,
) -> Result<Json<ApiResponse<Vec<EventType>>>> {
    let event_types = state.scheduling.event_types_for(claim.user_id).await?;
    Ok(ApiResponse::json(event_types))
}

async fn calendar_overview(
    State(state): State<Arc<AppState>>,
    Extension(claim): Extension<SessionClaim>,
) -> Result<Json<ApiResponse<CalendarOverview>>> {
    let overview = state.aggregator.overview(&claim).await?;
    Ok(ApiResponse::json(overview))
}

fn parse_provider(raw: &str) -> Result<ProviderKind> {
    raw.parse()
        .map_err(|_| AppError::NotFound(format!("provider {raw}")))
}

#[derive(Deserialize)]
pub struct ExchangeParams {
    code: Option<String>,
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth redirect target: store the provider token and return to the frontend.
async fn exchange(
    State(state): State<Arc<AppState>>,
    Extension(claim): Extension<SessionClaim>,
    Path(provider): Path<String>,
    Query(params): Query<ExchangeParams>,
) -> Result<Redirect> {
    let kind = parse_provider(&provider)?;

    if let Some(error) = params.error {
        tracing::warn!(provider = %kind, error = %error, "OAuth error from provider");
        let redirect = format!(
            "{}?error={}",
            state.config.frontend_url,
            urlencoding::encode(&error)
        );
        return Ok(Redirect::temporary(&redirect));
    }

    let oauth_state = params
        .state
        .ok_or_else(|| AppError::Validation("state is required".to_string()))?;
    if !verify_state(&oauth_state, kind, &state.config.oauth_state_key) {
        tracing::error!(provider = %kind, "OAuth state signature mismatch");
        return Err(AppError::Validation("invalid state".to_string()));
    }
    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::Validation("code is required".to_string()))?;

    tracing::info!(user_id = claim.user_id, provider = %kind, "Exchanging authorization code");

    let token = state.providers.get(kind).exchange_code(&code).await?;
    state.credentials.put(claim.user_id, kind, &token).await?;

    Ok(Redirect::temporary(&state.config.frontend_url))
}

/// Verify the OpenID identity behind a connected provider.
async fn identity(
    State(state): State<Arc<AppState>>,
    Extension(claim): Extension<SessionClaim>,
    Path(provider): Path<String>,
) -> Result<Json<ApiResponse<VerifiedIdentity>>> {
    let kind = parse_provider(&provider)?;

    let credentials = state.credentials.get(claim.user_id).await?;
    let blob = credentials
        .get(kind)
        .ok_or_else(|| AppError::provider_unauthorized(kind, "no stored token"))?;
    let token =
        OAuthToken::from_blob(blob).map_err(|reason| AppError::provider_unauthorized(kind, reason))?;

    let identity = state.identity.verify_stored(kind, &token).await?;
    Ok(ApiResponse::json(identity))
}
