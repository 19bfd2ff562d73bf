// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Login and logout.

use super::ApiResponse;
use crate::error::Result;
use crate::middleware::auth::{clear_session_cookie, session_cookie};
use crate::models::LoginForm;
use crate::services::LoginResult;
use crate::AppState;
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
}

/// Check credentials; the token is returned and also set as a cookie.
async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(form): Json<LoginForm>,
) -> Result<(CookieJar, Json<ApiResponse<LoginResult>>)> {
    let result = state.accounts.login(&form).await?;

    let cookie = session_cookie(
        result.token.clone(),
        state.accounts.session_ttl(),
        state.config.secure_cookies,
    );

    Ok((jar.add(cookie), ApiResponse::json(result)))
}

async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> (CookieJar, StatusCode) {
    (
        jar.add(clear_session_cookie(state.config.secure_cookies)),
        StatusCode::NO_CONTENT,
    )
}
