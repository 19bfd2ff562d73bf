// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session authentication middleware.

use crate::error::AppError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::sync::Arc;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "ACCESS_TOKEN";

/// Middleware that requires a valid session.
///
/// On success the [`SessionClaim`](crate::services::session::SessionClaim)
/// is inserted into request extensions. On failure the session cookie is
/// cleared and 401 is returned.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let token = session_token(&jar, request.headers());

    match state.sessions.validate(token.as_deref()) {
        Ok(claim) => {
            request.extensions_mut().insert(claim);
            next.run(request).await
        }
        Err(e) => {
            tracing::debug!(reason = %e, "Session rejected");
            let jar = jar.add(clear_session_cookie(state.config.secure_cookies));
            (jar, AppError::Auth(e)).into_response()
        }
    }
}

/// Token from the cookie, overridden by an `Authorization` header if present.
pub fn session_token(jar: &CookieJar, headers: &HeaderMap) -> Option<String> {
    let from_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .map(|h| h.strip_prefix("Bearer ").unwrap_or(h).trim().to_string())
        .filter(|t| !t.is_empty());

    from_header.or_else(|| {
        jar.get(SESSION_COOKIE)
            .map(|c| c.value().to_string())
            .filter(|t| !t.is_empty())
    })
}

pub fn session_cookie(token: String, max_age: std::time::Duration, secure: bool) -> Cookie<'static> {
    let max_age = time::Duration::seconds(i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX));
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(max_age)
        .build()
}

/// Empty session cookie that has already expired.
pub fn clear_session_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::ZERO)
        .expires(time::OffsetDateTime::now_utc() - time::Duration::hours(1))
        .build()
}
