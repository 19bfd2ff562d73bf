// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Public booking endpoints.

use super::ApiResponse;
use crate::error::Result;
use crate::models::{Booking, BookingForm, UserProfile};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/booking", post(create_booking))
        .route("/booking/{username}", get(host_page))
        .route("/schedule/{id}", get(schedule))
}

#[derive(Serialize)]
pub struct BookingCreated {
    pub id: i64,
}

async fn host_page(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> Result<Json<ApiResponse<UserProfile>>> {
    let host = state.scheduling.host_page(&username).await?;
    Ok(ApiResponse::json(host))
}

async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(form): Json<BookingForm>,
) -> Result<(StatusCode, Json<ApiResponse<BookingCreated>>)> {
    let id = state.bookings.create(&form).await?;
    Ok((StatusCode::CREATED, ApiResponse::json(BookingCreated { id })))
}

async fn schedule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Booking>>> {
    let booking = state.bookings.find(id).await?;
    Ok(ApiResponse::json(booking))
}
