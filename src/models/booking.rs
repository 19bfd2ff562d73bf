// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Bookings and the request forms that create them.

use super::ProviderKind;
use crate::time_utils::is_valid_hhmm;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// A stored booking. Immutable once written.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Booking {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub id: i64,
    #[serde(skip)]
    pub user_id: i64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub event_type_id: i64,
    pub title: String,
    pub notes: String,
    /// Invitee name
    pub name: String,
    /// Invitee email
    pub email: String,
    /// Unix timestamp identifying the day
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub date: i64,
    /// `HHMM`
    pub time: u32,
    pub location: String,
    pub provider: ProviderKind,
    /// Remote event as returned by the provider
    #[cfg_attr(feature = "binding-generation", ts(type = "unknown"))]
    pub event_detail: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Row to insert after the remote event exists.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub user_id: i64,
    pub event_type_id: i64,
    pub title: String,
    pub notes: String,
    pub name: String,
    pub email: String,
    pub date: i64,
    pub time: u32,
    pub location: String,
    pub provider: ProviderKind,
    /// Serialized remote event
    pub event: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginForm {
    #[validate(length(min = 1, message = "username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

/// Visitor's booking request.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct BookingForm {
    #[serde(default)]
    #[validate(length(min = 1, message = "username is required"))]
    pub username: String,
    #[validate(required(message = "event_type_id is required"))]
    pub event_type_id: Option<i64>,
    #[validate(required(message = "date is required"))]
    pub date: Option<i64>,
    #[validate(required(message = "time is required"))]
    pub time: Option<u32>,
    #[serde(default)]
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[serde(default)]
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub meeting_location: String,
    /// Calendar to book on; chosen from the host's connections when absent
    #[serde(default)]
    pub provider: Option<ProviderKind>,
}

impl BookingForm {
    /// Field rules plus the `HHMM` range check.
    pub fn check(&self) -> Result<(), validator::ValidationErrors> {
        let mut result = self.validate();
        if let Some(time) = self.time {
            if !is_valid_hhmm(time) {
                let mut errors = result.err().unwrap_or_default();
                let mut err = ValidationError::new("hhmm");
                err.message = Some("time must be HHMM between 0 and 2359".into());
                errors.add("time", err);
                result = Err(errors);
            }
        }
        result
    }
}
