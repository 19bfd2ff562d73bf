// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Availability and event-type lookup.

use crate::db::SqliteDb;
use crate::error::AppError;
use crate::models::{sort_enabled_first, Availability, EventType, User, UserProfile};

#[derive(Clone)]
pub struct SchedulingResolver {
    db: SqliteDb,
}

impl SchedulingResolver {
    pub fn new(db: SqliteDb) -> Self {
        Self { db }
    }

    pub async fn availability(&self, user_id: i64) -> Result<Availability, AppError> {
        self.db
            .find_availability(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("availability for user {user_id}")))
    }

    /// Event types for an already-loaded user, with enabled days first and
    /// provider flags taken from the user's credentials.
    pub async fn event_types(&self, user: &User) -> Result<Vec<EventType>, AppError> {
        let mut event_types = self.db.find_event_types(user.id).await?;

        for event_type in &mut event_types {
            sort_enabled_first(&mut event_type.availability.days);
            event_type.set_provider_flags(&user.credentials);
        }

        Ok(event_types)
    }

    pub async fn event_types_for(&self, user_id: i64) -> Result<Vec<EventType>, AppError> {
        let user = self
            .db
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {user_id}")))?;
        self.event_types(&user).await
    }

    pub async fn find_host(&self, username: &str) -> Result<User, AppError> {
        self.db
            .find_user_by_username(username)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {username}")))
    }

    /// What a visitor sees before booking: the host and their event types.
    pub async fn host_page(&self, username: &str) -> Result<UserProfile, AppError> {
        let host = self.find_host(username).await?;
        let event_types = self.event_types(&host).await?;

        let mut profile = UserProfile::from(&host);
        profile.event_types = Some(event_types);
        Ok(profile)
    }
}
