// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! SQLite client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (credentials and provider token blobs)
//! - Availabilities and their weekday windows
//! - Event types (joined with their availability)
//! - Bookings

use crate::error::AppError;
use crate::models::{
    Availability, AvailabilityDay, Booking, EventType, NewBooking, ProviderCredentials,
    ProviderKind, User,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

const SCHEMA: &str = include_str!("schema.sql");
const MAX_CONNECTIONS: u32 = 5;

/// Days for an availability as one JSON array, ordered by weekday.
const DAYS_JSON: &str = "(SELECT json_group_array(json_object(
        'day', d.day,
        'enable', d.enable,
        'start_time', d.start_time,
        'end_time', d.end_time))
    FROM (SELECT * FROM availability_days
          WHERE availability_id = a.id
          ORDER BY day, id) AS d)";

type UserRow = (i64, String, String, Option<String>, Option<String>);
type AvailabilityRow = (i64, i64, String, String, String);
type EventTypeRow = (
    i64,
    i64,
    bool,
    String,
    String,
    i64,
    i64,
    String,
    String,
    String,
);
type BookingRow = (
    i64,
    i64,
    i64,
    String,
    String,
    String,
    String,
    i64,
    i64,
    String,
    String,
    String,
    DateTime<Utc>,
);

/// SQLite database client.
#[derive(Clone)]
pub struct SqliteDb {
    pool: SqlitePool,
}

impl SqliteDb {
    /// Open (creating if needed) the database at `url` and apply the schema.
    pub async fn new(url: &str) -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;

        tracing::info!(url, "Connected to SQLite");
        Ok(db)
    }

    /// Private in-memory database, for tests and local experiments.
    ///
    /// Every connection to `:memory:` is a separate database, so the pool is
    /// pinned to one connection that never expires.
    pub async fn new_in_memory() -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<(), AppError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    // ─── Users ─────────────────────────────────────────────────

    pub async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, password, google_token, microsoft_token
             FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(user_from_row))
    }

    pub async fn find_user_by_id(&self, user_id: i64) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, password, google_token, microsoft_token
             FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(user_from_row))
    }

    /// Returns `None` if the user does not exist.
    pub async fn find_credentials(
        &self,
        user_id: i64,
    ) -> Result<Option<ProviderCredentials>, AppError> {
        let row = sqlx::query_as::<_, (Option<String>, Option<String>)>(
            "SELECT google_token, microsoft_token FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(google, microsoft)| ProviderCredentials { google, microsoft }))
    }

    /// Overwrite one provider's token column.
    pub async fn update_token(
        &self,
        user_id: i64,
        kind: ProviderKind,
        blob: &str,
    ) -> Result<(), AppError> {
        // Column name comes from a closed enum, never from input.
        let query = format!("UPDATE users SET {} = ? WHERE id = ?", kind.token_column());
        let result = sqlx::query(&query)
            .bind(blob)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("user {user_id}")));
        }
        Ok(())
    }

    pub async fn create_user(&self, username: &str, password_hash: &str) -> Result<i64, AppError> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO users (username, password) VALUES (?, ?) RETURNING id",
        )
        .bind(username)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    // ─── Availability & event types ────────────────────────────

    /// The user's first availability, with days ordered by weekday.
    pub async fn find_availability(&self, user_id: i64) -> Result<Option<Availability>, AppError> {
        let query = format!(
            "SELECT a.id, a.user_id, a.label, a.timezone, {DAYS_JSON} AS days
             FROM availabilities AS a
             WHERE a.user_id = ?
             ORDER BY a.id
             LIMIT 1"
        );
        let row = sqlx::query_as::<_, AvailabilityRow>(&query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|(id, user_id, label, timezone, days)| {
            Ok(Availability {
                id,
                user_id,
                label,
                timezone,
                days: parse_days(id, &days)?,
            })
        })
        .transpose()
    }

    /// Event types with their joined availability. Provider flags are left
    /// unset; they depend on the owner's credentials.
    pub async fn find_event_types(&self, user_id: i64) -> Result<Vec<EventType>, AppError> {
        let query = format!(
            "SELECT et.id, et.user_id, et.enable, et.title, et.description, et.duration,
                    a.id, a.label, a.timezone, {DAYS_JSON} AS days
             FROM event_types AS et
             JOIN availabilities AS a ON et.availability_id = a.id
             WHERE et.user_id = ?
             ORDER BY et.id"
        );
        let rows = sqlx::query_as::<_, EventTypeRow>(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(
                |(id, user_id, enabled, title, description, duration, av_id, label, tz, days)| {
                    let duration = u32::try_from(duration)
                        .ok()
                        .filter(|d| *d > 0)
                        .ok_or_else(|| {
                            AppError::DataCorruption(format!(
                                "event type {id} has invalid duration {duration}"
                            ))
                        })?;

                    Ok(EventType {
                        id,
                        user_id,
                        enabled,
                        title,
                        description,
                        duration,
                        availability: Availability {
                            id: av_id,
                            user_id,
                            label,
                            timezone: tz,
                            days: parse_days(av_id, &days)?,
                        },
                        is_google_available: false,
                        is_microsoft_available: false,
                    })
                },
            )
            .collect()
    }

    pub async fn create_availability(
        &self,
        user_id: i64,
        label: &str,
        timezone: &str,
        days: &[AvailabilityDay],
    ) -> Result<i64, AppError> {
        let mut tx = self.pool.begin().await?;

        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO availabilities (user_id, label, timezone) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(user_id)
        .bind(label)
        .bind(timezone)
        .fetch_one(&mut *tx)
        .await?;

        for day in days {
            sqlx::query(
                "INSERT INTO availability_days
                     (user_id, availability_id, enable, day, start_time, end_time)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(user_id)
            .bind(id)
            .bind(day.enabled)
            .bind(i64::from(day.day))
            .bind(i64::from(day.start_time))
            .bind(i64::from(day.end_time))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(id)
    }

    pub async fn create_event_type(
        &self,
        user_id: i64,
        availability_id: i64,
        title: &str,
        description: &str,
        duration: u32,
        enabled: bool,
    ) -> Result<i64, AppError> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO event_types (user_id, availability_id, enable, title, description, duration)
             VALUES (?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(user_id)
        .bind(availability_id)
        .bind(enabled)
        .bind(title)
        .bind(description)
        .bind(i64::from(duration))
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    // ─── Bookings ──────────────────────────────────────────────

    pub async fn insert_booking(&self, booking: &NewBooking) -> Result<i64, AppError> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO bookings
                 (user_id, event_type_id, title, notes, name, email, date, time,
                  location, provider, event, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(booking.user_id)
        .bind(booking.event_type_id)
        .bind(&booking.title)
        .bind(&booking.notes)
        .bind(&booking.name)
        .bind(&booking.email)
        .bind(booking.date)
        .bind(i64::from(booking.time))
        .bind(&booking.location)
        .bind(booking.provider.as_str())
        .bind(&booking.event)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn find_booking(&self, id: i64) -> Result<Option<Booking>, AppError> {
        let row = sqlx::query_as::<_, BookingRow>(
            "SELECT id, user_id, event_type_id, title, notes, name, email, date, time,
                    location, provider, event, created_at
             FROM bookings WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some((
            id,
            user_id,
            event_type_id,
            title,
            notes,
            name,
            email,
            date,
            time,
            location,
            provider,
            event,
            created_at,
        )) = row
        else {
            return Ok(None);
        };

        let corrupt = |what: String| AppError::DataCorruption(format!("booking {id}: {what}"));
        let provider = provider.parse::<ProviderKind>().map_err(corrupt)?;
        let time = u32::try_from(time).map_err(|e| corrupt(e.to_string()))?;
        let event_detail =
            serde_json::from_str(&event).map_err(|e| corrupt(format!("event payload: {e}")))?;

        Ok(Some(Booking {
            id,
            user_id,
            event_type_id,
            title,
            notes,
            name,
            email,
            date,
            time,
            location,
            provider,
            event_detail,
            created_at,
        }))
    }

    pub async fn count_bookings(&self) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM bookings")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Raw statement escape hatch for tests that need to plant bad rows.
    #[doc(hidden)]
    pub async fn execute_raw(&self, sql: &str) -> Result<u64, AppError> {
        Ok(sqlx::raw_sql(sql).execute(&self.pool).await?.rows_affected())
    }
}

fn user_from_row((id, username, password_hash, google, microsoft): UserRow) -> User {
    User {
        id,
        username,
        password_hash,
        credentials: ProviderCredentials { google, microsoft },
    }
}

/// Day as stored; integers are range-checked before use.
#[derive(Deserialize)]
struct StoredDay {
    day: i64,
    enable: i64,
    start_time: i64,
    end_time: i64,
}

fn parse_days(availability_id: i64, raw: &str) -> Result<Vec<AvailabilityDay>, AppError> {
    let corrupt = |what: String| {
        AppError::DataCorruption(format!("availability {availability_id} days: {what}"))
    };

    let stored: Vec<StoredDay> = serde_json::from_str(raw).map_err(|e| corrupt(e.to_string()))?;

    stored
        .into_iter()
        .map(|d| {
            let day = AvailabilityDay {
                day: u8::try_from(d.day).map_err(|e| corrupt(e.to_string()))?,
                enabled: d.enable != 0,
                start_time: u32::try_from(d.start_time).map_err(|e| corrupt(e.to_string()))?,
                end_time: u32::try_from(d.end_time).map_err(|e| corrupt(e.to_string()))?,
            };
            if !day.is_consistent() {
                return Err(corrupt(format!("invalid window {day:?}")));
            }
            Ok(day)
        })
        .collect()
}
