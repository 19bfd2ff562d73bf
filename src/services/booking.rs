// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Booking workflow.
//!
//! A booking is created in one linear pass:
//!
//! 1. validate the form
//! 2. resolve the host and the event type
//! 3. pick a connected provider and decode its token
//! 4. create the remote event
//! 5. persist the booking with the remote event embedded
//!
//! Any failure ends the pass. Nothing is written locally unless the remote
//! event exists. If the local insert fails after the remote create, the
//! remote event stays behind and is logged with its id.

use crate::db::SqliteDb;
use crate::error::AppError;
use crate::models::{Booking, BookingForm, EventType, NewBooking, ProviderKind};
use crate::services::credentials::CredentialStore;
use crate::services::provider::{MeetingRequest, OAuthToken, Providers};
use crate::services::scheduling::SchedulingResolver;
use crate::time_utils::parse_timezone;

#[derive(Clone)]
pub struct BookingWorkflow {
    db: SqliteDb,
    scheduling: SchedulingResolver,
    credentials: CredentialStore,
    providers: Providers,
}

impl BookingWorkflow {
    pub fn new(
        db: SqliteDb,
        scheduling: SchedulingResolver,
        credentials: CredentialStore,
        providers: Providers,
    ) -> Self {
        Self {
            db,
            scheduling,
            credentials,
            providers,
        }
    }

    /// Run the workflow; returns the new booking id.
    pub async fn create(&self, form: &BookingForm) -> Result<i64, AppError> {
        form.check()?;
        let (Some(event_type_id), Some(date), Some(time)) = (form.event_type_id, form.date, form.time)
        else {
            return Err(AppError::Validation(
                "event_type_id, date and time are required".to_string(),
            ));
        };

        let host = self.scheduling.find_host(&form.username).await?;

        let event_type = self
            .scheduling
            .event_types(&host)
            .await?
            .into_iter()
            .find(|et| et.id == event_type_id && et.enabled)
            .ok_or_else(|| AppError::NotFound(format!("event type {event_type_id}")))?;

        let kind = select_provider(&event_type, form.provider)?;
        let credentials = self.credentials.get(host.id).await?;
        let blob = credentials
            .get(kind)
            .ok_or_else(|| AppError::provider_unauthorized(kind, "no stored token"))?;
        let token = OAuthToken::from_blob(blob)
            .map_err(|reason| AppError::provider_unauthorized(kind, reason))?;

        let timezone = parse_timezone(event_type.timezone()).ok_or_else(|| {
            AppError::DataCorruption(format!(
                "availability {} has unknown timezone {:?}",
                event_type.availability.id,
                event_type.timezone()
            ))
        })?;

        let mut request = MeetingRequest {
            summary: format!(
                "{} between {} and {}",
                event_type.title, host.username, form.name
            ),
            description: form.notes.clone(),
            timezone,
            organizer_email: String::new(),
            invitee_name: form.name.clone(),
            invitee_email: form.email.clone(),
            epoch_date: date,
            hhmm: time,
            duration_minutes: event_type.duration,
        };
        request.window()?;

        let provider = self.providers.get(kind);
        let organizer = provider.fetch_profile(&token).await?;
        request.organizer_email = organizer.email;

        let remote = provider.create_event(&token, &request).await?;

        let location = if form.meeting_location.is_empty() {
            remote.meeting_url.clone().unwrap_or_default()
        } else {
            form.meeting_location.clone()
        };

        let booking = NewBooking {
            user_id: host.id,
            event_type_id: event_type.id,
            title: event_type.title.clone(),
            notes: form.notes.clone(),
            name: form.name.clone(),
            email: form.email.clone(),
            date,
            time,
            location,
            provider: kind,
            event: remote.payload.to_string(),
        };

        match self.db.insert_booking(&booking).await {
            Ok(id) => {
                tracing::info!(
                    booking_id = id,
                    user_id = host.id,
                    provider = %kind,
                    remote_event_id = %remote.id,
                    "Booking created"
                );
                Ok(id)
            }
            Err(e) => {
                tracing::error!(
                    user_id = host.id,
                    provider = %kind,
                    remote_event_id = %remote.id,
                    error = %e,
                    "Booking not stored; remote event is orphaned"
                );
                Err(e)
            }
        }
    }

    pub async fn find(&self, id: i64) -> Result<Booking, AppError> {
        self.db
            .find_booking(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("booking {id}")))
    }
}

/// The requested provider if it is connected, else the first connected one.
fn select_provider(
    event_type: &EventType,
    requested: Option<ProviderKind>,
) -> Result<ProviderKind, AppError> {
    match requested {
        Some(kind) if event_type.is_available_on(kind) => Ok(kind),
        Some(kind) => Err(AppError::provider_unauthorized(
            kind,
            "host has not connected this calendar",
        )),
        None => ProviderKind::ALL
            .into_iter()
            .find(|kind| event_type.is_available_on(*kind))
            .ok_or_else(|| {
                AppError::provider_unauthorized(
                    ProviderKind::ALL[0],
                    "host has no connected calendar",
                )
            }),
    }
}
