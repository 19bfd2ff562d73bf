// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google Calendar client.
//!
//! Handles:
//! - OAuth authorization URL and code exchange
//! - Profile lookup through the People API
//! - Upcoming events from the primary calendar
//! - Event creation with a Google Meet conference

use super::{
    check_response_json, sign_state, transport_error, upcoming, CalendarEvent, CalendarProvider,
    MeetingRequest, OAuthToken, ProviderProfile, RemoteEvent, TokenResponse,
};
use crate::config::OAuthClientConfig;
use crate::error::AppError;
use crate::models::ProviderKind;
use crate::time_utils::format_utc_rfc3339;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;

const KIND: ProviderKind = ProviderKind::Google;

const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/calendar.readonly",
    "https://www.googleapis.com/auth/calendar.events",
    "https://www.googleapis.com/auth/userinfo.profile",
    "https://www.googleapis.com/auth/gmail.readonly",
];

/// Base URLs for the Google APIs in use.
#[derive(Debug, Clone)]
pub struct GoogleEndpoints {
    pub auth_url: String,
    pub token_url: String,
    pub calendar_base: String,
    pub people_base: String,
}

impl Default for GoogleEndpoints {
    fn default() -> Self {
        Self {
            auth_url: "https://accounts.google.com/o/oauth2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            calendar_base: "https://www.googleapis.com/calendar/v3".to_string(),
            people_base: "https://people.googleapis.com/v1".to_string(),
        }
    }
}

impl GoogleEndpoints {
    /// All endpoints under one base URL (mock servers).
    pub fn rooted_at(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            auth_url: format!("{base}/o/oauth2/auth"),
            token_url: format!("{base}/token"),
            calendar_base: format!("{base}/calendar/v3"),
            people_base: format!("{base}/v1"),
        }
    }
}

/// Google Calendar API client.
#[derive(Clone)]
pub struct GoogleCalendarClient {
    http: reqwest::Client,
    oauth: OAuthClientConfig,
    endpoints: GoogleEndpoints,
    state_key: Vec<u8>,
}

impl GoogleCalendarClient {
    pub fn new(
        http: reqwest::Client,
        oauth: OAuthClientConfig,
        endpoints: GoogleEndpoints,
        state_key: Vec<u8>,
    ) -> Self {
        Self {
            http,
            oauth,
            endpoints,
            state_key,
        }
    }
}

#[async_trait]
impl CalendarProvider for GoogleCalendarClient {
    fn build_auth_url(&self) -> String {
        format!(
            "{}?access_type=offline&client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
            self.endpoints.auth_url,
            urlencoding::encode(&self.oauth.client_id),
            urlencoding::encode(&self.oauth.redirect_uri),
            urlencoding::encode(&SCOPES.join(" ")),
            sign_state(KIND, &self.state_key),
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<OAuthToken, AppError> {
        let response = self
            .http
            .post(&self.endpoints.token_url)
            .form(&[
                ("client_id", self.oauth.client_id.as_str()),
                ("client_secret", self.oauth.client_secret.as_str()),
                ("redirect_uri", self.oauth.redirect_uri.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| transport_error(KIND, e))?;

        let token: TokenResponse = check_response_json(KIND, response).await?;
        Ok(token.into_token(Utc::now()))
    }

    async fn fetch_profile(&self, token: &OAuthToken) -> Result<ProviderProfile, AppError> {
        let response = self
            .http
            .get(format!("{}/people/me", self.endpoints.people_base))
            .bearer_auth(&token.access_token)
            .query(&[("personFields", "names,emailAddresses")])
            .send()
            .await
            .map_err(|e| transport_error(KIND, e))?;

        let person: Person = check_response_json(KIND, response).await?;
        Ok(ProviderProfile {
            name: person
                .names
                .into_iter()
                .next()
                .map(|n| n.display_name)
                .unwrap_or_default(),
            email: person
                .email_addresses
                .into_iter()
                .next()
                .map(|e| e.value)
                .unwrap_or_default(),
        })
    }

    async fn fetch_upcoming_events(
        &self,
        token: &OAuthToken,
    ) -> Result<Vec<CalendarEvent>, AppError> {
        let time_min = format_utc_rfc3339(Utc::now());
        let response = self
            .http
            .get(format!(
                "{}/calendars/primary/events",
                self.endpoints.calendar_base
            ))
            .bearer_auth(&token.access_token)
            .query(&[
                ("showDeleted", "false"),
                ("singleEvents", "true"),
                ("timeMin", time_min.as_str()),
                ("maxResults", "10"),
                ("orderBy", "startTime"),
            ])
            .send()
            .await
            .map_err(|e| transport_error(KIND, e))?;

        let list: EventList = check_response_json(KIND, response).await?;

        let events = list
            .items
            .into_iter()
            .filter(|item| item.status.as_deref() != Some("cancelled"))
            .map(|item| {
                let start = item.start.instant();
                (
                    start,
                    CalendarEvent {
                        id: item.id,
                        summary: item.summary.unwrap_or_default(),
                        start: item.start.raw(),
                        end: item.end.raw(),
                        link: item.hangout_link.or(item.html_link),
                    },
                )
            })
            .collect();

        Ok(upcoming(events))
    }

    async fn create_event(
        &self,
        token: &OAuthToken,
        request: &MeetingRequest,
    ) -> Result<RemoteEvent, AppError> {
        let window = request.window()?;
        let timezone = request.timezone.name();

        let body = json!({
            "summary": request.summary,
            "description": request.description,
            "start": { "dateTime": window.start_rfc3339(), "timeZone": timezone },
            "end": { "dateTime": window.end_rfc3339(), "timeZone": timezone },
            "attendees": [
                {
                    "email": request.organizer_email,
                    "organizer": true,
                    "responseStatus": "accepted",
                },
                {
                    "email": request.invitee_email,
                    "displayName": request.invitee_name,
                    "responseStatus": "accepted",
                },
            ],
            "conferenceData": {
                "createRequest": {
                    "requestId": super::new_request_id(),
                    "conferenceSolutionKey": { "type": "hangoutsMeet" },
                },
            },
        });

        let response = self
            .http
            .post(format!(
                "{}/calendars/primary/events",
                self.endpoints.calendar_base
            ))
            .bearer_auth(&token.access_token)
            .query(&[("conferenceDataVersion", "1")])
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(KIND, e))?;

        let payload: serde_json::Value = check_response_json(KIND, response).await?;
        let id = payload["id"]
            .as_str()
            .ok_or_else(|| AppError::external(KIND, "created event has no id"))?
            .to_string();
        let meeting_url = payload["hangoutLink"]
            .as_str()
            .or_else(|| payload["conferenceData"]["entryPoints"][0]["uri"].as_str())
            .map(str::to_string);

        tracing::info!(event_id = %id, "Google event created");
        Ok(RemoteEvent {
            id,
            meeting_url,
            payload,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Person {
    #[serde(default)]
    names: Vec<PersonName>,
    #[serde(default)]
    email_addresses: Vec<PersonEmail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersonName {
    #[serde(default)]
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct PersonEmail {
    #[serde(default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct EventList {
    #[serde(default)]
    items: Vec<EventItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventItem {
    id: String,
    summary: Option<String>,
    status: Option<String>,
    #[serde(default)]
    start: EventTime,
    #[serde(default)]
    end: EventTime,
    html_link: Option<String>,
    hangout_link: Option<String>,
}

/// Timed events carry `dateTime`; all-day events carry `date`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventTime {
    date_time: Option<String>,
    date: Option<String>,
}

impl EventTime {
    fn raw(&self) -> String {
        self.date_time
            .clone()
            .or_else(|| self.date.clone())
            .unwrap_or_default()
    }

    fn instant(&self) -> DateTime<Utc> {
        if let Some(dt) = self
            .date_time
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        {
            return dt.with_timezone(&Utc);
        }
        self.date
            .as_deref()
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
            .map(|d| d.and_time(chrono::NaiveTime::MIN).and_utc())
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}
