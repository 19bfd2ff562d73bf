// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Microsoft Graph calendar client.

use super::{
    check_response_json, sign_state, transport_error, upcoming, CalendarEvent, CalendarProvider,
    MeetingRequest, OAuthToken, ProviderProfile, RemoteEvent, TokenResponse,
};
use crate::config::OAuthClientConfig;
use crate::error::AppError;
use crate::models::ProviderKind;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::json;

const KIND: ProviderKind = ProviderKind::Microsoft;

const SCOPES: &[&str] = &[
    "User.Read",
    "email",
    "openid",
    "profile",
    "offline_access",
    "Calendars.Read",
    "Calendars.ReadWrite",
    "OnlineMeetings.ReadWrite",
];

#[derive(Debug, Clone)]
pub struct MicrosoftEndpoints {
    pub auth_url: String,
    pub token_url: String,
    pub graph_base: String,
}

impl MicrosoftEndpoints {
    pub fn for_tenant(tenant: &str) -> Self {
        Self {
            auth_url: format!("https://login.microsoftonline.com/{tenant}/oauth2/v2.0/authorize"),
            token_url: format!("https://login.microsoftonline.com/{tenant}/oauth2/v2.0/token"),
            graph_base: "https://graph.microsoft.com/v1.0".to_string(),
        }
    }

    /// All endpoints under one base URL (mock servers).
    pub fn rooted_at(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            auth_url: format!("{base}/oauth2/v2.0/authorize"),
            token_url: format!("{base}/oauth2/v2.0/token"),
            graph_base: format!("{base}/v1.0"),
        }
    }
}

/// Microsoft Graph API client.
#[derive(Clone)]
pub struct MicrosoftCalendarClient {
    http: reqwest::Client,
    oauth: OAuthClientConfig,
    endpoints: MicrosoftEndpoints,
    state_key: Vec<u8>,
}

impl MicrosoftCalendarClient {
    pub fn new(
        http: reqwest::Client,
        oauth: OAuthClientConfig,
        endpoints: MicrosoftEndpoints,
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
impl CalendarProvider for MicrosoftCalendarClient {
    fn build_auth_url(&self) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
            self.endpoints.auth_url,
            urlencoding::encode(&self.oauth.client_id),
            urlencoding::encode(&self.oauth.redirect_uri),
            urlencoding::encode(&SCOPES.join(" ")),
            sign_state(KIND, &self.state_key),
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<OAuthToken, AppError> {
        let scope = SCOPES.join(" ");
        let response = self
            .http
            .post(&self.endpoints.token_url)
            .form(&[
                ("client_id", self.oauth.client_id.as_str()),
                ("client_secret", self.oauth.client_secret.as_str()),
                ("redirect_uri", self.oauth.redirect_uri.as_str()),
                ("scope", scope.as_str()),
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
            .get(format!("{}/me", self.endpoints.graph_base))
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(|e| transport_error(KIND, e))?;

        let me: GraphUser = check_response_json(KIND, response).await?;
        Ok(ProviderProfile {
            name: me.display_name.unwrap_or_default(),
            email: me.mail.or(me.user_principal_name).unwrap_or_default(),
        })
    }

    async fn fetch_upcoming_events(
        &self,
        token: &OAuthToken,
    ) -> Result<Vec<CalendarEvent>, AppError> {
        let filter = format!(
            "start/dateTime ge '{}'",
            Utc::now().format("%Y-%m-%dT%H:%M:%S")
        );
        let response = self
            .http
            .get(format!("{}/me/events", self.endpoints.graph_base))
            .bearer_auth(&token.access_token)
            // Graph reports times in UTC unless asked otherwise.
            .header("Prefer", "outlook.timezone=\"UTC\"")
            .query(&[
                ("$filter", filter.as_str()),
                ("$orderby", "start/dateTime"),
                ("$top", "10"),
            ])
            .send()
            .await
            .map_err(|e| transport_error(KIND, e))?;

        let list: GraphEventList = check_response_json(KIND, response).await?;

        let events = list
            .value
            .into_iter()
            .filter(|e| !e.is_cancelled)
            .map(|e| {
                (
                    e.start.instant(),
                    CalendarEvent {
                        id: e.id,
                        summary: e.subject.unwrap_or_default(),
                        start: e.start.date_time,
                        end: e.end.date_time,
                        link: e.online_meeting.and_then(|m| m.join_url).or(e.web_link),
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
            "subject": request.summary,
            "body": { "contentType": "text", "content": request.description },
            "start": { "dateTime": window.start_rfc3339(), "timeZone": timezone },
            "end": { "dateTime": window.end_rfc3339(), "timeZone": timezone },
            "attendees": [{
                "emailAddress": {
                    "address": request.invitee_email,
                    "name": request.invitee_name,
                },
                "type": "required",
            }],
            "isOnlineMeeting": true,
            "onlineMeetingProvider": "teamsForBusiness",
            "transactionId": super::new_request_id(),
        });

        let response = self
            .http
            .post(format!("{}/me/calendar/events", self.endpoints.graph_base))
            .bearer_auth(&token.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(KIND, e))?;

        let payload: serde_json::Value = check_response_json(KIND, response).await?;
        let id = payload["id"]
            .as_str()
            .ok_or_else(|| AppError::external(KIND, "created event has no id"))?
            .to_string();
        let meeting_url = payload["onlineMeeting"]["joinUrl"]
            .as_str()
            .map(str::to_string);

        tracing::info!(event_id = %id, "Microsoft event created");
        Ok(RemoteEvent {
            id,
            meeting_url,
            payload,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphUser {
    display_name: Option<String>,
    mail: Option<String>,
    user_principal_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphEventList {
    #[serde(default)]
    value: Vec<GraphEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphEvent {
    id: String,
    subject: Option<String>,
    #[serde(default)]
    is_cancelled: bool,
    start: GraphDateTime,
    end: GraphDateTime,
    web_link: Option<String>,
    online_meeting: Option<GraphOnlineMeeting>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphOnlineMeeting {
    join_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphDateTime {
    date_time: String,
}

impl GraphDateTime {
    /// Graph returns `2024-01-15T14:30:00.0000000` in the preferred zone (UTC).
    fn instant(&self) -> DateTime<Utc> {
        NaiveDateTime::parse_from_str(&self.date_time, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_url_requests_calendar_scopes() {
        let client = MicrosoftCalendarClient::new(
            reqwest::Client::new(),
            OAuthClientConfig {
                client_id: "mid".into(),
                client_secret: "secret".into(),
                redirect_uri: "http://localhost/cb".into(),
            },
            MicrosoftEndpoints::for_tenant("common"),
            b"key".to_vec(),
        );
        let url = client.build_auth_url();
        assert!(url.starts_with(
            "https://login.microsoftonline.com/common/oauth2/v2.0/authorize?"
        ));
        assert!(url.contains("offline_access"));
        assert!(url.contains("Calendars.ReadWrite"));
        assert_eq!(url, client.build_auth_url());
    }

    #[test]
    fn graph_times_parse_with_fraction() {
        let t = GraphDateTime {
            date_time: "2024-01-15T14:30:00.0000000".into(),
        };
        assert_eq!(t.instant().timestamp(), 1_705_329_000);
    }
}
