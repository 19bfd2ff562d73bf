// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Bookable event types.

use super::{Availability, ProviderCredentials, ProviderKind};
use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// A meeting template a host publishes, tied to one availability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct EventType {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub id: i64,
    #[serde(skip)]
    pub user_id: i64,
    pub enabled: bool,
    pub title: String,
    pub description: String,
    /// Minutes
    pub duration: u32,
    pub availability: Availability,
    // Derived from the owner's credentials at read time.
    pub is_google_available: bool,
    pub is_microsoft_available: bool,
}

impl EventType {
    pub fn set_provider_flags(&mut self, credentials: &ProviderCredentials) {
        self.is_google_available = credentials.is_connected(ProviderKind::Google);
        self.is_microsoft_available = credentials.is_connected(ProviderKind::Microsoft);
    }

    pub fn is_available_on(&self, kind: ProviderKind) -> bool {
        match kind {
            ProviderKind::Google => self.is_google_available,
            ProviderKind::Microsoft => self.is_microsoft_available,
        }
    }

    pub fn timezone(&self) -> &str {
        &self.availability.timezone
    }
}
