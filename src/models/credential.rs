// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Calendar providers and the per-user credential blobs stored for them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// One of the calendar providers a host can connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum ProviderKind {
    Google,
    Microsoft,
}

impl ProviderKind {
    /// Preference order when a booking does not name a provider.
    pub const ALL: [ProviderKind; 2] = [ProviderKind::Google, ProviderKind::Microsoft];

    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Google => "google",
            ProviderKind::Microsoft => "microsoft",
        }
    }

    /// Column on `users` holding this provider's token blob.
    pub fn token_column(self) -> &'static str {
        match self {
            ProviderKind::Google => "google_token",
            ProviderKind::Microsoft => "microsoft_token",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "google" => Ok(ProviderKind::Google),
            "microsoft" => Ok(ProviderKind::Microsoft),
            other => Err(format!("unknown calendar provider: {other}")),
        }
    }
}

/// Opaque token blobs, one per provider. `None` means not connected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderCredentials {
    pub google: Option<String>,
    pub microsoft: Option<String>,
}

impl ProviderCredentials {
    pub fn get(&self, kind: ProviderKind) -> Option<&str> {
        match kind {
            ProviderKind::Google => self.google.as_deref(),
            ProviderKind::Microsoft => self.microsoft.as_deref(),
        }
    }

    pub fn is_connected(&self, kind: ProviderKind) -> bool {
        self.get(kind).is_some()
    }
}
