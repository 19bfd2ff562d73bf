// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Weekly availability windows.

use crate::time_utils::is_valid_hhmm;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// One weekday's bookable window. Times are `HHMM` integers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AvailabilityDay {
    /// 0 = Sunday .. 6 = Saturday
    pub day: u8,
    pub enabled: bool,
    pub start_time: u32,
    pub end_time: u32,
}

impl AvailabilityDay {
    /// Whether the stored values describe a usable window.
    pub fn is_consistent(&self) -> bool {
        self.day <= 6
            && is_valid_hhmm(self.start_time)
            && is_valid_hhmm(self.end_time)
            && (!self.enabled || self.start_time < self.end_time)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Availability {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub id: i64,
    #[serde(skip)]
    pub user_id: i64,
    pub label: String,
    /// IANA zone name, e.g. `America/New_York`
    pub timezone: String,
    pub days: Vec<AvailabilityDay>,
}

/// Stable sort putting enabled days before disabled ones.
pub fn sort_enabled_first(days: &mut [AvailabilityDay]) {
    days.sort_by_key(|d| Reverse(d.enabled));
}
