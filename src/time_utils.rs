// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time handling.
//!
//! Meeting times travel as two integers: a unix timestamp that identifies the
//! calendar day and an `HHMM` wall-clock time (`930` is 09:30). The helpers
//! here turn that pair into concrete instants in the host's timezone.

use chrono::{DateTime, Duration, LocalResult, NaiveTime, Offset, SecondsFormat, TimeZone, Utc};
use chrono_tz::Tz;
use std::sync::RwLock;

/// Source of "now", injectable so expiry logic can be tested.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.write() {
            *now += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.read().map(|now| *now).unwrap_or_else(|e| *e.into_inner())
    }
}

/// Start and end of a meeting, in the host's timezone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetingWindow {
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

impl MeetingWindow {
    pub fn start_rfc3339(&self) -> String {
        format_rfc3339(&self.start)
    }

    pub fn end_rfc3339(&self) -> String {
        format_rfc3339(&self.end)
    }
}

/// Build the meeting window for a booking.
///
/// `epoch_date` is converted to `tz`, truncated to that day's local midnight,
/// then `hhmm / 100` hours and `hhmm % 100` minutes are added as absolute
/// durations. The end is `start + duration_minutes`. Returns `None` when the
/// date or the resulting instants fall outside the representable range.
pub fn compose_meeting_window(
    epoch_date: i64,
    hhmm: u32,
    tz: Tz,
    duration_minutes: u32,
) -> Option<MeetingWindow> {
    let utc = DateTime::from_timestamp(epoch_date, 0)?.naive_utc();
    let offset = tz.offset_from_utc_datetime(&utc).fix();
    let day = utc
        .checked_add_signed(Duration::seconds(i64::from(offset.local_minus_utc())))?
        .date();
    let midnight = local_midnight(day.and_time(NaiveTime::MIN), tz)?;

    let start = midnight
        .checked_add_signed(Duration::hours(i64::from(hhmm / 100)))?
        .checked_add_signed(Duration::minutes(i64::from(hhmm % 100)))?;
    let end = start.checked_add_signed(Duration::minutes(i64::from(duration_minutes)))?;

    // Both ends must also have a representable local time to be formatted.
    local_time(&start)?;
    local_time(&end)?;
    Some(MeetingWindow { start, end })
}

fn local_time(dt: &DateTime<Tz>) -> Option<chrono::NaiveDateTime> {
    let offset = dt.offset().fix();
    dt.naive_utc()
        .checked_add_signed(Duration::seconds(i64::from(offset.local_minus_utc())))
}

fn local_midnight(naive: chrono::NaiveDateTime, tz: Tz) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        // Midnight falls in a DST gap: apply the offset in force at that instant.
        LocalResult::None => {
            let offset = tz.offset_from_utc_datetime(&naive).fix();
            let utc = naive
                .checked_sub_signed(Duration::seconds(i64::from(offset.local_minus_utc())))?;
            Some(tz.from_utc_datetime(&utc))
        }
    }
}

/// Format with an explicit offset, using `Z` for UTC.
pub fn format_rfc3339<T: TimeZone>(date: &DateTime<T>) -> String
where
    T::Offset: std::fmt::Display,
{
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    format_rfc3339(&date)
}

/// `HHMM` values run from 0 to 2359 with minutes below 60.
pub fn is_valid_hhmm(value: u32) -> bool {
    value <= 2359 && value % 100 < 60
}

pub fn parse_timezone(name: &str) -> Option<Tz> {
    name.parse::<Tz>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    // Monday 2024-01-15 12:00 UTC
    const MONDAY_NOON_UTC: i64 = 1_705_320_000;

    #[test]
    fn new_york_half_past_nine() {
        let tz: Tz = "America/New_York".parse().unwrap();
        let window = compose_meeting_window(MONDAY_NOON_UTC, 930, tz, 30).unwrap();
        assert_eq!(window.start_rfc3339(), "2024-01-15T09:30:00-05:00");
        assert_eq!(window.end_rfc3339(), "2024-01-15T10:00:00-05:00");
    }

    #[test]
    fn utc_uses_z_suffix() {
        let window = compose_meeting_window(MONDAY_NOON_UTC, 1345, Tz::UTC, 60).unwrap();
        assert_eq!(window.start_rfc3339(), "2024-01-15T13:45:00Z");
        assert_eq!(window.end_rfc3339(), "2024-01-15T14:45:00Z");
    }

    #[test]
    fn start_is_local_midnight_plus_offset() {
        let zones = [
            "UTC",
            "America/New_York",
            "Asia/Kolkata",
            "Asia/Kathmandu",
            "Australia/Adelaide",
            "America/St_Johns",
            "Pacific/Chatham",
        ];
        let times = [0, 1, 59, 930, 1200, 1730, 2359];

        for zone in zones {
            let tz: Tz = zone.parse().unwrap();
            for epoch in [MONDAY_NOON_UTC, MONDAY_NOON_UTC + 86_400 * 45 + 3_600 * 7] {
                let local_day = DateTime::from_timestamp(epoch, 0)
                    .unwrap()
                    .with_timezone(&tz)
                    .date_naive();
                let midnight = tz
                    .from_local_datetime(&local_day.and_time(NaiveTime::MIN))
                    .earliest()
                    .unwrap();

                for hhmm in times {
                    let window = compose_meeting_window(epoch, hhmm, tz, 45).unwrap();
                    let expected = midnight
                        + Duration::minutes(i64::from(hhmm / 100 * 60 + hhmm % 100));
                    assert_eq!(window.start, expected, "{zone} {hhmm}");
                    assert_eq!(window.end - window.start, Duration::minutes(45));
                    assert_eq!(window.start.date_naive(), local_day, "{zone} {hhmm}");
                }
            }
        }
    }

    #[test]
    fn half_hour_offsets_are_preserved() {
        let tz: Tz = "Asia/Kolkata".parse().unwrap();
        let window = compose_meeting_window(MONDAY_NOON_UTC, 930, tz, 30).unwrap();
        assert_eq!(window.start_rfc3339(), "2024-01-15T09:30:00+05:30");

        let tz: Tz = "Asia/Kathmandu".parse().unwrap();
        let window = compose_meeting_window(MONDAY_NOON_UTC, 930, tz, 30).unwrap();
        assert_eq!(window.start_rfc3339(), "2024-01-15T09:30:00+05:45");
    }

    #[test]
    fn hhmm_bounds() {
        assert!(is_valid_hhmm(0));
        assert!(is_valid_hhmm(930));
        assert!(is_valid_hhmm(2359));
        assert!(!is_valid_hhmm(2400));
        assert!(!is_valid_hhmm(960));
    }

    #[test]
    fn out_of_range_dates_yield_none() {
        let last = DateTime::<Utc>::MAX_UTC.timestamp();
        assert_eq!(compose_meeting_window(last, 2359, Tz::UTC, 30), None);
        assert_eq!(
            compose_meeting_window(last, 930, chrono_tz::Pacific::Kiritimati, 30),
            None
        );
        assert_eq!(compose_meeting_window(i64::MAX, 930, Tz::UTC, 30), None);
        assert_eq!(compose_meeting_window(i64::MIN, 0, Tz::UTC, 30), None);
        // Local day is the last one representable; the end spills past it.
        let last_local_day = last - 14 * 3600;
        assert_eq!(
            compose_meeting_window(last_local_day, 2359, chrono_tz::Pacific::Kiritimati, 30),
            None
        );
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(DateTime::from_timestamp(0, 0).unwrap());
        clock.advance(Duration::minutes(31));
        assert_eq!(clock.now().timestamp(), 31 * 60);
    }
}
