//! Business-hours evaluation.
//!
//! Restaurants store their hours as `HH:MM:SS` strings. Whether a restaurant
//! is open is always judged against the wall clock in Korea Standard Time,
//! whatever the locale of the caller.
//!
//! Windows whose end is before their start wrap past midnight: `22:00-02:00`
//! covers 23:30 and 01:00 but not 03:00.

use chrono::{DateTime, FixedOffset, Timelike, Utc};

/// Minutes in a day.
pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// KST offset from UTC, in seconds. Korea does not observe daylight saving.
const KST_OFFSET_SECS: i32 = 9 * 60 * 60;

/// Parse a time-of-day string into minutes since midnight.
///
/// Segments are `hours:minutes:seconds`; each segment takes its leading
/// digits, and missing or unparsable segments count as zero. Seconds are
/// truncated to whole minutes. Empty input yields `None`.
#[must_use]
pub fn parse_time_to_minutes(raw: &str) -> Option<u32> {
    if raw.is_empty() {
        return None;
    }

    let mut segments = raw.split(':').map(leading_number);
    let hours = segments.next().unwrap_or(0);
    let minutes = segments.next().unwrap_or(0);
    let seconds = segments.next().unwrap_or(0);

    Some(
        hours
            .saturating_mul(60)
            .saturating_add(minutes)
            .saturating_add(seconds / 60),
    )
}

fn leading_number(segment: &str) -> u32 {
    let trimmed = segment.trim_start();
    let end = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    trimmed.get(..end).and_then(|d| d.parse().ok()).unwrap_or(0)
}

/// Whether `t` falls inside the half-open window `[start, end)`.
///
/// When `start > end` the window wraps past midnight.
#[must_use]
pub const fn in_range(start: u32, end: u32, t: u32) -> bool {
    if start <= end {
        t >= start && t < end
    } else {
        t >= start || t < end
    }
}

/// Opening hours of a single restaurant, as stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusinessHours<'a> {
    pub open: Option<&'a str>,
    pub close: Option<&'a str>,
    pub break_start: Option<&'a str>,
    pub break_end: Option<&'a str>,
}

impl<'a> BusinessHours<'a> {
    /// Build from optional owned strings.
    #[must_use]
    pub fn from_options(
        open: Option<&'a String>,
        close: Option<&'a String>,
        break_start: Option<&'a String>,
        break_end: Option<&'a String>,
    ) -> Self {
        Self {
            open: open.map(String::as_str),
            close: close.map(String::as_str),
            break_start: break_start.map(String::as_str),
            break_end: break_end.map(String::as_str),
        }
    }

    /// Whether the restaurant is open at `minute` minutes past midnight (KST).
    ///
    /// Missing open or close time means closed. The break window only applies
    /// when both of its bounds are present.
    #[must_use]
    pub fn is_open_at(&self, minute: u32) -> bool {
        let open = self.open.and_then(parse_time_to_minutes);
        let close = self.close.and_then(parse_time_to_minutes);
        let (Some(open), Some(close)) = (open, close) else {
            return false;
        };

        if !in_range(open, close, minute) {
            return false;
        }

        let break_start = self.break_start.and_then(parse_time_to_minutes);
        let break_end = self.break_end.and_then(parse_time_to_minutes);
        if let (Some(bs), Some(be)) = (break_start, break_end)
            && in_range(bs, be, minute)
        {
            return false;
        }

        true
    }

    /// Whether the restaurant is open at the given instant.
    #[must_use]
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.is_open_at(kst_minute_of_day(now))
    }
}

/// Minutes past midnight on the Asia/Seoul wall clock at `now`.
#[must_use]
pub fn kst_minute_of_day(now: DateTime<Utc>) -> u32 {
    FixedOffset::east_opt(KST_OFFSET_SECS).map_or_else(
        || (now.hour() * 60 + now.minute() + 9 * 60) % MINUTES_PER_DAY,
        |kst| {
            let local = now.with_timezone(&kst);
            local.hour() * 60 + local.minute()
        },
    )
}
