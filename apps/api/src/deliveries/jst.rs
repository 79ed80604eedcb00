//! JST (UTC+9) bucketing and formatting for delivery records.
//!
//! Instants are stored in UTC; send dates, time slots and every human-facing
//! timestamp are computed on the Japan wall clock.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::extraction::fields::JST_OFFSET_SECS;

fn offset() -> Duration {
    Duration::seconds(i64::from(JST_OFFSET_SECS))
}

pub fn to_jst(instant: DateTime<Utc>) -> NaiveDateTime {
    instant.naive_utc() + offset()
}

pub fn from_jst(wall_clock: NaiveDateTime) -> DateTime<Utc> {
    Utc.from_utc_datetime(&(wall_clock - offset()))
}

/// Calendar date of `sent_at` in JST.
pub fn send_date(sent_at: DateTime<Utc>) -> NaiveDate {
    to_jst(sent_at).date()
}

/// Six-hour bucket of the JST hour of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TimeSlot {
    #[serde(rename = "00-05")]
    Night,
    #[serde(rename = "06-11")]
    Morning,
    #[serde(rename = "12-17")]
    Afternoon,
    #[serde(rename = "18-23")]
    Evening,
}

impl TimeSlot {
    pub fn from_instant(instant: DateTime<Utc>) -> Self {
        match to_jst(instant).hour() {
            0..=5 => TimeSlot::Night,
            6..=11 => TimeSlot::Morning,
            12..=17 => TimeSlot::Afternoon,
            _ => TimeSlot::Evening,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeSlot::Night => "00-05",
            TimeSlot::Morning => "06-11",
            TimeSlot::Afternoon => "12-17",
            TimeSlot::Evening => "18-23",
        }
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeSlot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "00-05" => Ok(TimeSlot::Night),
            "06-11" => Ok(TimeSlot::Morning),
            "12-17" => Ok(TimeSlot::Afternoon),
            "18-23" => Ok(TimeSlot::Evening),
            other => Err(format!(
                "time_slot must be one of 00-05, 06-11, 12-17, 18-23 (got '{other}')"
            )),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Parsing
// ────────────────────────────────────────────────────────────────────────────

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

/// Parses an instant from RFC 3339, a JST local `YYYY-MM-DDTHH:MM`, or a bare
/// JST date. A bare date is the start of that day, or its last second when
/// `end_of_day` is set.
pub fn parse_instant(value: &str, end_of_day: bool) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(from_jst(naive));
        }
    }
    let date = parse_date(value)?;
    let time = if end_of_day {
        NaiveTime::from_hms_opt(23, 59, 59)?
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)?
    };
    Some(from_jst(date.and_time(time)))
}

// ────────────────────────────────────────────────────────────────────────────
// Formatting
// ────────────────────────────────────────────────────────────────────────────

/// `YYYY-MM-DD HH:MM` in JST; empty for `None`.
pub fn format_csv_datetime(instant: Option<DateTime<Utc>>) -> String {
    instant
        .map(|i| to_jst(i).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default()
}

/// `YYYYMMDD_HHMM` in JST.
pub fn format_filename_stamp(now: DateTime<Utc>) -> String {
    to_jst(now).format("%Y%m%d_%H%M").to_string()
}
