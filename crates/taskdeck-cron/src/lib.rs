//! taskdeck-cron: Recurrence <-> cron expression translation.
//!
//! Converts between a structured [`RecurrenceSpec`] (what a schedule form
//! edits) and the five-field cron syntax the scheduler service stores, and
//! renders human-readable descriptions and upcoming fire times.

pub mod translator;
pub mod upcoming;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use translator::{CronExpression, CronField, describe, generate, parse};
pub use upcoming::upcoming;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CronError {
    #[error("Invalid cron expression {expression:?}: expected 5 fields, found {fields}")]
    InvalidCronExpression { expression: String, fields: usize },
    #[error("Cannot compute run times for {expression:?}: {reason}")]
    Unschedulable { expression: String, reason: String },
    #[error("Invalid time of day {0:?}: expected HH:MM")]
    InvalidTimeOfDay(String),
}

/// How often a recurrence fires.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Frequency {
    EveryMinute,
    EveryNMinutes,
    EveryNHours,
    #[default]
    Daily,
    Weekly,
    Monthly,
    Custom,
}

/// Wall-clock time in UTC, 24h.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay {
    pub hour: u32,
    pub minute: u32,
}

impl TimeOfDay {
    pub const fn new(hour: u32, minute: u32) -> Self {
        Self { hour, minute }
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for TimeOfDay {
    type Err = CronError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CronError::InvalidTimeOfDay(s.to_string());
        let (hour, minute) = s.trim().split_once(':').ok_or_else(invalid)?;
        let hour: u32 = hour.parse().map_err(|_| invalid())?;
        let minute: u32 = minute.parse().map_err(|_| invalid())?;
        if hour > 23 || minute > 59 {
            return Err(invalid());
        }
        Ok(Self { hour, minute })
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = CronError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

/// Structured recurrence description.
///
/// Only the fields relevant to `frequency` are read; the rest are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurrenceSpec {
    pub frequency: Frequency,
    /// Used by `Daily`, `Weekly` and `Monthly`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_of_day: Option<TimeOfDay>,
    /// Used by `EveryNMinutes` (1-59) and `EveryNHours` (1-23).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<i64>,
    /// 0 = Sunday. Used by `Weekly`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_week: Option<u32>,
    /// 1-31. Used by `Monthly`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_month: Option<u32>,
    /// Raw expression. Used by `Custom`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_expression: Option<String>,
}

impl RecurrenceSpec {
    fn with_frequency(frequency: Frequency) -> Self {
        Self {
            frequency,
            ..Self::default()
        }
    }

    pub fn every_minute() -> Self {
        Self::with_frequency(Frequency::EveryMinute)
    }

    pub fn every_n_minutes(interval: i64) -> Self {
        Self {
            interval: Some(interval),
            ..Self::with_frequency(Frequency::EveryNMinutes)
        }
    }

    pub fn every_n_hours(interval: i64) -> Self {
        Self {
            interval: Some(interval),
            ..Self::with_frequency(Frequency::EveryNHours)
        }
    }

    pub fn daily(time: TimeOfDay) -> Self {
        Self {
            time_of_day: Some(time),
            ..Self::with_frequency(Frequency::Daily)
        }
    }

    pub fn weekly(time: TimeOfDay, day_of_week: u32) -> Self {
        Self {
            time_of_day: Some(time),
            day_of_week: Some(day_of_week),
            ..Self::with_frequency(Frequency::Weekly)
        }
    }

    pub fn monthly(time: TimeOfDay, day_of_month: u32) -> Self {
        Self {
            time_of_day: Some(time),
            day_of_month: Some(day_of_month),
            ..Self::with_frequency(Frequency::Monthly)
        }
    }

    pub fn custom(expression: impl Into<String>) -> Self {
        Self {
            custom_expression: Some(expression.into()),
            ..Self::with_frequency(Frequency::Custom)
        }
    }

    /// Interval with the "absent or non-positive means 1" rule applied.
    pub fn effective_interval(&self) -> u32 {
        match self.interval {
            Some(n) if n > 0 => u32::try_from(n).unwrap_or(u32::MAX),
            _ => 1,
        }
    }

    /// Time of day, midnight when absent.
    pub fn effective_time(&self) -> TimeOfDay {
        self.time_of_day.unwrap_or_default()
    }

    pub fn effective_day_of_week(&self) -> u32 {
        self.day_of_week.unwrap_or(0)
    }

    pub fn effective_day_of_month(&self) -> u32 {
        self.day_of_month.unwrap_or(1)
    }
}

/// English day name, indexed 0 = Sunday.
pub fn day_name(day_of_week: u32) -> Option<&'static str> {
    const DAYS: [&str; 7] = [
        "Sunday",
        "Monday",
        "Tuesday",
        "Wednesday",
        "Thursday",
        "Friday",
        "Saturday",
    ];
    DAYS.get(day_of_week as usize).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_of_day_parse_and_display() {
        let t: TimeOfDay = "9:05".parse().unwrap();
        assert_eq!(t, TimeOfDay::new(9, 5));
        assert_eq!(t.to_string(), "09:05");
        assert!("24:00".parse::<TimeOfDay>().is_err());
        assert!("noon".parse::<TimeOfDay>().is_err());
    }

    #[test]
    fn test_effective_interval_defaults() {
        assert_eq!(RecurrenceSpec::every_n_minutes(0).effective_interval(), 1);
        assert_eq!(RecurrenceSpec::every_n_minutes(-4).effective_interval(), 1);
        assert_eq!(RecurrenceSpec::every_n_hours(6).effective_interval(), 6);
        let spec = RecurrenceSpec {
            frequency: Frequency::EveryNHours,
            ..RecurrenceSpec::default()
        };
        assert_eq!(spec.effective_interval(), 1);
    }

    #[test]
    fn test_recurrence_spec_serde() {
        let spec = RecurrenceSpec::weekly(TimeOfDay::new(9, 0), 1);
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"frequency": "weekly", "timeOfDay": "09:00", "dayOfWeek": 1})
        );

        let parsed: RecurrenceSpec =
            serde_json::from_str(r#"{"frequency":"everyNMinutes","interval":15}"#).unwrap();
        assert_eq!(parsed, RecurrenceSpec::every_n_minutes(15));
    }

    #[test]
    fn test_day_name() {
        assert_eq!(day_name(0), Some("Sunday"));
        assert_eq!(day_name(6), Some("Saturday"));
        assert_eq!(day_name(7), None);
    }
}
