//! Cron expression parsing, generation and description.

use std::fmt;
use std::str::FromStr;

use crate::{CronError, Frequency, RecurrenceSpec, TimeOfDay, day_name};

/// One field of a cron expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CronField {
    /// `*`
    Any,
    /// `*/N`, N > 0
    Step(u32),
    /// A literal non-negative integer.
    Value(u32),
    /// Anything else (lists, ranges, names). Only representable via `Custom`.
    Other(String),
}

impl CronField {
    fn parse(token: &str) -> Self {
        if token == "*" {
            return CronField::Any;
        }
        if let Some(step) = token.strip_prefix("*/") {
            return match parse_digits(step) {
                Some(n) if n > 0 => CronField::Step(n),
                _ => CronField::Other(token.to_string()),
            };
        }
        match parse_digits(token) {
            Some(n) => CronField::Value(n),
            None => CronField::Other(token.to_string()),
        }
    }

    fn is_any(&self) -> bool {
        matches!(self, CronField::Any)
    }

    fn value_in(&self, min: u32, max: u32) -> Option<u32> {
        match *self {
            CronField::Value(n) if (min..=max).contains(&n) => Some(n),
            _ => None,
        }
    }

    fn step_in(&self, min: u32, max: u32) -> Option<u32> {
        match *self {
            CronField::Step(n) if (min..=max).contains(&n) => Some(n),
            _ => None,
        }
    }
}

fn parse_digits(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// A five-field cron expression split into typed fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpression {
    pub minute: CronField,
    pub hour: CronField,
    pub day_of_month: CronField,
    pub month: CronField,
    pub day_of_week: CronField,
    source: String,
}

impl CronExpression {
    /// The expression exactly as it was given.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl FromStr for CronExpression {
    type Err = CronError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = s.split_whitespace().collect();
        let &[minute, hour, day_of_month, month, day_of_week] = tokens.as_slice() else {
            return Err(CronError::InvalidCronExpression {
                expression: s.to_string(),
                fields: tokens.len(),
            });
        };
        Ok(Self {
            minute: CronField::parse(minute),
            hour: CronField::parse(hour),
            day_of_month: CronField::parse(day_of_month),
            month: CronField::parse(month),
            day_of_week: CronField::parse(day_of_week),
            source: s.to_string(),
        })
    }
}

impl fmt::Display for CronExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

type Matcher = fn(&CronExpression) -> Option<RecurrenceSpec>;

/// Structured shapes in priority order. The first three also satisfy the
/// "day-of-month and day-of-week both `*`" test, so they must come first.
const MATCHERS: &[Matcher] = &[
    match_every_minute,
    match_every_n_minutes,
    match_every_n_hours,
    match_daily,
    match_weekly,
    match_monthly,
];

fn match_every_minute(cron: &CronExpression) -> Option<RecurrenceSpec> {
    let all_any = [
        &cron.minute,
        &cron.hour,
        &cron.day_of_month,
        &cron.month,
        &cron.day_of_week,
    ]
    .iter()
    .all(|f| f.is_any());
    all_any.then(RecurrenceSpec::every_minute)
}

fn match_every_n_minutes(cron: &CronExpression) -> Option<RecurrenceSpec> {
    let n = cron.minute.step_in(1, 59)?;
    let rest_any = cron.hour.is_any() && date_fields_any(cron);
    rest_any.then(|| RecurrenceSpec::every_n_minutes(n.into()))
}

fn match_every_n_hours(cron: &CronExpression) -> Option<RecurrenceSpec> {
    cron.minute.value_in(0, 0)?;
    let n = cron.hour.step_in(1, 23)?;
    date_fields_any(cron).then(|| RecurrenceSpec::every_n_hours(n.into()))
}

fn match_daily(cron: &CronExpression) -> Option<RecurrenceSpec> {
    let time = time_of(cron)?;
    date_fields_any(cron).then(|| RecurrenceSpec::daily(time))
}

fn match_weekly(cron: &CronExpression) -> Option<RecurrenceSpec> {
    let time = time_of(cron)?;
    let dow = cron.day_of_week.value_in(0, 6)?;
    (cron.day_of_month.is_any() && cron.month.is_any())
        .then(|| RecurrenceSpec::weekly(time, dow))
}

fn match_monthly(cron: &CronExpression) -> Option<RecurrenceSpec> {
    let time = time_of(cron)?;
    let dom = cron.day_of_month.value_in(1, 31)?;
    (cron.month.is_any() && cron.day_of_week.is_any())
        .then(|| RecurrenceSpec::monthly(time, dom))
}

fn date_fields_any(cron: &CronExpression) -> bool {
    cron.day_of_month.is_any() && cron.month.is_any() && cron.day_of_week.is_any()
}

fn time_of(cron: &CronExpression) -> Option<TimeOfDay> {
    let minute = cron.minute.value_in(0, 59)?;
    let hour = cron.hour.value_in(0, 23)?;
    Some(TimeOfDay::new(hour, minute))
}

/// Classify a cron string into a [`RecurrenceSpec`].
///
/// Fails only when the field count is not exactly five. Anything that does
/// not fit a structured shape comes back as `Custom` with the input verbatim.
pub fn parse(cron: &str) -> Result<RecurrenceSpec, CronError> {
    let expr: CronExpression = cron.parse()?;
    let spec = MATCHERS
        .iter()
        .find_map(|matcher| matcher(&expr))
        .unwrap_or_else(|| RecurrenceSpec::custom(cron));
    tracing::trace!(cron, frequency = ?spec.frequency, "Classified cron expression");
    Ok(spec)
}

/// Render a [`RecurrenceSpec`] as a cron string.
pub fn generate(spec: &RecurrenceSpec) -> String {
    let time = spec.effective_time();
    match spec.frequency {
        Frequency::EveryMinute => "* * * * *".to_string(),
        Frequency::EveryNMinutes => format!("*/{} * * * *", spec.effective_interval()),
        Frequency::EveryNHours => format!("0 */{} * * *", spec.effective_interval()),
        Frequency::Daily => format!("{} {} * * *", time.minute, time.hour),
        Frequency::Weekly => format!(
            "{} {} * * {}",
            time.minute,
            time.hour,
            spec.effective_day_of_week()
        ),
        Frequency::Monthly => format!(
            "{} {} {} * *",
            time.minute,
            time.hour,
            spec.effective_day_of_month()
        ),
        Frequency::Custom => spec.custom_expression.clone().unwrap_or_default(),
    }
}

/// Human-readable sentence for a cron string, e.g. "Daily at 02:00 UTC".
pub fn describe(cron: &str) -> Result<String, CronError> {
    let spec = parse(cron)?;
    let time = spec.effective_time();
    let text = match spec.frequency {
        Frequency::EveryMinute => "Every minute".to_string(),
        Frequency::EveryNMinutes => format!("Every {} minute(s)", spec.effective_interval()),
        Frequency::EveryNHours => format!("Every {} hour(s)", spec.effective_interval()),
        Frequency::Daily => format!("Daily at {time} UTC"),
        Frequency::Weekly => format!(
            "Weekly on {} at {time} UTC",
            day_name(spec.effective_day_of_week()).unwrap_or("Sunday")
        ),
        Frequency::Monthly => format!(
            "Monthly on day {} at {time} UTC",
            spec.effective_day_of_month()
        ),
        Frequency::Custom => "Custom schedule".to_string(),
    };
    Ok(text)
}
