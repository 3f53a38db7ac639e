//! Upcoming fire times for a cron expression.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule;

use crate::{CronError, Frequency, RecurrenceSpec, parse};

const WEEKDAY_ABBREVIATIONS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// Return the next `count` fire times strictly after `after`, in UTC.
///
/// Weekdays are handed to the `cron` crate by name, since it numbers them
/// from 1 = Sunday. Numeric weekdays in custom expressions (0 or 7 = Sunday,
/// lists, ranges and steps) are rewritten the same way.
pub fn upcoming(
    expression: &str,
    after: DateTime<Utc>,
    count: usize,
) -> Result<Vec<DateTime<Utc>>, CronError> {
    let unschedulable = |reason: String| CronError::Unschedulable {
        expression: expression.to_string(),
        reason,
    };
    let spec = parse(expression)?;
    let six_field = to_six_field(&spec).map_err(unschedulable)?;
    let schedule = Schedule::from_str(&six_field).map_err(|e| unschedulable(e.to_string()))?;
    Ok(schedule.after(&after).take(count).collect())
}

fn to_six_field(spec: &RecurrenceSpec) -> Result<String, String> {
    let time = spec.effective_time();
    let six_field = match spec.frequency {
        Frequency::EveryMinute => "0 * * * * *".to_string(),
        Frequency::EveryNMinutes => format!("0 */{} * * * *", spec.effective_interval()),
        Frequency::EveryNHours => format!("0 0 */{} * * *", spec.effective_interval()),
        Frequency::Daily => format!("0 {} {} * * *", time.minute, time.hour),
        Frequency::Weekly => {
            let day = WEEKDAY_ABBREVIATIONS
                .get(spec.effective_day_of_week() as usize)
                .copied()
                .unwrap_or("Sun");
            format!("0 {} {} * * {day}", time.minute, time.hour)
        }
        Frequency::Monthly => format!(
            "0 {} {} {} * *",
            time.minute,
            time.hour,
            spec.effective_day_of_month()
        ),
        Frequency::Custom => {
            let mut fields: Vec<&str> = spec
                .custom_expression
                .as_deref()
                .unwrap_or_default()
                .split_whitespace()
                .collect();
            let day_of_week = fields.pop().ok_or("empty expression")?;
            format!("0 {} {}", fields.join(" "), named_weekdays(day_of_week)?)
        }
    };
    Ok(six_field)
}

/// Rewrite a day-of-week field with weekday names, expanding numeric ranges.
fn named_weekdays(field: &str) -> Result<String, String> {
    let items = field
        .split(',')
        .map(named_weekday_item)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(items.join(","))
}

fn named_weekday_item(item: &str) -> Result<String, String> {
    let (base, step) = match item.split_once('/') {
        Some((base, step)) => (base, Some(step)),
        None => (item, None),
    };
    // `*`, `*/N` and names mean the same to the `cron` crate.
    if base == "*" || !base.bytes().any(|b| b.is_ascii_digit()) {
        return Ok(item.to_string());
    }

    let (start, end) = match base.split_once('-') {
        Some((start, end)) => (weekday_number(start)?, weekday_number(end)?),
        None => {
            let day = weekday_number(base)?;
            (day, if step.is_some() { 6 } else { day })
        }
    };
    if start > end {
        return Err(format!("descending day-of-week range {base:?}"));
    }
    let step = match step {
        Some(step) => step
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| format!("invalid day-of-week step {step:?}"))?,
        None => 1,
    };
    let days: Vec<&str> = (start..=end)
        .step_by(step)
        .map(|day| WEEKDAY_ABBREVIATIONS[day % 7])
        .collect();
    Ok(days.join(","))
}

fn weekday_number(token: &str) -> Result<usize, String> {
    token
        .parse::<usize>()
        .ok()
        .filter(|day| *day <= 7)
        .ok_or_else(|| format!("invalid day of week {token:?}"))
}
