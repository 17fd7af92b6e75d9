//! Five-field cron expressions
//!
//! Supports `minute hour day-of-month month day-of-week` with `*`, lists,
//! ranges, steps and three-letter month and weekday names. When both day
//! fields are restricted a day matches if either one does.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Timelike, Utc};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const MONTH_NAMES: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];
const WEEKDAY_NAMES: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

/// Years searched by [`CronSchedule::next_after`] before giving up.
const SEARCH_YEARS: i32 = 5;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid cron expression {expression:?}: {message}")]
pub struct CronError {
    pub expression: String,
    pub message: String,
}

/// A parsed cron expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    expression: String,
    minutes: u64,
    hours: u64,
    days_of_month: u64,
    months: u64,
    days_of_week: u64,
    dom_restricted: bool,
    dow_restricted: bool,
}

struct FieldSpec {
    name: &'static str,
    min: u32,
    max: u32,
    names: &'static [&'static str],
    /// Value the first name maps to
    name_offset: u32,
}

const MINUTE: FieldSpec = FieldSpec {
    name: "minute",
    min: 0,
    max: 59,
    names: &[],
    name_offset: 0,
};
const HOUR: FieldSpec = FieldSpec {
    name: "hour",
    min: 0,
    max: 23,
    names: &[],
    name_offset: 0,
};
const DAY_OF_MONTH: FieldSpec = FieldSpec {
    name: "day-of-month",
    min: 1,
    max: 31,
    names: &[],
    name_offset: 0,
};
const MONTH: FieldSpec = FieldSpec {
    name: "month",
    min: 1,
    max: 12,
    names: &MONTH_NAMES,
    name_offset: 1,
};
// 7 is accepted as an alias for Sunday and folded onto 0 after parsing
const DAY_OF_WEEK: FieldSpec = FieldSpec {
    name: "day-of-week",
    min: 0,
    max: 7,
    names: &WEEKDAY_NAMES,
    name_offset: 0,
};

impl CronSchedule {
    pub fn parse(expression: &str) -> Result<Self, CronError> {
        let error = |message: String| CronError {
            expression: expression.to_string(),
            message,
        };

        let fields: Vec<&str> = expression.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(error(format!("expected 5 fields, found {}", fields.len())));
        }

        let minutes = parse_field(fields[0], &MINUTE).map_err(error)?;
        let hours = parse_field(fields[1], &HOUR).map_err(error)?;
        let days_of_month = parse_field(fields[2], &DAY_OF_MONTH).map_err(error)?;
        let months = parse_field(fields[3], &MONTH).map_err(error)?;
        let mut days_of_week = parse_field(fields[4], &DAY_OF_WEEK).map_err(error)?;
        if days_of_week & (1 << 7) != 0 {
            days_of_week = (days_of_week & !(1 << 7)) | 1;
        }

        Ok(Self {
            expression: expression.to_string(),
            minutes,
            hours,
            days_of_month,
            months,
            days_of_week,
            dom_restricted: !fields[2].starts_with('*'),
            dow_restricted: !fields[4].starts_with('*'),
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Whether the schedule fires at the minute containing `time`.
    pub fn matches(&self, time: &DateTime<Utc>) -> bool {
        let naive = time.naive_utc();
        bit(self.months, naive.month())
            && self.day_matches(naive.date())
            && bit(self.hours, naive.hour())
            && bit(self.minutes, naive.minute())
    }

    /// Returns the first fire time strictly after `after`, or `None` when the
    /// expression cannot fire within the next few years (e.g. `0 0 30 2 *`).
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let start = after.naive_utc().with_second(0)?.with_nanosecond(0)? + Duration::minutes(1);
        let limit_year = start.year() + SEARCH_YEARS;
        let mut t = start;

        while t.year() <= limit_year {
            if !bit(self.months, t.month()) {
                t = first_of_next_month(t.date())?.and_hms_opt(0, 0, 0)?;
                continue;
            }
            if !self.day_matches(t.date()) {
                t = t.date().succ_opt()?.and_hms_opt(0, 0, 0)?;
                continue;
            }
            if !bit(self.hours, t.hour()) {
                t = truncate_to_hour(t)? + Duration::hours(1);
                continue;
            }
            if !bit(self.minutes, t.minute()) {
                t += Duration::minutes(1);
                continue;
            }
            return Some(t.and_utc());
        }
        None
    }

    fn day_matches(&self, date: NaiveDate) -> bool {
        let dom = bit(self.days_of_month, date.day());
        let dow = bit(self.days_of_week, date.weekday().num_days_from_sunday());
        if self.dom_restricted && self.dow_restricted {
            dom || dow
        } else {
            dom && dow
        }
    }
}

impl FromStr for CronSchedule {
    type Err = CronError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CronSchedule::parse(s)
    }
}

impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

fn bit(mask: u64, value: u32) -> bool {
    mask & (1u64 << value) != 0
}

fn truncate_to_hour(t: NaiveDateTime) -> Option<NaiveDateTime> {
    t.with_minute(0)?.with_second(0)
}

fn first_of_next_month(date: NaiveDate) -> Option<NaiveDate> {
    if date.month() == 12 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
    }
}

fn parse_field(field: &str, spec: &FieldSpec) -> Result<u64, String> {
    let mut mask = 0u64;
    for part in field.split(',') {
        if part.is_empty() {
            return Err(format!("empty list item in {} field", spec.name));
        }

        let (range, step) = match part.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step
                    .parse()
                    .map_err(|_| format!("invalid step {step:?} in {} field", spec.name))?;
                if step == 0 {
                    return Err(format!("step must be positive in {} field", spec.name));
                }
                (range, Some(step))
            }
            None => (part, None),
        };

        let (start, end) = if range == "*" {
            (spec.min, spec.max)
        } else if let Some((a, b)) = range.split_once('-') {
            (parse_value(a, spec)?, parse_value(b, spec)?)
        } else {
            let value = parse_value(range, spec)?;
            // "5/15" means every 15 starting at 5
            (value, if step.is_some() { spec.max } else { value })
        };

        if start > end {
            return Err(format!(
                "range {start}-{end} is reversed in {} field",
                spec.name
            ));
        }

        let step = step.unwrap_or(1) as usize;
        for value in (start..=end).step_by(step) {
            mask |= 1u64 << value;
        }
    }
    Ok(mask)
}

fn parse_value(raw: &str, spec: &FieldSpec) -> Result<u32, String> {
    let upper = raw.to_ascii_uppercase();
    let value = match spec.names.iter().position(|name| *name == upper) {
        Some(index) => index as u32 + spec.name_offset,
        None => raw
            .parse::<u32>()
            .map_err(|_| format!("invalid value {raw:?} in {} field", spec.name))?,
    };

    if value < spec.min || value > spec.max {
        return Err(format!(
            "value {value} out of range {}-{} in {} field",
            spec.min, spec.max, spec.name
        ));
    }
    Ok(value)
}
