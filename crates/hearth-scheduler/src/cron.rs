// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! 5-field cron expression parser and next-run solver.
//!
//! Fields: minute (0-59), hour (0-23), day-of-month (1-31), month (1-12),
//! day-of-week (0-6, 0 = Sunday). Each field is `*`, a literal, a range
//! `N-M`, a stepped range `N-M/S` or `*/S`, or a comma list of those.
//!
//! Day matching follows standard cron OR-semantics: when both day-of-month
//! and day-of-week are restricted (neither is `*`), a candidate matches if
//! either field matches; otherwise both must match individually.

use std::collections::BTreeSet;

use chrono::{Datelike, Duration, NaiveDateTime, Timelike};

use hearth_core::HearthError;

/// How far ahead the solver scans before giving up.
const SEARCH_WINDOW_DAYS: i64 = 366;

/// A parsed cron expression: a set of legal values per field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpr {
    minutes: BTreeSet<u32>,
    hours: BTreeSet<u32>,
    days_of_month: BTreeSet<u32>,
    months: BTreeSet<u32>,
    days_of_week: BTreeSet<u32>,
    dom_is_wildcard: bool,
    dow_is_wildcard: bool,
    source: String,
}

impl CronExpr {
    /// Parses a 5-field expression.
    pub fn parse(expr: &str) -> Result<Self, HearthError> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(HearthError::Scheduler(format!(
                "cron expression must have 5 fields, got {}: '{expr}'",
                fields.len()
            )));
        }

        let (minutes, _) = parse_field(fields[0], 0, 59, "minute")?;
        let (hours, _) = parse_field(fields[1], 0, 23, "hour")?;
        let (days_of_month, dom_is_wildcard) = parse_field(fields[2], 1, 31, "day-of-month")?;
        let (months, _) = parse_field(fields[3], 1, 12, "month")?;
        let (days_of_week, dow_is_wildcard) = parse_field(fields[4], 0, 6, "day-of-week")?;

        Ok(Self {
            minutes,
            hours,
            days_of_month,
            months,
            days_of_week,
            dom_is_wildcard,
            dow_is_wildcard,
            source: fields.join(" "),
        })
    }

    /// The normalized source text of this expression.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether the given instant (truncated to the minute) matches.
    pub fn matches(&self, t: NaiveDateTime) -> bool {
        self.months.contains(&t.month())
            && self.hours.contains(&t.hour())
            && self.minutes.contains(&t.minute())
            && self.day_matches(t)
    }

    fn day_matches(&self, t: NaiveDateTime) -> bool {
        let dom = self.days_of_month.contains(&t.day());
        let dow = self
            .days_of_week
            .contains(&t.weekday().num_days_from_sunday());
        if !self.dom_is_wildcard && !self.dow_is_wildcard {
            dom || dow
        } else {
            dom && dow
        }
    }

    /// First matching instant strictly after `after`, scanning minute by
    /// minute up to 366 days ahead.
    pub fn next_run(&self, after: NaiveDateTime) -> Result<NaiveDateTime, HearthError> {
        let mut candidate = after
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(after)
            + Duration::minutes(1);
        let end = after + Duration::days(SEARCH_WINDOW_DAYS);

        while candidate <= end {
            if self.matches(candidate) {
                return Ok(candidate);
            }
            candidate += Duration::minutes(1);
        }
        Err(HearthError::Scheduler(format!(
            "no matching time within {SEARCH_WINDOW_DAYS} days for '{}'",
            self.source
        )))
    }

    /// Human-readable phrase, e.g. "At 08:00, Monday through Friday".
    /// Informational, not behavior-defining.
    pub fn describe(&self) -> String {
        let mut parts = vec![self.describe_time()];
        if let Some(days) = self.describe_days_of_week() {
            parts.push(days);
        }
        if let Some(dom) = self.describe_days_of_month() {
            parts.push(dom);
        }
        if let Some(months) = self.describe_months() {
            parts.push(months);
        }
        parts.join(", ")
    }

    fn describe_time(&self) -> String {
        let all_minutes = self.minutes.len() == 60;
        let all_hours = self.hours.len() == 24;
        match (self.minutes.len(), self.hours.len()) {
            (1, 1) => {
                let minute = *self.minutes.iter().next().unwrap_or(&0);
                let hour = *self.hours.iter().next().unwrap_or(&0);
                format!("At {hour:02}:{minute:02}")
            }
            (1, _) if all_hours => {
                let minute = *self.minutes.iter().next().unwrap_or(&0);
                format!("At minute {minute} of every hour")
            }
            _ if all_minutes && all_hours => "Every minute".to_string(),
            _ if all_minutes => "Every minute of selected hours".to_string(),
            _ => "At selected times".to_string(),
        }
    }

    fn describe_days_of_week(&self) -> Option<String> {
        if self.dow_is_wildcard {
            return None;
        }
        const NAMES: [&str; 7] = [
            "Sunday",
            "Monday",
            "Tuesday",
            "Wednesday",
            "Thursday",
            "Friday",
            "Saturday",
        ];
        let days: Vec<u32> = self.days_of_week.iter().copied().collect();
        if days.len() == 1 {
            return Some(NAMES[days[0] as usize].to_string());
        }
        let contiguous = days.windows(2).all(|w| w[1] == w[0] + 1);
        if contiguous {
            let first = NAMES[days[0] as usize];
            let last = NAMES[days[days.len() - 1] as usize];
            Some(format!("{first} through {last}"))
        } else {
            let names: Vec<&str> = days.iter().map(|d| NAMES[*d as usize]).collect();
            Some(names.join(", "))
        }
    }

    fn describe_days_of_month(&self) -> Option<String> {
        if self.dom_is_wildcard {
            return None;
        }
        let days: Vec<String> = self.days_of_month.iter().map(|d| d.to_string()).collect();
        Some(format!("on day {} of the month", days.join(", ")))
    }

    fn describe_months(&self) -> Option<String> {
        if self.months.len() == 12 {
            return None;
        }
        const NAMES: [&str; 12] = [
            "January",
            "February",
            "March",
            "April",
            "May",
            "June",
            "July",
            "August",
            "September",
            "October",
            "November",
            "December",
        ];
        let names: Vec<&str> = self
            .months
            .iter()
            .map(|m| NAMES[(*m - 1) as usize])
            .collect();
        Some(format!("in {}", names.join(", ")))
    }
}

impl std::fmt::Display for CronExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

/// Parses one field into its set of legal values. The wildcard flag is true
/// only for a bare `*`, which is what the day-matching OR rule keys on.
fn parse_field(
    text: &str,
    min: u32,
    max: u32,
    field: &str,
) -> Result<(BTreeSet<u32>, bool), HearthError> {
    let mut values = BTreeSet::new();
    for part in text.split(',') {
        parse_part(part, min, max, field, &mut values)?;
    }
    Ok((values, text == "*"))
}

fn parse_part(
    part: &str,
    min: u32,
    max: u32,
    field: &str,
    values: &mut BTreeSet<u32>,
) -> Result<(), HearthError> {
    let invalid = |detail: String| HearthError::Scheduler(format!("invalid cron {field} field '{part}': {detail}"));

    let (range_text, step) = match part.split_once('/') {
        Some((range_text, step_text)) => {
            let step: u32 = step_text
                .parse()
                .map_err(|_| invalid(format!("bad step '{step_text}'")))?;
            if step == 0 {
                return Err(invalid("step must be >= 1".into()));
            }
            (range_text, step)
        }
        None => (part, 1),
    };

    let (start, end) = if range_text == "*" {
        (min, max)
    } else if let Some((start_text, end_text)) = range_text.split_once('-') {
        let start: u32 = start_text
            .parse()
            .map_err(|_| invalid(format!("bad number '{start_text}'")))?;
        let end: u32 = end_text
            .parse()
            .map_err(|_| invalid(format!("bad number '{end_text}'")))?;
        if start > end {
            return Err(invalid(format!("range start {start} exceeds end {end}")));
        }
        (start, end)
    } else {
        let value: u32 = range_text
            .parse()
            .map_err(|_| invalid(format!("bad number '{range_text}'")))?;
        (value, value)
    };

    if start < min || end > max {
        return Err(invalid(format!("values must be within {min}-{max}")));
    }

    let mut v = start;
    while v <= end {
        values.insert(v);
        v += step;
    }
    Ok(())
}
