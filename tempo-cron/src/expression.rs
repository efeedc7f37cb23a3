//! Cron expression parsing and evaluation.

use crate::clock::TimeComponents;
use crate::error::ScheduleError;
use crate::field::{FieldKind, FieldSpec};
use crate::names;
use std::fmt;
use std::str::FromStr;

/// A fully parsed five-field schedule.
///
/// Only a successful parse (or one of the builders, which go through the same
/// validation) produces a value of this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpression {
    fields: [FieldSpec; 5],
    expression: String,
}

/// Parse `text` into a schedule. Same as [`CronExpression::parse`].
pub fn parse_cron_expression(text: &str) -> Result<CronExpression, ScheduleError> {
    CronExpression::parse(text)
}

impl CronExpression {
    /// Parse a cron expression.
    ///
    /// Exactly five fields separated by single spaces:
    /// - Minute (0-59), steps allowed
    /// - Hour (0-23), steps allowed
    /// - Day of month (1-31)
    /// - Month (1-12 or JAN-DEC)
    /// - Day of week (0-6 or SUN-SAT, Sunday = 0)
    ///
    /// # Examples
    ///
    /// ```
    /// use tempo_cron::CronExpression;
    ///
    /// // Every 15 minutes during working hours, Monday to Friday
    /// let expr = CronExpression::parse("*/15 9-17 * * MON-FRI").unwrap();
    /// assert_eq!(expr.expression(), "*/15 9-17 * * MON-FRI");
    ///
    /// // Steps are only valid for minutes and hours
    /// assert!(CronExpression::parse("* * */2 * *").is_err());
    /// ```
    pub fn parse(expression: &str) -> Result<Self, ScheduleError> {
        let expression = expression.trim();
        let parts: Vec<&str> = expression.split(' ').collect();

        if parts.len() != 5 || parts.iter().any(|part| part.is_empty()) {
            return Err(ScheduleError::FieldCount {
                expression: expression.to_string(),
                found: parts.iter().filter(|part| !part.is_empty()).count(),
            });
        }

        let minute = FieldSpec::parse(parts[0], FieldKind::Minute)?;
        let hour = FieldSpec::parse(parts[1], FieldKind::Hour)?;
        let day_of_month = FieldSpec::parse(parts[2], FieldKind::DayOfMonth)?;
        let month = FieldSpec::parse(parts[3], FieldKind::Month)?;
        let day_of_week = FieldSpec::parse(parts[4], FieldKind::DayOfWeek)?;

        Ok(Self {
            fields: [minute, hour, day_of_month, month, day_of_week],
            expression: expression.to_string(),
        })
    }

    /// `* * * * *`
    pub fn every_minute() -> Self {
        Self {
            fields: FieldKind::ALL.map(FieldSpec::any),
            expression: CronPresets::EVERY_MINUTE.to_string(),
        }
    }

    /// `0 * * * *`
    pub fn every_hour() -> Result<Self, ScheduleError> {
        Self::parse(CronPresets::EVERY_HOUR)
    }

    /// Every day at `hour:minute`.
    pub fn daily_at(hour: u8, minute: u8) -> Result<Self, ScheduleError> {
        check_bound(FieldKind::Hour, hour)?;
        check_bound(FieldKind::Minute, minute)?;
        Self::parse(&format!("{} {} * * *", minute, hour))
    }

    /// Every month on `day` at `time` (`HH:MM`).
    pub fn every_month_on(day: u8, time: &str) -> Result<Self, ScheduleError> {
        check_bound(FieldKind::DayOfMonth, day)?;
        let (hour, minute) = parse_time(time)?;
        Self::parse(&format!("{} {} {} * *", minute, hour, day))
    }

    /// Once a year, in `month` (name or number) on `day` at `time` (`HH:MM`).
    pub fn on_month(month: &str, day: u8, time: &str) -> Result<Self, ScheduleError> {
        let month = resolve_argument(FieldKind::Month, month)?;
        check_bound(FieldKind::DayOfMonth, day)?;
        let (hour, minute) = parse_time(time)?;
        Self::parse(&format!("{} {} {} {} *", minute, hour, day, month))
    }

    /// Every week on `day` (name or number, Sunday = 0) at `time` (`HH:MM`).
    pub fn weekly_on(day: &str, time: &str) -> Result<Self, ScheduleError> {
        let day = resolve_argument(FieldKind::DayOfWeek, day)?;
        let (hour, minute) = parse_time(time)?;
        Self::parse(&format!("{} {} * * {}", minute, hour, day))
    }

    /// The expression string as given, trimmed.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn field(&self, kind: FieldKind) -> &FieldSpec {
        &self.fields[kind as usize]
    }

    /// Whether all five fields match `now`.
    ///
    /// Day of month and day of week are combined with AND like every other
    /// field. POSIX cron would OR them when both are restricted; this does not.
    pub fn is_due(&self, now: &TimeComponents) -> bool {
        self.is_minute(now.minute)
            && self.is_hour(now.hour)
            && self.is_day_of_month(now.day_of_month)
            && self.is_month(now.month)
            && self.is_day_of_week(now.day_of_week)
    }

    pub fn is_minute(&self, minute: u8) -> bool {
        self.field(FieldKind::Minute).matches(minute)
    }

    pub fn is_hour(&self, hour: u8) -> bool {
        self.field(FieldKind::Hour).matches(hour)
    }

    pub fn is_day_of_month(&self, day: u8) -> bool {
        self.field(FieldKind::DayOfMonth).matches(day)
    }

    pub fn is_month(&self, month: u8) -> bool {
        self.field(FieldKind::Month).matches(month)
    }

    pub fn is_day_of_week(&self, day: u8) -> bool {
        self.field(FieldKind::DayOfWeek).matches(day)
    }
}

impl Default for CronExpression {
    fn default() -> Self {
        Self::every_minute()
    }
}

impl FromStr for CronExpression {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for CronExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

fn check_bound(kind: FieldKind, value: u8) -> Result<(), ScheduleError> {
    if kind.contains(value) {
        Ok(())
    } else {
        let (min, max) = kind.bounds();
        Err(ScheduleError::InvalidArgument(format!(
            "{} {} is outside {}-{}",
            kind, value, min, max
        )))
    }
}

fn resolve_argument(kind: FieldKind, value: &str) -> Result<u8, ScheduleError> {
    let value = value.trim();
    let resolved = match kind {
        FieldKind::Month => names::month_number(value),
        FieldKind::DayOfWeek => names::weekday_number(value),
        _ => None,
    };
    let number = match resolved {
        Some(number) => number,
        None => parse_small(value).ok_or_else(|| {
            ScheduleError::InvalidArgument(format!("unknown {} '{}'", kind, value))
        })?,
    };
    check_bound(kind, number)?;
    Ok(number)
}

fn parse_small(text: &str) -> Option<u8> {
    if text.is_empty() || text.len() > 2 || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// Parse `HH:MM` into `(hour, minute)`.
fn parse_time(time: &str) -> Result<(u8, u8), ScheduleError> {
    let invalid = || ScheduleError::InvalidArgument(format!("time '{}' is not HH:MM", time));

    let (hour, minute) = time.trim().split_once(':').ok_or_else(invalid)?;
    let hour = parse_small(hour).ok_or_else(invalid)?;
    let minute = parse_small(minute).ok_or_else(invalid)?;

    check_bound(FieldKind::Hour, hour)?;
    check_bound(FieldKind::Minute, minute)?;
    Ok((hour, minute))
}

/// Common five-field expressions.
pub struct CronPresets;

impl CronPresets {
    /// Every minute
    pub const EVERY_MINUTE: &'static str = "* * * * *";

    /// Every 5 minutes
    pub const EVERY_5_MINUTES: &'static str = "*/5 * * * *";

    /// Every 15 minutes
    pub const EVERY_15_MINUTES: &'static str = "*/15 * * * *";

    /// Every 30 minutes
    pub const EVERY_30_MINUTES: &'static str = "*/30 * * * *";

    /// Every hour, on the hour
    pub const EVERY_HOUR: &'static str = "0 * * * *";

    /// Every day at midnight
    pub const DAILY: &'static str = "0 0 * * *";

    /// Every Sunday at midnight
    pub const WEEKLY: &'static str = "0 0 * * SUN";

    /// The 1st of every month at midnight
    pub const MONTHLY: &'static str = "0 0 1 * *";

    /// January 1st at midnight
    pub const YEARLY: &'static str = "0 0 1 JAN *";

    /// Monday to Friday at 9 AM
    pub const WEEKDAYS_9AM: &'static str = "0 9 * * MON-FRI";

    /// Saturday and Sunday at 10 AM
    pub const WEEKENDS_10AM: &'static str = "0 10 * * SAT,SUN";
}
