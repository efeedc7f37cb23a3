//! Per-field parsing and matching.
//!
//! A cron field is a comma-separated list of tokens. Each token is first
//! classified by shape ([`classify`]) and then validated against the rules of
//! the field it appears in ([`FieldKind`]). The result is an immutable
//! [`FieldSpec`] that answers "does this value match?".

use crate::error::ScheduleError;
use crate::names;
use std::collections::BTreeSet;
use std::fmt;

/// The five positions of a cron expression, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldKind {
    Minute,
    Hour,
    DayOfMonth,
    Month,
    DayOfWeek,
}

impl FieldKind {
    /// All fields in expression order.
    pub const ALL: [FieldKind; 5] = [
        FieldKind::Minute,
        FieldKind::Hour,
        FieldKind::DayOfMonth,
        FieldKind::Month,
        FieldKind::DayOfWeek,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Minute => "minute",
            FieldKind::Hour => "hour",
            FieldKind::DayOfMonth => "day-of-month",
            FieldKind::Month => "month",
            FieldKind::DayOfWeek => "day-of-week",
        }
    }

    /// Inclusive lower and upper bound.
    pub fn bounds(&self) -> (u8, u8) {
        match self {
            FieldKind::Minute => (0, 59),
            FieldKind::Hour => (0, 23),
            FieldKind::DayOfMonth => (1, 31),
            FieldKind::Month => (1, 12),
            FieldKind::DayOfWeek => (0, 6),
        }
    }

    /// Only minutes and hours take `a/b` step tokens.
    pub fn allows_step(&self) -> bool {
        matches!(self, FieldKind::Minute | FieldKind::Hour)
    }

    pub fn contains(&self, value: u8) -> bool {
        let (min, max) = self.bounds();
        (min..=max).contains(&value)
    }

    /// Resolve a number or, for month and day-of-week, a three-letter name.
    /// Bounds are not checked here.
    fn resolve(&self, text: &str) -> Option<u8> {
        if let Some(number) = parse_number(text) {
            return Some(number);
        }
        match self {
            FieldKind::Month => names::month_number(text),
            FieldKind::DayOfWeek => names::weekday_number(text),
            _ => None,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Shape of one comma-separated token, before any field rules apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubExpression<'a> {
    /// `*`
    Wildcard,
    /// `a/b`
    Step(&'a str, &'a str),
    /// `a-b`
    Range(&'a str, &'a str),
    /// A single value or name.
    Specific(&'a str),
    /// Empty token.
    Invalid,
}

/// Classify a token by shape.
///
/// `/` is looked for before `-`, so `1-5/2` is a step whose left side is
/// `1-5`.
pub fn classify(token: &str) -> SubExpression<'_> {
    if token == "*" {
        return SubExpression::Wildcard;
    }
    if let Some((left, right)) = token.split_once('/') {
        if !left.is_empty() && !right.is_empty() {
            return SubExpression::Step(left, right);
        }
    }
    if let Some((start, end)) = token.split_once('-') {
        if !start.is_empty() && !end.is_empty() {
            return SubExpression::Range(start, end);
        }
    }
    if token.is_empty() {
        SubExpression::Invalid
    } else {
        SubExpression::Specific(token)
    }
}

fn parse_number(text: &str) -> Option<u8> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse::<u8>().ok()
}

/// Parsed form of a single field. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    kind: FieldKind,
    match_any: bool,
    specific_values: BTreeSet<u8>,
    ranges: Vec<(u8, u8)>,
    step_divisors: BTreeSet<u8>,
    step_hits: BTreeSet<u8>,
}

impl FieldSpec {
    /// A field that matches every value (`*`).
    pub fn any(kind: FieldKind) -> Self {
        Self {
            match_any: true,
            ..Self::empty(kind)
        }
    }

    fn empty(kind: FieldKind) -> Self {
        Self {
            kind,
            match_any: false,
            specific_values: BTreeSet::new(),
            ranges: Vec::new(),
            step_divisors: BTreeSet::new(),
            step_hits: BTreeSet::new(),
        }
    }

    /// Parse the text of one field.
    ///
    /// The first invalid token rejects the whole field.
    pub fn parse(text: &str, kind: FieldKind) -> Result<Self, ScheduleError> {
        let mut spec = Self::empty(kind);

        for token in text.split(',') {
            match classify(token) {
                SubExpression::Wildcard => spec.match_any = true,
                SubExpression::Step(left, right) => spec.add_step(token, left, right)?,
                SubExpression::Range(start, end) => spec.add_range(token, start, end)?,
                SubExpression::Specific(value) => {
                    let value = kind
                        .resolve(value)
                        .ok_or_else(|| ScheduleError::token(kind, token, "is not a valid value"))?;
                    if !kind.contains(value) {
                        return Err(ScheduleError::token(kind, token, "is out of range"));
                    }
                    spec.specific_values.insert(value);
                }
                SubExpression::Invalid => {
                    return Err(ScheduleError::EmptyField {
                        field: kind,
                        text: text.to_string(),
                    });
                }
            }
        }

        Ok(spec)
    }

    fn add_step(&mut self, token: &str, left: &str, right: &str) -> Result<(), ScheduleError> {
        let kind = self.kind;
        if !kind.allows_step() {
            return Err(ScheduleError::token(kind, token, "uses a step, which this field does not allow"));
        }

        let divisor = parse_number(right)
            .ok_or_else(|| ScheduleError::token(kind, token, "has a non-numeric step"))?;
        if divisor == 0 || !kind.contains(divisor) {
            return Err(ScheduleError::token(kind, token, "has a step outside the field range"));
        }

        if left != "*" {
            let start = parse_number(left)
                .ok_or_else(|| ScheduleError::token(kind, token, "has an invalid step start"))?;
            if !kind.contains(start) {
                return Err(ScheduleError::token(kind, token, "has a step start outside the field range"));
            }
            self.step_hits.insert(start);
        }

        self.step_divisors.insert(divisor);
        Ok(())
    }

    fn add_range(&mut self, token: &str, start: &str, end: &str) -> Result<(), ScheduleError> {
        let kind = self.kind;
        let (start, end) = match (kind.resolve(start), kind.resolve(end)) {
            (Some(start), Some(end)) => (start, end),
            _ => return Err(ScheduleError::token(kind, token, "has an unknown range bound")),
        };
        if start >= end {
            return Err(ScheduleError::token(kind, token, "must start before it ends"));
        }
        if !kind.contains(start) || !kind.contains(end) {
            return Err(ScheduleError::token(kind, token, "is out of range"));
        }

        if (start, end) == kind.bounds() {
            self.match_any = true;
        }
        self.ranges.push((start, end));
        Ok(())
    }

    /// Whether `value` satisfies this field.
    pub fn matches(&self, value: u8) -> bool {
        if self.match_any {
            return true;
        }
        if self.ranges.iter().any(|&(start, end)| (start..=end).contains(&value)) {
            return true;
        }
        if self.specific_values.contains(&value) || self.step_hits.contains(&value) {
            return true;
        }
        self.step_divisors.iter().any(|&divisor| value % divisor == 0)
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn is_match_any(&self) -> bool {
        self.match_any
    }

    pub fn specific_values(&self) -> &BTreeSet<u8> {
        &self.specific_values
    }

    pub fn ranges(&self) -> &[(u8, u8)] {
        &self.ranges
    }

    /// Divisors collected from `a/b` tokens.
    pub fn step_divisors(&self) -> &BTreeSet<u8> {
        &self.step_divisors
    }

    /// Explicit start values collected from `a/b` tokens.
    pub fn step_hits(&self) -> &BTreeSet<u8> {
        &self.step_hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_shapes() {
        assert_eq!(classify("*"), SubExpression::Wildcard);
        assert_eq!(classify("*/5"), SubExpression::Step("*", "5"));
        assert_eq!(classify("1-5"), SubExpression::Range("1", "5"));
        assert_eq!(classify("MON"), SubExpression::Specific("MON"));
        assert_eq!(classify(""), SubExpression::Invalid);
    }

    #[test]
    fn test_classify_checks_step_before_range() {
        assert_eq!(classify("1-5/2"), SubExpression::Step("1-5", "2"));
    }

    #[test]
    fn test_classify_half_shapes_fall_through() {
        assert_eq!(classify("5/"), SubExpression::Specific("5/"));
        assert_eq!(classify("-5"), SubExpression::Specific("-5"));
    }

    #[test]
    fn test_wildcard_matches_everything() {
        let spec = FieldSpec::parse("*", FieldKind::Minute).unwrap();
        assert!(spec.is_match_any());
        assert!((0..=59).all(|m| spec.matches(m)));
    }

    #[test]
    fn test_specific_list() {
        let spec = FieldSpec::parse("0,15,30", FieldKind::Minute).unwrap();
        assert!(spec.matches(15));
        assert!(!spec.matches(16));
        assert_eq!(spec.specific_values().len(), 3);
    }

    #[test]
    fn test_range_inclusive() {
        let spec = FieldSpec::parse("9-17", FieldKind::Hour).unwrap();
        assert!(spec.matches(9));
        assert!(spec.matches(17));
        assert!(!spec.matches(18));
    }

    #[test]
    fn test_range_must_increase() {
        assert!(FieldSpec::parse("5-5", FieldKind::Hour).is_err());
        assert!(FieldSpec::parse("10-2", FieldKind::Hour).is_err());
    }

    #[test]
    fn test_step_matches_by_modulo() {
        let spec = FieldSpec::parse("*/15", FieldKind::Minute).unwrap();
        assert!(spec.matches(0));
        assert!(spec.matches(45));
        assert!(!spec.matches(50));
    }

    #[test]
    fn test_step_with_start_value() {
        let spec = FieldSpec::parse("1/5", FieldKind::Minute).unwrap();
        assert!(spec.matches(1));
        assert!(spec.matches(10));
        assert!(!spec.matches(11));
        assert!(spec.step_hits().contains(&1));
        assert!(spec.step_divisors().contains(&5));
    }

    #[test]
    fn test_step_bounds() {
        assert!(FieldSpec::parse("*/0", FieldKind::Minute).is_err());
        assert!(FieldSpec::parse("*/60", FieldKind::Minute).is_err());
        assert!(FieldSpec::parse("*/30", FieldKind::Hour).is_err());
        assert!(FieldSpec::parse("*/12", FieldKind::Hour).is_ok());
    }

    #[test]
    fn test_empty_token() {
        let err = FieldSpec::parse("1,,2", FieldKind::Minute).unwrap_err();
        assert_eq!(
            err,
            ScheduleError::EmptyField {
                field: FieldKind::Minute,
                text: "1,,2".to_string()
            }
        );
        assert!(FieldSpec::parse("5,", FieldKind::Hour).is_err());
    }

    #[test]
    fn test_step_with_range_start_is_rejected() {
        assert!(FieldSpec::parse("1-5/2", FieldKind::Minute).is_err());
    }

    #[test]
    fn test_step_rejected_outside_minute_and_hour() {
        for kind in [FieldKind::DayOfMonth, FieldKind::Month, FieldKind::DayOfWeek] {
            let err = FieldSpec::parse("*/2", kind).unwrap_err();
            assert!(matches!(err, ScheduleError::InvalidToken { field, .. } if field == kind));
        }
    }

    #[test]
    fn test_out_of_range_values() {
        assert!(FieldSpec::parse("60", FieldKind::Minute).is_err());
        assert!(FieldSpec::parse("24", FieldKind::Hour).is_err());
        assert!(FieldSpec::parse("0", FieldKind::DayOfMonth).is_err());
        assert!(FieldSpec::parse("13", FieldKind::Month).is_err());
        assert!(FieldSpec::parse("7", FieldKind::DayOfWeek).is_err());
        assert!(FieldSpec::parse("300", FieldKind::Minute).is_err());
    }

    #[test]
    fn test_month_names_and_full_range() {
        let spec = FieldSpec::parse("jan,MAR-may", FieldKind::Month).unwrap();
        assert!(spec.matches(1));
        assert!(spec.matches(4));
        assert!(!spec.matches(2));

        let all = FieldSpec::parse("JAN-DEC", FieldKind::Month).unwrap();
        assert!(all.is_match_any());
    }

    #[test]
    fn test_weekday_wraparound_rejected() {
        assert!(FieldSpec::parse("FRI-MON", FieldKind::DayOfWeek).is_err());
        assert!(FieldSpec::parse("MON-FRI", FieldKind::DayOfWeek).is_ok());
    }

    #[test]
    fn test_names_only_in_named_fields() {
        assert!(FieldSpec::parse("MON", FieldKind::Hour).is_err());
        assert!(FieldSpec::parse("JAN", FieldKind::DayOfWeek).is_err());
    }

    #[test]
    fn test_one_bad_token_rejects_field() {
        assert!(FieldSpec::parse("1,2,x", FieldKind::Minute).is_err());
        assert!(FieldSpec::parse("1,,2", FieldKind::Minute).is_err());
        assert!(FieldSpec::parse("", FieldKind::Minute).is_err());
    }

    #[test]
    fn test_signs_and_spaces_are_not_numbers() {
        assert!(FieldSpec::parse("+5", FieldKind::Minute).is_err());
        assert!(FieldSpec::parse(" 5", FieldKind::Minute).is_err());
    }
}
