//! Month and weekday names accepted in place of numbers.

/// `JAN`..`DEC` map to 1..12.
pub const MONTHS: [(&str, u8); 12] = [
    ("JAN", 1),
    ("FEB", 2),
    ("MAR", 3),
    ("APR", 4),
    ("MAY", 5),
    ("JUN", 6),
    ("JUL", 7),
    ("AUG", 8),
    ("SEP", 9),
    ("OCT", 10),
    ("NOV", 11),
    ("DEC", 12),
];

/// `SUN`..`SAT` map to 0..6.
pub const WEEKDAYS: [(&str, u8); 7] = [
    ("SUN", 0),
    ("MON", 1),
    ("TUE", 2),
    ("WED", 3),
    ("THU", 4),
    ("FRI", 5),
    ("SAT", 6),
];

fn lookup(table: &[(&str, u8)], name: &str) -> Option<u8> {
    table
        .iter()
        .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
        .map(|(_, value)| *value)
}

/// Resolve a three-letter month name, case-insensitively.
pub fn month_number(name: &str) -> Option<u8> {
    lookup(&MONTHS, name)
}

/// Resolve a three-letter weekday name, case-insensitively. Sunday is 0.
pub fn weekday_number(name: &str) -> Option<u8> {
    lookup(&WEEKDAYS, name)
}
