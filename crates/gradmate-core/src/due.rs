//! Due date parsing, normalization and ordering.
//!
//! Due dates live in task documents as strings. Anything that parses as an
//! ISO 8601 date or datetime is normalized on write; other strings are kept
//! verbatim and sort after every valid date.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

enum Parsed {
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
}

fn parse(raw: &str) -> Option<Parsed> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(Parsed::DateTime(dt.with_timezone(&Utc)));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(Parsed::Date(date));
    }
    // Datetimes without an offset are taken as UTC.
    NAIVE_DATETIME_FORMATS.iter().find_map(|fmt| {
        NaiveDateTime::parse_from_str(raw, fmt)
            .ok()
            .map(|naive| Parsed::DateTime(naive.and_utc()))
    })
}

/// Parse a stored due date into an instant. Plain dates map to midnight UTC.
pub fn parse_due_date(raw: &str) -> Option<DateTime<Utc>> {
    match parse(raw)? {
        Parsed::Date(date) => date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc()),
        Parsed::DateTime(dt) => Some(dt),
    }
}

/// Normalize a due date for storage.
///
/// - `None` or blank input becomes `None`.
/// - `YYYY-MM-DD` stays a plain date.
/// - Datetimes become RFC 3339 in UTC (`2025-01-02T09:00:00Z`).
/// - Anything unparseable is kept as given (trimmed).
pub fn normalize_due_date(raw: Option<&str>) -> Option<String> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    Some(match parse(raw) {
        Some(Parsed::Date(date)) => date.format("%Y-%m-%d").to_string(),
        Some(Parsed::DateTime(dt)) => dt.to_rfc3339_opts(SecondsFormat::Secs, true),
        None => raw.to_owned(),
    })
}

/// Stable sort ascending by due date; missing or unparseable dates go last
/// and keep their relative order.
pub fn sort_by_due_date<T>(items: &mut [T], due_date: impl Fn(&T) -> Option<&str>) {
    items.sort_by_key(|item| {
        let parsed = due_date(item).and_then(parse_due_date);
        (parsed.is_none(), parsed)
    });
}
