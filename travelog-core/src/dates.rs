//! Calendar-day arithmetic. Time of day is always ignored.

use chrono::{DateTime, Datelike, NaiveDate};

/// Parse an ISO date (`2024-05-01`) or datetime (`2024-05-01T10:00:00Z`),
/// keeping only the calendar day.
#[must_use]
pub fn parse_day(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if let Ok(day) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(day);
    }
    if let Ok(stamp) = DateTime::parse_from_rfc3339(text) {
        return Some(stamp.date_naive());
    }
    text.get(..10)
        .and_then(|head| NaiveDate::parse_from_str(head, "%Y-%m-%d").ok())
}

/// Inclusive day span: a same-day trip counts as one day. Unparseable or
/// reversed ranges count as zero.
#[must_use]
pub fn calculate_days(start: &str, end: &str) -> i64 {
    match (parse_day(start), parse_day(end)) {
        (Some(start), Some(end)) if end >= start => (end - start).num_days() + 1,
        _ => 0,
    }
}

/// `"<year>년 <month>월"`, as shown beside a previous visit.
#[must_use]
pub fn year_month_label(day: NaiveDate) -> String {
    format!("{}년 {}월", day.year(), day.month())
}
