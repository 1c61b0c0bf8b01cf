// src/common/dates.rs

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};

use crate::common::error::AppError;

/// Parses the month a caller asks bills for. Accepts `2024-03`, `2024-03-15` or a full
/// RFC 3339 timestamp; only the calendar month matters.
pub fn parse_month(input: &str) -> Result<NaiveDate, AppError> {
    let trimmed = input.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(ts.with_timezone(&Utc).date_naive());
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date);
    }
    NaiveDate::parse_from_str(&format!("{trimmed}-01"), "%Y-%m-%d")
        .map_err(|_| AppError::InvalidInput(format!("Invalid month '{input}', expected YYYY-MM")))
}

/// Last representable millisecond of the calendar month containing `date` (UTC).
/// This is the canonical `bill_month` key.
pub fn end_of_month(date: NaiveDate) -> DateTime<Utc> {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };

    let first_of_next = NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
        .unwrap_or(DateTime::<Utc>::MAX_UTC);

    first_of_next - Duration::milliseconds(1)
}
