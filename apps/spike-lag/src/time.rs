use chrono::{DateTime, Utc};

pub const MS_PER_DAY: i64 = 86_400_000;

pub fn to_datetime(ts_ms: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(ts_ms)
}

pub fn days_to_ms(days: i64) -> i64 {
    days.saturating_mul(MS_PER_DAY)
}

/// Whole days between two instants, ignoring order.
pub fn whole_days_between(a_ms: i64, b_ms: i64) -> i64 {
    a_ms.abs_diff(b_ms) as i64 / MS_PER_DAY
}

pub fn fractional_days_between(a_ms: i64, b_ms: i64) -> f64 {
    (a_ms.abs_diff(b_ms) as f64) / (MS_PER_DAY as f64)
}

/// `YYYY-MM-DD` for display; falls back to the raw millisecond value when out of range.
pub fn format_date(ts_ms: i64) -> String {
    match to_datetime(ts_ms) {
        Some(ts) => ts.format("%Y-%m-%d").to_string(),
        None => ts_ms.to_string(),
    }
}
