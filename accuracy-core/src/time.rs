//! Reference-timezone day arithmetic.
//!
//! Day boundaries for completeness checks and horizon computation use one
//! fixed timezone regardless of each city's own local time.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// The fixed timezone defining calendar-day boundaries.
pub const REFERENCE_TZ: Tz = chrono_tz::Europe::Sarajevo;

/// UTC instant at which `date` begins in the reference timezone.
pub fn start_of_local_day(date: NaiveDate) -> DateTime<Utc> {
    REFERENCE_TZ
        .from_local_datetime(&date.and_time(NaiveTime::MIN))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        // Midnight never falls inside a DST gap in this zone; UTC midnight
        // is the documented fallback if that ever changes.
        .unwrap_or_else(|| Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)))
}

/// UTC instant range `[start, end)` covering `date`'s local day.
pub fn local_day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    (start_of_local_day(date), start_of_local_day(date + Duration::days(1)))
}

/// Whole hours between `fetch_timestamp` and the start of `target_date`'s
/// local day, truncated toward zero. Negative when the forecast was fetched
/// after the day began.
pub fn forecast_horizon_hours(fetch_timestamp: DateTime<Utc>, target_date: NaiveDate) -> i64 {
    (start_of_local_day(target_date) - fetch_timestamp).num_hours()
}

/// Today's calendar date in the reference timezone.
pub fn today_local() -> NaiveDate {
    Utc::now().with_timezone(&REFERENCE_TZ).date_naive()
}
