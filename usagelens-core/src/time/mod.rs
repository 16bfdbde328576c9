//! Local-time arithmetic shared by range resolution, bucketing and gap filling.
//!
//! Buckets are aligned in the host's local time zone, not UTC, so "today" and
//! "this hour" match what the user sees on the clock. The zone is a type
//! parameter so tests can pin it.

pub mod bucket;
pub mod fill;
pub mod range;

pub use bucket::Granularity;
pub use fill::fill_series;
pub use range::{Bounds, RangeResolver, ResolvedRange, TimeRange};

use chrono::{DateTime, Days, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone};
use std::panic::{RefUnwindSafe, UnwindSafe};

pub const MS_PER_HOUR: i64 = 3_600_000;
pub const MS_PER_DAY: i64 = 86_400_000;

/// A time zone usable for bucketing, including inside SQLite scalar functions.
pub trait BucketZone:
    TimeZone + Copy + Send + Sync + UnwindSafe + RefUnwindSafe + 'static
{
}

impl<T> BucketZone for T where
    T: TimeZone + Copy + Send + Sync + UnwindSafe + RefUnwindSafe + 'static
{
}

/// Wall-clock time of `ts_ms` in `tz`, or `None` if outside chrono's range.
pub fn to_local<Tz: TimeZone>(tz: &Tz, ts_ms: i64) -> Option<NaiveDateTime> {
    tz.timestamp_millis_opt(ts_ms)
        .single()
        .map(|dt: DateTime<Tz>| dt.naive_local())
}

/// Instant of a wall-clock time in `tz`.
///
/// Ambiguous times (clocks going back) take the earlier instant; times inside
/// a gap (clocks going forward) take the first valid instant after the gap.
pub fn local_to_ms<Tz: TimeZone>(tz: &Tz, local: NaiveDateTime) -> i64 {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => dt.timestamp_millis(),
        LocalResult::Ambiguous(earliest, _) => earliest.timestamp_millis(),
        LocalResult::None => {
            let mut candidate = local;
            for _ in 0..8 {
                let Some(next) = candidate.checked_add_signed(Duration::minutes(15)) else {
                    break;
                };
                candidate = next;
                if let Some(dt) = tz.from_local_datetime(&candidate).earliest() {
                    return dt.timestamp_millis();
                }
            }
            local.and_utc().timestamp_millis()
        }
    }
}

/// Local midnight at the start of `date`.
pub fn day_start<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> i64 {
    match date.and_hms_opt(0, 0, 0) {
        Some(midnight) => local_to_ms(tz, midnight),
        None => 0,
    }
}

/// `date` moved by `days` calendar days, or `None` past chrono's date range.
pub fn add_days(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    let magnitude = Days::new(days.unsigned_abs());
    if days >= 0 {
        date.checked_add_days(magnitude)
    } else {
        date.checked_sub_days(magnitude)
    }
}

/// Local midnight `days` calendar days away from the day containing `ts_ms`.
///
/// Saturates instead of panicking when the target day is not representable.
pub fn shift_days<Tz: TimeZone>(tz: &Tz, ts_ms: i64, days: i64) -> i64 {
    match to_local(tz, ts_ms).and_then(|local| add_days(local.date(), days)) {
        Some(date) => day_start(tz, date),
        None => ts_ms.saturating_add(days.saturating_mul(MS_PER_DAY)),
    }
}
