//! Granularity and bucket alignment.

use super::{add_days, day_start, to_local, MS_PER_HOUR};
use chrono::{Datelike, Months, TimeZone, Timelike};
use serde::{Deserialize, Serialize};

/// Width of a time bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Hourly,
    Daily,
    /// ISO weeks, starting Monday
    Weekly,
    Monthly,
}

impl Granularity {
    pub const ALL: [Granularity; 4] = [
        Granularity::Hourly,
        Granularity::Daily,
        Granularity::Weekly,
        Granularity::Monthly,
    ];

    /// Identifier passed to the `lens_bucket` SQL function.
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Hourly => "hour",
            Granularity::Daily => "day",
            Granularity::Weekly => "week",
            Granularity::Monthly => "month",
        }
    }

    /// Parse `hour`/`hourly`, `day`/`daily`, `week`/`weekly`, `month`/`monthly`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "hour" | "hourly" => Some(Granularity::Hourly),
            "day" | "daily" => Some(Granularity::Daily),
            "week" | "weekly" => Some(Granularity::Weekly),
            "month" | "monthly" => Some(Granularity::Monthly),
            _ => None,
        }
    }

    /// strftime-style key format for a bucket.
    pub fn key_format(&self) -> &'static str {
        match self {
            Granularity::Hourly => "%Y-%m-%d %H",
            Granularity::Daily => "%Y-%m-%d",
            Granularity::Weekly => "%G-W%V",
            Granularity::Monthly => "%Y-%m",
        }
    }

    /// Start of the bucket containing `ts_ms`, in ms since epoch.
    pub fn bucket_start<Tz: TimeZone>(&self, tz: &Tz, ts_ms: i64) -> i64 {
        let Some(local) = to_local(tz, ts_ms) else {
            return ts_ms;
        };

        match self {
            // Subtracting the offset into the hour keeps both passes through a
            // repeated (DST fall-back) hour distinct.
            Granularity::Hourly => {
                let into_hour = i64::from(local.minute()) * 60_000
                    + i64::from(local.second()) * 1_000
                    + i64::from(local.nanosecond() / 1_000_000);
                ts_ms - into_hour
            }
            Granularity::Daily => day_start(tz, local.date()),
            Granularity::Weekly => {
                let back = i64::from(local.weekday().num_days_from_monday());
                day_start(tz, add_days(local.date(), -back).unwrap_or(local.date()))
            }
            Granularity::Monthly => {
                let first = local.date().with_day(1).unwrap_or(local.date());
                day_start(tz, first)
            }
        }
    }

    /// Start of the bucket following the one that starts at `bucket_start`.
    pub fn next_bucket<Tz: TimeZone>(&self, tz: &Tz, bucket_start: i64) -> i64 {
        self.step(tz, bucket_start, 1)
    }

    /// Start of the bucket `n` buckets away (negative walks backwards).
    pub fn step<Tz: TimeZone>(&self, tz: &Tz, bucket_start: i64, n: i64) -> i64 {
        let Some(local) = to_local(tz, bucket_start) else {
            return bucket_start;
        };
        match self {
            Granularity::Hourly => bucket_start.saturating_add(n.saturating_mul(MS_PER_HOUR)),
            Granularity::Daily => match add_days(local.date(), n) {
                Some(date) => day_start(tz, date),
                None => bucket_start,
            },
            Granularity::Weekly => match add_days(local.date(), n.saturating_mul(7)) {
                Some(date) => day_start(tz, date),
                None => bucket_start,
            },
            Granularity::Monthly => {
                let magnitude = Months::new(n.unsigned_abs().min(u64::from(u32::MAX)) as u32);
                let shifted = if n >= 0 {
                    local.date().checked_add_months(magnitude)
                } else {
                    local.date().checked_sub_months(magnitude)
                };
                match shifted {
                    Some(date) => day_start(tz, date),
                    None => bucket_start,
                }
            }
        }
    }

    /// Bucket key of `ts_ms` formatted with [`Granularity::key_format`].
    pub fn key<Tz: TimeZone>(&self, tz: &Tz, ts_ms: i64) -> String {
        to_local(tz, ts_ms)
            .map(|local| local.format(self.key_format()).to_string())
            .unwrap_or_default()
    }

    /// Chart label for the bucket starting at `bucket_start`.
    ///
    /// Hourly buckets are labelled by hour of day (`"0:00"` .. `"23:00"`).
    pub fn label<Tz: TimeZone>(&self, tz: &Tz, bucket_start: i64) -> String {
        match self {
            Granularity::Hourly => to_local(tz, bucket_start)
                .map(|local| format!("{}:00", local.hour()))
                .unwrap_or_default(),
            _ => self.key(tz, bucket_start),
        }
    }

    /// True if `ts_ms` is the start of its own bucket.
    pub fn is_aligned<Tz: TimeZone>(&self, tz: &Tz, ts_ms: i64) -> bool {
        self.bucket_start(tz, ts_ms) == ts_ms
    }
}

/// Local hour of day (0-23).
pub fn hour_of_day<Tz: TimeZone>(tz: &Tz, ts_ms: i64) -> u32 {
    to_local(tz, ts_ms).map(|l| l.hour()).unwrap_or(0)
}

/// Local day of week, 0 = Sunday .. 6 = Saturday.
pub fn weekday<Tz: TimeZone>(tz: &Tz, ts_ms: i64) -> u32 {
    to_local(tz, ts_ms)
        .map(|l| l.weekday().num_days_from_sunday())
        .unwrap_or(0)
}
