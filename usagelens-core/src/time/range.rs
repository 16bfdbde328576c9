//! Time range selectors and their resolution to absolute instants.

use super::fill::MAX_FILL_POINTS;
use super::{shift_days, BucketZone, Granularity, MS_PER_HOUR};
use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};

/// A logical time range as chosen in the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeRange {
    /// Local midnight to the next local midnight
    Today,
    /// The last 24 hours up to now
    Last24Hours,
    /// Seven whole local days before today
    Last7Days,
    /// Thirty whole local days before today
    Last30Days,
    /// From the oldest stored event up to now
    AllTime,
    /// Explicit `[start_ms, end_ms)`
    Custom { start_ms: i64, end_ms: i64 },
}

impl TimeRange {
    /// Parse `today`, `24h`, `7d`, `30d` or `all`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "today" => Some(TimeRange::Today),
            "24h" | "last24h" => Some(TimeRange::Last24Hours),
            "7d" | "last7d" => Some(TimeRange::Last7Days),
            "30d" | "last30d" => Some(TimeRange::Last30Days),
            "all" | "all-time" => Some(TimeRange::AllTime),
            _ => None,
        }
    }

    /// True when the range ends at "now" rather than on a bucket boundary.
    pub fn ends_now(&self) -> bool {
        matches!(self, TimeRange::Last24Hours | TimeRange::AllTime)
    }
}

/// A resolved `[start_ms, end_ms)` window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedRange {
    pub selector: TimeRange,
    pub start_ms: i64,
    pub end_ms: i64,
}

impl ResolvedRange {
    /// True for all-time ranges, whose start is just the oldest event.
    pub fn open_start(&self) -> bool {
        self.selector == TimeRange::AllTime
    }

    pub fn is_empty(&self) -> bool {
        self.end_ms <= self.start_ms
    }

    pub fn contains(&self, ts_ms: i64) -> bool {
        ts_ms >= self.start_ms && ts_ms < self.end_ms
    }

    /// SQL bounds for this range.
    pub fn bounds(&self) -> Bounds {
        Bounds {
            start_ms: if self.open_start() {
                i64::MIN
            } else {
                self.start_ms
            },
            end_ms: self.end_ms,
        }
    }
}

/// Half-open `[start_ms, end_ms)` filter applied to timestamps or bucket starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub start_ms: i64,
    pub end_ms: i64,
}

/// Converts [`TimeRange`] selectors to instants in a fixed zone and clock.
#[derive(Debug, Clone, Copy)]
pub struct RangeResolver<Tz: BucketZone = Local> {
    tz: Tz,
    now_ms: Option<i64>,
}

impl<Tz: BucketZone> RangeResolver<Tz> {
    pub fn new(tz: Tz) -> Self {
        Self { tz, now_ms: None }
    }

    /// Pin "now" (for tests and reproducible reports).
    pub fn with_now(mut self, now_ms: i64) -> Self {
        self.now_ms = Some(now_ms);
        self
    }

    pub fn zone(&self) -> &Tz {
        &self.tz
    }

    pub fn now_ms(&self) -> i64 {
        self.now_ms
            .unwrap_or_else(|| Utc::now().timestamp_millis())
    }

    /// Local midnight starting today.
    pub fn today_start(&self) -> i64 {
        Granularity::Daily.bucket_start(&self.tz, self.now_ms())
    }

    /// Resolve a selector. `min_created_at` is only consulted for
    /// [`TimeRange::AllTime`]; an empty store resolves to `(0, now)`.
    pub fn resolve(&self, range: TimeRange, min_created_at: Option<i64>) -> ResolvedRange {
        let now = self.now_ms();
        let (start_ms, end_ms) = match range {
            TimeRange::Today => {
                let start = self.today_start();
                (start, shift_days(&self.tz, start, 1))
            }
            TimeRange::Last24Hours => (now - 24 * MS_PER_HOUR, now),
            TimeRange::Last7Days => {
                let end = self.today_start();
                (shift_days(&self.tz, end, -7), end)
            }
            TimeRange::Last30Days => {
                let end = self.today_start();
                (shift_days(&self.tz, end, -30), end)
            }
            TimeRange::AllTime => (min_created_at.unwrap_or(0).min(now), now),
            TimeRange::Custom { start_ms, end_ms } => (start_ms, end_ms),
        };

        ResolvedRange {
            selector: range,
            start_ms,
            end_ms,
        }
    }

    /// The trailing `days` local days ending with (and including) today,
    /// clamped to `1..=MAX_FILL_POINTS`.
    pub fn trailing_days(&self, days: u32) -> ResolvedRange {
        let days = days.clamp(1, MAX_FILL_POINTS as u32);
        let today = self.today_start();
        let start_ms = shift_days(&self.tz, today, 1 - i64::from(days));
        let end_ms = shift_days(&self.tz, today, 1);
        ResolvedRange {
            selector: TimeRange::Custom { start_ms, end_ms },
            start_ms,
            end_ms,
        }
    }
}
