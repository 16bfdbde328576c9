//! Calendar views: weekday/weekend split and the daily heatmap.

use crate::types::TimeSeriesPoint;
use serde::Serialize;

/// A metric split between weekdays and weekends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct WeekdayWeekendSplit {
    pub weekday_total: f64,
    pub weekend_total: f64,
    /// Weekdays with any data
    pub weekday_days: i64,
    /// Weekend days with any data
    pub weekend_days: i64,
    pub weekday_avg: f64,
    pub weekend_avg: f64,
}

impl WeekdayWeekendSplit {
    /// Build from per-day `(weekday, value)` pairs, one per day with data
    /// (weekday 0 = Sunday).
    pub fn from_days(days: impl IntoIterator<Item = (u32, f64)>) -> Self {
        let mut split = Self::default();
        for (weekday, value) in days {
            if weekday == 0 || weekday == 6 {
                split.weekend_total += value;
                split.weekend_days += 1;
            } else {
                split.weekday_total += value;
                split.weekday_days += 1;
            }
        }
        if split.weekday_days > 0 {
            split.weekday_avg = split.weekday_total / split.weekday_days as f64;
        }
        if split.weekend_days > 0 {
            split.weekend_avg = split.weekend_total / split.weekend_days as f64;
        }
        split
    }
}

/// One day of the activity heatmap.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapCell {
    pub bucket_start: i64,
    /// `%Y-%m-%d`
    pub date: String,
    pub value: f64,
    /// Intensity 0 (none) .. 4 (near the maximum)
    pub level: u8,
}

/// Quantise `value` against `max` into levels 0-4.
pub fn heat_level(value: f64, max: f64) -> u8 {
    if value <= 0.0 || max <= 0.0 {
        return 0;
    }
    let fraction = (value / max).min(1.0);
    // Any non-zero day is at least level 1.
    ((fraction * 4.0).ceil() as u8).clamp(1, 4)
}

/// Heatmap cells for a filled daily series.
pub fn heatmap_cells(series: &[TimeSeriesPoint]) -> Vec<HeatmapCell> {
    let max = series.iter().map(|p| p.value).fold(0.0, f64::max);
    series
        .iter()
        .map(|p| HeatmapCell {
            bucket_start: p.bucket_start,
            date: p.label.clone(),
            value: p.value,
            level: heat_level(p.value, max),
        })
        .collect()
}
