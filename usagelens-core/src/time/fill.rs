//! Gap filling for fixed-length chart series.
//!
//! Every function here returns a series whose length depends only on the
//! range and granularity, never on how sparse the data is. Buckets without
//! rows become zero-valued points with `has_data = false`.

use super::{local_to_ms, to_local, Granularity, ResolvedRange, TimeRange, MS_PER_HOUR};
use crate::types::TimeSeriesPoint;
use chrono::{TimeZone, Timelike};
use std::collections::HashMap;

/// Points in an hourly series.
pub const HOURS_PER_SERIES: usize = 24;

/// Points in a monthly series.
pub const MONTHS_PER_SERIES: usize = 12;

/// Upper bound on generated points; older buckets are dropped first.
pub const MAX_FILL_POINTS: usize = 3_660;

fn value_map(values: &[(i64, f64)]) -> HashMap<i64, f64> {
    let mut map = HashMap::with_capacity(values.len());
    for &(bucket, value) in values {
        *map.entry(bucket).or_insert(0.0) += value;
    }
    map
}

fn build<Tz: TimeZone>(
    tz: &Tz,
    granularity: Granularity,
    buckets: &[i64],
    values: &HashMap<i64, f64>,
) -> Vec<TimeSeriesPoint> {
    buckets
        .iter()
        .enumerate()
        .map(|(bucket_index, &bucket_start)| {
            let found = values.get(&bucket_start).copied();
            TimeSeriesPoint {
                bucket_start,
                label: granularity.label(tz, bucket_start),
                value: found.unwrap_or(0.0),
                bucket_index,
                has_data: found.is_some(),
            }
        })
        .collect()
}

/// Every bucket of `granularity` whose start lies in `[start, end)`, starting
/// from the bucket containing `start`. Only the newest [`MAX_FILL_POINTS`]
/// buckets are walked, however long the range.
fn walk<Tz: TimeZone>(tz: &Tz, granularity: Granularity, start: i64, end: i64) -> Vec<i64> {
    let mut buckets = Vec::new();
    if end <= start {
        return buckets;
    }
    let last = granularity.bucket_start(tz, end - 1);
    let earliest = granularity.step(tz, last, 1 - MAX_FILL_POINTS as i64);
    let mut cursor = granularity.bucket_start(tz, start).max(earliest);
    while cursor < end {
        buckets.push(cursor);
        let next = granularity.next_bucket(tz, cursor);
        if next <= cursor {
            break;
        }
        cursor = next;
    }
    if buckets.len() > MAX_FILL_POINTS {
        buckets.drain(..buckets.len() - MAX_FILL_POINTS);
    }
    buckets
}

/// One point per local calendar day in `[start, end)`.
pub fn fill_daily<Tz: TimeZone>(
    tz: &Tz,
    values: &[(i64, f64)],
    range: &ResolvedRange,
) -> Vec<TimeSeriesPoint> {
    let buckets = walk(tz, Granularity::Daily, range.start_ms, range.end_ms);
    build(tz, Granularity::Daily, &buckets, &value_map(values))
}

/// One point per ISO week touching `[start, end)`.
pub fn fill_weekly<Tz: TimeZone>(
    tz: &Tz,
    values: &[(i64, f64)],
    range: &ResolvedRange,
) -> Vec<TimeSeriesPoint> {
    let buckets = walk(tz, Granularity::Weekly, range.start_ms, range.end_ms);
    build(tz, Granularity::Weekly, &buckets, &value_map(values))
}

/// Stable `0:00`..`23:00` series for the local day starting at `day_start`.
///
/// Points are keyed by wall-clock hour. Both passes through a repeated
/// (fall-back) hour land on one point; an hour skipped by a spring-forward
/// jump is a zero point sharing its start with the hour after it.
pub fn fill_hourly_today<Tz: TimeZone>(
    tz: &Tz,
    values: &[(i64, f64)],
    day_start: i64,
) -> Vec<TimeSeriesPoint> {
    let date = to_local(tz, day_start).map(|local| local.date());

    let mut by_hour: [Option<f64>; HOURS_PER_SERIES] = [None; HOURS_PER_SERIES];
    for &(bucket, value) in values {
        let Some(local) = to_local(tz, bucket) else {
            continue;
        };
        if Some(local.date()) != date {
            continue;
        }
        let slot = &mut by_hour[local.hour() as usize];
        *slot = Some(slot.unwrap_or(0.0) + value);
    }

    by_hour
        .iter()
        .enumerate()
        .map(|(hour, found)| {
            let bucket_start = match date.and_then(|d| d.and_hms_opt(hour as u32, 0, 0)) {
                Some(local) => local_to_ms(tz, local),
                None => day_start.saturating_add(hour as i64 * MS_PER_HOUR),
            };
            TimeSeriesPoint {
                bucket_start,
                label: format!("{}:00", hour),
                value: found.unwrap_or(0.0),
                bucket_index: hour,
                has_data: found.is_some(),
            }
        })
        .collect()
}

/// 24 hourly points whose last bucket is the hour containing `end_ms`
/// (exclusive), so the rightmost bar is always "now".
pub fn fill_hourly_rolling<Tz: TimeZone>(
    tz: &Tz,
    values: &[(i64, f64)],
    end_ms: i64,
) -> Vec<TimeSeriesPoint> {
    let last = Granularity::Hourly.bucket_start(tz, end_ms.saturating_sub(1));
    let mut buckets: Vec<i64> = (0..HOURS_PER_SERIES as i64)
        .map(|back| Granularity::Hourly.step(tz, last, -back))
        .collect();
    buckets.reverse();
    build(tz, Granularity::Hourly, &buckets, &value_map(values))
}

/// The 12 months ending with the month containing `end_ms` (exclusive).
pub fn fill_monthly<Tz: TimeZone>(
    tz: &Tz,
    values: &[(i64, f64)],
    end_ms: i64,
) -> Vec<TimeSeriesPoint> {
    let last = Granularity::Monthly.bucket_start(tz, end_ms.saturating_sub(1));
    let mut buckets: Vec<i64> = (0..MONTHS_PER_SERIES as i64)
        .map(|back| Granularity::Monthly.step(tz, last, -back))
        .collect();
    buckets.reverse();
    build(tz, Granularity::Monthly, &buckets, &value_map(values))
}

/// Fill `values` (bucket start → value) for `range` at `granularity`.
///
/// Hourly series anchor to local midnight when the range is exactly
/// [`TimeRange::Today`] and roll backwards from the range end otherwise.
pub fn fill_series<Tz: TimeZone>(
    tz: &Tz,
    values: &[(i64, f64)],
    range: &ResolvedRange,
    granularity: Granularity,
) -> Vec<TimeSeriesPoint> {
    match granularity {
        Granularity::Hourly if range.selector == TimeRange::Today => {
            fill_hourly_today(tz, values, range.start_ms)
        }
        Granularity::Hourly => fill_hourly_rolling(tz, values, range.end_ms),
        Granularity::Daily => fill_daily(tz, values, range),
        Granularity::Weekly => fill_weekly(tz, values, range),
        Granularity::Monthly => fill_monthly(tz, values, range.end_ms),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::{RangeResolver, MS_PER_DAY};
    use chrono::Utc;
    use chrono_tz::America::New_York;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> i64 {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
            .timestamp_millis()
    }

    fn resolver() -> RangeResolver<Utc> {
        RangeResolver::new(Utc).with_now(utc(2024, 5, 15, 13, 47))
    }

    fn assert_contiguous(series: &[TimeSeriesPoint]) {
        for (i, point) in series.iter().enumerate() {
            assert_eq!(point.bucket_index, i);
        }
        for pair in series.windows(2) {
            assert!(pair[0].bucket_start < pair[1].bucket_start);
        }
    }

    #[test]
    fn test_daily_fill_30_days_sparse() {
        let range = resolver().resolve(TimeRange::Last30Days, None);
        let values = [(utc(2024, 5, 1, 0, 0), 4.0), (utc(2024, 5, 14, 0, 0), 2.0)];

        let series = fill_daily(&Utc, &values, &range);

        assert_eq!(series.len(), 30);
        assert_contiguous(&series);
        assert_eq!(series[0].label, "2024-04-15");
        assert_eq!(series[29].label, "2024-05-14");
        assert_eq!(series[29].value, 2.0);
        assert!(series[29].has_data);
        assert_eq!(series.iter().filter(|p| p.has_data).count(), 2);
    }

    #[test]
    fn test_empty_input_yields_full_placeholder() {
        let r = resolver();
        for (range, granularity, expected) in [
            (TimeRange::Last30Days, Granularity::Daily, 30),
            (TimeRange::Last7Days, Granularity::Daily, 7),
            (TimeRange::Today, Granularity::Hourly, 24),
            (TimeRange::Last24Hours, Granularity::Hourly, 24),
            (TimeRange::AllTime, Granularity::Monthly, 12),
        ] {
            let resolved = r.resolve(range, Some(utc(2024, 1, 3, 0, 0)));
            let series = fill_series(&Utc, &[], &resolved, granularity);
            assert_eq!(series.len(), expected, "{:?}", range);
            assert!(series.iter().all(|p| p.value == 0.0 && !p.has_data));
            assert_contiguous(&series);
        }
    }

    #[test]
    fn test_hourly_today_labels() {
        let range = resolver().resolve(TimeRange::Today, None);
        let series = fill_series(&Utc, &[], &range, Granularity::Hourly);

        let labels: Vec<String> = series.iter().map(|p| p.label.clone()).collect();
        let expected: Vec<String> = (0..24).map(|h| format!("{}:00", h)).collect();
        assert_eq!(labels, expected);
    }

    #[test]
    fn test_hourly_rolling_ends_at_now() {
        let range = resolver().resolve(TimeRange::Last24Hours, None);
        let now = range.end_ms;
        let values = [(utc(2024, 5, 15, 13, 0), 7.0)];

        let series = fill_series(&Utc, &values, &range, Granularity::Hourly);

        assert_eq!(series.len(), 24);
        assert_contiguous(&series);
        let last = series.last().unwrap();
        let last_end = last.bucket_start + MS_PER_HOUR;
        assert!(last_end >= now && last_end - now <= MS_PER_HOUR);
        assert_eq!(last.value, 7.0);
        assert_eq!(series[0].label, "14:00");
    }

    #[test]
    fn test_monthly_fill_ends_with_current_month() {
        let range = resolver().resolve(TimeRange::AllTime, Some(utc(2020, 1, 1, 0, 0)));
        let values = [(utc(2024, 5, 1, 0, 0), 3.0), (utc(2023, 6, 1, 0, 0), 1.0)];

        let series = fill_series(&Utc, &values, &range, Granularity::Monthly);

        assert_eq!(series.len(), 12);
        assert_eq!(series[0].label, "2023-06");
        assert_eq!(series[0].value, 1.0);
        assert_eq!(series[11].label, "2024-05");
        assert_eq!(series[11].value, 3.0);
    }

    #[test]
    fn test_weekly_fill_covers_partial_weeks() {
        let range = resolver().resolve(TimeRange::Last30Days, None);
        let series = fill_weekly(&Utc, &[], &range);
        // 2024-04-15 (Mon) .. 2024-05-14 (Tue) touches five ISO weeks.
        assert_eq!(series.len(), 5);
        assert_eq!(series[0].label, "2024-W16");
    }

    #[test]
    fn test_duplicate_buckets_are_summed() {
        let range = resolver().resolve(TimeRange::Last7Days, None);
        let day = utc(2024, 5, 10, 0, 0);
        let series = fill_daily(&Utc, &[(day, 1.0), (day, 2.5)], &range);
        let point = series.iter().find(|p| p.bucket_start == day).unwrap();
        assert_eq!(point.value, 3.5);
    }

    fn custom(start_ms: i64, end_ms: i64) -> ResolvedRange {
        resolver().resolve(TimeRange::Custom { start_ms, end_ms }, None)
    }

    fn labels(series: &[TimeSeriesPoint]) -> Vec<String> {
        series.iter().map(|p| p.label.clone()).collect()
    }

    #[test]
    fn test_hourly_today_on_spring_forward_day() {
        // New York midnight on 2024-03-10; 2:00 local does not exist.
        let midnight = utc(2024, 3, 10, 5, 0);
        let values = [
            (utc(2024, 3, 10, 6, 0), 1.0),
            (utc(2024, 3, 10, 7, 0), 2.0),
            // 0:00 the next day
            (utc(2024, 3, 11, 4, 0), 9.0),
        ];

        let series = fill_hourly_today(&New_York, &values, midnight);

        let expected: Vec<String> = (0..24).map(|h| format!("{}:00", h)).collect();
        assert_eq!(labels(&series), expected);
        assert_eq!(series[1].value, 1.0);
        assert_eq!(series[2].value, 0.0);
        assert!(!series[2].has_data);
        assert_eq!(series[2].bucket_start, series[3].bucket_start);
        assert_eq!(series[3].value, 2.0);
        assert_eq!(series[23].bucket_start, utc(2024, 3, 11, 3, 0));
        assert!(series.iter().all(|p| p.bucket_start < utc(2024, 3, 11, 4, 0)));
        assert_eq!(series.iter().map(|p| p.value).sum::<f64>(), 3.0);
        for pair in series.windows(2) {
            assert!(pair[0].bucket_start <= pair[1].bucket_start);
        }
    }

    #[test]
    fn test_hourly_today_on_fall_back_day() {
        // New York midnight on 2024-11-03; 1:00 local happens twice.
        let midnight = utc(2024, 11, 3, 4, 0);
        let values = [
            (utc(2024, 11, 3, 5, 0), 1.0),
            (utc(2024, 11, 3, 6, 0), 2.0),
            // 23:00 EST, still the same local day
            (utc(2024, 11, 4, 4, 0), 4.0),
            // 0:00 the next day
            (utc(2024, 11, 4, 5, 0), 8.0),
        ];

        let series = fill_hourly_today(&New_York, &values, midnight);

        assert_eq!(series.len(), 24);
        assert_contiguous(&series);
        assert_eq!(series[1].label, "1:00");
        assert_eq!(series[1].bucket_start, utc(2024, 11, 3, 5, 0));
        assert_eq!(series[1].value, 3.0);
        assert_eq!(series[2].label, "2:00");
        assert_eq!(series[23].value, 4.0);
        assert_eq!(series.iter().map(|p| p.value).sum::<f64>(), 7.0);
    }

    #[test]
    fn test_daily_fill_across_spring_forward() {
        // 2024-03-09 through 2024-03-11, New York midnights.
        let range = custom(utc(2024, 3, 9, 5, 0), utc(2024, 3, 12, 4, 0));
        let values = [(utc(2024, 3, 10, 5, 0), 1.0), (utc(2024, 3, 11, 4, 0), 2.0)];

        let series = fill_daily(&New_York, &values, &range);

        assert_eq!(
            labels(&series),
            ["2024-03-09", "2024-03-10", "2024-03-11"]
        );
        assert_eq!(series[1].value, 1.0);
        assert_eq!(series[2].value, 2.0);
        assert_eq!(series[2].bucket_start - series[1].bucket_start, 23 * MS_PER_HOUR);
    }

    #[test]
    fn test_long_custom_range_keeps_newest_buckets() {
        let end = 2_000_000_000_000_000;
        let series = fill_daily(&Utc, &[], &custom(0, end));

        assert_eq!(series.len(), MAX_FILL_POINTS);
        assert_contiguous(&series);
        let last = series.last().unwrap();
        assert!(last.bucket_start < end && end - last.bucket_start <= MS_PER_DAY);

        let weeks = fill_weekly(&Utc, &[], &custom(0, end));
        assert_eq!(weeks.len(), MAX_FILL_POINTS);
    }

    #[test]
    fn test_degenerate_ranges_do_not_panic() {
        assert!(fill_daily(&Utc, &[], &custom(10, 10)).is_empty());
        assert!(fill_daily(&Utc, &[], &custom(20, 10)).is_empty());
        assert!(fill_weekly(&Utc, &[], &custom(0, i64::MIN)).is_empty());

        for end in [i64::MIN, i64::MAX] {
            assert_eq!(fill_hourly_rolling(&Utc, &[], end).len(), HOURS_PER_SERIES);
            assert_eq!(fill_monthly(&Utc, &[], end).len(), MONTHS_PER_SERIES);
        }
    }
}
