//! Fixed-length series shapes, with and without data.

mod common;

use chrono::Utc;
use common::{insert, now, populate_rollups, seed_history, service, store, utc, Event};
use usagelens_core::time::MS_PER_HOUR;
use usagelens_core::{Granularity, Metric, TimeRange, TimeSeriesPoint};

fn assert_contiguous(series: &[TimeSeriesPoint]) {
    for (i, point) in series.iter().enumerate() {
        assert_eq!(point.bucket_index, i);
    }
}

#[test]
fn test_last_30_days_daily_has_30_points() {
    let db = store();
    insert(
        &db,
        &[
            Event::new("a", "s1", "user", utc(2024, 4, 15, 6, 0)),
            Event::new("b", "s1", "user", utc(2024, 5, 14, 23, 59)),
            // Outside the window on both ends.
            Event::new("c", "s2", "user", utc(2024, 4, 14, 23, 59)),
            Event::new("d", "s3", "user", utc(2024, 5, 15, 0, 0)),
        ],
    );

    let series =
        service(&db, Utc, true).trend(TimeRange::Last30Days, Metric::Messages, Granularity::Daily);
    assert_eq!(series.len(), 30);
    assert_contiguous(&series);
    assert_eq!(series[0].label, "2024-04-15");
    assert_eq!(series[0].value, 1.0);
    assert_eq!(series[29].value, 1.0);
    assert_eq!(series.iter().filter(|p| p.has_data).count(), 2);
}

#[test]
fn test_empty_store_still_yields_full_series() {
    let db = store();
    let svc = service(&db, Utc, true);
    for (range, granularity, len) in [
        (TimeRange::Today, Granularity::Hourly, 24),
        (TimeRange::Last24Hours, Granularity::Hourly, 24),
        (TimeRange::Last7Days, Granularity::Daily, 7),
        (TimeRange::Last30Days, Granularity::Daily, 30),
        (TimeRange::AllTime, Granularity::Monthly, 12),
    ] {
        let series = svc.try_trend(range, Metric::Cost, granularity).unwrap();
        assert_eq!(series.len(), len, "{:?}", range);
        assert!(series.iter().all(|p| p.value == 0.0 && !p.has_data));
        assert_contiguous(&series);
    }
}

#[test]
fn test_today_hourly_labels() {
    let db = store();
    seed_history(&db);
    populate_rollups(&db, Utc);

    let series =
        service(&db, Utc, true).trend(TimeRange::Today, Metric::Messages, Granularity::Hourly);
    let labels: Vec<String> = series.iter().map(|p| p.label.clone()).collect();
    let expected: Vec<String> = (0..24).map(|h| format!("{}:00", h)).collect();
    assert_eq!(labels, expected);
    assert_eq!(series[9].value, 2.0);
}

#[test]
fn test_last_24_hours_ends_at_now() {
    let db = store();
    seed_history(&db);

    let series = service(&db, Utc, true).trend(
        TimeRange::Last24Hours,
        Metric::Messages,
        Granularity::Hourly,
    );
    assert_eq!(series.len(), 24);
    let last = series.last().unwrap();
    let last_end = last.bucket_start + MS_PER_HOUR;
    assert!(last_end >= now() && last_end - now() <= MS_PER_HOUR);

    // 2024-05-14 22:00 and 23:00 UTC, then 09:00 today.
    let with_data: Vec<&str> = series
        .iter()
        .filter(|p| p.has_data)
        .map(|p| p.label.as_str())
        .collect();
    assert_eq!(with_data, ["22:00", "23:00", "9:00"]);
}

#[test]
fn test_all_time_monthly_has_twelve_months() {
    let db = store();
    seed_history(&db);
    populate_rollups(&db, Utc);

    let series =
        service(&db, Utc, true).trend(TimeRange::AllTime, Metric::Messages, Granularity::Monthly);
    assert_eq!(series.len(), 12);
    assert_eq!(series[0].label, "2023-06");
    assert_eq!(series[11].label, "2024-05");
    assert_eq!(series[11].value, 10.0);
    assert_eq!(series[10].value, 1.0);
    assert_eq!(series[7].label, "2024-01");
    assert_eq!(series[7].value, 1.0);
}
