//! Chooses between rollup tables and raw events for each query.
//!
//! A rollup table is used only when all of these hold:
//!
//! 1. it exists in `sqlite_master` and holds at least one row;
//! 2. it is current: its `last_created_at` watermark has reached the newest
//!    raw event, its first bucket is no later than the oldest raw event and
//!    its `message_count` total equals the number of raw events;
//! 3. its resolution can express the requested buckets and the range
//!    boundaries fall on its bucket edges.
//!
//! Otherwise the query falls back to [`RawEventSource`]. Both paths give the
//! same answer, so the choice only affects speed.

use super::{MetricSource, RawEventSource, RollupSource, RollupTable};
use crate::db::repo::min_created_at;
use crate::error::Result;
use crate::time::{BucketZone, Granularity, ResolvedRange};
use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

/// Per-read source chooser bound to one connection and time zone.
pub struct Selector<'c, Tz: BucketZone> {
    conn: &'c Connection,
    tz: Tz,
    prefer_rollups: bool,
}

impl<'c, Tz: BucketZone> Selector<'c, Tz> {
    pub fn new(conn: &'c Connection, tz: Tz, prefer_rollups: bool) -> Self {
        Self {
            conn,
            tz,
            prefer_rollups,
        }
    }

    /// Is the table present in the schema?
    pub fn table_exists(&self, table: RollupTable) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table.table_name()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Does the table hold at least one row?
    pub fn has_rows(&self, table: RollupTable) -> Result<bool> {
        let sql = format!("SELECT 1 FROM {} LIMIT 1", table.table_name());
        let found: Option<i64> = self.conn.query_row(&sql, [], |row| row.get(0)).optional()?;
        Ok(found.is_some())
    }

    /// Has the rollup job caught up with the raw events at both ends, and
    /// does it account for every one of them?
    pub fn is_current(&self, table: RollupTable) -> Result<bool> {
        let sql = format!(
            "SELECT (SELECT MAX(last_created_at) FROM {t}), \
                    (SELECT MIN(time_bucket) FROM {t}), \
                    (SELECT MAX(created_at) FROM messages), \
                    (SELECT COALESCE(SUM(message_count), 0) FROM {t}), \
                    (SELECT COUNT(*) FROM messages)",
            t = table.table_name()
        );
        let (watermark, first_bucket, newest, rolled_up, raw_count) =
            self.conn.query_row(&sql, [], |row| {
                Ok((
                    row.get::<_, Option<i64>>(0)?,
                    row.get::<_, Option<i64>>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })?;

        let Some(newest) = newest else {
            return Ok(true);
        };
        let Some(oldest) = min_created_at(self.conn)? else {
            return Ok(true);
        };

        let caught_up = watermark.is_some_and(|w| w >= newest);
        let oldest_bucket = table.resolution().bucket_start(&self.tz, oldest);
        let backfilled = first_bucket.is_some_and(|b| b <= oldest_bucket);
        let complete = rolled_up == raw_count;
        Ok(caught_up && backfilled && complete)
    }

    /// Exists, is non-empty and is current. Query errors count as unusable.
    pub fn has_usable_rollup(&self, table: RollupTable) -> bool {
        let check = || -> Result<bool> {
            Ok(self.table_exists(table)? && self.has_rows(table)? && self.is_current(table)?)
        };
        match check() {
            Ok(usable) => {
                if !usable {
                    debug!(table = table.table_name(), "Rollup not usable");
                }
                usable
            }
            Err(e) => {
                debug!(table = table.table_name(), error = %e, "Rollup check failed");
                false
            }
        }
    }

    /// Do the range boundaries fall on the table's bucket edges?
    pub fn covers(&self, table: RollupTable, range: &ResolvedRange) -> bool {
        let resolution = table.resolution();
        let start_ok = range.open_start() || resolution.is_aligned(&self.tz, range.start_ms);
        let end_ok = range.selector.ends_now() || resolution.is_aligned(&self.tz, range.end_ms);
        start_ok && end_ok
    }

    /// Pick a source for a query bucketed at `granularity`, trying
    /// `preferred` first and then finer rollups.
    pub fn select(
        &self,
        preferred: RollupTable,
        granularity: Granularity,
        range: &ResolvedRange,
    ) -> Box<dyn MetricSource> {
        if self.prefer_rollups {
            let finest_first = RollupTable::ALL;
            let upto = finest_first
                .iter()
                .position(|t| *t == preferred)
                .unwrap_or(0);
            for table in finest_first[..=upto].iter().rev().copied() {
                if table.can_serve(granularity)
                    && self.covers(table, range)
                    && self.has_usable_rollup(table)
                {
                    debug!(table = table.table_name(), "Using rollup");
                    return Box::new(RollupSource(table));
                }
            }
        }
        debug!(
            preferred = preferred.table_name(),
            "Falling back to raw events"
        );
        Box::new(RawEventSource)
    }

    /// Source for range totals and rankings: hourly rollups for today,
    /// daily otherwise.
    pub fn for_totals(&self, range: &ResolvedRange) -> Box<dyn MetricSource> {
        let preferred = if range.selector == crate::time::TimeRange::Today {
            RollupTable::Hourly
        } else {
            RollupTable::Daily
        };
        self.select(preferred, preferred.resolution(), range)
    }

    /// Source for a series bucketed at `granularity`.
    pub fn for_granularity(
        &self,
        granularity: Granularity,
        range: &ResolvedRange,
    ) -> Box<dyn MetricSource> {
        self.select(RollupTable::preferred_for(granularity), granularity, range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::source::SourceKind;
    use crate::time::{RangeResolver, TimeRange};
    use chrono::{TimeZone, Utc};
    use rusqlite::params;

    fn utc(y: i32, m: u32, d: u32, h: u32) -> i64 {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0)
            .unwrap()
            .timestamp_millis()
    }

    fn seed(conn: &Connection, created: i64, watermark: i64) {
        conn.execute(
            "INSERT INTO messages (id, session_id, role, created_at)
             VALUES ('m1', 's', 'user', ?1)",
            [created],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO daily_stats (time_bucket, message_count, session_count, last_created_at)
             VALUES (?1, 1, 1, ?2)",
            params![utc(2024, 5, 10, 0), watermark],
        )
        .unwrap();
    }

    fn range(selector: TimeRange) -> ResolvedRange {
        RangeResolver::new(Utc)
            .with_now(utc(2024, 5, 15, 13) + 47 * 60_000)
            .resolve(selector, Some(utc(2024, 5, 10, 9)))
    }

    #[test]
    fn test_current_rollup_is_selected() {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        let conn = db.connection().unwrap();
        seed(&conn, utc(2024, 5, 10, 9), utc(2024, 5, 10, 9));

        let selector = Selector::new(&conn, Utc, true);
        assert!(selector.has_usable_rollup(RollupTable::Daily));
        let source = selector.for_totals(&range(TimeRange::Last7Days));
        assert_eq!(source.kind(), SourceKind::Rollup(RollupTable::Daily));
    }

    #[test]
    fn test_stale_rollup_is_skipped() {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        let conn = db.connection().unwrap();
        seed(&conn, utc(2024, 5, 10, 9), utc(2024, 5, 10, 8));

        let selector = Selector::new(&conn, Utc, true);
        assert!(!selector.is_current(RollupTable::Daily).unwrap());
        let source = selector.for_totals(&range(TimeRange::Last7Days));
        assert_eq!(source.kind(), SourceKind::Raw);
    }

    #[test]
    fn test_empty_or_missing_rollup_is_skipped() {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        let conn = db.connection().unwrap();
        let selector = Selector::new(&conn, Utc, true);
        assert!(selector.table_exists(RollupTable::Hourly).unwrap());
        assert!(!selector.has_rows(RollupTable::Hourly).unwrap());
        assert!(!selector.has_usable_rollup(RollupTable::Hourly));

        let bare = Database::open_in_memory().unwrap();
        bare.migrate_to(1).unwrap();
        let conn = bare.connection().unwrap();
        let selector = Selector::new(&conn, Utc, true);
        assert!(!selector.table_exists(RollupTable::Daily).unwrap());
        assert!(!selector.has_usable_rollup(RollupTable::Daily));
    }

    #[test]
    fn test_unaligned_range_falls_back() {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        let conn = db.connection().unwrap();
        seed(&conn, utc(2024, 5, 10, 9), utc(2024, 5, 10, 9));
        let selector = Selector::new(&conn, Utc, true);

        assert!(!selector.covers(RollupTable::Daily, &range(TimeRange::Last24Hours)));
        assert!(selector.covers(RollupTable::Daily, &range(TimeRange::AllTime)));
        let source = selector.for_totals(&range(TimeRange::Last24Hours));
        assert_eq!(source.kind(), SourceKind::Raw);
    }

    #[test]
    fn test_rollup_missing_middle_rows_is_skipped() {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        let conn = db.connection().unwrap();
        seed(&conn, utc(2024, 5, 10, 9), utc(2024, 5, 12, 9));
        // A later event whose bucket was never written, though the
        // watermark already reaches it.
        conn.execute(
            "INSERT INTO messages (id, session_id, role, created_at)
             VALUES ('m2', 's', 'user', ?1)",
            [utc(2024, 5, 12, 9)],
        )
        .unwrap();

        let selector = Selector::new(&conn, Utc, true);
        assert!(selector.has_rows(RollupTable::Daily).unwrap());
        assert!(!selector.is_current(RollupTable::Daily).unwrap());
        let source = selector.for_totals(&range(TimeRange::Last7Days));
        assert_eq!(source.kind(), SourceKind::Raw);
    }

    #[test]
    fn test_prefer_rollups_off_forces_raw() {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        let conn = db.connection().unwrap();
        seed(&conn, utc(2024, 5, 10, 9), utc(2024, 5, 10, 9));

        let selector = Selector::new(&conn, Utc, false);
        let source = selector.for_totals(&range(TimeRange::Last7Days));
        assert_eq!(source.kind(), SourceKind::Raw);
    }
}
