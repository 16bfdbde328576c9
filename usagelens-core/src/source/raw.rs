//! Raw scans of the `messages` table.
//!
//! [`RAW_EVENTS`] normalises each message into the column layout of a rollup
//! row, so the shared [`MetricSource`] SQL runs unchanged against it. The
//! inherent methods on [`RawEventSource`] answer questions rollups cannot
//! (distinct sessions per hour, billing coverage, per-message durations).

use super::{where_clause, DayType, MetricSource, QueryFilter, SourceKind};
use crate::error::Result;
use crate::time::Bounds;
use crate::types::Dimension;
use rusqlite::{params_from_iter, Connection};
use serde::Serialize;

/// One row per message, shaped like a rollup row.
///
/// Token counts are stored as text and go through `lens_tokens`, which maps
/// anything unparseable to 0. `session_start` is 1 on the first message of
/// each session (by `created_at`, then `id`).
pub const RAW_EVENTS: &str = r#"(
    SELECT
        id,
        session_id,
        created_at,
        COALESCE(role, '') AS role,
        COALESCE(project_id, '') AS project,
        COALESCE(provider_id, '') AS provider,
        COALESCE(model_id, '') AS model,
        COALESCE(agent, '') AS agent,
        lens_tokens(token_input) AS input_tokens,
        lens_tokens(token_output) AS output_tokens,
        lens_tokens(token_reasoning) AS reasoning_tokens,
        COALESCE(cache_read, 0) AS cache_read,
        COALESCE(cache_write, 0) AS cache_write,
        COALESCE(cost, 0.0) AS cost,
        CASE WHEN completed_at IS NOT NULL AND completed_at > created_at
             THEN completed_at - created_at ELSE 0 END AS duration_ms,
        CASE WHEN completed_at IS NOT NULL AND completed_at > created_at
             THEN 1 ELSE 0 END AS has_duration,
        COALESCE(summary_additions, 0) AS additions,
        COALESCE(summary_deletions, 0) AS deletions,
        COALESCE(summary_additions, 0) - COALESCE(summary_deletions, 0) AS net_code_lines,
        COALESCE(summary_files, 0) AS file_count,
        CASE WHEN ROW_NUMBER() OVER (
            PARTITION BY session_id ORDER BY created_at, id
        ) = 1 THEN 1 ELSE 0 END AS session_start
    FROM messages
) AS ev"#;

/// Scans usage events directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawEventSource;

impl MetricSource for RawEventSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Raw
    }

    fn relation(&self) -> &'static str {
        RAW_EVENTS
    }

    fn time_column(&self) -> &'static str {
        "created_at"
    }
}

// ============================================
// Raw-only scan results
// ============================================

/// Message and distinct-session counts behind the rhythm ratios.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RhythmCounts {
    pub messages: i64,
    pub night_messages: i64,
    pub weekend_messages: i64,
    pub sessions: i64,
    pub night_sessions: i64,
    pub weekend_sessions: i64,
}

/// Billed (cost > 0) versus all messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BillingCounts {
    pub messages: i64,
    pub billed_messages: i64,
    pub billed_cost: f64,
}

/// Assistant message timings for one group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ThroughputCounts {
    pub name: String,
    pub messages: i64,
    /// Messages with `completed_at > created_at`
    pub timed_messages: i64,
    pub timed_output_tokens: i64,
    pub timed_duration_ms: i64,
}

/// Session summaries split by who drove them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionSplit {
    /// At least one user message
    pub with_user_input: i64,
    /// No user messages at all
    pub agent_only: i64,
    pub orphan: i64,
}

/// Code churn and spend for one bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CodeOutputRow {
    pub bucket_start: i64,
    pub additions: i64,
    pub deletions: i64,
    pub cost: f64,
}

/// When and how often something was active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ActivitySpan {
    /// Distinct local days with at least one message
    pub active_days: i64,
    /// Distinct sessions with at least one message in range
    pub sessions: i64,
    pub first_seen: Option<i64>,
    pub last_seen: Option<i64>,
}

/// SQL predicate for a night window `[start, end)` over local hours.
fn night_predicate(start_hour: u32, end_hour: u32) -> String {
    let (start, end) = (start_hour.min(23), end_hour.min(23));
    if start == end {
        "0".to_string()
    } else if start > end {
        format!(
            "(lens_hour(created_at) >= {} OR lens_hour(created_at) < {})",
            start, end
        )
    } else {
        format!(
            "(lens_hour(created_at) >= {} AND lens_hour(created_at) < {})",
            start, end
        )
    }
}

impl RawEventSource {
    /// Night, weekend and total activity, counted both per message and per
    /// distinct session.
    pub fn rhythm_counts(
        &self,
        conn: &Connection,
        bounds: Bounds,
        night_start_hour: u32,
        night_end_hour: u32,
    ) -> Result<RhythmCounts> {
        let night = night_predicate(night_start_hour, night_end_hour);
        let weekend = "lens_weekday(created_at) IN (0, 6)";
        let (where_sql, params) =
            where_clause("created_at", bounds, &QueryFilter::default(), DayType::All);
        let sql = format!(
            "SELECT COUNT(*), \
                    COALESCE(SUM(CASE WHEN {night} THEN 1 ELSE 0 END), 0), \
                    COALESCE(SUM(CASE WHEN {weekend} THEN 1 ELSE 0 END), 0), \
                    COUNT(DISTINCT session_id), \
                    COUNT(DISTINCT CASE WHEN {night} THEN session_id END), \
                    COUNT(DISTINCT CASE WHEN {weekend} THEN session_id END) \
             FROM messages WHERE {where_sql}"
        );

        let counts = conn.query_row(&sql, params_from_iter(params.iter()), |row| {
            Ok(RhythmCounts {
                messages: row.get(0)?,
                night_messages: row.get(1)?,
                weekend_messages: row.get(2)?,
                sessions: row.get(3)?,
                night_sessions: row.get(4)?,
                weekend_sessions: row.get(5)?,
            })
        })?;
        Ok(counts)
    }

    /// How many messages carry a cost.
    pub fn billing(
        &self,
        conn: &Connection,
        bounds: Bounds,
        filter: &QueryFilter,
    ) -> Result<BillingCounts> {
        let (where_sql, params) = where_clause("created_at", bounds, filter, DayType::All);
        let sql = format!(
            "SELECT COUNT(*), \
                    COALESCE(SUM(CASE WHEN cost > 0 THEN 1 ELSE 0 END), 0), \
                    COALESCE(SUM(CASE WHEN cost > 0 THEN cost ELSE 0 END), 0.0) \
             FROM {RAW_EVENTS} WHERE {where_sql}"
        );

        let counts = conn.query_row(&sql, params_from_iter(params.iter()), |row| {
            Ok(BillingCounts {
                messages: row.get(0)?,
                billed_messages: row.get(1)?,
                billed_cost: row.get(2)?,
            })
        })?;
        Ok(counts)
    }

    /// Assistant message timings grouped by `dimension`, busiest first.
    pub fn throughput(
        &self,
        conn: &Connection,
        bounds: Bounds,
        dimension: Dimension,
    ) -> Result<Vec<ThroughputCounts>> {
        let (where_sql, params) = where_clause(
            "created_at",
            bounds,
            &QueryFilter::role(crate::types::Role::Assistant),
            DayType::All,
        );
        let key = dimension.column();
        let sql = format!(
            "SELECT {key}, COUNT(*), \
                    COALESCE(SUM(has_duration), 0), \
                    COALESCE(SUM(CASE WHEN has_duration = 1 THEN output_tokens ELSE 0 END), 0), \
                    COALESCE(SUM(duration_ms), 0) \
             FROM {RAW_EVENTS} WHERE {where_sql} \
             GROUP BY {key} ORDER BY COUNT(*) DESC, {key}"
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
            Ok(ThroughputCounts {
                name: row.get(0)?,
                messages: row.get(1)?,
                timed_messages: row.get(2)?,
                timed_output_tokens: row.get(3)?,
                timed_duration_ms: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Session summaries created in `bounds`, split into sessions with human
    /// input, agent-only sessions and orphans.
    pub fn session_split(&self, conn: &Connection, bounds: Bounds) -> Result<SessionSplit> {
        let split = conn.query_row(
            "SELECT \
                COALESCE(SUM(CASE WHEN COALESCE(user_message_count, 0) > 0 THEN 1 ELSE 0 END), 0), \
                COALESCE(SUM(CASE WHEN COALESCE(user_message_count, 0) = 0 THEN 1 ELSE 0 END), 0), \
                COALESCE(SUM(CASE WHEN COALESCE(is_orphan, 0) != 0 THEN 1 ELSE 0 END), 0) \
             FROM sessions WHERE created_at >= ?1 AND created_at < ?2",
            [bounds.start_ms, bounds.end_ms],
            |row| {
                Ok(SessionSplit {
                    with_user_input: row.get(0)?,
                    agent_only: row.get(1)?,
                    orphan: row.get(2)?,
                })
            },
        )?;
        Ok(split)
    }

    /// Additions, deletions and cost per local day, days without rows absent.
    pub fn code_output_daily(
        &self,
        conn: &Connection,
        bounds: Bounds,
        filter: &QueryFilter,
    ) -> Result<Vec<CodeOutputRow>> {
        let (where_sql, params) = where_clause("created_at", bounds, filter, DayType::All);
        let sql = format!(
            "SELECT lens_bucket(created_at, 'day') AS bucket, \
                    COALESCE(SUM(additions), 0), \
                    COALESCE(SUM(deletions), 0), \
                    COALESCE(SUM(cost), 0.0) \
             FROM {RAW_EVENTS} WHERE {where_sql} \
             GROUP BY bucket ORDER BY bucket"
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
            Ok(CodeOutputRow {
                bucket_start: row.get(0)?,
                additions: row.get(1)?,
                deletions: row.get(2)?,
                cost: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Active days, sessions and first/last message time.
    pub fn activity(
        &self,
        conn: &Connection,
        bounds: Bounds,
        filter: &QueryFilter,
    ) -> Result<ActivitySpan> {
        let (where_sql, params) = where_clause("created_at", bounds, filter, DayType::All);
        let sql = format!(
            "SELECT COUNT(DISTINCT lens_bucket(created_at, 'day')), \
                    COUNT(DISTINCT session_id), \
                    MIN(created_at), \
                    MAX(created_at) \
             FROM {RAW_EVENTS} WHERE {where_sql}"
        );

        let span = conn.query_row(&sql, params_from_iter(params.iter()), |row| {
            Ok(ActivitySpan {
                active_days: row.get(0)?,
                sessions: row.get(1)?,
                first_seen: row.get(2)?,
                last_seen: row.get(3)?,
            })
        })?;
        Ok(span)
    }
}
