//! Metric sources: where aggregated counters come from.
//!
//! Every aggregation can be answered from two places:
//!
//! - [`RollupSource`] reads one of the pre-aggregated `hourly_stats`,
//!   `daily_stats` or `monthly_stats` tables;
//! - [`RawEventSource`] scans the `messages` table directly.
//!
//! Both implement [`MetricSource`], whose provided methods build the SQL from
//! an enum-indexed expression table ([`aggregate_expression`]) rather than by
//! string concatenation per call site. The [`Selector`] picks one source per
//! call; results are identical whichever one it picks.

pub mod raw;
pub mod rollup;
pub mod selector;

pub use raw::RawEventSource;
pub use rollup::{RollupSource, RollupTable};
pub use selector::Selector;

use crate::error::Result;
use crate::time::{Bounds, Granularity};
use crate::types::{BreakdownRow, Dimension, Metric, Role, UsageTotals};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use serde::Serialize;

/// Which computation path answered a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Rollup(RollupTable),
    Raw,
}

/// Dimension filters applied on top of the time bounds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryFilter {
    pub project: Option<String>,
    pub role: Option<Role>,
}

impl QueryFilter {
    /// Only events for `project`.
    pub fn project(project: impl Into<String>) -> Self {
        Self {
            project: Some(project.into()),
            role: None,
        }
    }

    /// Only events authored by `role`.
    pub fn role(role: Role) -> Self {
        Self {
            project: None,
            role: Some(role),
        }
    }
}

/// Restricts hour-of-day breakdowns to a kind of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DayType {
    #[default]
    All,
    /// Monday to Friday
    Weekday,
    /// Saturday and Sunday
    Weekend,
}

impl DayType {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "all" => Some(DayType::All),
            "weekday" | "weekdays" => Some(DayType::Weekday),
            "weekend" | "weekends" => Some(DayType::Weekend),
            _ => None,
        }
    }

    /// True if a local weekday (0 = Sunday) belongs to this day type.
    pub fn matches(&self, weekday: u32) -> bool {
        let weekend = weekday == 0 || weekday == 6;
        match self {
            DayType::All => true,
            DayType::Weekday => !weekend,
            DayType::Weekend => weekend,
        }
    }

    fn predicate(&self) -> Option<&'static str> {
        match self {
            DayType::All => None,
            DayType::Weekday => Some("lens_weekday({t}) BETWEEN 1 AND 5"),
            DayType::Weekend => Some("lens_weekday({t}) IN (0, 6)"),
        }
    }
}

/// Aggregate expression for `metric` when reading from a source of `kind`.
///
/// Rollup rows and the raw event relation expose the same counter column
/// names; only message and session counts differ, since a rollup row stands
/// for many events.
pub fn aggregate_expression(metric: Metric, kind: SourceKind) -> &'static str {
    match (metric, kind) {
        (Metric::Messages, SourceKind::Raw) => "COUNT(*)",
        (Metric::Messages, SourceKind::Rollup(_)) => "COALESCE(SUM(message_count), 0)",
        (Metric::Sessions, SourceKind::Raw) => "COALESCE(SUM(session_start), 0)",
        (Metric::Sessions, SourceKind::Rollup(_)) => "COALESCE(SUM(session_count), 0)",
        (Metric::InputTokens, _) => "COALESCE(SUM(input_tokens), 0)",
        (Metric::OutputTokens, _) => "COALESCE(SUM(output_tokens), 0)",
        (Metric::ReasoningTokens, _) => "COALESCE(SUM(reasoning_tokens), 0)",
        (Metric::CacheRead, _) => "COALESCE(SUM(cache_read), 0)",
        (Metric::CacheWrite, _) => "COALESCE(SUM(cache_write), 0)",
        (Metric::DurationMs, _) => "COALESCE(SUM(duration_ms), 0)",
        (Metric::Cost, _) => "COALESCE(SUM(cost), 0.0)",
        (Metric::NetCodeLines, _) => "COALESCE(SUM(net_code_lines), 0)",
        (Metric::FileCount, _) => "COALESCE(SUM(file_count), 0)",
        (Metric::TotalTokens, _) => {
            "COALESCE(SUM(input_tokens + output_tokens + reasoning_tokens), 0)"
        }
    }
}

/// Build the WHERE clause and its bound parameters.
pub(crate) fn where_clause(
    time_column: &str,
    bounds: Bounds,
    filter: &QueryFilter,
    day_type: DayType,
) -> (String, Vec<Value>) {
    let mut clauses = vec![
        format!("{} >= ?", time_column),
        format!("{} < ?", time_column),
    ];
    let mut params = vec![
        Value::Integer(bounds.start_ms),
        Value::Integer(bounds.end_ms),
    ];

    if let Some(project) = &filter.project {
        clauses.push("project = ?".to_string());
        params.push(Value::Text(project.clone()));
    }
    if let Some(role) = filter.role {
        clauses.push("role = ?".to_string());
        params.push(Value::Text(role.as_str().to_string()));
    }
    if let Some(predicate) = day_type.predicate() {
        clauses.push(predicate.replace("{t}", time_column));
    }

    (clauses.join(" AND "), params)
}

/// A place aggregated counters can be read from.
pub trait MetricSource: Send + Sync {
    /// Which path this is.
    fn kind(&self) -> SourceKind;

    /// FROM clause (a table or an aliased subquery).
    fn relation(&self) -> &'static str;

    /// Column holding the event time or bucket start, in ms.
    fn time_column(&self) -> &'static str;

    /// Aggregate expression for `metric` on this source.
    fn aggregate_expr(&self, metric: Metric) -> &'static str {
        aggregate_expression(metric, self.kind())
    }

    /// All counters summed over `bounds`.
    fn totals(
        &self,
        conn: &Connection,
        bounds: Bounds,
        filter: &QueryFilter,
    ) -> Result<UsageTotals> {
        let rows = self.breakdown(conn, bounds, &[], filter)?;
        Ok(rows.into_iter().next().map(|r| r.totals).unwrap_or_default())
    }

    /// All counters grouped by `dimensions` (no grouping when empty).
    fn breakdown(
        &self,
        conn: &Connection,
        bounds: Bounds,
        dimensions: &[Dimension],
        filter: &QueryFilter,
    ) -> Result<Vec<BreakdownRow>> {
        let keys: Vec<&str> = dimensions.iter().map(Dimension::column).collect();
        let (where_sql, params) = where_clause(self.time_column(), bounds, filter, DayType::All);

        let mut select: Vec<&str> = keys.clone();
        select.extend(Metric::COUNTERS.iter().map(|m| self.aggregate_expr(*m)));

        let mut sql = format!(
            "SELECT {} FROM {} WHERE {}",
            select.join(", "),
            self.relation(),
            where_sql
        );
        if !keys.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&keys.join(", "));
        }

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
            let mut group = Vec::with_capacity(keys.len());
            for i in 0..keys.len() {
                group.push(row.get::<_, Option<String>>(i)?.unwrap_or_default());
            }
            Ok(BreakdownRow {
                keys: group,
                totals: UsageTotals::from_row(row, keys.len())?,
            })
        })?;

        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// `metric` per bucket of `granularity`, as (bucket start, value) pairs
    /// ordered by bucket. Buckets without rows are absent.
    fn bucketed(
        &self,
        conn: &Connection,
        bounds: Bounds,
        metric: Metric,
        granularity: Granularity,
        filter: &QueryFilter,
    ) -> Result<Vec<(i64, f64)>> {
        let (where_sql, where_params) =
            where_clause(self.time_column(), bounds, filter, DayType::All);
        let sql = format!(
            "SELECT lens_bucket({t}, ?) AS bucket, {agg} FROM {rel} WHERE {w} \
             GROUP BY bucket ORDER BY bucket",
            t = self.time_column(),
            agg = self.aggregate_expr(metric),
            rel = self.relation(),
            w = where_sql,
        );

        let mut params = vec![Value::Text(granularity.as_str().to_string())];
        params.extend(where_params);

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, f64>(1)?))
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// `metric` summed per local hour of day (index 0-23).
    fn hour_of_day(
        &self,
        conn: &Connection,
        bounds: Bounds,
        metric: Metric,
        day_type: DayType,
        filter: &QueryFilter,
    ) -> Result<[f64; 24]> {
        let (where_sql, params) = where_clause(self.time_column(), bounds, filter, day_type);
        let sql = format!(
            "SELECT lens_hour({t}) AS hour, {agg} FROM {rel} WHERE {w} GROUP BY hour",
            t = self.time_column(),
            agg = self.aggregate_expr(metric),
            rel = self.relation(),
            w = where_sql,
        );

        let mut distribution = [0f64; 24];
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, f64>(1)?))
        })?;
        for row in rows {
            let (hour, value) = row?;
            if (0..24).contains(&hour) {
                distribution[hour as usize] = value;
            }
        }
        Ok(distribution)
    }

    /// `metric` summed per local weekday (index 0 = Sunday).
    fn weekday(
        &self,
        conn: &Connection,
        bounds: Bounds,
        metric: Metric,
        filter: &QueryFilter,
    ) -> Result<[f64; 7]> {
        let (where_sql, params) = where_clause(self.time_column(), bounds, filter, DayType::All);
        let sql = format!(
            "SELECT lens_weekday({t}) AS dow, {agg} FROM {rel} WHERE {w} GROUP BY dow",
            t = self.time_column(),
            agg = self.aggregate_expr(metric),
            rel = self.relation(),
            w = where_sql,
        );

        let mut distribution = [0f64; 7];
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, f64>(1)?))
        })?;
        for row in rows {
            let (dow, value) = row?;
            if (0..7).contains(&dow) {
                distribution[dow as usize] = value;
            }
        }
        Ok(distribution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expression_table_differs_only_for_counts() {
        let rollup = SourceKind::Rollup(RollupTable::Daily);
        for metric in Metric::COUNTERS {
            let same = aggregate_expression(metric, SourceKind::Raw)
                == aggregate_expression(metric, rollup);
            let expected_same = !matches!(metric, Metric::Messages | Metric::Sessions);
            assert_eq!(same, expected_same, "{:?}", metric);
        }
        assert_eq!(
            aggregate_expression(Metric::Sessions, rollup),
            "COALESCE(SUM(session_count), 0)"
        );
    }

    #[test]
    fn test_where_clause_binds_filters() {
        let filter = QueryFilter {
            project: Some("p1".to_string()),
            role: Some(Role::User),
        };
        let (sql, params) = where_clause(
            "created_at",
            Bounds {
                start_ms: 1,
                end_ms: 2,
            },
            &filter,
            DayType::Weekend,
        );
        assert_eq!(
            sql,
            "created_at >= ? AND created_at < ? AND project = ? AND role = ? \
             AND lens_weekday(created_at) IN (0, 6)"
        );
        assert_eq!(params.len(), 4);
        assert_eq!(params[2], Value::Text("p1".to_string()));
    }

    #[test]
    fn test_day_type_matches() {
        assert!(DayType::Weekend.matches(0));
        assert!(DayType::Weekend.matches(6));
        assert!(!DayType::Weekend.matches(3));
        assert!(DayType::Weekday.matches(1));
        assert!(DayType::All.matches(6));
    }
}
