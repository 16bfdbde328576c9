//! Query façade
//!
//! [`StatsService`] is the read API consumed by dashboards and the CLI. Each
//! report comes in two flavours:
//!
//! - `try_<report>` returns [`Result`] and surfaces store failures;
//! - `<report>` logs the failure and returns an empty but correctly shaped
//!   value (filled series keep their fixed length).
//!
//! Every report resolves its [`TimeRange`], asks the [`Selector`] for a
//! [`MetricSource`] and post-processes with [`crate::stats`].

use crate::config::StatsConfig;
use crate::db::repo::min_created_at;
use crate::db::Database;
use crate::error::Result;
use crate::source::raw::{ActivitySpan, CodeOutputRow};
use crate::source::{
    DayType, MetricSource, QueryFilter, RawEventSource, RollupTable, Selector,
};
use crate::stats::{
    automation_level, heatmap_cells, top_n_with_other, AnomalyMetric, AnomalyStats, Baseline,
    BillingCoverage, HeatmapCell, RhythmInsights, ThroughputStats, TimeOfDayDistribution,
    WeekdayWeekendSplit,
};
use crate::time::bucket::weekday;
use crate::time::fill::fill_daily;
use crate::time::{fill_series, BucketZone, Granularity, RangeResolver, ResolvedRange, TimeRange};
use crate::types::{BreakdownRow, Dimension, Metric, Role, TimeSeriesPoint, UsageTotals};
use chrono::Local;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, warn};

// ============================================
// Report types
// ============================================

/// Headline numbers for a range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct OverviewStats {
    pub totals: UsageTotals,
    pub user_messages: i64,
    pub assistant_messages: i64,
    /// Assistant share of messages, percent
    pub automation_level: f64,
    pub total_tokens: i64,
}

/// Daily KPI series over the trailing days, today included.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KpiTrend {
    pub messages: Vec<TimeSeriesPoint>,
    pub sessions: Vec<TimeSeriesPoint>,
    pub cost: Vec<TimeSeriesPoint>,
    pub tokens: Vec<TimeSeriesPoint>,
}

/// Message and session counts by who drove them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct UserVsAgent {
    pub user_messages: i64,
    pub assistant_messages: i64,
    pub automation_level: f64,
    /// Sessions with at least one user message
    pub sessions_with_user_input: i64,
    /// Sessions without any user message
    pub agent_only_sessions: i64,
    pub orphan_sessions: i64,
}

/// Per-role message series.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserVsAgentTrend {
    pub user: Vec<TimeSeriesPoint>,
    pub assistant: Vec<TimeSeriesPoint>,
}

/// Daily code churn and spend.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CodeOutputTrend {
    pub additions: Vec<TimeSeriesPoint>,
    pub deletions: Vec<TimeSeriesPoint>,
    /// additions - deletions
    pub net: Vec<TimeSeriesPoint>,
    pub cost: Vec<TimeSeriesPoint>,
}

/// Heatmaps for the headline counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HeatmapBundle {
    pub messages: Vec<HeatmapCell>,
    pub sessions: Vec<HeatmapCell>,
    pub tokens: Vec<HeatmapCell>,
    pub cost: Vec<HeatmapCell>,
}

/// Grouping for [`StatsService::model_lens`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelLensGroup {
    Model,
    Provider,
}

impl ModelLensGroup {
    fn dimension(&self) -> Dimension {
        match self {
            ModelLensGroup::Model => Dimension::Model,
            ModelLensGroup::Provider => Dimension::Provider,
        }
    }
}

/// Usage and speed of one model or provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelLensRow {
    pub name: String,
    pub totals: UsageTotals,
    pub throughput: ThroughputStats,
}

// ============================================
// Service
// ============================================

/// Read-only statistics over a usage store.
///
/// Cheap to construct; holds no state besides configuration. Safe to share
/// across threads when the zone is.
pub struct StatsService<'a, Tz: BucketZone = Local> {
    db: &'a Database,
    tz: Tz,
    config: StatsConfig,
    now_ms: Option<i64>,
}

impl<'a> StatsService<'a, Local> {
    /// Service bucketing in the host's local time zone.
    pub fn new(db: &'a Database, config: StatsConfig) -> Self {
        Self::with_zone(db, Local, config)
    }
}

impl<'a, Tz: BucketZone> StatsService<'a, Tz> {
    pub fn with_zone(db: &'a Database, tz: Tz, config: StatsConfig) -> Self {
        Self {
            db,
            tz,
            config,
            now_ms: None,
        }
    }

    /// Pin "now" for reproducible reports.
    pub fn with_now(mut self, now_ms: i64) -> Self {
        self.now_ms = Some(now_ms);
        self
    }

    pub fn config(&self) -> &StatsConfig {
        &self.config
    }

    fn resolver(&self) -> RangeResolver<Tz> {
        let resolver = RangeResolver::new(self.tz);
        match self.now_ms {
            Some(now) => resolver.with_now(now),
            None => resolver,
        }
    }

    fn resolve(&self, conn: &Connection, range: TimeRange) -> Result<ResolvedRange> {
        let min = match range {
            TimeRange::AllTime => min_created_at(conn)?,
            _ => None,
        };
        Ok(self.resolver().resolve(range, min))
    }

    fn selector<'c>(&self, conn: &'c Connection) -> Selector<'c, Tz> {
        Selector::new(conn, self.tz, self.config.prefer_rollups)
    }

    /// Run one report inside a read transaction.
    fn run<T>(
        &self,
        report: &'static str,
        query: impl FnOnce(&Connection) -> Result<T>,
    ) -> Result<T> {
        let started = Instant::now();
        let result = self.db.read(self.tz, query);
        debug!(
            report,
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "Stats query"
        );
        result
    }

    fn degrade<T>(report: &'static str, result: Result<T>, fallback: impl FnOnce() -> T) -> T {
        match result {
            Ok(value) => value,
            Err(e) => {
                warn!(report, error = %e, "Stats query failed, returning empty result");
                fallback()
            }
        }
    }

    /// Zero series for `range`, used when the store cannot be read.
    fn empty_series(&self, range: TimeRange, granularity: Granularity) -> Vec<TimeSeriesPoint> {
        let resolved = self.resolver().resolve(range, None);
        fill_series(&self.tz, &[], &resolved, granularity)
    }

    fn series(
        &self,
        conn: &Connection,
        resolved: &ResolvedRange,
        metric: Metric,
        granularity: Granularity,
        filter: &QueryFilter,
    ) -> Result<Vec<TimeSeriesPoint>> {
        let source = self.selector(conn).for_granularity(granularity, resolved);
        let values = source.bucketed(conn, resolved.bounds(), metric, granularity, filter)?;
        Ok(fill_series(&self.tz, &values, resolved, granularity))
    }

    fn ranked(
        &self,
        conn: &Connection,
        source: &dyn MetricSource,
        resolved: &ResolvedRange,
        dimension: Dimension,
        n: usize,
    ) -> Result<Vec<BreakdownRow>> {
        let rows =
            source.breakdown(conn, resolved.bounds(), &[dimension], &QueryFilter::default())?;
        Ok(top_n_with_other(rows, n, Metric::InputTokens))
    }

    // ----------------------------------------
    // 1. Overview
    // ----------------------------------------

    fn overview_in(&self, conn: &Connection, resolved: &ResolvedRange) -> Result<OverviewStats> {
        let source = self.selector(conn).for_totals(resolved);
        let rows = source.breakdown(
            conn,
            resolved.bounds(),
            &[Dimension::Role],
            &QueryFilter::default(),
        )?;

        let mut stats = OverviewStats::default();
        for row in &rows {
            stats.totals.absorb(&row.totals);
            match Role::parse(row.name()) {
                Some(Role::User) => stats.user_messages += row.totals.messages,
                Some(Role::Assistant) => stats.assistant_messages += row.totals.messages,
                None => {}
            }
        }
        stats.automation_level =
            automation_level(stats.assistant_messages, stats.user_messages);
        stats.total_tokens = stats.totals.total_tokens();
        Ok(stats)
    }

    pub fn try_overview(&self, range: TimeRange) -> Result<OverviewStats> {
        self.run("overview", |conn| {
            let resolved = self.resolve(conn, range)?;
            self.overview_in(conn, &resolved)
        })
    }

    pub fn overview(&self, range: TimeRange) -> OverviewStats {
        Self::degrade("overview", self.try_overview(range), OverviewStats::default)
    }

    // ----------------------------------------
    // 2. KPI trend
    // ----------------------------------------

    pub fn try_kpi_trend(&self, days: u32) -> Result<KpiTrend> {
        let resolved = self.resolver().trailing_days(days);
        self.run("kpi_trend", |conn| {
            let source = self.selector(conn).for_granularity(Granularity::Daily, &resolved);
            let filter = QueryFilter::default();
            let daily = |metric| -> Result<Vec<TimeSeriesPoint>> {
                let values =
                    source.bucketed(conn, resolved.bounds(), metric, Granularity::Daily, &filter)?;
                Ok(fill_daily(&self.tz, &values, &resolved))
            };
            Ok(KpiTrend {
                messages: daily(Metric::Messages)?,
                sessions: daily(Metric::Sessions)?,
                cost: daily(Metric::Cost)?,
                tokens: daily(Metric::TotalTokens)?,
            })
        })
    }

    pub fn kpi_trend(&self, days: u32) -> KpiTrend {
        Self::degrade("kpi_trend", self.try_kpi_trend(days), || {
            let resolved = self.resolver().trailing_days(days);
            let empty = fill_daily(&self.tz, &[], &resolved);
            KpiTrend {
                messages: empty.clone(),
                sessions: empty.clone(),
                cost: empty.clone(),
                tokens: empty,
            }
        })
    }

    // ----------------------------------------
    // 3. Trend
    // ----------------------------------------

    pub fn try_trend_filtered(
        &self,
        range: TimeRange,
        metric: Metric,
        granularity: Granularity,
        filter: &QueryFilter,
    ) -> Result<Vec<TimeSeriesPoint>> {
        self.run("trend", |conn| {
            let resolved = self.resolve(conn, range)?;
            self.series(conn, &resolved, metric, granularity, filter)
        })
    }

    pub fn try_trend(
        &self,
        range: TimeRange,
        metric: Metric,
        granularity: Granularity,
    ) -> Result<Vec<TimeSeriesPoint>> {
        self.try_trend_filtered(range, metric, granularity, &QueryFilter::default())
    }

    /// `metric` over `range`, filled to a fixed-length series.
    pub fn trend(
        &self,
        range: TimeRange,
        metric: Metric,
        granularity: Granularity,
    ) -> Vec<TimeSeriesPoint> {
        Self::degrade("trend", self.try_trend(range, metric, granularity), || {
            self.empty_series(range, granularity)
        })
    }

    // ----------------------------------------
    // 4-5. Time of day, weekday/weekend
    // ----------------------------------------

    pub fn try_time_of_day(
        &self,
        range: TimeRange,
        metric: Metric,
    ) -> Result<TimeOfDayDistribution> {
        let hourly = self.try_hourly_intensity(range, metric, DayType::All)?;
        Ok(TimeOfDayDistribution::from_hourly(&hourly))
    }

    pub fn time_of_day(&self, range: TimeRange, metric: Metric) -> TimeOfDayDistribution {
        Self::degrade("time_of_day", self.try_time_of_day(range, metric), Default::default)
    }

    pub fn try_weekday_weekend(
        &self,
        range: TimeRange,
        metric: Metric,
    ) -> Result<WeekdayWeekendSplit> {
        self.run("weekday_weekend", |conn| {
            let resolved = self.resolve(conn, range)?;
            let source = self.selector(conn).for_granularity(Granularity::Daily, &resolved);
            let days = source.bucketed(
                conn,
                resolved.bounds(),
                metric,
                Granularity::Daily,
                &QueryFilter::default(),
            )?;
            Ok(WeekdayWeekendSplit::from_days(
                days.into_iter()
                    .map(|(day, value)| (weekday(&self.tz, day), value)),
            ))
        })
    }

    pub fn weekday_weekend(&self, range: TimeRange, metric: Metric) -> WeekdayWeekendSplit {
        Self::degrade("weekday_weekend", self.try_weekday_weekend(range, metric), Default::default)
    }

    // ----------------------------------------
    // 6. Top-N
    // ----------------------------------------

    /// Top projects by input tokens, always from raw events.
    pub fn try_top_projects(&self, range: TimeRange, n: usize) -> Result<Vec<BreakdownRow>> {
        self.run("top_projects", |conn| {
            let resolved = self.resolve(conn, range)?;
            self.ranked(conn, &RawEventSource, &resolved, Dimension::Project, n)
        })
    }

    pub fn top_projects(&self, range: TimeRange, n: usize) -> Vec<BreakdownRow> {
        Self::degrade("top_projects", self.try_top_projects(range, n), Vec::new)
    }

    /// Top models by input tokens, always from raw events.
    pub fn try_top_models(&self, range: TimeRange, n: usize) -> Result<Vec<BreakdownRow>> {
        self.run("top_models", |conn| {
            let resolved = self.resolve(conn, range)?;
            self.ranked(conn, &RawEventSource, &resolved, Dimension::Model, n)
        })
    }

    pub fn top_models(&self, range: TimeRange, n: usize) -> Vec<BreakdownRow> {
        Self::degrade("top_models", self.try_top_models(range, n), Vec::new)
    }

    /// Top projects, reading rollups when usable.
    pub fn try_top_projects_optimized(
        &self,
        range: TimeRange,
        n: usize,
    ) -> Result<Vec<BreakdownRow>> {
        self.run("top_projects_optimized", |conn| {
            let resolved = self.resolve(conn, range)?;
            let source = self.selector(conn).for_totals(&resolved);
            self.ranked(conn, source.as_ref(), &resolved, Dimension::Project, n)
        })
    }

    pub fn top_projects_optimized(&self, range: TimeRange, n: usize) -> Vec<BreakdownRow> {
        Self::degrade(
            "top_projects_optimized",
            self.try_top_projects_optimized(range, n),
            Vec::new,
        )
    }

    /// Top models, reading rollups when usable.
    pub fn try_top_models_optimized(
        &self,
        range: TimeRange,
        n: usize,
    ) -> Result<Vec<BreakdownRow>> {
        self.run("top_models_optimized", |conn| {
            let resolved = self.resolve(conn, range)?;
            let source = self.selector(conn).for_totals(&resolved);
            self.ranked(conn, source.as_ref(), &resolved, Dimension::Model, n)
        })
    }

    pub fn top_models_optimized(&self, range: TimeRange, n: usize) -> Vec<BreakdownRow> {
        Self::degrade(
            "top_models_optimized",
            self.try_top_models_optimized(range, n),
            Vec::new,
        )
    }

    // ----------------------------------------
    // 7. Per project
    // ----------------------------------------

    pub fn project_daily(
        &self,
        project: &str,
        range: TimeRange,
        metric: Metric,
    ) -> Vec<TimeSeriesPoint> {
        let filter = QueryFilter::project(project);
        Self::degrade(
            "project_daily",
            self.try_trend_filtered(range, metric, Granularity::Daily, &filter),
            || self.empty_series(range, Granularity::Daily),
        )
    }

    pub fn try_project_activity(&self, project: &str, range: TimeRange) -> Result<ActivitySpan> {
        self.run("project_activity", |conn| {
            let resolved = self.resolve(conn, range)?;
            RawEventSource.activity(conn, resolved.bounds(), &QueryFilter::project(project))
        })
    }

    pub fn project_activity(&self, project: &str, range: TimeRange) -> ActivitySpan {
        Self::degrade(
            "project_activity",
            self.try_project_activity(project, range),
            ActivitySpan::default,
        )
    }

    pub fn try_project_consumption(&self, project: &str, range: TimeRange) -> Result<UsageTotals> {
        self.run("project_consumption", |conn| {
            let resolved = self.resolve(conn, range)?;
            let source = self.selector(conn).for_totals(&resolved);
            source.totals(conn, resolved.bounds(), &QueryFilter::project(project))
        })
    }

    pub fn project_consumption(&self, project: &str, range: TimeRange) -> UsageTotals {
        Self::degrade(
            "project_consumption",
            self.try_project_consumption(project, range),
            UsageTotals::default,
        )
    }

    /// Usage of one project per (model, agent), most messages first.
    pub fn try_project_model_agents(
        &self,
        project: &str,
        range: TimeRange,
    ) -> Result<Vec<BreakdownRow>> {
        self.run("project_model_agents", |conn| {
            let resolved = self.resolve(conn, range)?;
            let source = self.selector(conn).for_totals(&resolved);
            let mut rows = source.breakdown(
                conn,
                resolved.bounds(),
                &[Dimension::Model, Dimension::Agent],
                &QueryFilter::project(project),
            )?;
            rows.sort_by(|a, b| {
                b.totals
                    .messages
                    .cmp(&a.totals.messages)
                    .then_with(|| a.keys.cmp(&b.keys))
            });
            Ok(rows)
        })
    }

    pub fn project_model_agents(&self, project: &str, range: TimeRange) -> Vec<BreakdownRow> {
        Self::degrade(
            "project_model_agents",
            self.try_project_model_agents(project, range),
            Vec::new,
        )
    }

    // ----------------------------------------
    // 8. User vs agent
    // ----------------------------------------

    /// Message and session splits read from one snapshot.
    pub fn try_user_vs_agent(&self, range: TimeRange) -> Result<UserVsAgent> {
        self.run("user_vs_agent", |conn| {
            let resolved = self.resolve(conn, range)?;
            let overview = self.overview_in(conn, &resolved)?;
            let split = RawEventSource.session_split(conn, resolved.bounds())?;
            Ok(UserVsAgent {
                user_messages: overview.user_messages,
                assistant_messages: overview.assistant_messages,
                automation_level: overview.automation_level,
                sessions_with_user_input: split.with_user_input,
                agent_only_sessions: split.agent_only,
                orphan_sessions: split.orphan,
            })
        })
    }

    pub fn user_vs_agent(&self, range: TimeRange) -> UserVsAgent {
        Self::degrade("user_vs_agent", self.try_user_vs_agent(range), Default::default)
    }

    pub fn try_user_vs_agent_trend(
        &self,
        range: TimeRange,
        granularity: Granularity,
    ) -> Result<UserVsAgentTrend> {
        Ok(UserVsAgentTrend {
            user: self.try_trend_filtered(
                range,
                Metric::Messages,
                granularity,
                &QueryFilter::role(Role::User),
            )?,
            assistant: self.try_trend_filtered(
                range,
                Metric::Messages,
                granularity,
                &QueryFilter::role(Role::Assistant),
            )?,
        })
    }

    pub fn user_vs_agent_trend(
        &self,
        range: TimeRange,
        granularity: Granularity,
    ) -> UserVsAgentTrend {
        Self::degrade(
            "user_vs_agent_trend",
            self.try_user_vs_agent_trend(range, granularity),
            || UserVsAgentTrend {
                user: self.empty_series(range, granularity),
                assistant: self.empty_series(range, granularity),
            },
        )
    }

    // ----------------------------------------
    // 9. Code output
    // ----------------------------------------

    pub fn try_code_output_trend(&self, range: TimeRange) -> Result<CodeOutputTrend> {
        self.run("code_output_trend", |conn| {
            let resolved = self.resolve(conn, range)?;
            let rows = RawEventSource.code_output_daily(
                conn,
                resolved.bounds(),
                &QueryFilter::default(),
            )?;
            let column = |f: fn(&CodeOutputRow) -> f64| {
                let values: Vec<(i64, f64)> = rows.iter().map(|r| (r.bucket_start, f(r))).collect();
                fill_daily(&self.tz, &values, &resolved)
            };
            Ok(CodeOutputTrend {
                additions: column(|r| r.additions as f64),
                deletions: column(|r| r.deletions as f64),
                net: column(|r| (r.additions - r.deletions) as f64),
                cost: column(|r| r.cost),
            })
        })
    }

    pub fn code_output_trend(&self, range: TimeRange) -> CodeOutputTrend {
        Self::degrade("code_output_trend", self.try_code_output_trend(range), || {
            let empty = self.empty_series(range, Granularity::Daily);
            CodeOutputTrend {
                additions: empty.clone(),
                deletions: empty.clone(),
                net: empty.clone(),
                cost: empty,
            }
        })
    }

    // ----------------------------------------
    // 10. Anomalies
    // ----------------------------------------

    pub fn try_anomalies_with(&self, range: TimeRange, baseline: Baseline) -> Result<AnomalyStats> {
        let sigma = self.config.anomaly_sigma;
        self.run("anomalies", |conn| {
            let resolved = self.resolve(conn, range)?;
            let filter = QueryFilter::default();
            let check = |metric| -> Result<AnomalyMetric> {
                let series = self.series(conn, &resolved, metric, Granularity::Daily, &filter)?;
                let values: Vec<f64> = series.iter().map(|p| p.value).collect();
                Ok(AnomalyMetric::from_series(&values, baseline, sigma))
            };
            Ok(AnomalyStats {
                messages: check(Metric::Messages)?,
                sessions: check(Metric::Sessions)?,
                cost: check(Metric::Cost)?,
                net_code_lines: check(Metric::NetCodeLines)?,
            })
        })
    }

    pub fn try_anomalies(&self, range: TimeRange) -> Result<AnomalyStats> {
        self.try_anomalies_with(range, Baseline::ExcludeCurrent)
    }

    /// Latest day of each headline counter against the days before it.
    pub fn anomalies(&self, range: TimeRange) -> AnomalyStats {
        Self::degrade("anomalies", self.try_anomalies(range), Default::default)
    }

    // ----------------------------------------
    // 11. Rhythm
    // ----------------------------------------

    pub fn try_rhythm(&self, range: TimeRange) -> Result<RhythmInsights> {
        self.run("rhythm", |conn| {
            let resolved = self.resolve(conn, range)?;
            let bounds = resolved.bounds();
            let filter = QueryFilter::default();
            let selector = self.selector(conn);

            let hourly = selector
                .select(RollupTable::Hourly, Granularity::Hourly, &resolved)
                .hour_of_day(conn, bounds, Metric::Messages, DayType::All, &filter)?;
            let weekdays = selector
                .for_granularity(Granularity::Daily, &resolved)
                .weekday(conn, bounds, Metric::Messages, &filter)?;
            let counts = RawEventSource.rhythm_counts(
                conn,
                bounds,
                self.config.night_start_hour,
                self.config.night_end_hour,
            )?;
            Ok(RhythmInsights::new(hourly, weekdays, &counts))
        })
    }

    pub fn rhythm(&self, range: TimeRange) -> RhythmInsights {
        Self::degrade("rhythm", self.try_rhythm(range), Default::default)
    }

    // ----------------------------------------
    // 12. Heatmap
    // ----------------------------------------

    /// All-time heatmaps are limited to the configured trailing days.
    fn heatmap_range(&self, conn: &Connection, range: TimeRange) -> Result<ResolvedRange> {
        match range {
            TimeRange::AllTime => Ok(self.resolver().trailing_days(self.config.heatmap_days)),
            _ => self.resolve(conn, range),
        }
    }

    fn heatmap_cells_for(
        &self,
        conn: &Connection,
        resolved: &ResolvedRange,
        metric: Metric,
    ) -> Result<Vec<HeatmapCell>> {
        let filter = QueryFilter::default();
        let series = self.series(conn, resolved, metric, Granularity::Daily, &filter)?;
        Ok(heatmap_cells(&series))
    }

    pub fn try_heatmap(&self, range: TimeRange, metric: Metric) -> Result<Vec<HeatmapCell>> {
        self.run("heatmap", |conn| {
            let resolved = self.heatmap_range(conn, range)?;
            self.heatmap_cells_for(conn, &resolved, metric)
        })
    }

    pub fn heatmap(&self, range: TimeRange, metric: Metric) -> Vec<HeatmapCell> {
        Self::degrade("heatmap", self.try_heatmap(range, metric), Vec::new)
    }

    pub fn try_heatmap_bundle(&self, range: TimeRange) -> Result<HeatmapBundle> {
        self.run("heatmap_bundle", |conn| {
            let resolved = self.heatmap_range(conn, range)?;
            Ok(HeatmapBundle {
                messages: self.heatmap_cells_for(conn, &resolved, Metric::Messages)?,
                sessions: self.heatmap_cells_for(conn, &resolved, Metric::Sessions)?,
                tokens: self.heatmap_cells_for(conn, &resolved, Metric::TotalTokens)?,
                cost: self.heatmap_cells_for(conn, &resolved, Metric::Cost)?,
            })
        })
    }

    pub fn heatmap_bundle(&self, range: TimeRange) -> HeatmapBundle {
        Self::degrade("heatmap_bundle", self.try_heatmap_bundle(range), Default::default)
    }

    // ----------------------------------------
    // 13. Intensity
    // ----------------------------------------

    pub fn try_hourly_intensity(
        &self,
        range: TimeRange,
        metric: Metric,
        day_type: DayType,
    ) -> Result<[f64; 24]> {
        self.run("hourly_intensity", |conn| {
            let resolved = self.resolve(conn, range)?;
            self.selector(conn)
                .select(RollupTable::Hourly, Granularity::Hourly, &resolved)
                .hour_of_day(conn, resolved.bounds(), metric, day_type, &QueryFilter::default())
        })
    }

    /// `metric` per local hour of day, optionally only weekdays or weekends.
    pub fn hourly_intensity(
        &self,
        range: TimeRange,
        metric: Metric,
        day_type: DayType,
    ) -> [f64; 24] {
        Self::degrade(
            "hourly_intensity",
            self.try_hourly_intensity(range, metric, day_type),
            Default::default,
        )
    }

    pub fn try_weekday_intensity(&self, range: TimeRange, metric: Metric) -> Result<[f64; 7]> {
        self.run("weekday_intensity", |conn| {
            let resolved = self.resolve(conn, range)?;
            self.selector(conn)
                .for_granularity(Granularity::Daily, &resolved)
                .weekday(conn, resolved.bounds(), metric, &QueryFilter::default())
        })
    }

    /// `metric` per local weekday, index 0 = Sunday.
    pub fn weekday_intensity(&self, range: TimeRange, metric: Metric) -> [f64; 7] {
        Self::degrade(
            "weekday_intensity",
            self.try_weekday_intensity(range, metric),
            Default::default,
        )
    }

    // ----------------------------------------
    // 14. Model lens
    // ----------------------------------------

    /// Usage and output speed per model or provider, most input tokens first.
    pub fn try_model_lens(
        &self,
        range: TimeRange,
        group: ModelLensGroup,
    ) -> Result<Vec<ModelLensRow>> {
        self.run("model_lens", |conn| {
            let resolved = self.resolve(conn, range)?;
            let dimension = group.dimension();
            let source = self.selector(conn).for_totals(&resolved);
            let rows = source.breakdown(
                conn,
                resolved.bounds(),
                &[dimension],
                &QueryFilter::default(),
            )?;

            let mut speed: HashMap<String, ThroughputStats> = RawEventSource
                .throughput(conn, resolved.bounds(), dimension)?
                .iter()
                .map(|counts| (counts.name.clone(), ThroughputStats::from(counts)))
                .collect();

            let mut lens: Vec<ModelLensRow> = rows
                .into_iter()
                .map(|row| {
                    let name = row.name().to_string();
                    ModelLensRow {
                        throughput: speed.remove(&name).unwrap_or_default(),
                        name,
                        totals: row.totals,
                    }
                })
                .collect();
            lens.sort_by(|a, b| {
                b.totals
                    .input_tokens
                    .cmp(&a.totals.input_tokens)
                    .then_with(|| a.name.cmp(&b.name))
            });
            Ok(lens)
        })
    }

    pub fn model_lens(&self, range: TimeRange, group: ModelLensGroup) -> Vec<ModelLensRow> {
        Self::degrade("model_lens", self.try_model_lens(range, group), Vec::new)
    }

    // ----------------------------------------
    // 15. Billing coverage
    // ----------------------------------------

    pub fn try_billing_coverage(&self, range: TimeRange) -> Result<BillingCoverage> {
        self.run("billing_coverage", |conn| {
            let resolved = self.resolve(conn, range)?;
            let counts = RawEventSource.billing(conn, resolved.bounds(), &QueryFilter::default())?;
            Ok(BillingCoverage::from(counts))
        })
    }

    pub fn billing_coverage(&self, range: TimeRange) -> BillingCoverage {
        Self::degrade("billing_coverage", self.try_billing_coverage(range), Default::default)
    }
}
