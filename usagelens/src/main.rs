//! usagelens - usage statistics for AI assistant activity
//!
//! Reads the usage store and prints one report, as text or JSON.

use anyhow::{bail, Context, Result};
use chrono::{Local, TimeZone};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::path::{Path, PathBuf};
use usagelens_core::stats::{AnomalyMetric, HeatmapCell, OTHER};
use usagelens_core::{
    BreakdownRow, Config, Database, Granularity, Metric, ModelLensGroup, QueryFilter, StatsService,
    TimeRange, TimeSeriesPoint, UsageTotals,
};

#[derive(Parser)]
#[command(name = "usagelens")]
#[command(about = "Usage statistics for AI assistant sessions")]
#[command(version)]
struct Args {
    /// Report to print
    #[arg(short, long, value_enum, default_value_t = Report::Overview)]
    report: Report,

    /// Time range: today, 24h, 7d, 30d or all
    #[arg(long, default_value = "7d", value_parser = parse_range)]
    range: TimeRange,

    /// Metric for series and heatmaps (messages, sessions, cost, total_tokens, ...)
    #[arg(short, long, default_value = "messages", value_parser = parse_metric)]
    metric: Metric,

    /// Bucket size for trends: hour, day, week or month
    #[arg(short, long, default_value = "day", value_parser = parse_granularity)]
    granularity: Granularity,

    /// Entries shown before "Other" in rankings
    #[arg(short, long)]
    top: Option<usize>,

    /// Project for the project report
    #[arg(short, long)]
    project: Option<String>,

    /// Grouping for the model lens
    #[arg(long, value_enum, default_value_t = LensGroup::Model)]
    group: LensGroup,

    /// Usage store to read (overrides config)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Config file (defaults to the XDG config path)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Always scan raw events, ignoring rollup tables
    #[arg(long)]
    raw: bool,

    /// Create the store and its schema if missing
    #[arg(long)]
    init: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Text)]
    format: Format,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Report {
    Overview,
    Kpi,
    Trend,
    TimeOfDay,
    WeekdayWeekend,
    TopProjects,
    TopModels,
    Project,
    UserVsAgent,
    CodeOutput,
    Anomalies,
    Rhythm,
    Heatmap,
    ModelLens,
    Billing,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LensGroup {
    Model,
    Provider,
}

impl From<LensGroup> for ModelLensGroup {
    fn from(group: LensGroup) -> Self {
        match group {
            LensGroup::Model => ModelLensGroup::Model,
            LensGroup::Provider => ModelLensGroup::Provider,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn parse_range(value: &str) -> std::result::Result<TimeRange, String> {
    TimeRange::parse(value)
        .ok_or_else(|| format!("unknown range '{}' (today, 24h, 7d, 30d, all)", value))
}

fn parse_metric(value: &str) -> std::result::Result<Metric, String> {
    Metric::parse(value).ok_or_else(|| format!("unknown metric '{}'", value))
}

fn parse_granularity(value: &str) -> std::result::Result<Granularity, String> {
    Granularity::parse(value)
        .ok_or_else(|| format!("unknown granularity '{}' (hour, day, week, month)", value))
}

/// Store facts for the info report.
#[derive(Debug, Serialize)]
struct StoreInfo {
    path: PathBuf,
    size_bytes: u64,
    first_event_at: Option<i64>,
}

/// Everything known about one project.
#[derive(Debug, Serialize)]
struct ProjectReport {
    name: String,
    activity: usagelens_core::source::raw::ActivitySpan,
    totals: UsageTotals,
    models_and_agents: Vec<BreakdownRow>,
    daily: Vec<TimeSeriesPoint>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("failed to load configuration")?;

    // Initialize logging
    let _log_guard =
        usagelens_core::logging::init(&config.logging).context("failed to initialize logging")?;

    let db_path = args
        .db
        .clone()
        .unwrap_or_else(|| config.resolved_database_path());

    let db = if args.init {
        let db = Database::open(&db_path).context("failed to open database")?;
        db.migrate().context("failed to run database migrations")?;
        db
    } else {
        if !db_path.exists() {
            bail!(
                "No usage store at {}. Run with --init to create an empty one.",
                db_path.display()
            );
        }
        Database::open_read_only(&db_path).context("failed to open database")?
    };

    let mut stats = config.stats.clone();
    if let Some(top) = args.top {
        stats.top_n = top.max(1);
    }
    if args.raw {
        stats.prefer_rollups = false;
    }
    let service = StatsService::new(&db, stats);

    tracing::debug!(report = ?args.report, range = ?args.range, "running report");
    run_report(&args, &service, &db, &db_path)
}

fn run_report(
    args: &Args,
    service: &StatsService<'_>,
    db: &Database,
    db_path: &Path,
) -> Result<()> {
    let range = args.range;
    let top_n = service.config().top_n;

    match args.report {
        Report::Overview => {
            let overview = service.try_overview(range).context("overview failed")?;
            emit(args.format, &overview, |o| {
                println!("Overview ({})", range_label(range));
                print_totals(&o.totals);
                println!("  User messages:      {}", o.user_messages);
                println!("  Assistant messages: {}", o.assistant_messages);
                println!("  Automation level:   {:.1}%", o.automation_level);
            })
        }
        Report::Kpi => {
            let kpi = service
                .try_kpi_trend(service.config().kpi_days)
                .context("KPI trend failed")?;
            emit(args.format, &kpi, |k| {
                println!("Messages");
                print_series(&k.messages, false);
                println!("Sessions");
                print_series(&k.sessions, false);
                println!("Cost");
                print_series(&k.cost, true);
                println!("Tokens");
                print_series(&k.tokens, false);
            })
        }
        Report::Trend => {
            let series = service
                .try_trend(range, args.metric, args.granularity)
                .context("trend failed")?;
            emit(args.format, &series, |s| {
                println!(
                    "{} per {} ({})",
                    args.metric.as_str(),
                    args.granularity.as_str(),
                    range_label(range)
                );
                print_series(s, args.metric == Metric::Cost);
            })
        }
        Report::TimeOfDay => {
            let dist = service
                .try_time_of_day(range, args.metric)
                .context("time of day failed")?;
            emit(args.format, &dist, |d| {
                println!("{} by time of day ({})", args.metric.as_str(), range_label(range));
                println!("  Morning   (06-12): {}", d.morning);
                println!("  Afternoon (12-18): {}", d.afternoon);
                println!("  Evening   (18-22): {}", d.evening);
                println!("  Night     (22-06): {}", d.night);
            })
        }
        Report::WeekdayWeekend => {
            let split = service
                .try_weekday_weekend(range, args.metric)
                .context("weekday/weekend split failed")?;
            emit(args.format, &split, |s| {
                println!("{} weekday vs weekend ({})", args.metric.as_str(), range_label(range));
                println!(
                    "  Weekdays: {} over {} days (avg {:.2})",
                    s.weekday_total, s.weekday_days, s.weekday_avg
                );
                println!(
                    "  Weekends: {} over {} days (avg {:.2})",
                    s.weekend_total, s.weekend_days, s.weekend_avg
                );
            })
        }
        Report::TopProjects => {
            let rows = service
                .try_top_projects_optimized(range, top_n)
                .context("top projects failed")?;
            emit(args.format, &rows, |r| print_ranking("Project", r))
        }
        Report::TopModels => {
            let rows = service
                .try_top_models_optimized(range, top_n)
                .context("top models failed")?;
            emit(args.format, &rows, |r| print_ranking("Model", r))
        }
        Report::Project => {
            let Some(name) = args.project.clone() else {
                bail!("--project is required for the project report");
            };
            let report = ProjectReport {
                activity: service
                    .try_project_activity(&name, range)
                    .context("project activity failed")?,
                totals: service
                    .try_project_consumption(&name, range)
                    .context("project consumption failed")?,
                models_and_agents: service
                    .try_project_model_agents(&name, range)
                    .context("project breakdown failed")?,
                daily: service
                    .try_trend_filtered(
                        range,
                        args.metric,
                        Granularity::Daily,
                        &QueryFilter::project(&name),
                    )
                    .context("project series failed")?,
                name,
            };
            emit(args.format, &report, print_project)
        }
        Report::UserVsAgent => {
            let split = service
                .try_user_vs_agent(range)
                .context("user vs agent failed")?;
            emit(args.format, &split, |s| {
                println!("User vs agent ({})", range_label(range));
                println!("  User messages:      {}", s.user_messages);
                println!("  Assistant messages: {}", s.assistant_messages);
                println!("  Automation level:   {:.1}%", s.automation_level);
                println!("  Sessions with user input: {}", s.sessions_with_user_input);
                println!("  Agent-only sessions:      {}", s.agent_only_sessions);
                println!("  Orphan sessions:          {}", s.orphan_sessions);
            })
        }
        Report::CodeOutput => {
            let trend = service
                .try_code_output_trend(range)
                .context("code output failed")?;
            emit(args.format, &trend, |t| {
                println!(
                    "{:<12} {:>8} {:>8} {:>8} {:>10}",
                    "Day", "Added", "Removed", "Net", "Cost"
                );
                for (i, add) in t.additions.iter().enumerate() {
                    println!(
                        "{:<12} {:>8} {:>8} {:>8} {:>10}",
                        add.label,
                        add.value,
                        value_at(&t.deletions, i),
                        value_at(&t.net, i),
                        format_cost(value_at(&t.cost, i))
                    );
                }
            })
        }
        Report::Anomalies => {
            let anomalies = service.try_anomalies(range).context("anomalies failed")?;
            emit(args.format, &anomalies, |a| {
                println!("Anomalies ({})", range_label(range));
                print_anomaly("Messages", &a.messages);
                print_anomaly("Sessions", &a.sessions);
                print_anomaly("Cost", &a.cost);
                print_anomaly("Net code lines", &a.net_code_lines);
            })
        }
        Report::Rhythm => {
            let rhythm = service.try_rhythm(range).context("rhythm failed")?;
            emit(args.format, &rhythm, |r| {
                println!("Rhythm ({})", range_label(range));
                println!("  Peak hour:       {}", r.format_peak_hour());
                println!("  Busiest weekday: {}", r.format_busiest_weekday());
                println!("  Night owl:       {:.1}% of messages", r.night_owl_ratio * 100.0);
                println!("  Weekend:         {:.1}% of messages", r.weekend_ratio * 100.0);
                println!(
                    "  Sessions:        {} ({:.1}% at night, {:.1}% on weekends)",
                    r.total_sessions,
                    r.night_owl_session_ratio * 100.0,
                    r.weekend_session_ratio * 100.0
                );
            })
        }
        Report::Heatmap => {
            let cells = service
                .try_heatmap(range, args.metric)
                .context("heatmap failed")?;
            emit(args.format, &cells, |c| print_heatmap(c))
        }
        Report::ModelLens => {
            let rows = service
                .try_model_lens(range, args.group.into())
                .context("model lens failed")?;
            emit(args.format, &rows, |rows| {
                println!(
                    "{:<24} {:>8} {:>10} {:>10} {:>8}",
                    "Name", "Messages", "Tokens", "Cost", "Tok/s"
                );
                for row in rows {
                    println!(
                        "{:<24} {:>8} {:>10} {:>10} {:>8.1}",
                        display_name(&row.name),
                        row.totals.messages,
                        row.totals.total_tokens(),
                        format_cost(row.totals.cost),
                        row.throughput.tokens_per_second
                    );
                }
            })
        }
        Report::Billing => {
            let coverage = service
                .try_billing_coverage(range)
                .context("billing coverage failed")?;
            emit(args.format, &coverage, |c| {
                println!("Billing coverage ({})", range_label(range));
                println!(
                    "  Billed messages: {} of {} ({:.1}%)",
                    c.billed_message_count,
                    c.total_message_count,
                    c.coverage_ratio * 100.0
                );
                println!("  Billed cost:     {}", format_cost(c.billed_cost));
                println!("  Avg per billed:  {}", format_cost(c.avg_cost_per_billed_message));
            })
        }
        Report::Info => {
            let info = StoreInfo {
                path: db_path.to_path_buf(),
                size_bytes: db.get_database_size().context("failed to read store size")?,
                first_event_at: db.min_created_at().context("failed to read store bounds")?,
            };
            emit(args.format, &info, |i| {
                println!("Store:       {}", i.path.display());
                println!("Size:        {} bytes", i.size_bytes);
                println!(
                    "First event: {}",
                    i.first_event_at.map(format_ts).unwrap_or_else(|| "-".to_string())
                );
            })
        }
    }
}

fn emit<T: Serialize>(format: Format, value: &T, text: impl FnOnce(&T)) -> Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(value)?),
        Format::Text => text(value),
    }
    Ok(())
}

fn range_label(range: TimeRange) -> &'static str {
    match range {
        TimeRange::Today => "today",
        TimeRange::Last24Hours => "last 24 hours",
        TimeRange::Last7Days => "last 7 days",
        TimeRange::Last30Days => "last 30 days",
        TimeRange::AllTime => "all time",
        TimeRange::Custom { .. } => "custom range",
    }
}

fn format_cost(cost: f64) -> String {
    format!("${:.2}", cost)
}

fn format_ts(ts_ms: i64) -> String {
    Local
        .timestamp_millis_opt(ts_ms)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts_ms.to_string())
}

fn value_at(series: &[TimeSeriesPoint], i: usize) -> f64 {
    series.get(i).map(|p| p.value).unwrap_or(0.0)
}

fn display_name(name: &str) -> &str {
    if name.is_empty() {
        "(none)"
    } else {
        name
    }
}

fn print_totals(t: &UsageTotals) {
    println!("  Sessions:           {}", t.sessions);
    println!("  Messages:           {}", t.messages);
    println!(
        "  Tokens:             {} (in {}, out {}, reasoning {})",
        t.total_tokens(),
        t.input_tokens,
        t.output_tokens,
        t.reasoning_tokens
    );
    println!("  Cache read/write:   {} / {}", t.cache_read, t.cache_write);
    println!("  Cost:               {}", format_cost(t.cost));
    println!("  Net code lines:     {}", t.net_code_lines);
}

fn print_series(series: &[TimeSeriesPoint], cost: bool) {
    let max = series.iter().map(|p| p.value).fold(0.0, f64::max);
    for point in series {
        let width = if max > 0.0 {
            (point.value / max * 30.0).round() as usize
        } else {
            0
        };
        let value = if cost {
            format_cost(point.value)
        } else {
            point.value.to_string()
        };
        println!("  {:>10} {:>10} {}", point.label, value, "#".repeat(width));
    }
}

fn print_ranking(heading: &str, rows: &[BreakdownRow]) {
    println!(
        "{:<24} {:>8} {:>8} {:>10} {:>10}",
        heading, "Sessions", "Messages", "Input", "Cost"
    );
    for row in rows {
        // The overflow row sorts last; keep it visually apart.
        if row.name() == OTHER {
            println!("{}", "-".repeat(63));
        }
        println!(
            "{:<24} {:>8} {:>8} {:>10} {:>10}",
            display_name(row.name()),
            row.totals.sessions,
            row.totals.messages,
            row.totals.input_tokens,
            format_cost(row.totals.cost)
        );
    }
}

fn print_project(report: &ProjectReport) {
    println!("Project: {}", report.name);
    println!("  Active days: {}", report.activity.active_days);
    if let (Some(first), Some(last)) = (report.activity.first_seen, report.activity.last_seen) {
        println!("  First seen:  {}", format_ts(first));
        println!("  Last seen:   {}", format_ts(last));
    }
    print_totals(&report.totals);
    println!();
    println!("  {:<20} {:<12} {:>8}", "Model", "Agent", "Messages");
    for row in &report.models_and_agents {
        let model = row.keys.first().map(String::as_str).unwrap_or("");
        let agent = row.keys.get(1).map(String::as_str).unwrap_or("");
        println!(
            "  {:<20} {:<12} {:>8}",
            display_name(model),
            display_name(agent),
            row.totals.messages
        );
    }
    println!();
    print_series(&report.daily, false);
}

fn print_anomaly(name: &str, metric: &AnomalyMetric) {
    let flag = if metric.is_anomaly { "!" } else { " " };
    println!(
        "  [{}] {:<15} current {:>10.2}  mean {:>10.2}  threshold {:>10.2}",
        flag, name, metric.current, metric.mean, metric.threshold
    );
}

fn print_heatmap(cells: &[HeatmapCell]) {
    const SHADES: [char; 5] = ['.', '░', '▒', '▓', '█'];
    for week in cells.chunks(7) {
        let Some(first) = week.first() else {
            continue;
        };
        let row: String = week
            .iter()
            .map(|c| SHADES[usize::from(c.level.min(4))])
            .collect();
        println!("{} {}", first.date, row);
    }
}
