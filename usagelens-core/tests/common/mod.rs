//! Shared fixtures for integration tests.
#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use rusqlite::params;
use usagelens_core::source::raw::RAW_EVENTS;
use usagelens_core::source::RollupTable;
use usagelens_core::time::BucketZone;
use usagelens_core::{Database, StatsConfig, StatsService};

/// 2024-05-15 13:00 UTC, a Wednesday.
pub fn now() -> i64 {
    utc(2024, 5, 15, 13, 0)
}

pub fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> i64 {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0)
        .unwrap()
        .timestamp_millis()
}

/// In-memory store with the full schema.
pub fn store() -> Database {
    usagelens_core::logging::init_test();
    let db = Database::open_in_memory().unwrap();
    db.migrate().unwrap();
    db
}

pub fn service<Tz: BucketZone>(
    db: &Database,
    tz: Tz,
    prefer_rollups: bool,
) -> StatsService<'_, Tz> {
    service_at(db, tz, prefer_rollups, now())
}

/// Like [`service`], with "now" pinned to `now_ms`.
pub fn service_at<Tz: BucketZone>(
    db: &Database,
    tz: Tz,
    prefer_rollups: bool,
    now_ms: i64,
) -> StatsService<'_, Tz> {
    let config = StatsConfig {
        prefer_rollups,
        ..StatsConfig::default()
    };
    StatsService::with_zone(db, tz, config).with_now(now_ms)
}

/// One usage event row.
#[derive(Debug, Clone)]
pub struct Event {
    pub id: String,
    pub session: String,
    pub role: &'static str,
    pub created_at: i64,
    pub completed_at: Option<i64>,
    pub project: Option<String>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub agent: Option<String>,
    pub input: Option<String>,
    pub output: Option<String>,
    pub reasoning: Option<String>,
    pub cache_read: i64,
    pub cache_write: i64,
    pub cost: f64,
    pub additions: i64,
    pub deletions: i64,
    pub files: i64,
}

impl Event {
    pub fn new(id: &str, session: &str, role: &'static str, created_at: i64) -> Self {
        Self {
            id: id.to_string(),
            session: session.to_string(),
            role,
            created_at,
            completed_at: None,
            project: None,
            provider: None,
            model: None,
            agent: None,
            input: None,
            output: None,
            reasoning: None,
            cache_read: 0,
            cache_write: 0,
            cost: 0.0,
            additions: 0,
            deletions: 0,
            files: 0,
        }
    }

    pub fn project(mut self, project: &str) -> Self {
        self.project = Some(project.to_string());
        self
    }

    pub fn model(mut self, provider: &str, model: &str) -> Self {
        self.provider = Some(provider.to_string());
        self.model = Some(model.to_string());
        self
    }

    pub fn agent(mut self, agent: &str) -> Self {
        self.agent = Some(agent.to_string());
        self
    }

    pub fn tokens(mut self, input: &str, output: &str) -> Self {
        self.input = Some(input.to_string());
        self.output = Some(output.to_string());
        self
    }

    pub fn reasoning(mut self, reasoning: &str) -> Self {
        self.reasoning = Some(reasoning.to_string());
        self
    }

    pub fn cache(mut self, read: i64, write: i64) -> Self {
        self.cache_read = read;
        self.cache_write = write;
        self
    }

    pub fn cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }

    pub fn took_ms(mut self, ms: i64) -> Self {
        self.completed_at = Some(self.created_at + ms);
        self
    }

    pub fn code(mut self, additions: i64, deletions: i64, files: i64) -> Self {
        self.additions = additions;
        self.deletions = deletions;
        self.files = files;
        self
    }
}

pub fn insert(db: &Database, events: &[Event]) {
    let conn = db.connection().unwrap();
    for e in events {
        conn.execute(
            "INSERT INTO messages (
                id, session_id, role, created_at, completed_at,
                provider_id, model_id, agent, project_id,
                token_input, token_output, token_reasoning,
                cache_read, cache_write, cost,
                summary_additions, summary_deletions, summary_files
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9,
                      ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            params![
                e.id,
                e.session,
                e.role,
                e.created_at,
                e.completed_at,
                e.provider,
                e.model,
                e.agent,
                e.project,
                e.input,
                e.output,
                e.reasoning,
                e.cache_read,
                e.cache_write,
                e.cost,
                e.additions,
                e.deletions,
                e.files,
            ],
        )
        .unwrap();
    }
}

/// Insert a session summary row.
pub fn insert_session(db: &Database, id: &str, created_at: i64, user_messages: i64, orphan: bool) {
    let conn = db.connection().unwrap();
    conn.execute(
        "INSERT INTO sessions (session_id, created_at, user_message_count, is_orphan)
         VALUES (?1, ?2, ?3, ?4)",
        params![id, created_at, user_messages, orphan as i64],
    )
    .unwrap();
}

/// Rebuild every rollup table from `messages`, bucketing in `tz`.
pub fn populate_rollups<Tz: BucketZone>(db: &Database, tz: Tz) {
    db.read(tz, |conn| {
        for table in RollupTable::ALL {
            conn.execute(&format!("DELETE FROM {}", table.table_name()), [])?;
            let sql = format!(
                "INSERT INTO {table} (
                    time_bucket, project, provider, model, role, agent, tool,
                    session_count, message_count, input_tokens, output_tokens,
                    reasoning_tokens, cache_read, cache_write, duration_ms, cost,
                    net_code_lines, file_count, last_created_at
                )
                SELECT lens_bucket(created_at, '{unit}') AS bucket,
                       project, provider, model, role, agent, '',
                       SUM(session_start), COUNT(*), SUM(input_tokens), SUM(output_tokens),
                       SUM(reasoning_tokens), SUM(cache_read), SUM(cache_write),
                       SUM(duration_ms), SUM(cost), SUM(net_code_lines), SUM(file_count),
                       MAX(created_at)
                FROM {RAW_EVENTS}
                GROUP BY bucket, project, provider, model, role, agent",
                table = table.table_name(),
                unit = table.resolution().as_str(),
            );
            conn.execute(&sql, [])?;
        }
        Ok(())
    })
    .unwrap();
}

/// A week of mixed activity around [`now`], plus older history.
///
/// Costs are multiples of 1/4 so sums are exact in any order.
pub fn seed_history(db: &Database) {
    insert(
        db,
        &[
            // Today
            Event::new("t1", "s-today", "user", utc(2024, 5, 15, 9, 0))
                .project("alpha")
                .model("anthropic", "opus")
                .tokens("100", "0")
                .cost(1.5),
            Event::new("t2", "s-today", "assistant", utc(2024, 5, 15, 9, 5))
                .project("alpha")
                .model("anthropic", "opus")
                .agent("build")
                .tokens("20", "400")
                .reasoning("30")
                .cache(500, 40)
                .cost(0.5)
                .took_ms(4_000)
                .code(30, 5, 2),
            // Yesterday, late evening
            Event::new("y1", "s-late", "user", utc(2024, 5, 14, 22, 30))
                .project("beta")
                .model("openai", "gpt")
                .tokens("70", "0"),
            Event::new("y2", "s-late", "assistant", utc(2024, 5, 14, 23, 10))
                .project("beta")
                .model("openai", "gpt")
                .agent("plan")
                .tokens("10", "90")
                .cost(0.25)
                .took_ms(3_000),
            // Session crossing midnight
            Event::new("x1", "s-cross", "user", utc(2024, 5, 12, 23, 50))
                .project("alpha")
                .model("anthropic", "sonnet")
                .tokens("5", "0"),
            Event::new("x2", "s-cross", "assistant", utc(2024, 5, 13, 0, 10))
                .project("alpha")
                .model("anthropic", "sonnet")
                .agent("build")
                .tokens("5", "60")
                .cost(0.25)
                .code(12, 40, 1),
            // Monday
            Event::new("m1", "s-mon", "user", utc(2024, 5, 13, 15, 0))
                .project("gamma")
                .model("anthropic", "opus")
                .tokens("bad", "0"),
            Event::new("m2", "s-mon", "assistant", utc(2024, 5, 13, 15, 2))
                .project("gamma")
                .model("anthropic", "opus")
                .tokens("300", "120")
                .cost(0.75)
                .took_ms(2_000),
            // Saturday
            Event::new("w1", "s-sat", "user", utc(2024, 5, 11, 10, 0))
                .project("beta")
                .model("openai", "gpt")
                .tokens("40", "0"),
            Event::new("w2", "s-sat", "assistant", utc(2024, 5, 11, 10, 1))
                .project("beta")
                .model("openai", "gpt")
                .tokens("8", "16")
                .cost(0.25),
            // Earlier this year
            Event::new("a1", "s-apr", "assistant", utc(2024, 4, 20, 8, 0))
                .project("beta")
                .model("openai", "gpt")
                .tokens("60", "60")
                .cost(0.75),
            Event::new("j1", "s-jan", "user", utc(2024, 1, 10, 12, 0))
                .project("alpha")
                .model("anthropic", "opus")
                .tokens("25", "0"),
        ],
    );
}
