//! Core value types for usagelens
//!
//! | Term | Definition |
//! |------|------------|
//! | **Usage event** | One user or assistant message with tokens, cost and code summary |
//! | **Session** | A group of usage events sharing a `session_id` |
//! | **Rollup row** | Additive counters for one bucket and dimension tuple |
//! | **Metric** | One additive counter that can be summed over any set of events or rollup rows |
//! | **Dimension** | A column events and rollup rows can both be grouped by |

use rusqlite::Row;
use serde::{Deserialize, Serialize};

// ============================================
// Role
// ============================================

/// Author of a usage event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Convert to string for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Parse a stored role; anything unrecognised is `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

// ============================================
// Metric
// ============================================

/// An additive quantity that can be charted or ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Sessions,
    Messages,
    InputTokens,
    OutputTokens,
    ReasoningTokens,
    CacheRead,
    CacheWrite,
    DurationMs,
    Cost,
    NetCodeLines,
    FileCount,
    /// Input + output + reasoning tokens
    TotalTokens,
}

impl Metric {
    /// Stored counters, in [`UsageTotals`] column order.
    pub const COUNTERS: [Metric; 11] = [
        Metric::Sessions,
        Metric::Messages,
        Metric::InputTokens,
        Metric::OutputTokens,
        Metric::ReasoningTokens,
        Metric::CacheRead,
        Metric::CacheWrite,
        Metric::DurationMs,
        Metric::Cost,
        Metric::NetCodeLines,
        Metric::FileCount,
    ];

    /// Stable identifier used by the CLI and JSON output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Sessions => "sessions",
            Metric::Messages => "messages",
            Metric::InputTokens => "input_tokens",
            Metric::OutputTokens => "output_tokens",
            Metric::ReasoningTokens => "reasoning_tokens",
            Metric::CacheRead => "cache_read",
            Metric::CacheWrite => "cache_write",
            Metric::DurationMs => "duration_ms",
            Metric::Cost => "cost",
            Metric::NetCodeLines => "net_code_lines",
            Metric::FileCount => "file_count",
            Metric::TotalTokens => "total_tokens",
        }
    }

    /// Parse a metric identifier (as produced by [`Metric::as_str`]).
    pub fn parse(value: &str) -> Option<Self> {
        Metric::COUNTERS
            .into_iter()
            .chain([Metric::TotalTokens])
            .find(|m| m.as_str() == value)
    }
}

// ============================================
// Dimension
// ============================================

/// A column shared by raw events and rollup rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Project,
    Provider,
    Model,
    Role,
    Agent,
}

impl Dimension {
    /// Column name; identical on both computation paths.
    pub fn column(&self) -> &'static str {
        match self {
            Dimension::Project => "project",
            Dimension::Provider => "provider",
            Dimension::Model => "model",
            Dimension::Role => "role",
            Dimension::Agent => "agent",
        }
    }
}

// ============================================
// Totals
// ============================================

/// Summed counters over some set of usage events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct UsageTotals {
    /// Sessions whose first message falls inside the set
    pub sessions: i64,
    pub messages: i64,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub reasoning_tokens: i64,
    pub cache_read: i64,
    pub cache_write: i64,
    pub duration_ms: i64,
    pub cost: f64,
    pub net_code_lines: i64,
    pub file_count: i64,
}

impl UsageTotals {
    /// Read the [`Metric::COUNTERS`] columns starting at `offset`.
    pub(crate) fn from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            sessions: row.get(offset)?,
            messages: row.get(offset + 1)?,
            input_tokens: row.get(offset + 2)?,
            output_tokens: row.get(offset + 3)?,
            reasoning_tokens: row.get(offset + 4)?,
            cache_read: row.get(offset + 5)?,
            cache_write: row.get(offset + 6)?,
            duration_ms: row.get(offset + 7)?,
            cost: row.get(offset + 8)?,
            net_code_lines: row.get(offset + 9)?,
            file_count: row.get(offset + 10)?,
        })
    }

    /// Value of a single metric.
    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Sessions => self.sessions as f64,
            Metric::Messages => self.messages as f64,
            Metric::InputTokens => self.input_tokens as f64,
            Metric::OutputTokens => self.output_tokens as f64,
            Metric::ReasoningTokens => self.reasoning_tokens as f64,
            Metric::CacheRead => self.cache_read as f64,
            Metric::CacheWrite => self.cache_write as f64,
            Metric::DurationMs => self.duration_ms as f64,
            Metric::Cost => self.cost,
            Metric::NetCodeLines => self.net_code_lines as f64,
            Metric::FileCount => self.file_count as f64,
            Metric::TotalTokens => self.total_tokens() as f64,
        }
    }

    /// Input + output + reasoning tokens.
    pub fn total_tokens(&self) -> i64 {
        self.input_tokens + self.output_tokens + self.reasoning_tokens
    }

    /// Add another set of counters into this one.
    pub fn absorb(&mut self, other: &UsageTotals) {
        self.sessions += other.sessions;
        self.messages += other.messages;
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.reasoning_tokens += other.reasoning_tokens;
        self.cache_read += other.cache_read;
        self.cache_write += other.cache_write;
        self.duration_ms += other.duration_ms;
        self.cost += other.cost;
        self.net_code_lines += other.net_code_lines;
        self.file_count += other.file_count;
    }
}

/// Totals for one group of a dimensional breakdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakdownRow {
    /// Group key, one entry per requested dimension
    pub keys: Vec<String>,
    pub totals: UsageTotals,
}

impl BreakdownRow {
    /// First key, or "" for an ungrouped row.
    pub fn name(&self) -> &str {
        self.keys.first().map(String::as_str).unwrap_or("")
    }
}

// ============================================
// Time series
// ============================================

/// One bucket of a chart series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeriesPoint {
    /// Bucket start, ms since epoch, aligned in local time
    pub bucket_start: i64,
    pub label: String,
    pub value: f64,
    /// Position in the series, contiguous from 0
    pub bucket_index: usize,
    /// False for synthetic gap-filled points
    pub has_data: bool,
}

/// Parse a text-encoded token count, treating anything malformed as 0.
pub fn parse_token_count(raw: Option<&str>) -> i64 {
    raw.map(str::trim)
        .and_then(|s| {
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
        })
        .filter(|n| *n >= 0)
        .unwrap_or(0)
}
