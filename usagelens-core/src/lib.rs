//! # usagelens-core
//!
//! Statistics engine over a SQLite log of AI-assistant usage events.
//!
//! This library provides:
//! - Time range resolution, local-time bucketing and gap filling
//! - A rollup-or-raw source selector with identical results on both paths
//! - Derived statistics (anomalies, rhythm, coverage, top-N)
//! - The [`StatsService`] read façade
//! - Configuration and logging infrastructure
//!
//! ## Architecture
//!
//! A report flows through four layers:
//! - **Range:** a [`TimeRange`] selector resolved to `[start, end)` in local time
//! - **Source:** `hourly_stats` / `daily_stats` / `monthly_stats` when usable,
//!   otherwise a scan of `messages`
//! - **Series:** buckets grouped in SQL, then gap-filled to a fixed length
//! - **Stats:** pure post-processing into report structs
//!
//! ## Example
//!
//! ```rust,no_run
//! use usagelens_core::{Config, Database, Granularity, Metric, StatsService, TimeRange};
//!
//! let config = Config::load().expect("failed to load config");
//! let db = Database::open(&config.resolved_database_path()).expect("failed to open store");
//!
//! let stats = StatsService::new(&db, config.stats.clone());
//! let overview = stats.overview(TimeRange::Today);
//! let trend = stats.trend(TimeRange::Last30Days, Metric::Cost, Granularity::Daily);
//! assert_eq!(trend.len(), 30);
//! println!("{} messages today", overview.totals.messages);
//! ```

// Re-export commonly used items at the crate root
pub use config::{Config, StatsConfig};
pub use db::Database;
pub use error::{Error, Result};
pub use service::{ModelLensGroup, StatsService};
pub use source::{DayType, QueryFilter};
pub use time::{Granularity, TimeRange};
pub use types::*;

// Public modules
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod service;
pub mod source;
pub mod stats;
pub mod time;
pub mod types;
