//! Derived statistics computed from aggregated counters.
//!
//! Everything here is pure: the service fetches counters through a
//! [`MetricSource`](crate::source::MetricSource) and hands them to these
//! functions.

pub mod anomaly;
pub mod calendar;
pub mod ratios;
pub mod rhythm;
pub mod topn;

pub use anomaly::{AnomalyMetric, AnomalyStats, Baseline};
pub use calendar::{heatmap_cells, HeatmapCell, WeekdayWeekendSplit};
pub use ratios::{automation_level, BillingCoverage, ThroughputStats};
pub use rhythm::{RhythmInsights, TimeOfDayDistribution};
pub use topn::{top_n_with_other, OTHER};
