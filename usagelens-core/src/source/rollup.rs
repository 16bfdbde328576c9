//! Pre-aggregated rollup tables.

use super::{MetricSource, SourceKind};
use crate::time::Granularity;
use serde::Serialize;

/// One of the three rollup resolutions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RollupTable {
    Hourly,
    Daily,
    Monthly,
}

impl RollupTable {
    /// Finest resolution first.
    pub const ALL: [RollupTable; 3] =
        [RollupTable::Hourly, RollupTable::Daily, RollupTable::Monthly];

    pub fn table_name(&self) -> &'static str {
        match self {
            RollupTable::Hourly => "hourly_stats",
            RollupTable::Daily => "daily_stats",
            RollupTable::Monthly => "monthly_stats",
        }
    }

    /// Width of one row's `time_bucket`.
    pub fn resolution(&self) -> Granularity {
        match self {
            RollupTable::Hourly => Granularity::Hourly,
            RollupTable::Daily => Granularity::Daily,
            RollupTable::Monthly => Granularity::Monthly,
        }
    }

    /// True if buckets of `granularity` are unions of whole rows of this table.
    pub fn can_serve(&self, granularity: Granularity) -> bool {
        match self {
            RollupTable::Hourly => true,
            RollupTable::Daily => granularity != Granularity::Hourly,
            RollupTable::Monthly => granularity == Granularity::Monthly,
        }
    }

    /// The table preferred for charting at `granularity`.
    pub fn preferred_for(granularity: Granularity) -> Self {
        match granularity {
            Granularity::Hourly => RollupTable::Hourly,
            Granularity::Daily | Granularity::Weekly => RollupTable::Daily,
            Granularity::Monthly => RollupTable::Monthly,
        }
    }
}

/// Reads one rollup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollupSource(pub RollupTable);

impl MetricSource for RollupSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Rollup(self.0)
    }

    fn relation(&self) -> &'static str {
        self.0.table_name()
    }

    fn time_column(&self) -> &'static str {
        "time_bucket"
    }
}
