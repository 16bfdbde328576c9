//! Top-N rankings with an overflow bucket.

use crate::types::{BreakdownRow, Metric, UsageTotals};

/// Key of the synthetic overflow row.
pub const OTHER: &str = "Other";

/// Rank `rows` by `metric` (descending, ties by key) and keep the first `n`.
///
/// The rest are summed into a single [`OTHER`] row, emitted only when the
/// remainder's `metric` sum is strictly positive.
pub fn top_n_with_other(
    mut rows: Vec<BreakdownRow>,
    n: usize,
    metric: Metric,
) -> Vec<BreakdownRow> {
    rows.sort_by(|a, b| {
        b.totals
            .value(metric)
            .total_cmp(&a.totals.value(metric))
            .then_with(|| a.keys.cmp(&b.keys))
    });

    if rows.len() <= n {
        return rows;
    }

    let rest = rows.split_off(n);
    let mut other = UsageTotals::default();
    for row in &rest {
        other.absorb(&row.totals);
    }
    if other.value(metric) > 0.0 {
        rows.push(BreakdownRow {
            keys: vec![OTHER.to_string()],
            totals: other,
        });
    }
    rows
}
