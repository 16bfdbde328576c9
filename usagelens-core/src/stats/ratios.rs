//! Ratio metrics: automation, billing coverage, throughput.
//!
//! Every ratio here is 0 when its denominator is 0.

use crate::source::raw::{BillingCounts, ThroughputCounts};
use serde::Serialize;

/// Assistant share of all messages, in percent.
pub fn automation_level(assistant_messages: i64, user_messages: i64) -> f64 {
    let total = assistant_messages + user_messages;
    if total > 0 {
        assistant_messages as f64 / total as f64 * 100.0
    } else {
        0.0
    }
}

/// How much of the traffic carried a cost.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BillingCoverage {
    pub billed_message_count: i64,
    pub total_message_count: i64,
    /// `billed / total`
    pub coverage_ratio: f64,
    /// Cost summed over billed messages only
    pub billed_cost: f64,
    /// Average over billed messages; zero-cost messages do not dilute it
    pub avg_cost_per_billed_message: f64,
}

impl From<BillingCounts> for BillingCoverage {
    fn from(counts: BillingCounts) -> Self {
        let coverage_ratio = if counts.messages > 0 {
            counts.billed_messages as f64 / counts.messages as f64
        } else {
            0.0
        };
        let avg_cost_per_billed_message = if counts.billed_messages > 0 {
            counts.billed_cost / counts.billed_messages as f64
        } else {
            0.0
        };
        Self {
            billed_message_count: counts.billed_messages,
            total_message_count: counts.messages,
            coverage_ratio,
            billed_cost: counts.billed_cost,
            avg_cost_per_billed_message,
        }
    }
}

/// Output speed of assistant messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ThroughputStats {
    /// All assistant messages, timed or not
    pub message_count: i64,
    pub timed_message_count: i64,
    /// Output tokens per second over timed messages
    pub tokens_per_second: f64,
    /// Mean duration of timed messages, in ms
    pub avg_duration_ms: f64,
    /// Timed share of `message_count`
    pub valid_duration_ratio: f64,
}

impl From<&ThroughputCounts> for ThroughputStats {
    fn from(counts: &ThroughputCounts) -> Self {
        let seconds = counts.timed_duration_ms as f64 / 1000.0;
        let tokens_per_second = if seconds > 0.0 {
            counts.timed_output_tokens as f64 / seconds
        } else {
            0.0
        };
        let avg_duration_ms = if counts.timed_messages > 0 {
            counts.timed_duration_ms as f64 / counts.timed_messages as f64
        } else {
            0.0
        };
        let valid_duration_ratio = if counts.messages > 0 {
            counts.timed_messages as f64 / counts.messages as f64
        } else {
            0.0
        };
        Self {
            message_count: counts.messages,
            timed_message_count: counts.timed_messages,
            tokens_per_second,
            avg_duration_ms,
            valid_duration_ratio,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_automation_level_boundaries() {
        assert_eq!(automation_level(0, 0), 0.0);
        assert_eq!(automation_level(3, 1), 75.0);
        assert_eq!(automation_level(0, 4), 0.0);
    }

    #[test]
    fn test_billing_coverage_excludes_free_messages_from_average() {
        let coverage = BillingCoverage::from(BillingCounts {
            messages: 3,
            billed_messages: 1,
            billed_cost: 2.0,
        });
        assert_eq!(coverage.billed_message_count, 1);
        assert_eq!(coverage.total_message_count, 3);
        assert!((coverage.coverage_ratio - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(coverage.avg_cost_per_billed_message, 2.0);

        assert_eq!(BillingCoverage::from(BillingCounts::default()), BillingCoverage::default());
    }

    #[test]
    fn test_throughput_ignores_untimed_messages_in_rate() {
        let stats = ThroughputStats::from(&ThroughputCounts {
            name: "m".to_string(),
            messages: 4,
            timed_messages: 2,
            timed_output_tokens: 300,
            timed_duration_ms: 3_000,
        });
        assert_eq!(stats.tokens_per_second, 100.0);
        assert_eq!(stats.avg_duration_ms, 1_500.0);
        assert_eq!(stats.valid_duration_ratio, 0.5);
        assert_eq!(stats.message_count, 4);
    }

    #[test]
    fn test_throughput_without_timings() {
        let stats = ThroughputStats::from(&ThroughputCounts {
            messages: 2,
            ..Default::default()
        });
        assert_eq!(stats.tokens_per_second, 0.0);
        assert_eq!(stats.valid_duration_ratio, 0.0);
    }
}
