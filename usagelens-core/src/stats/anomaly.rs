//! Sigma-threshold anomaly detection over a daily series.

use serde::Serialize;

/// Which values form the baseline the latest value is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Baseline {
    /// Every value except the last
    #[default]
    ExcludeCurrent,
    /// The whole series, last value included
    IncludeCurrent,
}

/// The latest value of a series measured against its history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AnomalyMetric {
    /// Last value of the series
    pub current: f64,
    pub mean: f64,
    /// Population standard deviation of the baseline
    pub std_dev: f64,
    /// `mean + sigma * std_dev`
    pub threshold: f64,
    pub is_anomaly: bool,
}

impl AnomalyMetric {
    /// Compare the last value of `values` to the baseline.
    ///
    /// Series of length 0 or 1 have no history and yield an all-zero,
    /// never-anomalous metric (except `current` for a single value).
    pub fn from_series(values: &[f64], baseline: Baseline, sigma: f64) -> Self {
        let Some(&current) = values.last() else {
            return Self::default();
        };
        if values.len() <= 1 {
            return Self {
                current,
                ..Self::default()
            };
        }

        let history = match baseline {
            Baseline::ExcludeCurrent => &values[..values.len() - 1],
            Baseline::IncludeCurrent => values,
        };
        let n = history.len() as f64;
        let mean = history.iter().sum::<f64>() / n;
        let variance = history.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std_dev = variance.sqrt();
        let threshold = mean + sigma * std_dev;

        Self {
            current,
            mean,
            std_dev,
            threshold,
            is_anomaly: current > threshold,
        }
    }
}

/// Anomaly checks for the headline counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AnomalyStats {
    pub messages: AnomalyMetric,
    pub sessions: AnomalyMetric,
    pub cost: AnomalyMetric,
    pub net_code_lines: AnomalyMetric,
}

impl AnomalyStats {
    /// True if any metric is flagged.
    pub fn any(&self) -> bool {
        [self.messages, self.sessions, self.cost, self.net_code_lines]
            .iter()
            .any(|m| m.is_anomaly)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_series_never_anomalous() {
        let empty = AnomalyMetric::from_series(&[], Baseline::ExcludeCurrent, 2.0);
        assert_eq!(empty, AnomalyMetric::default());

        let single = AnomalyMetric::from_series(&[42.0], Baseline::IncludeCurrent, 2.0);
        assert_eq!(single.current, 42.0);
        assert_eq!(single.mean, 0.0);
        assert_eq!(single.std_dev, 0.0);
        assert!(!single.is_anomaly);
    }

    #[test]
    fn test_spike_is_flagged() {
        let values = [10.0, 12.0, 8.0, 10.0, 50.0];
        let m = AnomalyMetric::from_series(&values, Baseline::ExcludeCurrent, 2.0);
        assert_eq!(m.current, 50.0);
        assert_eq!(m.mean, 10.0);
        assert!((m.std_dev - 2f64.sqrt()).abs() < 1e-9);
        assert!(m.is_anomaly);
    }

    #[test]
    fn test_include_current_widens_baseline() {
        let values = [1.0, 3.0];
        let m = AnomalyMetric::from_series(&values, Baseline::IncludeCurrent, 2.0);
        assert_eq!(m.mean, 2.0);
        assert_eq!(m.std_dev, 1.0);
        assert_eq!(m.threshold, 4.0);
        assert!(!m.is_anomaly);
    }

    #[test]
    fn test_flat_history_flags_any_rise() {
        let m = AnomalyMetric::from_series(&[5.0, 5.0, 5.0, 6.0], Baseline::ExcludeCurrent, 2.0);
        assert_eq!(m.std_dev, 0.0);
        assert_eq!(m.threshold, 5.0);
        assert!(m.is_anomaly);

        let same = AnomalyMetric::from_series(&[5.0, 5.0], Baseline::ExcludeCurrent, 2.0);
        assert!(!same.is_anomaly);
    }
}
