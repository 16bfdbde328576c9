//! Usage rhythm: when in the day and week activity happens.

use crate::source::raw::RhythmCounts;
use serde::Serialize;

/// Peak times and off-hours ratios.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RhythmInsights {
    /// Messages per local hour of day
    pub hourly: [f64; 24],
    /// Messages per local weekday (0 = Sunday)
    pub weekday: [f64; 7],
    /// First hour holding the maximum (0-23)
    pub peak_hour: u8,
    /// First weekday holding the maximum (0 = Sunday)
    pub busiest_weekday: u8,
    /// Share of messages sent at night
    pub night_owl_ratio: f64,
    /// Share of messages sent on Saturday or Sunday
    pub weekend_ratio: f64,
    /// Share of sessions with any night activity
    pub night_owl_session_ratio: f64,
    /// Share of sessions with any weekend activity
    pub weekend_session_ratio: f64,
    pub total_messages: i64,
    pub total_sessions: i64,
}

/// Index of the first maximum; 0 for an all-zero slice.
pub fn first_max(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, value) in values.iter().enumerate() {
        if *value > values[best] {
            best = i;
        }
    }
    best
}

fn ratio(part: i64, whole: i64) -> f64 {
    if whole > 0 {
        part as f64 / whole as f64
    } else {
        0.0
    }
}

impl RhythmInsights {
    pub fn new(hourly: [f64; 24], weekday: [f64; 7], counts: &RhythmCounts) -> Self {
        Self {
            hourly,
            weekday,
            peak_hour: first_max(&hourly) as u8,
            busiest_weekday: first_max(&weekday) as u8,
            night_owl_ratio: ratio(counts.night_messages, counts.messages),
            weekend_ratio: ratio(counts.weekend_messages, counts.messages),
            night_owl_session_ratio: ratio(counts.night_sessions, counts.sessions),
            weekend_session_ratio: ratio(counts.weekend_sessions, counts.sessions),
            total_messages: counts.messages,
            total_sessions: counts.sessions,
        }
    }

    /// Peak hour as a span, e.g. "2-3pm".
    pub fn format_peak_hour(&self) -> String {
        let hour = u32::from(self.peak_hour);
        let twelve = |h: u32| match h {
            0 => "12am".to_string(),
            1..=11 => format!("{}am", h),
            12 => "12pm".to_string(),
            _ => format!("{}pm", h - 12),
        };
        format!("{}-{}", twelve(hour), twelve((hour + 1) % 24))
    }

    pub fn format_busiest_weekday(&self) -> &'static str {
        weekday_name(self.busiest_weekday)
    }
}

/// English weekday name for 0 = Sunday .. 6 = Saturday.
pub fn weekday_name(day: u8) -> &'static str {
    match day {
        0 => "Sunday",
        1 => "Monday",
        2 => "Tuesday",
        3 => "Wednesday",
        4 => "Thursday",
        5 => "Friday",
        6 => "Saturday",
        _ => "Unknown",
    }
}

/// A metric summed into four parts of the day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TimeOfDayDistribution {
    /// 06:00 - 12:00
    pub morning: f64,
    /// 12:00 - 18:00
    pub afternoon: f64,
    /// 18:00 - 22:00
    pub evening: f64,
    /// 22:00 - 06:00
    pub night: f64,
}

impl TimeOfDayDistribution {
    pub fn from_hourly(hourly: &[f64; 24]) -> Self {
        let mut out = Self::default();
        for (hour, value) in hourly.iter().enumerate() {
            match hour {
                6..=11 => out.morning += value,
                12..=17 => out.afternoon += value,
                18..=21 => out.evening += value,
                _ => out.night += value,
            }
        }
        out
    }

    pub fn total(&self) -> f64 {
        self.morning + self.afternoon + self.evening + self.night
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peak_hour_ties_resolve_to_earliest() {
        let mut hourly = [0.0; 24];
        hourly[9] = 5.0;
        hourly[14] = 5.0;
        hourly[3] = 1.0;
        let insights = RhythmInsights::new(hourly, [0.0; 7], &RhythmCounts::default());
        assert_eq!(insights.peak_hour, 9);
        assert_eq!(insights.format_peak_hour(), "9am-10am");
        assert_eq!(insights.busiest_weekday, 0);
    }

    #[test]
    fn test_ratios_message_and_session_level() {
        let counts = RhythmCounts {
            messages: 10,
            night_messages: 4,
            weekend_messages: 5,
            sessions: 4,
            night_sessions: 1,
            weekend_sessions: 2,
        };
        let insights = RhythmInsights::new([0.0; 24], [0.0; 7], &counts);
        assert_eq!(insights.night_owl_ratio, 0.4);
        assert_eq!(insights.weekend_ratio, 0.5);
        assert_eq!(insights.night_owl_session_ratio, 0.25);
        assert_eq!(insights.weekend_session_ratio, 0.5);
    }

    #[test]
    fn test_empty_counts_give_zero_ratios() {
        let insights = RhythmInsights::new([0.0; 24], [0.0; 7], &RhythmCounts::default());
        assert_eq!(insights.night_owl_ratio, 0.0);
        assert_eq!(insights.weekend_session_ratio, 0.0);
        assert_eq!(insights.format_peak_hour(), "12am-1am");
    }

    #[test]
    fn test_time_of_day_boundaries() {
        let mut hourly = [0.0; 24];
        hourly[5] = 1.0; // night
        hourly[6] = 2.0; // morning
        hourly[12] = 3.0; // afternoon
        hourly[18] = 4.0; // evening
        hourly[22] = 5.0; // night
        let d = TimeOfDayDistribution::from_hourly(&hourly);
        assert_eq!(d.morning, 2.0);
        assert_eq!(d.afternoon, 3.0);
        assert_eq!(d.evening, 4.0);
        assert_eq!(d.night, 6.0);
        assert_eq!(d.total(), 15.0);
    }
}
