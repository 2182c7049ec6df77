//! Per-turn activity counters and their run-level summary.

use serde::{Deserialize, Serialize};

use super::types::round6;

/// Counters folded from one turn report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityCounts {
    pub front_active: usize,
    pub pressure_eligible: usize,
    pub displacement_trigger: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricStats {
    pub min: usize,
    pub max: usize,
    pub mean: f64,
    pub nonzero_weeks: usize,
}

impl MetricStats {
    fn from_series(series: &[usize]) -> Self {
        let total: usize = series.iter().sum();
        Self {
            min: series.iter().copied().min().unwrap_or(0),
            max: series.iter().copied().max().unwrap_or(0),
            mean: if series.is_empty() {
                0.0
            } else {
                round6(total as f64 / series.len() as f64)
            },
            nonzero_weeks: series.iter().filter(|value| **value > 0).count(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityMetrics {
    pub front_active_set_size: MetricStats,
    pub pressure_eligible_size: MetricStats,
    pub displacement_trigger_eligible_size: MetricStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngagementSummary {
    pub per_week: Vec<f64>,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivitySummary {
    pub weeks: usize,
    pub metrics: ActivityMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engagement_level: Option<EngagementSummary>,
    pub notes: Vec<String>,
}

impl ActivitySummary {
    /// True when no turn registered any front, pressure or displacement activity.
    pub fn is_static(&self) -> bool {
        self.metrics.front_active_set_size.max == 0
            && self.metrics.pressure_eligible_size.max == 0
            && self.metrics.displacement_trigger_eligible_size.max == 0
    }
}

/// Summarize per-week counters. `engagement` holds one level per week in
/// which baseline ops ran.
pub fn summarize(per_week: &[ActivityCounts], engagement: &[f64]) -> ActivitySummary {
    let series = |pick: fn(&ActivityCounts) -> usize| -> Vec<usize> {
        per_week.iter().map(pick).collect()
    };
    let metrics = ActivityMetrics {
        front_active_set_size: MetricStats::from_series(&series(|c| c.front_active)),
        pressure_eligible_size: MetricStats::from_series(&series(|c| c.pressure_eligible)),
        displacement_trigger_eligible_size: MetricStats::from_series(&series(|c| {
            c.displacement_trigger
        })),
    };

    let engagement_level = (!engagement.is_empty()).then(|| EngagementSummary {
        per_week: engagement.to_vec(),
        min: engagement.iter().copied().fold(f64::INFINITY, f64::min),
        max: engagement.iter().copied().fold(0.0, f64::max),
        mean: round6(engagement.iter().sum::<f64>() / engagement.len() as f64),
    });

    let mut summary = ActivitySummary {
        weeks: per_week.len(),
        metrics,
        engagement_level,
        notes: Vec::new(),
    };
    if summary.is_static() {
        summary
            .notes
            .push("no front, pressure or displacement activity in any week".to_string());
    }
    if summary.metrics.front_active_set_size.max > 0
        && summary.metrics.pressure_eligible_size.max == 0
    {
        summary
            .notes
            .push("fronts existed but no edge was pressure-eligible (all postures hold)".to_string());
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(front: usize, pressure: usize, displacement: usize) -> ActivityCounts {
        ActivityCounts {
            front_active: front,
            pressure_eligible: pressure,
            displacement_trigger: displacement,
        }
    }

    #[test]
    fn summarizes_min_max_mean_and_nonzero_weeks() {
        let summary = summarize(&[counts(0, 0, 0), counts(2, 1, 0), counts(4, 2, 1)], &[]);
        let front = &summary.metrics.front_active_set_size;
        assert_eq!((front.min, front.max, front.nonzero_weeks), (0, 4, 2));
        assert_eq!(front.mean, 2.0);
        assert_eq!(summary.metrics.pressure_eligible_size.mean, 1.0);
        assert!(summary.engagement_level.is_none());
        assert!(summary.notes.is_empty());
    }

    #[test]
    fn all_zero_run_is_flagged_static() {
        let summary = summarize(&[counts(0, 0, 0); 18], &[]);
        assert_eq!(summary.weeks, 18);
        assert!(summary.is_static());
        assert_eq!(summary.notes.len(), 1);
    }

    #[test]
    fn engagement_statistics_are_reported() {
        let summary = summarize(&[counts(1, 1, 0), counts(1, 1, 0)], &[0.1, 0.3]);
        let engagement = summary.engagement_level.expect("engagement");
        assert_eq!(engagement.min, 0.1);
        assert_eq!(engagement.max, 0.3);
        assert_eq!(engagement.mean, 0.2);
    }
}
