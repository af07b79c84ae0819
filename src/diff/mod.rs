//! Baseline/candidate comparison of two analysis summaries.
//!
//! Comparison is pure: two immutable summaries in, one report out.
//! Each metric knows which direction is an improvement, and changes
//! inside a small noise band count as unchanged so run-to-run jitter
//! does not read as a regression. Metrics absent from either side are
//! left out of the report entirely.

use crate::aggregator::MetricsSummary;
use crate::utils::config::COMPARE_NOISE_PCT;
use log::debug;
use serde::{Deserialize, Serialize};

/// Direction-aware outcome for one metric or the whole comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Improved,
    Regressed,
    Unchanged,
}

/// Which direction of change is an improvement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    HigherIsBetter,
    LowerIsBetter,
}

/// Before/after values for one compared metric
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricDelta {
    pub name: &'static str,
    pub baseline: f64,
    pub candidate: f64,
    pub absolute_change: f64,
    /// Relative change; zero when the baseline is zero
    pub percent_change: f64,
    pub verdict: Verdict,
}

/// Full comparison report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonResult {
    pub metrics: Vec<MetricDelta>,
    /// Any regression makes the whole comparison regressed; otherwise
    /// any improvement makes it improved
    pub overall: Verdict,
}

/// Compare a candidate run against a baseline run.
///
/// Identical summaries always come out `Unchanged` on every metric.
pub fn compare(baseline: &MetricsSummary, candidate: &MetricsSummary) -> ComparisonResult {
    let mut metrics = Vec::new();

    push_delta(
        &mut metrics,
        "throughput_pct",
        Some(baseline.throughput_pct()),
        Some(candidate.throughput_pct()),
        Direction::HigherIsBetter,
    );
    push_delta(
        &mut metrics,
        "mean_pause_ms",
        Some(baseline.mean_pause_ms),
        Some(candidate.mean_pause_ms),
        Direction::LowerIsBetter,
    );
    push_delta(
        &mut metrics,
        "p99_pause_ms",
        Some(baseline.percentiles.p99),
        Some(candidate.percentiles.p99),
        Direction::LowerIsBetter,
    );
    push_delta(
        &mut metrics,
        "max_pause_ms",
        Some(baseline.max_pause_ms),
        Some(candidate.max_pause_ms),
        Direction::LowerIsBetter,
    );
    push_delta(
        &mut metrics,
        "total_pause_ms",
        Some(baseline.total_pause_ms),
        Some(candidate.total_pause_ms),
        Direction::LowerIsBetter,
    );
    push_delta(
        &mut metrics,
        "gc_frequency_hz",
        baseline.frequency.map(|f| f.overall_hz),
        candidate.frequency.map(|f| f.overall_hz),
        Direction::LowerIsBetter,
    );
    push_delta(
        &mut metrics,
        "heap_utilization_pct",
        baseline.heap.map(|h| h.utilization_mean_pct),
        candidate.heap.map(|h| h.utilization_mean_pct),
        Direction::LowerIsBetter,
    );
    push_delta(
        &mut metrics,
        "reclaim_efficiency_pct",
        baseline.heap.and_then(|h| h.reclaim_efficiency_pct),
        candidate.heap.and_then(|h| h.reclaim_efficiency_pct),
        Direction::HigherIsBetter,
    );

    let overall = if metrics.iter().any(|m| m.verdict == Verdict::Regressed) {
        Verdict::Regressed
    } else if metrics.iter().any(|m| m.verdict == Verdict::Improved) {
        Verdict::Improved
    } else {
        Verdict::Unchanged
    };

    debug!("compared {} metrics, overall {:?}", metrics.len(), overall);
    ComparisonResult { metrics, overall }
}

/// Record one metric delta; skipped when either side lacks the metric
fn push_delta(
    metrics: &mut Vec<MetricDelta>,
    name: &'static str,
    baseline: Option<f64>,
    candidate: Option<f64>,
    direction: Direction,
) {
    let (Some(baseline), Some(candidate)) = (baseline, candidate) else {
        return;
    };
    let absolute_change = candidate - baseline;
    let percent_change = safe_percentage(absolute_change, baseline);
    metrics.push(MetricDelta {
        name,
        baseline,
        candidate,
        absolute_change,
        percent_change,
        verdict: verdict_of(percent_change, direction),
    });
}

/// Percentage change guarded against a zero baseline
fn safe_percentage(change: f64, baseline: f64) -> f64 {
    if baseline == 0.0 {
        0.0
    } else {
        change / baseline * 100.0
    }
}

fn verdict_of(percent_change: f64, direction: Direction) -> Verdict {
    if percent_change.abs() <= COMPARE_NOISE_PCT {
        return Verdict::Unchanged;
    }
    let better = match direction {
        Direction::HigherIsBetter => percent_change > 0.0,
        Direction::LowerIsBetter => percent_change < 0.0,
    };
    if better {
        Verdict::Improved
    } else {
        Verdict::Regressed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::{aggregate, HeapStats};
    use crate::parser::schema::{EventKind, GcEvent};

    fn summary_with_pauses(pauses: &[f64]) -> MetricsSummary {
        let events: Vec<GcEvent> = pauses
            .iter()
            .enumerate()
            .map(|(i, &p)| {
                let mut e = GcEvent::new(i as u64, EventKind::Young);
                e.pause_ms = p;
                e.runtime_secs = Some(i as f64);
                e
            })
            .collect();
        aggregate(&events)
    }

    #[test]
    fn test_identical_summaries_are_unchanged() {
        let summary = summary_with_pauses(&[10.0, 20.0, 30.0]);
        let result = compare(&summary, &summary.clone());
        assert_eq!(result.overall, Verdict::Unchanged);
        assert!(result.metrics.iter().all(|m| m.verdict == Verdict::Unchanged));
    }

    #[test]
    fn test_lower_pause_is_improvement() {
        let baseline = summary_with_pauses(&[100.0, 100.0, 100.0]);
        let candidate = summary_with_pauses(&[50.0, 50.0, 50.0]);

        let result = compare(&baseline, &candidate);
        let mean = result
            .metrics
            .iter()
            .find(|m| m.name == "mean_pause_ms")
            .expect("mean delta");
        assert_eq!(mean.verdict, Verdict::Improved);
        assert!((mean.percent_change + 50.0).abs() < 1e-9);
        assert_eq!(result.overall, Verdict::Improved);
    }

    #[test]
    fn test_higher_pause_is_regression() {
        let baseline = summary_with_pauses(&[50.0, 50.0, 50.0]);
        let candidate = summary_with_pauses(&[100.0, 100.0, 100.0]);

        let result = compare(&baseline, &candidate);
        assert_eq!(result.overall, Verdict::Regressed);
    }

    #[test]
    fn test_noise_band_absorbs_small_changes() {
        let mut baseline = summary_with_pauses(&[100.0, 100.0, 100.0]);
        let mut candidate = baseline.clone();
        baseline.mean_pause_ms = 100.0;
        candidate.mean_pause_ms = 101.5;

        let result = compare(&baseline, &candidate);
        let mean = result
            .metrics
            .iter()
            .find(|m| m.name == "mean_pause_ms")
            .expect("mean delta");
        assert_eq!(mean.verdict, Verdict::Unchanged);
    }

    #[test]
    fn test_any_regression_dominates() {
        let mut baseline = summary_with_pauses(&[100.0, 100.0, 100.0]);
        let mut candidate = baseline.clone();
        // pauses improve sharply but throughput collapses
        candidate.mean_pause_ms = 10.0;
        candidate.percentiles.p99 = 10.0;
        candidate.max_pause_ms = 10.0;
        candidate.total_pause_ms = 30.0;
        baseline.throughput_ratio = 0.99;
        candidate.throughput_ratio = 0.50;

        let result = compare(&baseline, &candidate);
        assert_eq!(result.overall, Verdict::Regressed);
    }

    #[test]
    fn test_zero_baseline_is_safe() {
        let baseline = aggregate(&[]);
        let candidate = summary_with_pauses(&[10.0, 20.0]);

        let result = compare(&baseline, &candidate);
        let mean = result
            .metrics
            .iter()
            .find(|m| m.name == "mean_pause_ms")
            .expect("mean delta");
        // change from nothing is reported as absolute only
        assert_eq!(mean.percent_change, 0.0);
        assert_eq!(mean.verdict, Verdict::Unchanged);
    }

    #[test]
    fn test_optional_metrics_skipped_when_one_side_lacks_them() {
        let baseline = summary_with_pauses(&[10.0, 20.0, 30.0]);
        let mut candidate = baseline.clone();
        candidate.heap = Some(HeapStats {
            utilization_mean_pct: 50.0,
            utilization_max_pct: 60.0,
            max_heap_used_bytes: 1 << 20,
            total_reclaimed_bytes: 1 << 10,
            reclaim_efficiency_pct: None,
        });

        let result = compare(&baseline, &candidate);
        assert!(!result.metrics.iter().any(|m| m.name == "heap_utilization_pct"));
        assert!(!result.metrics.iter().any(|m| m.name == "reclaim_efficiency_pct"));
    }
}
