//! Incremental metrics aggregation over a stream of GC events.
//!
//! The aggregator is fed one event at a time and keeps only what the
//! final summary needs: per-kind counts, running pause statistics, the
//! ordered duration list for exact percentiles, heap-utilization
//! samples and the series used for trend detection. `finalize`
//! consumes the state and yields one immutable [`MetricsSummary`];
//! re-analysis builds a fresh aggregator.
//!
//! Percentiles are exact nearest-rank over the retained duration list,
//! which bounds memory by event count rather than log size. That is
//! the documented trade-off; [`MetricsAggregator::with_duration_cap`]
//! is the non-default extension point for extreme event counts.

use crate::parser::schema::{EventKind, GcEvent};
use crate::utils::config::FALLBACK_ELAPSED_MS;
use chrono::NaiveDateTime;
use log::debug;
use serde::{Deserialize, Serialize};

/// Direction of a metric over the analyzed window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Stable,
    Increasing,
    Decreasing,
}

/// Where the total elapsed time came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElapsedSource {
    /// First/last wall-clock or uptime stamps in the log
    Timestamps,
    /// No usable anchors: a fixed one-second window is assumed, and
    /// rate-based metrics are left undefined
    SequenceSpan,
}

/// Event counts per canonical kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindCounts {
    pub young: u64,
    pub mixed_or_global: u64,
    pub full: u64,
    pub humongous: u64,
    pub other: u64,
}

impl KindCounts {
    fn record(&mut self, kind: EventKind) {
        match kind {
            EventKind::Young => self.young += 1,
            EventKind::MixedOrGlobal => self.mixed_or_global += 1,
            EventKind::Full => self.full += 1,
            EventKind::Humongous => self.humongous += 1,
            EventKind::Other => self.other += 1,
        }
    }
}

/// Exact nearest-rank pause percentiles (ms)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PausePercentiles {
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Collection frequencies; present only when the log carried usable
/// time anchors
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyStats {
    pub overall_hz: f64,
    pub young_hz: f64,
    pub full_hz: f64,
}

/// Heap statistics; present only when events carried heap figures
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeapStats {
    pub utilization_mean_pct: f64,
    pub utilization_max_pct: f64,
    pub max_heap_used_bytes: u64,
    pub total_reclaimed_bytes: u64,
    /// None when no collection observed any reclaimable heap
    pub reclaim_efficiency_pct: Option<f64>,
}

/// Immutable snapshot of one analysis pass.
///
/// Built once by [`MetricsAggregator::finalize`]; never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub event_count: u64,
    pub kind_counts: KindCounts,
    /// Fraction of wall-clock time not spent paused, in [0, 1]
    pub throughput_ratio: f64,
    pub total_pause_ms: f64,
    /// Events contributing a non-zero pause
    pub pause_count: u64,
    pub mean_pause_ms: f64,
    pub min_pause_ms: f64,
    pub max_pause_ms: f64,
    pub percentiles: PausePercentiles,
    pub total_elapsed_ms: f64,
    pub elapsed_source: ElapsedSource,
    pub frequency: Option<FrequencyStats>,
    pub heap: Option<HeapStats>,
    pub pause_trend: Trend,
    pub heap_trend: Trend,
}

impl MetricsSummary {
    /// Summary of an input with no events: every statistic degrades
    /// to zero and never trips a critical alert.
    fn empty() -> Self {
        Self {
            event_count: 0,
            kind_counts: KindCounts::default(),
            throughput_ratio: 0.0,
            total_pause_ms: 0.0,
            pause_count: 0,
            mean_pause_ms: 0.0,
            min_pause_ms: 0.0,
            max_pause_ms: 0.0,
            percentiles: PausePercentiles::default(),
            total_elapsed_ms: 0.0,
            elapsed_source: ElapsedSource::SequenceSpan,
            frequency: None,
            heap: None,
            pause_trend: Trend::Stable,
            heap_trend: Trend::Stable,
        }
    }

    pub fn throughput_pct(&self) -> f64 {
        self.throughput_ratio * 100.0
    }
}

/// Streaming aggregator; state lives for exactly one parse pass
#[derive(Debug, Default)]
pub struct MetricsAggregator {
    event_count: u64,
    kind_counts: KindCounts,
    durations: Vec<f64>,
    duration_cap: Option<usize>,
    pause_count: u64,
    pause_sum: f64,
    pause_max: f64,
    pause_min: f64,
    utilization_samples: Vec<f64>,
    heap_series: Vec<f64>,
    max_heap_used: u64,
    reclaimed_total: u64,
    allocated_total: u64,
    first_timestamp: Option<NaiveDateTime>,
    last_timestamp: Option<NaiveDateTime>,
    first_runtime: Option<f64>,
    last_runtime: Option<f64>,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the retained duration list. Percentiles then cover only the
    /// first `cap` pauses; an explicit opt-in for extreme event counts
    /// where the exact-percentile memory trade-off no longer holds.
    /// Count, sum, mean, max and min stay exact.
    pub fn with_duration_cap(mut self, cap: usize) -> Self {
        self.duration_cap = Some(cap);
        self
    }

    pub fn observe(&mut self, event: &GcEvent) {
        self.event_count += 1;
        self.kind_counts.record(event.kind);

        if event.pause_ms > 0.0 {
            self.pause_count += 1;
            self.pause_sum += event.pause_ms;
            self.pause_max = self.pause_max.max(event.pause_ms);
            self.pause_min = if self.pause_count == 1 {
                event.pause_ms
            } else {
                self.pause_min.min(event.pause_ms)
            };
            if self.duration_cap.map_or(true, |cap| self.durations.len() < cap) {
                self.durations.push(event.pause_ms);
            }
        }

        if let (Some(before), Some(total)) = (event.heap_before_bytes, event.heap_total_bytes) {
            if total > 0 {
                self.utilization_samples.push(before as f64 / total as f64);
            }
        }
        if let Some(before) = event.heap_before_bytes {
            self.heap_series.push(before as f64);
            self.max_heap_used = self.max_heap_used.max(before);
        }
        if let Some(reclaimed) = event.reclaimed_bytes() {
            self.reclaimed_total += reclaimed;
            // Heap occupancy at pause start approximates what was
            // allocated since the previous collection
            self.allocated_total += event.heap_before_bytes.unwrap_or(0);
        }

        if let Some(ts) = event.timestamp {
            if self.first_timestamp.is_none() {
                self.first_timestamp = Some(ts);
            }
            self.last_timestamp = Some(ts);
        }
        if let Some(rt) = event.runtime_secs {
            if self.first_runtime.is_none() {
                self.first_runtime = Some(rt);
            }
            self.last_runtime = Some(rt);
        }
    }

    fn elapsed_ms(&self) -> (f64, ElapsedSource) {
        if let (Some(first), Some(last)) = (self.first_runtime, self.last_runtime) {
            let span = (last - first) * 1_000.0;
            if span > 0.0 {
                return (span, ElapsedSource::Timestamps);
            }
        }
        if let (Some(first), Some(last)) = (self.first_timestamp, self.last_timestamp) {
            let span = (last - first).num_milliseconds() as f64;
            if span > 0.0 {
                return (span, ElapsedSource::Timestamps);
            }
        }
        (FALLBACK_ELAPSED_MS, ElapsedSource::SequenceSpan)
    }

    /// Reduce the accumulated state to one immutable summary.
    /// Empty input never crashes: everything degrades to zero.
    pub fn finalize(self) -> MetricsSummary {
        if self.event_count == 0 {
            return MetricsSummary::empty();
        }

        let (total_elapsed_ms, elapsed_source) = self.elapsed_ms();
        let throughput_ratio = (1.0 - self.pause_sum / total_elapsed_ms).clamp(0.0, 1.0);

        let mut sorted = self.durations.clone();
        sorted.sort_unstable_by(f64::total_cmp);
        let percentiles = PausePercentiles {
            p50: nearest_rank(&sorted, 50.0),
            p90: nearest_rank(&sorted, 90.0),
            p95: nearest_rank(&sorted, 95.0),
            p99: nearest_rank(&sorted, 99.0),
        };

        // The mean comes from the exact running totals, not from the
        // (possibly capped) retained list
        let pause_count = self.pause_count;
        let mean_pause_ms = if pause_count > 0 {
            self.pause_sum / pause_count as f64
        } else {
            0.0
        };

        // Rate metrics are undefined without real time anchors;
        // leaving them None suppresses the dependent alert rules.
        let frequency = match elapsed_source {
            ElapsedSource::Timestamps => {
                let elapsed_secs = total_elapsed_ms / 1_000.0;
                Some(FrequencyStats {
                    overall_hz: self.event_count as f64 / elapsed_secs,
                    young_hz: (self.kind_counts.young + self.kind_counts.humongous) as f64
                        / elapsed_secs,
                    full_hz: self.kind_counts.full as f64 / elapsed_secs,
                })
            }
            ElapsedSource::SequenceSpan => None,
        };

        let heap = if self.utilization_samples.is_empty() {
            None
        } else {
            let mean = self.utilization_samples.iter().sum::<f64>()
                / self.utilization_samples.len() as f64;
            let max = self
                .utilization_samples
                .iter()
                .fold(0.0_f64, |acc, &u| acc.max(u));
            let reclaim_efficiency_pct = if self.allocated_total > 0 {
                Some(self.reclaimed_total as f64 / self.allocated_total as f64 * 100.0)
            } else {
                None
            };
            Some(HeapStats {
                utilization_mean_pct: mean * 100.0,
                utilization_max_pct: max * 100.0,
                max_heap_used_bytes: self.max_heap_used,
                total_reclaimed_bytes: self.reclaimed_total,
                reclaim_efficiency_pct,
            })
        };

        debug!(
            "finalized summary: {} events, throughput {:.2}%, max pause {:.2}ms",
            self.event_count,
            throughput_ratio * 100.0,
            self.pause_max
        );

        MetricsSummary {
            event_count: self.event_count,
            kind_counts: self.kind_counts,
            throughput_ratio,
            total_pause_ms: self.pause_sum,
            pause_count,
            mean_pause_ms,
            min_pause_ms: self.pause_min,
            max_pause_ms: self.pause_max,
            percentiles,
            total_elapsed_ms,
            elapsed_source,
            frequency,
            pause_trend: trend_of(&self.durations),
            heap_trend: trend_of(&self.heap_series),
            heap,
        }
    }
}

/// Aggregate a complete event sequence in one call
pub fn aggregate(events: &[GcEvent]) -> MetricsSummary {
    let mut aggregator = MetricsAggregator::new();
    for event in events {
        aggregator.observe(event);
    }
    aggregator.finalize()
}

/// Nearest-rank percentile: value at rank `ceil(p/100 * n)` of the
/// sorted list (1-based)
fn nearest_rank(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = ((p / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

/// Classify a series as rising, falling or flat. The least-squares
/// slope is projected across the whole window and judged against a
/// 10%-of-mean significance band, so the verdict does not depend on
/// how many points the same overall change is spread over.
fn trend_of(values: &[f64]) -> Trend {
    if values.len() < 3 {
        return Trend::Stable;
    }
    let n = values.len() as f64;
    let x_mean = (n - 1.0) / 2.0;
    let y_mean = values.iter().sum::<f64>() / n;

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (i, &y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        numerator += dx * (y - y_mean);
        denominator += dx * dx;
    }
    if denominator == 0.0 {
        return Trend::Stable;
    }
    let projected_change = (numerator / denominator) * (n - 1.0);
    let threshold = y_mean.abs() * 0.1;

    if projected_change > threshold {
        Trend::Increasing
    } else if projected_change < -threshold {
        Trend::Decreasing
    } else {
        Trend::Stable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::schema::{EventKind, GcEvent};

    fn event(seq: u64, kind: EventKind, pause_ms: f64) -> GcEvent {
        let mut e = GcEvent::new(seq, kind);
        e.pause_ms = pause_ms;
        e
    }

    fn event_with_heap(seq: u64, pause_ms: f64, before: u64, after: u64, total: u64) -> GcEvent {
        let mut e = event(seq, EventKind::Young, pause_ms);
        e.heap_before_bytes = Some(before);
        e.heap_after_bytes = Some(after);
        e.heap_total_bytes = Some(total);
        e
    }

    #[test]
    fn test_empty_input_degrades_to_zero() {
        let summary = aggregate(&[]);
        assert_eq!(summary.event_count, 0);
        assert_eq!(summary.throughput_ratio, 0.0);
        assert_eq!(summary.mean_pause_ms, 0.0);
        assert_eq!(summary.percentiles.p99, 0.0);
        assert_eq!(summary.pause_trend, Trend::Stable);
        assert!(summary.frequency.is_none());
        assert!(summary.heap.is_none());
    }

    #[test]
    fn test_single_event_statistics() {
        let summary = aggregate(&[event(0, EventKind::Young, 24.85)]);
        assert_eq!(summary.event_count, 1);
        assert_eq!(summary.pause_count, 1);
        assert_eq!(summary.mean_pause_ms, 24.85);
        assert_eq!(summary.percentiles.p50, 24.85);
        assert_eq!(summary.max_pause_ms, 24.85);
        assert_eq!(summary.min_pause_ms, 24.85);
    }

    #[test]
    fn test_percentile_monotonicity() {
        let events: Vec<GcEvent> = (0..250)
            .map(|i| event(i, EventKind::Young, (i % 97) as f64 + 0.5))
            .collect();
        let summary = aggregate(&events);
        let p = summary.percentiles;
        assert!(p.p50 <= p.p90);
        assert!(p.p90 <= p.p95);
        assert!(p.p95 <= p.p99);
        assert!(p.p99 <= summary.max_pause_ms);
    }

    #[test]
    fn test_nearest_rank_small_list() {
        let sorted = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(nearest_rank(&sorted, 50.0), 2.0);
        assert_eq!(nearest_rank(&sorted, 90.0), 4.0);
        assert_eq!(nearest_rank(&sorted, 99.0), 4.0);
    }

    #[test]
    fn test_throughput_from_runtime_anchors() {
        let mut first = event(0, EventKind::Young, 100.0);
        first.runtime_secs = Some(1.0);
        let mut last = event(1, EventKind::Young, 100.0);
        last.runtime_secs = Some(3.0);

        let summary = aggregate(&[first, last]);
        assert_eq!(summary.elapsed_source, ElapsedSource::Timestamps);
        assert_eq!(summary.total_elapsed_ms, 2_000.0);
        // 200ms paused over a 2s window
        assert!((summary.throughput_ratio - 0.9).abs() < 1e-9);

        let freq = summary.frequency.expect("frequency");
        assert!((freq.overall_hz - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_anchors_uses_fallback_window() {
        let summary = aggregate(&[event(0, EventKind::Young, 24.85)]);
        assert_eq!(summary.elapsed_source, ElapsedSource::SequenceSpan);
        assert!(summary.frequency.is_none());
        assert!((summary.throughput_ratio - (1.0 - 24.85 / 1_000.0)).abs() < 1e-9);
    }

    #[test]
    fn test_heap_statistics() {
        let events = vec![
            event_with_heap(0, 10.0, 500, 200, 1_000),
            event_with_heap(1, 12.0, 800, 400, 1_000),
        ];
        let summary = aggregate(&events);
        let heap = summary.heap.expect("heap stats");
        assert!((heap.utilization_mean_pct - 65.0).abs() < 1e-9);
        assert!((heap.utilization_max_pct - 80.0).abs() < 1e-9);
        assert_eq!(heap.max_heap_used_bytes, 800);
        assert_eq!(heap.total_reclaimed_bytes, 700);
        let eff = heap.reclaim_efficiency_pct.expect("efficiency");
        assert!((eff - 700.0 / 1_300.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_heap_growth_across_pause_is_zero_reclaim() {
        // after > before: concurrent allocation, not an error
        let summary = aggregate(&[event_with_heap(0, 5.0, 100, 180, 1_000)]);
        let heap = summary.heap.expect("heap stats");
        assert_eq!(heap.total_reclaimed_bytes, 0);
        assert_eq!(heap.reclaim_efficiency_pct, Some(0.0));
    }

    #[test]
    fn test_trend_detection() {
        let rising: Vec<f64> = (0..20).map(|i| i as f64 * 10.0).collect();
        assert_eq!(trend_of(&rising), Trend::Increasing);

        let falling: Vec<f64> = (0..20).map(|i| 200.0 - i as f64 * 10.0).collect();
        assert_eq!(trend_of(&falling), Trend::Decreasing);

        let flat = vec![50.0; 20];
        assert_eq!(trend_of(&flat), Trend::Stable);

        assert_eq!(trend_of(&[1.0, 2.0]), Trend::Stable);
    }

    #[test]
    fn test_trend_on_high_mean_series() {
        // A steep fall must classify even when the series mean is large
        let falling: Vec<f64> = (0..20).map(|i| 1_000.0 - i as f64 * 30.0).collect();
        assert_eq!(trend_of(&falling), Trend::Decreasing);

        // Drift well inside the band stays flat
        let drifting: Vec<f64> = (0..20).map(|i| 1_000.0 + i as f64 * 0.5).collect();
        assert_eq!(trend_of(&drifting), Trend::Stable);
    }

    #[test]
    fn test_kind_counts() {
        let events = vec![
            event(0, EventKind::Young, 1.0),
            event(1, EventKind::Young, 1.0),
            event(2, EventKind::Full, 50.0),
            event(3, EventKind::MixedOrGlobal, 5.0),
            event(4, EventKind::Other, 0.0),
        ];
        let summary = aggregate(&events);
        assert_eq!(summary.kind_counts.young, 2);
        assert_eq!(summary.kind_counts.full, 1);
        assert_eq!(summary.kind_counts.mixed_or_global, 1);
        assert_eq!(summary.kind_counts.other, 1);
        // zero-duration record does not feed the pause statistics
        assert_eq!(summary.pause_count, 4);
    }

    #[test]
    fn test_duration_cap_keeps_exact_running_stats() {
        let events: Vec<GcEvent> = (0..100)
            .map(|i| event(i, EventKind::Young, i as f64 + 1.0))
            .collect();
        let mut aggregator = MetricsAggregator::new().with_duration_cap(10);
        for e in &events {
            aggregator.observe(e);
        }
        let summary = aggregator.finalize();
        // only percentiles degrade to the capped list
        assert_eq!(summary.pause_count, 100);
        assert_eq!(summary.max_pause_ms, 100.0);
        assert_eq!(summary.min_pause_ms, 1.0);
        assert!((summary.mean_pause_ms - 50.5).abs() < 1e-9);
        assert_eq!(summary.total_pause_ms, 5_050.0);
        assert_eq!(summary.percentiles.p99, 10.0);
    }
}
