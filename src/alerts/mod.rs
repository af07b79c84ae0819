//! Threshold configuration and alert evaluation.
//!
//! Loads threshold policies from TOML and evaluates a finalized
//! metrics summary against them. Evaluation is a pure function of the
//! summary and config: every rule is checked independently, so one
//! analysis can raise several alerts at once. A rule whose input
//! metric the log did not provide is suppressed, never fired on a
//! guessed value.

use crate::aggregator::{MetricsSummary, Trend};
use crate::utils::error::ConfigError;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Complete threshold configuration.
///
/// Every field has a default, so a TOML file only needs to state the
/// values it wants to override.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Pause above this is a critical pause-time violation (ms)
    pub max_pause_time_ms: f64,
    /// Pause above this is flagged as severe on its own (ms)
    pub critical_pause_time_ms: f64,
    /// Minimum acceptable application throughput (%)
    pub min_throughput_pct: f64,
    /// Throughput below this is flagged as severe on its own (%)
    pub critical_throughput_pct: f64,
    /// Maximum acceptable overall collection rate (Hz)
    pub max_gc_frequency_hz: f64,
    /// Maximum acceptable full-collection rate (Hz)
    pub max_full_gc_frequency_hz: f64,
    /// Maximum acceptable mean heap occupancy before collections (%)
    pub max_heap_utilization_pct: f64,
    /// Minimum acceptable memory reclaim efficiency (%)
    pub min_reclaim_efficiency_pct: f64,
    /// p99/mean pause ratio above this marks unstable behavior
    pub pause_instability_ratio: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            max_pause_time_ms: 100.0,
            critical_pause_time_ms: 500.0,
            min_throughput_pct: 95.0,
            critical_throughput_pct: 90.0,
            max_gc_frequency_hz: 10.0,
            max_full_gc_frequency_hz: 0.1,
            max_heap_utilization_pct: 85.0,
            min_reclaim_efficiency_pct: 50.0,
            pause_instability_ratio: 3.0,
        }
    }
}

/// Load thresholds from a TOML file
///
/// # Errors
/// * `ConfigError::IoError` - If file cannot be read
/// * `ConfigError::ParseFailed` - If TOML is invalid
pub fn load_thresholds(path: impl AsRef<Path>) -> Result<ThresholdConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let config: ThresholdConfig = toml::from_str(&contents)?;
    Ok(config)
}

/// Alert severity, ordered from most to least urgent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

/// One threshold violation with its actionable context
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub severity: Severity,
    /// Stable machine-readable rule id, e.g. `pause_time`
    pub code: &'static str,
    pub message: String,
    pub actual: f64,
    pub threshold: f64,
    pub recommendation: String,
}

/// Evaluate every alert rule against a finalized summary.
///
/// An empty analysis (zero events) raises nothing: absence of data is
/// not a violation.
pub fn evaluate_alerts(summary: &MetricsSummary, config: &ThresholdConfig) -> Vec<Alert> {
    let mut alerts = Vec::new();
    if summary.event_count == 0 {
        return alerts;
    }

    // Output order is evaluation order, not a precedence ranking
    check_pause_time(summary, config, &mut alerts);
    check_throughput(summary, config, &mut alerts);
    check_frequency(summary, config, &mut alerts);
    check_heap(summary, config, &mut alerts);
    check_trends(summary, config, &mut alerts);
    check_stability(summary, config, &mut alerts);

    info!("evaluated {} alerts", alerts.len());
    alerts
}

fn check_pause_time(summary: &MetricsSummary, config: &ThresholdConfig, alerts: &mut Vec<Alert>) {
    if summary.pause_count == 0 {
        return;
    }
    let worst = summary.max_pause_ms.max(summary.percentiles.p99);
    if worst > config.max_pause_time_ms {
        alerts.push(Alert {
            severity: Severity::Critical,
            code: "pause_time",
            message: format!(
                "GC pause of {:.2}ms exceeds the {:.0}ms limit",
                worst, config.max_pause_time_ms
            ),
            actual: worst,
            threshold: config.max_pause_time_ms,
            recommendation: "Reduce pause target (-XX:MaxGCPauseMillis) or switch to a \
                             low-latency collector such as ZGC or Shenandoah"
                .to_string(),
        });
    }
    if summary.max_pause_ms > config.critical_pause_time_ms {
        alerts.push(Alert {
            severity: Severity::Critical,
            code: "pause_time_severe",
            message: format!(
                "Extreme GC pause of {:.2}ms exceeds the {:.0}ms severe limit",
                summary.max_pause_ms, config.critical_pause_time_ms
            ),
            actual: summary.max_pause_ms,
            threshold: config.critical_pause_time_ms,
            recommendation: "Investigate full collections and heap sizing; pauses this long \
                             usually indicate evacuation failure or heap exhaustion"
                .to_string(),
        });
    }
}

fn check_throughput(summary: &MetricsSummary, config: &ThresholdConfig, alerts: &mut Vec<Alert>) {
    let throughput_pct = summary.throughput_pct();
    if throughput_pct < config.min_throughput_pct {
        alerts.push(Alert {
            severity: Severity::Critical,
            code: "throughput",
            message: format!(
                "Application throughput {:.2}% is below the {:.0}% minimum",
                throughput_pct, config.min_throughput_pct
            ),
            actual: throughput_pct,
            threshold: config.min_throughput_pct,
            recommendation: "Increase heap size or reduce allocation rate; the JVM is \
                             spending too much time collecting"
                .to_string(),
        });
    }
    if throughput_pct < config.critical_throughput_pct {
        alerts.push(Alert {
            severity: Severity::Critical,
            code: "throughput_severe",
            message: format!(
                "Application throughput {:.2}% is below the {:.0}% severe minimum",
                throughput_pct, config.critical_throughput_pct
            ),
            actual: throughput_pct,
            threshold: config.critical_throughput_pct,
            recommendation: "At this level collection dominates wall-clock time; treat as \
                             an outage-grade capacity problem, not a tuning exercise"
                .to_string(),
        });
    }
}

fn check_frequency(summary: &MetricsSummary, config: &ThresholdConfig, alerts: &mut Vec<Alert>) {
    // Suppressed when the log carried no time anchors
    let Some(freq) = &summary.frequency else {
        return;
    };
    if freq.overall_hz > config.max_gc_frequency_hz {
        alerts.push(Alert {
            severity: Severity::Warning,
            code: "high_gc_frequency",
            message: format!(
                "Collections run at {:.2}Hz, above the {:.1}Hz limit",
                freq.overall_hz, config.max_gc_frequency_hz
            ),
            actual: freq.overall_hz,
            threshold: config.max_gc_frequency_hz,
            recommendation: "Grow the young generation or lower the allocation rate to \
                             space collections out"
                .to_string(),
        });
    }
    if freq.full_hz > config.max_full_gc_frequency_hz {
        alerts.push(Alert {
            severity: Severity::Critical,
            code: "frequent_full_gc",
            message: format!(
                "Full collections run at {:.3}Hz, above the {:.3}Hz limit",
                freq.full_hz, config.max_full_gc_frequency_hz
            ),
            actual: freq.full_hz,
            threshold: config.max_full_gc_frequency_hz,
            recommendation: "Frequent full collections point to an undersized heap or a \
                             promotion storm; check tenuring and old-generation sizing"
                .to_string(),
        });
    }
}

fn check_heap(summary: &MetricsSummary, config: &ThresholdConfig, alerts: &mut Vec<Alert>) {
    let Some(heap) = &summary.heap else {
        return;
    };
    if heap.utilization_mean_pct > config.max_heap_utilization_pct {
        alerts.push(Alert {
            severity: Severity::Warning,
            code: "high_heap_utilization",
            message: format!(
                "Mean heap occupancy before collections is {:.1}%, above the {:.0}% limit",
                heap.utilization_mean_pct, config.max_heap_utilization_pct
            ),
            actual: heap.utilization_mean_pct,
            threshold: config.max_heap_utilization_pct,
            recommendation: "Increase the maximum heap size (-Xmx) or reduce live-set \
                             footprint"
                .to_string(),
        });
    }
    if let Some(efficiency) = heap.reclaim_efficiency_pct {
        if efficiency < config.min_reclaim_efficiency_pct {
            alerts.push(Alert {
                severity: Severity::Warning,
                code: "poor_memory_reclaim",
                message: format!(
                    "Collections reclaim only {:.1}% of occupied heap, below the {:.0}% \
                     minimum",
                    efficiency, config.min_reclaim_efficiency_pct
                ),
                actual: efficiency,
                threshold: config.min_reclaim_efficiency_pct,
                recommendation: "Low reclaim efficiency suggests a large or growing live \
                                 set; profile retained objects"
                    .to_string(),
            });
        }
    }
}

fn check_trends(summary: &MetricsSummary, config: &ThresholdConfig, alerts: &mut Vec<Alert>) {
    if summary.pause_trend == Trend::Increasing {
        alerts.push(Alert {
            severity: Severity::Warning,
            code: "degrading_pause_trend",
            message: "GC pause times are trending upward over the analyzed window".to_string(),
            actual: summary.max_pause_ms,
            threshold: config.max_pause_time_ms,
            recommendation: "Pauses growing over time often track heap fragmentation or a \
                             rising live set; correlate with the heap trend"
                .to_string(),
        });
    }
    if summary.heap_trend == Trend::Increasing {
        let occupancy = summary
            .heap
            .map(|h| h.utilization_mean_pct)
            .unwrap_or_default();
        alerts.push(Alert {
            severity: Severity::Critical,
            code: "memory_leak_pattern",
            message: "Heap occupancy before collections is climbing steadily, consistent \
                      with a memory leak"
                .to_string(),
            actual: occupancy,
            threshold: config.max_heap_utilization_pct,
            recommendation: "Capture a heap dump and compare dominator trees across the \
                             window to find the leaking root"
                .to_string(),
        });
    }
}

fn check_stability(summary: &MetricsSummary, config: &ThresholdConfig, alerts: &mut Vec<Alert>) {
    if summary.pause_count == 0 || summary.mean_pause_ms <= 0.0 {
        return;
    }
    let ratio = summary.percentiles.p99 / summary.mean_pause_ms;
    if ratio > config.pause_instability_ratio {
        alerts.push(Alert {
            severity: Severity::Warning,
            code: "unstable_performance",
            message: format!(
                "p99 pause is {:.1}x the mean, above the {:.1}x stability limit",
                ratio, config.pause_instability_ratio
            ),
            actual: ratio,
            threshold: config.pause_instability_ratio,
            recommendation: "High pause variance usually comes from occasional expensive \
                             collections; inspect the outliers individually"
                .to_string(),
        });
    }
}
