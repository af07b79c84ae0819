//! Pause-time distribution histogram.
//!
//! Buckets every non-zero pause into fixed millisecond bins so the
//! shape of the pause profile is visible at a glance: a healthy young
//! collector concentrates in the low bins, while mass in the 100ms+
//! bins points at the same problems the alert rules flag. Zero-pause
//! records (concurrent cycles) are excluded, matching the pause
//! statistics in the summary.

use crate::parser::schema::GcEvent;
use serde::Serialize;

/// Bin edges in milliseconds; the last bin is open-ended
const BIN_EDGES: [(f64, Option<f64>, &str); 9] = [
    (0.0, Some(5.0), "0-5ms"),
    (5.0, Some(10.0), "5-10ms"),
    (10.0, Some(20.0), "10-20ms"),
    (20.0, Some(50.0), "20-50ms"),
    (50.0, Some(100.0), "50-100ms"),
    (100.0, Some(200.0), "100-200ms"),
    (200.0, Some(500.0), "200-500ms"),
    (500.0, Some(1_000.0), "500ms-1s"),
    (1_000.0, None, ">1s"),
];

/// One histogram bucket; `upper_ms` is `None` for the open-ended tail
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PauseBin {
    pub label: &'static str,
    pub lower_ms: f64,
    pub upper_ms: Option<f64>,
    pub count: u64,
    pub percentage: f64,
    pub cumulative_percentage: f64,
}

/// Histogram of pause durations over fixed bins
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PauseDistribution {
    pub bins: Vec<PauseBin>,
    /// Non-zero pauses counted into the bins
    pub total_pauses: u64,
}

impl PauseDistribution {
    /// The bin holding the most pauses; `None` for an empty analysis
    pub fn dominant_bin(&self) -> Option<&PauseBin> {
        self.bins
            .iter()
            .filter(|b| b.count > 0)
            .max_by_key(|b| b.count)
    }
}

/// Bucket the pause durations of an event sequence.
///
/// Bins are half-open `[lower, upper)`; every bin is present in the
/// output even when empty, so consumers can render a stable axis.
pub fn pause_distribution(events: &[GcEvent]) -> PauseDistribution {
    let mut counts = [0_u64; BIN_EDGES.len()];
    let mut total = 0_u64;

    for event in events {
        if event.pause_ms <= 0.0 {
            continue;
        }
        total += 1;
        for (i, &(lower, upper, _)) in BIN_EDGES.iter().enumerate() {
            let in_bin = event.pause_ms >= lower && upper.map_or(true, |u| event.pause_ms < u);
            if in_bin {
                counts[i] += 1;
                break;
            }
        }
    }

    let mut cumulative = 0_u64;
    let bins = BIN_EDGES
        .iter()
        .zip(counts)
        .map(|(&(lower, upper, label), count)| {
            cumulative += count;
            let pct = |c: u64| {
                if total > 0 {
                    c as f64 / total as f64 * 100.0
                } else {
                    0.0
                }
            };
            PauseBin {
                label,
                lower_ms: lower,
                upper_ms: upper,
                count,
                percentage: pct(count),
                cumulative_percentage: pct(cumulative),
            }
        })
        .collect();

    PauseDistribution {
        bins,
        total_pauses: total,
    }
}
