//! Canonical GC event model shared by both parsers.
//!
//! The two supported log formats use incompatible vocabularies
//! (pause vs duration, Eden/Survivor vs Nursery/Tenure); everything is
//! normalized into the types here so downstream stages never see
//! format-specific fields. Fields the log did not provide stay `None`
//! rather than defaulting to zero or a placeholder.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Canonical collection kind, collapsing format-specific vocabulary.
///
/// `scavenge` maps to [`EventKind::Young`], `global` and `mixed` to
/// [`EventKind::MixedOrGlobal`]; concurrent cycles land in
/// [`EventKind::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Young,
    MixedOrGlobal,
    Full,
    Humongous,
    Other,
}

/// How a region figure was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Taken directly from the log
    Measured,
    /// Derived from a fixed-fraction heuristic when the format carried
    /// no per-region detail
    Estimated,
}

/// Before/after occupancy of one canonical region.
///
/// Units follow the source format: the unified text format reports G1
/// region counts, the verbose markup format reports bytes. Consumers
/// compare within one analysis, never across formats.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionSample {
    pub before: Option<u64>,
    pub after: Option<u64>,
    pub total: Option<u64>,
    pub provenance: Provenance,
}

impl RegionSample {
    pub fn measured(before: Option<u64>, after: Option<u64>, total: Option<u64>) -> Self {
        Self {
            before,
            after,
            total,
            provenance: Provenance::Measured,
        }
    }
}

/// Per-generation breakdown under canonical names
/// (nursery maps to young, tenure to old)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionBreakdown {
    pub young: Option<RegionSample>,
    pub old: Option<RegionSample>,
    /// Humongous / large-object / survivor-adjacent extras
    pub extras: Option<RegionSample>,
}

impl RegionBreakdown {
    pub fn is_empty(&self) -> bool {
        self.young.is_none() && self.old.is_none() && self.extras.is_none()
    }
}

/// Metaspace occupancy, when the log reports it (KB)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetaspaceSample {
    pub before_kb: u64,
    pub after_kb: u64,
    pub total_kb: u64,
}

/// One garbage-collection pause with normalized measurements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GcEvent {
    /// Monotonic position in the parsed sequence
    pub sequence_index: u64,
    /// Normalized wall-clock timestamp, timezone dropped
    pub timestamp: Option<NaiveDateTime>,
    /// JVM uptime stamp when the format carries one (seconds)
    pub runtime_secs: Option<f64>,
    pub kind: EventKind,
    /// Stop-the-world pause duration (ms, non-negative); zero for
    /// records that describe no application pause
    pub pause_ms: f64,
    pub heap_before_bytes: Option<u64>,
    pub heap_after_bytes: Option<u64>,
    pub heap_total_bytes: Option<u64>,
    pub regions: Option<RegionBreakdown>,
    pub metaspace: Option<MetaspaceSample>,
    /// Collector-assigned id, e.g. `GC(42)`
    pub gc_id: Option<u64>,
    /// Trigger reason or subtype text, verbatim
    pub trigger: Option<String>,
    /// Set when the event was flushed at end of input before its
    /// record was fully reduced
    pub incomplete: bool,
}

impl GcEvent {
    pub fn new(sequence_index: u64, kind: EventKind) -> Self {
        Self {
            sequence_index,
            timestamp: None,
            runtime_secs: None,
            kind,
            pause_ms: 0.0,
            heap_before_bytes: None,
            heap_after_bytes: None,
            heap_total_bytes: None,
            regions: None,
            metaspace: None,
            gc_id: None,
            trigger: None,
            incomplete: false,
        }
    }

    /// Whether the sampler must retain this event: every full
    /// collection, plus any pause over the significance threshold.
    pub fn is_critical(&self, threshold_ms: f64) -> bool {
        self.kind == EventKind::Full || self.pause_ms > threshold_ms
    }

    /// Bytes reclaimed by this collection. Concurrent allocation
    /// between samples can make heap grow across a pause in some
    /// formats; a negative delta clamps to zero instead of erroring.
    pub fn reclaimed_bytes(&self) -> Option<u64> {
        match (self.heap_before_bytes, self.heap_after_bytes) {
            (Some(before), Some(after)) => Some(before.saturating_sub(after)),
            _ => None,
        }
    }
}

/// One-time environment block extracted near the log start.
///
/// Every field is optional; a value the log never stated is `None`,
/// never a sentinel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JvmInfo {
    pub version: Option<String>,
    pub gc_policy: Option<String>,
    pub cpu_count: Option<u32>,
    pub physical_memory_bytes: Option<u64>,
    pub heap_initial_bytes: Option<u64>,
    pub heap_max_bytes: Option<u64>,
    pub gc_threads: Option<u32>,
}

impl JvmInfo {
    /// Merge fields from `other`, keeping values already present
    pub fn absorb(&mut self, other: JvmInfo) {
        macro_rules! take_if_none {
            ($field:ident) => {
                if self.$field.is_none() {
                    self.$field = other.$field;
                }
            };
        }
        take_if_none!(version);
        take_if_none!(gc_policy);
        take_if_none!(cpu_count);
        take_if_none!(physical_memory_bytes);
        take_if_none!(heap_initial_bytes);
        take_if_none!(heap_max_bytes);
        take_if_none!(gc_threads);
    }
}

/// Parse a log timestamp into a normalized timezone-free value.
///
/// Accepts both the unified-log form with a numeric offset
/// (`2025-08-26T15:03:29.558+0800`) and the verbose-markup form
/// without one (`2025-08-12T10:30:41.848`). The local clock reading
/// is kept and the offset dropped.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = chrono::DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt.naive_local());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()
}
