//! Parser for the JVM unified logging text format (bracketed tags).
//!
//! One GC event spans several lines: a pause-announcement line opens
//! the record, associated lines (heap region sizes, metaspace, worker
//! and CPU timings) accumulate, and the closing summary line carries
//! the pause duration and heap transition. The parser is an explicit
//! state machine with a pending-line carry buffer so a record split
//! across chunk boundaries reduces identically at any granularity,
//! down to one byte per chunk.

use super::schema::{
    parse_timestamp, EventKind, GcEvent, JvmInfo, MetaspaceSample, RegionBreakdown, RegionSample,
};
use super::EventParser;
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;

/// Lines inspected for the one-time environment block before giving up
const ENV_SCAN_LINES: u64 = 2_000;

const MIB: u64 = 1024 * 1024;

// Pause announcement, e.g.
// [2025-08-26T15:03:29.558+0800][3.715s][info][gc,start    ] GC(0) Pause Young (Normal) (G1 Evacuation Pause)
// Trigger text may end in "()" as in "Pause Full (System.gc())".
static GC_START: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\[([^\]]+)\]\[([\d.]+)s\]\[info\]\[gc,start\s*\] GC\((\d+)\) Pause (\w+)(?:\s+\(([^)]*(?:\(\))?)\))?(?:\s+\(([^)]*(?:\(\))?)\))?",
    )
    .expect("gc,start regex")
});

// Closing summary line with heap transition and pause duration, e.g.
// [...][info][gc          ] GC(0) Pause Young (Normal) (G1 Evacuation Pause) 173M->23M(512M) 24.846ms
static GC_END: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\[([^\]]+)\]\[([\d.]+)s\]\[info\]\[gc\s*\] GC\((\d+)\) Pause (\w+)(?:\s+\(([^)]*(?:\(\))?)\))?(?:\s+\(([^)]*(?:\(\))?)\))?\s+(\d+)M->(\d+)M\((\d+)M\)\s+([\d.]+)ms",
    )
    .expect("gc end regex")
});

// Concurrent cycle summary, e.g. GC(5097) Concurrent Mark Cycle 2449.142ms
static CONCURRENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[([^\]]+)\]\[([\d.]+)s\]\[info\]\[gc\s*\] GC\((\d+)\) Concurrent (.+?)\s+([\d.]+)ms")
        .expect("concurrent regex")
});

// Region transition, e.g. [gc,heap] GC(0) Eden regions: 170->0(150)
static HEAP_REGIONS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[gc,heap\s*\] GC\((\d+)\) (\w+) regions: (\d+)->(\d+)(?:\((\d+)\))?")
        .expect("gc,heap regex")
});

// Metaspace transition, e.g. [gc,metaspace] GC(0) Metaspace: 1234K->1234K(4096K)
static METASPACE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[gc,metaspace\s*\] GC\((\d+)\) Metaspace: (\d+)K->(\d+)K\((\d+)K\)")
        .expect("gc,metaspace regex")
});

// One-time environment block emitted by gc,init at JVM startup
static INIT_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[gc,init\s*\]\s+Version:\s+(\S+)").expect("init version regex"));
static INIT_CPUS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[gc,init\s*\]\s+CPUs:\s+(\d+) total").expect("init cpus regex"));
static INIT_MEMORY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[gc,init\s*\]\s+Memory:\s+(\d+)M").expect("init memory regex"));
static INIT_HEAP_INITIAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[gc,init\s*\]\s+Heap Initial Capacity:\s+(\d+)M").expect("init heap regex")
});
static INIT_HEAP_MAX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[gc,init\s*\]\s+Heap Max Capacity:\s+(\d+)M").expect("init heap max regex")
});
static INIT_WORKERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[gc,init\s*\]\s+Parallel Workers:\s+(\d+)").expect("init workers regex")
});
static USING_POLICY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[info\]\[gc\s*\] Using (.+)$").expect("gc policy regex"));

/// Accumulation phase of the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    /// Between records
    Idle,
    /// Announcement seen, waiting for the closing summary line
    AccumulatingHeader,
    /// Summary line seen, trailer lines may still attach
    AccumulatingBody,
}

/// Record under construction
struct PendingEvent {
    event: GcEvent,
    young_before: Option<u64>,
    young_after: Option<u64>,
    young_total: Option<u64>,
    old_before: Option<u64>,
    old_after: Option<u64>,
    extras_before: Option<u64>,
    extras_after: Option<u64>,
    has_summary: bool,
}

impl PendingEvent {
    fn new(event: GcEvent) -> Self {
        Self {
            event,
            young_before: None,
            young_after: None,
            young_total: None,
            old_before: None,
            old_after: None,
            extras_before: None,
            extras_after: None,
            has_summary: false,
        }
    }

    /// Anything beyond the bare announcement was captured
    fn has_substance(&self) -> bool {
        self.has_summary || self.event.pause_ms > 0.0 || self.event.heap_before_bytes.is_some()
    }

    fn into_event(self) -> GcEvent {
        let mut event = self.event;
        let mut regions = RegionBreakdown::default();
        if self.young_before.is_some() || self.young_after.is_some() {
            regions.young = Some(RegionSample::measured(
                self.young_before,
                self.young_after,
                self.young_total,
            ));
        }
        if self.old_before.is_some() || self.old_after.is_some() {
            regions.old = Some(RegionSample::measured(self.old_before, self.old_after, None));
        }
        if self.extras_before.is_some() || self.extras_after.is_some() {
            regions.extras = Some(RegionSample::measured(
                self.extras_before,
                self.extras_after,
                None,
            ));
        }
        if !regions.is_empty() {
            event.regions = Some(regions);
        }
        event
    }
}

/// State-machine parser for the unified logging format
pub struct UnifiedLogParser {
    state: ParseState,
    current: Option<PendingEvent>,
    /// Partial last line carried across chunk boundaries
    pending: String,
    next_sequence: u64,
    skipped: u64,
    lines_seen: u64,
    jvm: JvmInfo,
}

impl Default for UnifiedLogParser {
    fn default() -> Self {
        Self::new()
    }
}

impl UnifiedLogParser {
    pub fn new() -> Self {
        Self {
            state: ParseState::Idle,
            current: None,
            pending: String::new(),
            next_sequence: 0,
            skipped: 0,
            lines_seen: 0,
            jvm: JvmInfo::default(),
        }
    }

    fn emit(&mut self, pending: PendingEvent, out: &mut Vec<GcEvent>) {
        let mut event = pending.into_event();
        event.sequence_index = self.next_sequence;
        self.next_sequence += 1;
        out.push(event);
    }

    /// Close out the record under construction, if any. A record that
    /// never got past its announcement is counted as skipped rather
    /// than emitted as an empty event.
    fn reduce_current(&mut self, out: &mut Vec<GcEvent>) {
        if let Some(pending) = self.current.take() {
            if pending.has_substance() {
                self.emit(pending, out);
            } else {
                debug!(
                    "skipping record GC({:?}) with no measurements",
                    pending.event.gc_id
                );
                self.skipped += 1;
            }
        }
        self.state = ParseState::Idle;
    }

    fn scan_environment(&mut self, line: &str) {
        if let Some(caps) = INIT_VERSION.captures(line) {
            self.jvm.version = Some(caps[1].to_string());
        } else if let Some(caps) = INIT_CPUS.captures(line) {
            self.jvm.cpu_count = caps[1].parse().ok();
        } else if let Some(caps) = INIT_MEMORY.captures(line) {
            self.jvm.physical_memory_bytes = caps[1].parse::<u64>().ok().map(|m| m * MIB);
        } else if let Some(caps) = INIT_HEAP_INITIAL.captures(line) {
            self.jvm.heap_initial_bytes = caps[1].parse::<u64>().ok().map(|m| m * MIB);
        } else if let Some(caps) = INIT_HEAP_MAX.captures(line) {
            self.jvm.heap_max_bytes = caps[1].parse::<u64>().ok().map(|m| m * MIB);
        } else if let Some(caps) = INIT_WORKERS.captures(line) {
            self.jvm.gc_threads = caps[1].parse().ok();
        } else if self.jvm.gc_policy.is_none() {
            if let Some(caps) = USING_POLICY.captures(line) {
                self.jvm.gc_policy = Some(caps[1].trim().to_string());
            }
        }
    }

    fn kind_from(word: &str, trigger: Option<&str>) -> EventKind {
        if trigger.is_some_and(|t| t.contains("Humongous")) {
            return EventKind::Humongous;
        }
        match word.to_ascii_lowercase().as_str() {
            "young" => EventKind::Young,
            "mixed" => EventKind::MixedOrGlobal,
            "full" => EventKind::Full,
            _ => EventKind::Other,
        }
    }

    fn process_line(&mut self, line: &str, out: &mut Vec<GcEvent>) {
        self.lines_seen += 1;
        if self.lines_seen <= ENV_SCAN_LINES {
            self.scan_environment(line);
        }

        // A blank line terminates the record under construction
        if line.trim().is_empty() {
            if self.state != ParseState::Idle {
                self.reduce_current(out);
            }
            return;
        }

        if let Some(caps) = GC_END.captures(line) {
            self.apply_summary(&caps, out);
            return;
        }

        if let Some(caps) = GC_START.captures(line) {
            // The next announcement closes whatever was accumulating
            if self.state != ParseState::Idle {
                self.reduce_current(out);
            }
            let trigger = caps
                .get(6)
                .or_else(|| caps.get(5))
                .map(|m| m.as_str().to_string());
            let mut event = GcEvent::new(0, Self::kind_from(&caps[4], trigger.as_deref()));
            event.timestamp = parse_timestamp(&caps[1]);
            event.runtime_secs = caps[2].parse().ok();
            event.gc_id = caps[3].parse().ok();
            event.trigger = trigger;
            self.current = Some(PendingEvent::new(event));
            self.state = ParseState::AccumulatingHeader;
            return;
        }

        if let Some(caps) = CONCURRENT.captures(line) {
            // Concurrent cycles complete independently of the pause
            // being accumulated; they are not application pauses.
            let mut event = GcEvent::new(0, EventKind::Other);
            event.timestamp = parse_timestamp(&caps[1]);
            event.runtime_secs = caps[2].parse().ok();
            event.gc_id = caps[3].parse().ok();
            event.trigger = Some(format!("Concurrent {}", &caps[4]));
            self.emit(PendingEvent::new(event), out);
            return;
        }

        if let Some(caps) = HEAP_REGIONS.captures(line) {
            self.apply_regions(&caps);
            return;
        }

        if let Some(caps) = METASPACE.captures(line) {
            if let Some(pending) = self.current.as_mut() {
                if let (Ok(before), Ok(after), Ok(total)) =
                    (caps[2].parse(), caps[3].parse(), caps[4].parse())
                {
                    pending.event.metaspace = Some(MetaspaceSample {
                        before_kb: before,
                        after_kb: after,
                        total_kb: total,
                    });
                }
            }
            return;
        }

        // Anything else (worker counts, CPU timings, phase breakdowns,
        // ergonomics chatter) is ignored, not fatal.
    }

    /// Handle the closing summary line carrying heap transition and
    /// pause duration. Works with or without a preceding announcement.
    fn apply_summary(&mut self, caps: &regex::Captures<'_>, out: &mut Vec<GcEvent>) {
        let gc_id: Option<u64> = caps[3].parse().ok();

        let matches_current = self
            .current
            .as_ref()
            .is_some_and(|p| p.event.gc_id == gc_id);
        if !matches_current && self.state != ParseState::Idle {
            self.reduce_current(out);
        }

        let trigger = caps
            .get(6)
            .or_else(|| caps.get(5))
            .map(|m| m.as_str().to_string());
        let pending = self.current.get_or_insert_with(|| {
            let mut event = GcEvent::new(0, Self::kind_from(&caps[4], trigger.as_deref()));
            event.gc_id = gc_id;
            event.trigger = trigger.clone();
            PendingEvent::new(event)
        });

        let event = &mut pending.event;
        // Full pauses report under the same id as the cycle that
        // triggered them; the summary kind wins over the announcement.
        event.kind = Self::kind_from(&caps[4], trigger.as_deref());
        if event.timestamp.is_none() {
            event.timestamp = parse_timestamp(&caps[1]);
        }
        if event.runtime_secs.is_none() {
            event.runtime_secs = caps[2].parse().ok();
        }
        event.heap_before_bytes = caps[7].parse::<u64>().ok().map(|m| m * MIB);
        event.heap_after_bytes = caps[8].parse::<u64>().ok().map(|m| m * MIB);
        event.heap_total_bytes = caps[9].parse::<u64>().ok().map(|m| m * MIB);
        event.pause_ms = caps[10].parse().unwrap_or(0.0);
        pending.has_summary = true;
        self.state = ParseState::AccumulatingBody;
    }

    fn apply_regions(&mut self, caps: &regex::Captures<'_>) {
        let Some(pending) = self.current.as_mut() else {
            return;
        };
        let before: Option<u64> = caps[3].parse().ok();
        let after: Option<u64> = caps[4].parse().ok();
        let target: Option<u64> = caps.get(5).and_then(|m| m.as_str().parse().ok());

        fn add(slot: &mut Option<u64>, value: Option<u64>) {
            if let Some(v) = value {
                *slot = Some(slot.unwrap_or(0) + v);
            }
        }

        // Eden and Survivor together form the canonical young region
        match caps[2].to_ascii_lowercase().as_str() {
            "eden" | "survivor" => {
                add(&mut pending.young_before, before);
                add(&mut pending.young_after, after);
                add(&mut pending.young_total, target);
            }
            "old" => {
                add(&mut pending.old_before, before);
                add(&mut pending.old_after, after);
            }
            "humongous" | "archive" => {
                add(&mut pending.extras_before, before);
                add(&mut pending.extras_after, after);
            }
            other => {
                debug!("ignoring unknown region type '{}'", other);
            }
        }
    }
}

impl EventParser for UnifiedLogParser {
    fn consume(&mut self, chunk: &str) -> Vec<GcEvent> {
        let mut out = Vec::new();
        let mut text = std::mem::take(&mut self.pending);
        text.push_str(chunk);

        let mut rest = text.as_str();
        while let Some(pos) = rest.find('\n') {
            let line = rest[..pos].trim_end_matches('\r');
            self.process_line(line, &mut out);
            rest = &rest[pos + 1..];
        }
        self.pending = rest.to_string();
        out
    }

    fn finish(&mut self) -> Vec<GcEvent> {
        let mut out = Vec::new();
        if !self.pending.is_empty() {
            let line = std::mem::take(&mut self.pending);
            self.process_line(line.trim_end_matches('\r'), &mut out);
        }
        // Flush best-effort rather than dropping: an event still
        // accumulating at end of input is tagged incomplete unless its
        // summary line already closed it.
        if let Some(mut pending) = self.current.take() {
            if !pending.has_summary {
                warn!(
                    "input ended mid-record GC({:?}), emitting incomplete event",
                    pending.event.gc_id
                );
                pending.event.incomplete = true;
            }
            self.emit(pending, &mut out);
        }
        self.state = ParseState::Idle;
        out
    }

    fn skipped_records(&self) -> u64 {
        self.skipped
    }

    fn jvm_info(&self) -> &JvmInfo {
        &self.jvm
    }
}
