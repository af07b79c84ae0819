//! Parser for the verbose GC markup format (nested elements).
//!
//! Records are `<gc-start>` / `<gc-end>` element pairs carrying
//! `<mem-info>` and per-region `<mem>` children. Elements are usually
//! self-contained, but a record can still straddle a chunk boundary,
//! so the same carry-buffer discipline as the text parser applies.
//!
//! Vocabulary translation into the canonical model: `durationms`
//! becomes the pause duration, `nursery` maps to the young region and
//! `tenure` to old; occupancies are derived as `total - free`.

use super::schema::{
    parse_timestamp, EventKind, GcEvent, JvmInfo, Provenance, RegionBreakdown, RegionSample,
};
use super::EventParser;
use crate::utils::config::OLD_GEN_ESTIMATE_FRACTION;
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;

/// Lines inspected for the one-time system-info block
const ENV_SCAN_LINES: u64 = 2_000;

// <gc-start id="5" type="scavenge" contextid="4" timestamp="2025-08-12T10:30:41.848">
static GC_START_EL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<gc-start\s+id="([^"]+)"\s+type="([^"]+)"\s+contextid="[^"]*"\s+timestamp="([^"]+)""#)
        .expect("gc-start regex")
});

// <gc-end id="8" type="scavenge" contextid="4" durationms="4.063" ... timestamp="..." activeThreads="16">
static GC_END_EL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"<gc-end\s+id="([^"]+)"\s+type="([^"]+)"\s+contextid="[^"]*"\s+durationms="([^"]+)"[^>]*timestamp="([^"]+)""#,
    )
    .expect("gc-end regex")
});

// <mem-info id="6" free="38984672" total="52428800" percent="74">
static MEM_INFO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<mem-info\s+id="[^"]*"\s+free="(\d+)"\s+total="(\d+)""#).expect("mem-info regex")
});

// <mem type="nursery" free="0" total="13107200" percent="0">
static MEM_TYPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<mem\s+type="([^"]+)"\s+free="(\d+)"\s+total="(\d+)""#).expect("mem regex")
});

// <allocation-stats totalBytes="6886848" >
static ALLOCATION_STATS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<allocation-stats\s+totalBytes="(\d+)""#).expect("allocation-stats regex")
});

// <attribute name="physicalMemory" value="17179869184" />
static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<attribute\s+name="([^"]+)"\s+value="([^"]*)""#).expect("attribute regex")
});

/// Which half of the record the cursor is inside
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    /// Inside <gc-start>: memory figures are pre-collection
    InStart,
    /// Inside <gc-end>: memory figures are post-collection
    InEnd,
}

struct PendingEvent {
    event: GcEvent,
    young_before: Option<u64>,
    young_after: Option<u64>,
    young_total: Option<u64>,
    old_before: Option<u64>,
    old_after: Option<u64>,
    old_total: Option<u64>,
    has_end: bool,
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
            old_total: None,
            has_end: false,
        }
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
            regions.old = Some(RegionSample {
                before: self.old_before,
                after: self.old_after,
                total: self.old_total,
                provenance: Provenance::Measured,
            });
        }
        if regions.is_empty() {
            // No per-region detail in this record: estimate old-gen
            // occupancy as a fixed fraction of the whole heap, tagged
            // as estimated so it is never mistaken for a measurement.
            if let Some(old) = estimate_old_gen(&event) {
                regions.old = Some(old);
            }
        }
        if !regions.is_empty() {
            event.regions = Some(regions);
        }
        event
    }
}

fn estimate_old_gen(event: &GcEvent) -> Option<RegionSample> {
    event.heap_total_bytes?;
    let scale = |bytes: Option<u64>| bytes.map(|b| (b as f64 * OLD_GEN_ESTIMATE_FRACTION) as u64);
    Some(RegionSample {
        before: scale(event.heap_before_bytes),
        after: scale(event.heap_after_bytes),
        total: scale(event.heap_total_bytes),
        provenance: Provenance::Estimated,
    })
}

/// Element-oriented parser for the verbose GC markup format
pub struct VerboseGcParser {
    phase: Phase,
    current: Option<PendingEvent>,
    /// Partial element text carried across chunk boundaries
    pending: String,
    next_sequence: u64,
    skipped: u64,
    lines_seen: u64,
    jvm: JvmInfo,
}

impl Default for VerboseGcParser {
    fn default() -> Self {
        Self::new()
    }
}

impl VerboseGcParser {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            current: None,
            pending: String::new(),
            next_sequence: 0,
            skipped: 0,
            lines_seen: 0,
            jvm: JvmInfo::default(),
        }
    }

    fn kind_from(gc_type: &str) -> EventKind {
        match gc_type.to_ascii_lowercase().as_str() {
            "scavenge" | "nursery" => EventKind::Young,
            "global" | "mixed" => EventKind::MixedOrGlobal,
            "full" => EventKind::Full,
            _ => EventKind::Other,
        }
    }

    fn emit(&mut self, pending: PendingEvent, out: &mut Vec<GcEvent>) {
        let mut event = pending.into_event();
        event.sequence_index = self.next_sequence;
        self.next_sequence += 1;
        out.push(event);
    }

    fn reduce_current(&mut self, out: &mut Vec<GcEvent>) {
        if let Some(pending) = self.current.take() {
            if pending.has_end {
                self.emit(pending, out);
            } else {
                debug!(
                    "skipping unterminated record id={:?}",
                    pending.event.gc_id
                );
                self.skipped += 1;
            }
        }
        self.phase = Phase::Idle;
    }

    fn scan_environment(&mut self, line: &str) {
        for caps in ATTRIBUTE.captures_iter(line) {
            let value = caps[2].to_string();
            match &caps[1] {
                "j9version" | "version" => {
                    if self.jvm.version.is_none() {
                        self.jvm.version = Some(value);
                    }
                }
                "gcPolicy" => {
                    if self.jvm.gc_policy.is_none() {
                        self.jvm.gc_policy =
                            Some(value.trim_start_matches("-Xgcpolicy:").to_string());
                    }
                }
                "numCPUs" | "activeCPUs" => {
                    if self.jvm.cpu_count.is_none() {
                        self.jvm.cpu_count = value.parse().ok();
                    }
                }
                "physicalMemory" => {
                    if self.jvm.physical_memory_bytes.is_none() {
                        self.jvm.physical_memory_bytes = value.parse().ok();
                    }
                }
                "gcthreads" => {
                    if self.jvm.gc_threads.is_none() {
                        self.jvm.gc_threads = value.parse().ok();
                    }
                }
                _ => {}
            }
        }
    }

    fn process_line(&mut self, line: &str, out: &mut Vec<GcEvent>) {
        self.lines_seen += 1;
        if self.lines_seen <= ENV_SCAN_LINES {
            self.scan_environment(line);
        }

        if let Some(caps) = GC_START_EL.captures(line) {
            // A fresh record closes anything left dangling
            if self.current.is_some() {
                self.reduce_current(out);
            }
            let mut event = GcEvent::new(0, Self::kind_from(&caps[2]));
            event.gc_id = caps[1].parse().ok();
            event.timestamp = parse_timestamp(&caps[3]);
            self.current = Some(PendingEvent::new(event));
            self.phase = Phase::InStart;
            return;
        }

        if let Some(caps) = GC_END_EL.captures(line) {
            if self.current.is_none() {
                // End element with no matching start still yields an
                // event; duration and timestamp are all it has.
                let mut event = GcEvent::new(0, Self::kind_from(&caps[2]));
                event.gc_id = caps[1].parse().ok();
                self.current = Some(PendingEvent::new(event));
            }
            let pending = self.current.as_mut().expect("current record");
            pending.event.pause_ms = caps[3].parse().unwrap_or(0.0);
            if pending.event.timestamp.is_none() {
                pending.event.timestamp = parse_timestamp(&caps[4]);
            }
            pending.has_end = true;
            self.phase = Phase::InEnd;
            if line.contains("/>") {
                self.reduce_current(out);
            }
            return;
        }

        if line.contains("</gc-end>") {
            if self.current.is_some() {
                self.reduce_current(out);
            }
            return;
        }

        if let Some(pending) = self.current.as_mut() {
            if let Some(caps) = MEM_INFO.captures(line) {
                if let (Ok(free), Ok(total)) = (caps[1].parse::<u64>(), caps[2].parse::<u64>()) {
                    let used = total.saturating_sub(free);
                    match self.phase {
                        Phase::InStart => pending.event.heap_before_bytes = Some(used),
                        Phase::InEnd => pending.event.heap_after_bytes = Some(used),
                        Phase::Idle => {}
                    }
                    pending.event.heap_total_bytes = Some(total);
                }
                return;
            }

            if let Some(caps) = MEM_TYPE.captures(line) {
                if let (Ok(free), Ok(total)) = (caps[2].parse::<u64>(), caps[3].parse::<u64>()) {
                    let used = total.saturating_sub(free);
                    match (&caps[1].to_ascii_lowercase()[..], self.phase) {
                        ("nursery", Phase::InStart) => {
                            pending.young_before = Some(used);
                            pending.young_total = Some(total);
                        }
                        ("nursery", Phase::InEnd) => {
                            pending.young_after = Some(used);
                            pending.young_total = Some(total);
                        }
                        ("tenure", Phase::InStart) => {
                            pending.old_before = Some(used);
                            pending.old_total = Some(total);
                        }
                        ("tenure", Phase::InEnd) => {
                            pending.old_after = Some(used);
                            pending.old_total = Some(total);
                        }
                        // allocate/survivor/soa/loa are sub-spaces of
                        // nursery and tenure; the parents carry the
                        // canonical figures
                        _ => {}
                    }
                }
                return;
            }

            if let Some(caps) = ALLOCATION_STATS.captures(line) {
                if pending.event.trigger.is_none() {
                    pending.event.trigger = Some(format!("allocation request: {} bytes", &caps[1]));
                }
                return;
            }
        }

        // Unrecognized elements (cycle markers, heap-resize, warnings)
        // are ignored, not fatal.
    }
}

impl EventParser for VerboseGcParser {
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
        if let Some(mut pending) = self.current.take() {
            if !pending.has_end {
                warn!(
                    "input ended mid-element id={:?}, emitting incomplete event",
                    pending.event.gc_id
                );
                pending.event.incomplete = true;
            }
            self.emit(pending, &mut out);
        }
        self.phase = Phase::Idle;
        out
    }

    fn skipped_records(&self) -> u64 {
        self.skipped
    }

    fn jvm_info(&self) -> &JvmInfo {
        &self.jvm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" ?>
<verbosegc xmlns="http://www.ibm.com/j9/verbosegc" version="fa000e8_CMPRSS">
<gc-start id="5" type="scavenge" contextid="4" timestamp="2025-08-12T10:30:41.848">
  <mem-info id="6" free="38984672" total="52428800" percent="74">
    <mem type="nursery" free="0" total="13107200" percent="0">
      <mem type="allocate" free="0" total="6553600" percent="0" />
      <mem type="survivor" free="0" total="6553600" percent="0" />
    </mem>
    <mem type="tenure" free="38984672" total="39321600" percent="99">
      <mem type="soa" free="37018592" total="37355520" percent="99" />
      <mem type="loa" free="1966080" total="1966080" percent="100" />
    </mem>
  </mem-info>
</gc-start>
<allocation-stats totalBytes="6886848" >
  <allocated-bytes non-tlh="984560" tlh="5902288" />
</allocation-stats>
<gc-end id="8" type="scavenge" contextid="4" durationms="4.063" usertimems="11.075" systemtimems="5.067" stalltimems="31.653" timestamp="2025-08-12T10:30:41.852" activeThreads="16">
  <mem-info id="9" free="43341360" total="52428800" percent="82">
    <mem type="nursery" free="4356688" total="13107200" percent="33">
      <mem type="allocate" free="4356688" total="6553600" percent="66" />
      <mem type="survivor" free="0" total="6553600" percent="0" />
    </mem>
  </mem-info>
</gc-end>
"#;

    fn parse_all(input: &str) -> Vec<GcEvent> {
        let mut parser = VerboseGcParser::new();
        let mut events = parser.consume(input);
        events.extend(parser.finish());
        events
    }

    #[test]
    fn test_scavenge_record() {
        let events = parse_all(SAMPLE);
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.kind, EventKind::Young);
        assert_eq!(event.pause_ms, 4.063);
        assert_eq!(event.gc_id, Some(5));
        assert_eq!(event.heap_before_bytes, Some(52428800 - 38984672));
        assert_eq!(event.heap_after_bytes, Some(52428800 - 43341360));
        assert_eq!(event.heap_total_bytes, Some(52428800));
        assert!(!event.incomplete);

        let regions = event.regions.as_ref().expect("regions");
        let young = regions.young.expect("young");
        assert_eq!(young.before, Some(13107200));
        assert_eq!(young.after, Some(13107200 - 4356688));
        assert_eq!(young.total, Some(13107200));
        assert_eq!(young.provenance, Provenance::Measured);
        let old = regions.old.expect("old");
        assert_eq!(old.before, Some(39321600 - 38984672));
        assert_eq!(old.total, Some(39321600));
    }

    #[test]
    fn test_trigger_from_allocation_stats() {
        let events = parse_all(SAMPLE);
        assert_eq!(
            events[0].trigger.as_deref(),
            Some("allocation request: 6886848 bytes")
        );
    }

    #[test]
    fn test_global_maps_to_mixed_or_global() {
        let input = r#"<gc-start id="1" type="global" contextid="0" timestamp="2025-08-12T10:31:00.000">
</gc-start>
<gc-end id="2" type="global" contextid="0" durationms="151.200" timestamp="2025-08-12T10:31:00.152" activeThreads="4">
</gc-end>
"#;
        let events = parse_all(input);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::MixedOrGlobal);
        assert_eq!(events[0].pause_ms, 151.2);
    }

    #[test]
    fn test_element_straddling_chunks() {
        let whole = parse_all(SAMPLE);

        let mut parser = VerboseGcParser::new();
        let mut pieced = Vec::new();
        let split = SAMPLE.len() / 2;
        // Split mid-element; the carry buffer must reassemble it
        pieced.extend(parser.consume(&SAMPLE[..split]));
        pieced.extend(parser.consume(&SAMPLE[split..]));
        pieced.extend(parser.finish());

        assert_eq!(whole, pieced);
    }

    #[test]
    fn test_missing_region_detail_yields_estimate() {
        let input = r#"<gc-start id="3" type="global" contextid="0" timestamp="2025-08-12T10:32:00.000">
  <mem-info id="4" free="20000000" total="100000000" percent="20">
</gc-start>
<gc-end id="4" type="global" contextid="0" durationms="80.000" timestamp="2025-08-12T10:32:00.080" activeThreads="4">
  <mem-info id="5" free="90000000" total="100000000" percent="90">
</gc-end>
"#;
        let events = parse_all(input);
        assert_eq!(events.len(), 1);
        let regions = events[0].regions.as_ref().expect("regions");
        let old = regions.old.expect("estimated old gen");
        assert_eq!(old.provenance, Provenance::Estimated);
        assert_eq!(old.total, Some(75_000_000));
    }

    #[test]
    fn test_unterminated_record_flushes_incomplete() {
        let input = r#"<gc-start id="9" type="scavenge" contextid="4" timestamp="2025-08-12T10:33:00.000">
  <mem-info id="10" free="1000" total="2000" percent="50">
"#;
        let events = parse_all(input);
        assert_eq!(events.len(), 1);
        assert!(events[0].incomplete);
        assert_eq!(events[0].heap_before_bytes, Some(1000));
    }

    #[test]
    fn test_system_info_extraction() {
        let input = r#"<initialized id="1" timestamp="2025-08-12T10:30:00.000">
  <attribute name="gcPolicy" value="-Xgcpolicy:gencon" />
  <attribute name="physicalMemory" value="17179869184" />
  <attribute name="numCPUs" value="16" />
  <attribute name="gcthreads" value="4" />
  <attribute name="j9version" value="fa000e8" />
</initialized>
"#;
        let mut parser = VerboseGcParser::new();
        parser.consume(input);
        parser.finish();
        let jvm = parser.jvm_info();
        assert_eq!(jvm.gc_policy.as_deref(), Some("gencon"));
        assert_eq!(jvm.physical_memory_bytes, Some(17179869184));
        assert_eq!(jvm.cpu_count, Some(16));
        assert_eq!(jvm.gc_threads, Some(4));
        assert_eq!(jvm.version.as_deref(), Some("fa000e8"));
    }
}
