//! One-call analysis pipeline: detect, parse, aggregate, sample,
//! evaluate alerts.
//!
//! The stage functions stay public for callers that need finer
//! control (streaming sources, cancellation, custom sampling); this
//! module wires them together for the common case.

use crate::aggregator::{self, MetricsAggregator, MetricsSummary, PauseDistribution};
use crate::alerts::{evaluate_alerts, Alert, ThresholdConfig};
use crate::parser::schema::{GcEvent, JvmInfo};
use crate::parser;
use crate::reader::{detect_format, FormatKind, ReaderConfig};
use crate::utils::config::DETECT_PREFIX_LIMIT;
use crate::utils::error::ParseError;
use log::info;
use serde::Serialize;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;

/// Everything one analysis produces
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub format: FormatKind,
    pub jvm_info: JvmInfo,
    pub summary: MetricsSummary,
    /// Pause-time histogram over fixed bins
    pub pause_distribution: PauseDistribution,
    /// Display-ready subsequence of the parsed events
    pub sampled_events: Vec<GcEvent>,
    pub alerts: Vec<Alert>,
    pub skipped_records: u64,
    pub size_warnings: u64,
}

impl AnalysisReport {
    /// Render the report as pretty-printed JSON for dashboards and
    /// CI artifacts
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Analyze an in-memory log.
///
/// # Errors
/// * `ParseError::UnsupportedFormat` - format detection failed
/// * `ParseError::SizeExceeded` - a record outgrew the memory ceiling
pub fn analyze_bytes(
    data: &[u8],
    reader_config: &ReaderConfig,
    thresholds: &ThresholdConfig,
) -> Result<AnalysisReport, ParseError> {
    let prefix = &data[..data.len().min(DETECT_PREFIX_LIMIT)];
    let format = detect_format(prefix);
    analyze_source(Cursor::new(data), format, reader_config, thresholds)
}

/// Analyze a log file on disk.
///
/// # Errors
/// As [`analyze_bytes`], plus `ParseError::SourceUnavailable` when the
/// file cannot be opened or read.
pub fn analyze_file(
    path: impl AsRef<Path>,
    reader_config: &ReaderConfig,
    thresholds: &ThresholdConfig,
) -> Result<AnalysisReport, ParseError> {
    let path = path.as_ref();
    let mut prefix = vec![0_u8; DETECT_PREFIX_LIMIT];
    let mut file = File::open(path)?;
    let mut filled = 0;
    // a short read does not mean end of file
    loop {
        let n = file.read(&mut prefix[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
        if filled == prefix.len() {
            break;
        }
    }
    prefix.truncate(filled);
    let format = detect_format(&prefix);

    info!("analyzing {} as {:?}", path.display(), format);
    analyze_source(File::open(path)?, format, reader_config, thresholds)
}

fn analyze_source<R: Read>(
    source: R,
    format: FormatKind,
    reader_config: &ReaderConfig,
    thresholds: &ThresholdConfig,
) -> Result<AnalysisReport, ParseError> {
    let output = parser::parse(source, format, reader_config)?;

    let mut aggregator = MetricsAggregator::new();
    for event in &output.events {
        aggregator.observe(event);
    }
    let summary = aggregator.finalize();
    let alerts = evaluate_alerts(&summary, thresholds);
    let pause_distribution = aggregator::pause_distribution(&output.events);
    let sampled_events = aggregator::sample_for_display(&output.events);

    Ok(AnalysisReport {
        format,
        jvm_info: output.jvm_info,
        summary,
        pause_distribution,
        sampled_events,
        alerts,
        skipped_records: output.skipped_records,
        size_warnings: output.size_warnings,
    })
}
