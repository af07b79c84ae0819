//! Log format detection from a bounded input prefix.
//!
//! Classification looks for signature markers of the two supported
//! formats and never fails: an input matching neither yields
//! [`FormatKind::Unrecognized`] and the caller decides what to do.

use crate::utils::config::DETECT_PREFIX_LIMIT;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Supported log formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormatKind {
    /// JVM unified logging: bracketed `[timestamp][uptime][info][gc,...]` lines
    UnifiedLog,
    /// Verbose GC markup: nested `<gc-start>` / `<gc-end>` elements
    VerboseGc,
    /// Neither signature matched
    Unrecognized,
}

static UNIFIED_MARKERS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"\[info\]\[gc").expect("unified marker regex"),
        Regex::new(r"\[gc,start\s*\]").expect("unified marker regex"),
        Regex::new(r"GC\(\d+\) Pause").expect("unified marker regex"),
        Regex::new(r"G1 Evacuation Pause").expect("unified marker regex"),
    ]
});

static VERBOSE_MARKERS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"<\?xml").expect("verbose marker regex"),
        Regex::new(r"<verbosegc").expect("verbose marker regex"),
        Regex::new(r#"<gc-start\s+id=""#).expect("verbose marker regex"),
        Regex::new(r"<mem-info").expect("verbose marker regex"),
    ]
});

/// Classify the input format from a byte prefix.
///
/// Only the first [`DETECT_PREFIX_LIMIT`] bytes are inspected. Each
/// format scores one point per signature marker present; the higher
/// score wins, with the unified text format winning ties since its
/// markers are the more specific ones.
pub fn detect_format(prefix: &[u8]) -> FormatKind {
    let bounded = &prefix[..prefix.len().min(DETECT_PREFIX_LIMIT)];
    let text = String::from_utf8_lossy(bounded);

    let unified_score = UNIFIED_MARKERS.iter().filter(|p| p.is_match(&text)).count();
    let verbose_score = VERBOSE_MARKERS.iter().filter(|p| p.is_match(&text)).count();

    debug!(
        "format detection: unified={} verbose={}",
        unified_score, verbose_score
    );

    if unified_score > 0 && unified_score >= verbose_score {
        FormatKind::UnifiedLog
    } else if verbose_score > 0 {
        FormatKind::VerboseGc
    } else {
        FormatKind::Unrecognized
    }
}
