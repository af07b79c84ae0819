//! Dual-format GC event parsing.
//!
//! The two formats are two implementations of one capability contract
//! ([`EventParser`]): feed boundary-aligned chunks with `consume`,
//! then `finish` to flush whatever is still accumulating. Parser state
//! lives only for one parse pass and is discarded afterwards; separate
//! analyses never share it.

pub mod schema;

mod unified;
mod verbose;

pub use unified::UnifiedLogParser;
pub use verbose::VerboseGcParser;

use crate::reader::{ChunkReader, FormatKind, ReaderConfig};
use crate::utils::error::ParseError;
use log::{debug, info};
use schema::{GcEvent, JvmInfo};
use std::io::Read;

/// Chunk-at-a-time event parser.
///
/// `consume` takes one chunk and returns the events completed by it;
/// partial records carry over inside the parser. `finish` flushes a
/// still-accumulating record best-effort, tagged incomplete rather
/// than dropped.
pub trait EventParser {
    fn consume(&mut self, chunk: &str) -> Vec<GcEvent>;
    fn finish(&mut self) -> Vec<GcEvent>;
    /// Records that could not be reduced to a valid event and were
    /// skipped (recovered locally, never fatal)
    fn skipped_records(&self) -> u64;
    /// One-time environment block found near the log start
    fn jvm_info(&self) -> &JvmInfo;
}

/// Construct the parser for a detected format.
///
/// # Errors
/// `ParseError::UnsupportedFormat` for [`FormatKind::Unrecognized`]
pub fn parser_for(kind: FormatKind) -> Result<Box<dyn EventParser>, ParseError> {
    match kind {
        FormatKind::UnifiedLog => Ok(Box::new(UnifiedLogParser::new())),
        FormatKind::VerboseGc => Ok(Box::new(VerboseGcParser::new())),
        FormatKind::Unrecognized => Err(ParseError::UnsupportedFormat),
    }
}

/// Everything one parse pass produces
#[derive(Debug, Clone)]
pub struct ParseOutput {
    pub events: Vec<GcEvent>,
    pub jvm_info: JvmInfo,
    /// Malformed records skipped during the pass (data-quality note,
    /// not an error)
    pub skipped_records: u64,
    /// Records that forced a chunk-boundary relaxation (soft warning)
    pub size_warnings: u64,
}

/// Run the full ingestion pipeline over a byte source.
///
/// # Arguments
/// * `source` - Raw byte stream (file, upload buffer, ...)
/// * `kind` - Format as returned by [`crate::reader::detect_format`]
/// * `config` - Chunk size and memory ceiling
///
/// # Errors
/// * `ParseError::UnsupportedFormat` - `kind` is `Unrecognized`
/// * `ParseError::SourceUnavailable` - the source failed mid-read
/// * `ParseError::SizeExceeded` - a record outgrew the memory ceiling
pub fn parse<R: Read>(
    source: R,
    kind: FormatKind,
    config: &ReaderConfig,
) -> Result<ParseOutput, ParseError> {
    parse_with(source, kind, config, || false)
}

/// Like [`parse`], but checks `should_cancel` between chunk boundaries
/// so a caller-initiated abort does not have to wait for end-of-input.
///
/// # Errors
/// As [`parse`], plus `ParseError::Cancelled`.
pub fn parse_with<R: Read>(
    source: R,
    kind: FormatKind,
    config: &ReaderConfig,
    should_cancel: impl Fn() -> bool,
) -> Result<ParseOutput, ParseError> {
    let mut parser = parser_for(kind)?;
    let mut reader = ChunkReader::new(source, *config);
    let mut events = Vec::new();

    for chunk in reader.by_ref() {
        if should_cancel() {
            return Err(ParseError::Cancelled);
        }
        let chunk = chunk?;
        if chunk.relaxed {
            debug!("parsing relaxed oversize chunk of {} bytes", chunk.data.len());
        }
        events.extend(parser.consume(&chunk.data));
    }
    events.extend(parser.finish());

    info!(
        "parsed {} events ({} records skipped)",
        events.len(),
        parser.skipped_records()
    );

    Ok(ParseOutput {
        jvm_info: parser.jvm_info().clone(),
        skipped_records: parser.skipped_records(),
        size_warnings: reader.size_warnings(),
        events,
    })
}
