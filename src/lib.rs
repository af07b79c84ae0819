//! GCLens: JVM garbage-collection log analysis.
//!
//! Ingests HotSpot unified-log and OpenJ9/IBM verbose-markup GC logs
//! through a bounded-memory chunked reader, normalizes both into one
//! event model, and derives pause statistics, throughput, trends,
//! threshold alerts and baseline comparisons.
//!
//! [`analysis::analyze_bytes`] and [`analysis::analyze_file`] run the
//! whole pipeline; the stage modules are public for callers that need
//! streaming sources, cancellation or custom sampling.

pub mod aggregator;
pub mod alerts;
pub mod analysis;
pub mod diff;
pub mod parser;
pub mod reader;
pub mod utils;

pub use aggregator::{aggregate, MetricsSummary};
pub use alerts::{evaluate_alerts, Alert, Severity, ThresholdConfig};
pub use analysis::{analyze_bytes, analyze_file, AnalysisReport};
pub use diff::{compare, ComparisonResult, Verdict};
pub use parser::schema::{EventKind, GcEvent, JvmInfo};
pub use reader::{detect_format, FormatKind, ReaderConfig};
