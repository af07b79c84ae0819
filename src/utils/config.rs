//! Constants and defaults shared across the pipeline.

/// Default maximum chunk size handed to a parser (64 MiB)
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024 * 1024;

/// Default memory ceiling for a single analysis pipeline (2 GiB)
pub const DEFAULT_MEMORY_CEILING: usize = 2 * 1024 * 1024 * 1024;

/// How much of the input prefix format detection may inspect (1 MiB)
pub const DETECT_PREFIX_LIMIT: usize = 1024 * 1024;

/// Default maximum number of events the adaptive sampler returns,
/// critical events excluded from the cap
pub const DEFAULT_MAX_SAMPLE_POINTS: usize = 50_000;

/// Pause duration above which an event is considered critical (ms).
/// Full collections are critical regardless of duration.
pub const CRITICAL_PAUSE_MS: f64 = 100.0;

/// Elapsed-time fallback when the log carries no usable wall-clock
/// anchors (ms). Matches the one-second window the frequency and
/// throughput metrics degrade to.
pub const FALLBACK_ELAPSED_MS: f64 = 1_000.0;

/// Fraction of total heap attributed to the old generation when a
/// format reports no per-region detail. A heuristic, not a measured
/// value; samples derived from it carry `Provenance::Estimated`.
pub const OLD_GEN_ESTIMATE_FRACTION: f64 = 0.75;

/// Relative change (percent) below which a compared metric is treated
/// as noise and reported as unchanged
pub const COMPARE_NOISE_PCT: f64 = 2.0;
