//! Analysis stage: metrics aggregation, pause-distribution histogram
//! and display sampling.

mod distribution;
mod metrics;
mod sampler;

pub use distribution::{pause_distribution, PauseBin, PauseDistribution};
pub use metrics::{
    aggregate, ElapsedSource, FrequencyStats, HeapStats, KindCounts, MetricsAggregator,
    MetricsSummary, PausePercentiles, Trend,
};
pub use sampler::{sample, sample_for_display};
