pub mod aggregator;
pub mod converter;
pub mod dataset;
pub mod resampler;
pub mod run_processor;

pub use aggregator::{AggregationReport, PollutantAggregator, PollutantFailure};
pub use converter::{
    harp_operations, ConversionReport, ConversionStage, HarpCommandConverter, ProductConverter,
};
pub use dataset::{DatasetMember, TimeIndexedDataset};
pub use resampler::{reduce_mean, DailyResampler, MeanAccumulator, ReductionStrategy, ResampleOutcome};
pub use run_processor::{AggregationRun, BatchOptions, BatchRun, Inventory, RetentionRun, RunProcessor};
