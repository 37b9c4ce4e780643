use rayon::prelude::*;
use std::path::PathBuf;
use tracing::{error, info, warn};

use crate::error::{ProcessingError, Result};
use crate::models::{CompositeGrid, Pollutant};
use crate::processors::dataset::TimeIndexedDataset;
use crate::readers::{Catalog, GranuleIndex, ProductReader};
use crate::settings::AggregationSettings;
use crate::utils::progress::ProgressReporter;

/// Pollutant pass that failed, with the error that stopped it.
#[derive(Debug)]
pub struct PollutantFailure {
    pub pollutant: Pollutant,
    pub error: ProcessingError,
}

/// Outcome of aggregating every pollutant of a catalog.
#[derive(Debug, Default)]
pub struct AggregationReport {
    pub composites: Vec<CompositeGrid>,
    pub failures: Vec<PollutantFailure>,
    /// Pollutants with no derived files.
    pub skipped: Vec<Pollutant>,
}

enum PassOutcome {
    Composite(Box<CompositeGrid>),
    Skipped,
    Failed(ProcessingError),
}

/// Turns the derived files of each pollutant into one composite grid.
pub struct PollutantAggregator<'a> {
    reader: &'a dyn ProductReader,
    index: &'a GranuleIndex,
    settings: AggregationSettings,
}

impl<'a> PollutantAggregator<'a> {
    pub fn new(
        reader: &'a dyn ProductReader,
        index: &'a GranuleIndex,
        settings: AggregationSettings,
    ) -> Self {
        Self {
            reader,
            index,
            settings,
        }
    }

    /// Label, combine, resample daily and reduce the files of one pollutant.
    pub fn aggregate(&self, pollutant: Pollutant, files: &[PathBuf]) -> Result<CompositeGrid> {
        let dataset = TimeIndexedDataset::open(
            self.reader,
            files,
            pollutant.field(),
            |path, header| self.index.resolve_time_label(path, header),
        )?;

        let coverage = dataset.coverage().ok_or_else(|| {
            ProcessingError::MissingData(format!("no members for {}", pollutant))
        })?;
        let outcome = dataset.resample_daily(
            self.settings.bin_reduction,
            self.settings.composite_reduction,
        )?;

        if outcome.empty_bins > 0 {
            warn!(
                pollutant = %pollutant,
                empty_bins = outcome.empty_bins,
                bins = outcome.bins,
                "composite includes days without observations"
            );
        }

        Ok(CompositeGrid {
            pollutant,
            definition: *dataset.grid(),
            values: outcome.values,
            coverage,
            member_count: dataset.len(),
            bin_count: outcome.bins,
        })
    }

    /// Aggregate every pollutant of `catalog` on a bounded worker pool.
    ///
    /// Only a failure to build the pool is returned as an error; a failing
    /// pollutant is recorded in the report and the others carry on.
    pub fn aggregate_all(
        &self,
        catalog: &Catalog,
        progress: &ProgressReporter,
    ) -> Result<AggregationReport> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.settings.max_workers)
            .build()
            .map_err(|e| ProcessingError::Config(e.to_string()))?;

        let outcomes: Vec<(Pollutant, PassOutcome)> = pool.install(|| {
            Pollutant::ALL
                .par_iter()
                .map(|&pollutant| {
                    let outcome = self.run_pass(pollutant, catalog.files(pollutant));
                    progress.advance(pollutant.tag());
                    (pollutant, outcome)
                })
                .collect()
        });

        let mut report = AggregationReport::default();
        for (pollutant, outcome) in outcomes {
            match outcome {
                PassOutcome::Composite(composite) => report.composites.push(*composite),
                PassOutcome::Skipped => report.skipped.push(pollutant),
                PassOutcome::Failed(error) => {
                    report.failures.push(PollutantFailure { pollutant, error })
                }
            }
        }

        progress.finish_with_message(&format!(
            "{} composites, {} failed, {} skipped",
            report.composites.len(),
            report.failures.len(),
            report.skipped.len()
        ));
        Ok(report)
    }

    fn run_pass(&self, pollutant: Pollutant, files: &[PathBuf]) -> PassOutcome {
        if files.is_empty() {
            warn!(pollutant = %pollutant, "no derived files, skipping");
            return PassOutcome::Skipped;
        }

        match self.aggregate(pollutant, files) {
            Ok(composite) => {
                info!(
                    pollutant = %pollutant,
                    members = composite.member_count,
                    bins = composite.bin_count,
                    defined = composite.defined_cells(),
                    "composite ready"
                );
                PassOutcome::Composite(Box::new(composite))
            }
            Err(e) => {
                error!(pollutant = %pollutant, error = %e, "aggregation failed");
                PassOutcome::Failed(e)
            }
        }
    }
}
