use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::Result;
use crate::models::{CompositeGrid, ProcessingLevel};
use crate::processors::aggregator::{AggregationReport, PollutantAggregator};
use crate::processors::converter::{ConversionReport, ConversionStage, ProductConverter};
use crate::readers::{Catalog, ExtractionFailure, GranuleIndex, ProductReader};
use crate::retention::{DirectorySweep, FileSweep, SweepReport};
use crate::settings::Settings;
use crate::utils::constants::SUMMARY_FILE;
use crate::utils::geodesy::scale_bar_distance;
use crate::utils::naming::{run_directory_name, RenderedName};
use crate::utils::progress::ProgressReporter;
use crate::writers::{write_summary, GeoTiffWriter, RenderRequest, Renderer, SequenceBuilder, SequenceOutcome};

/// What one aggregation pass produced.
#[derive(Debug)]
pub struct AggregationRun {
    pub run_dir: PathBuf,
    pub aggregation: AggregationReport,
    pub extraction_failures: Vec<ExtractionFailure>,
    pub rendered: Vec<PathBuf>,
    pub exported: Vec<PathBuf>,
    pub render_failures: usize,
    pub summary: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct RetentionRun {
    pub raw: SweepReport,
    pub derived: SweepReport,
    pub output: SweepReport,
}

impl RetentionRun {
    /// All three sweeps folded into one report.
    pub fn totals(&self) -> SweepReport {
        let mut totals = SweepReport::new(self.raw.dry_run);
        for report in [&self.raw, &self.derived, &self.output] {
            totals.merge(report.clone());
        }
        totals
    }
}

#[derive(Debug)]
pub struct BatchRun {
    pub conversion: Option<ConversionReport>,
    pub retention: Option<RetentionRun>,
    pub aggregation: AggregationRun,
    pub animations: Vec<SequenceOutcome>,
}

#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    pub skip_retention: bool,
    pub max_frames: Option<usize>,
}

/// Catalog counts and the granule index, for inspection.
#[derive(Debug)]
pub struct Inventory {
    pub raw: Catalog,
    pub derived: Catalog,
    pub index: GranuleIndex,
    pub extraction_failures: Vec<ExtractionFailure>,
}

/// Drives the stages of a batch run over the configured directories.
pub struct RunProcessor {
    settings: Settings,
    reader: Arc<dyn ProductReader>,
    renderer: Arc<dyn Renderer>,
}

impl RunProcessor {
    pub fn new(settings: Settings, reader: Arc<dyn ProductReader>, renderer: Arc<dyn Renderer>) -> Self {
        Self {
            settings,
            reader,
            renderer,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn raw_catalog(&self) -> Result<Catalog> {
        Catalog::scan(&self.settings.paths.raw_dir, ProcessingLevel::L2)
    }

    fn derived_catalog(&self) -> Result<Catalog> {
        Catalog::scan(&self.settings.paths.processed_dir, ProcessingLevel::L3)
    }

    pub fn convert(&self, converter: &dyn ProductConverter) -> Result<ConversionReport> {
        let raw = self.raw_catalog()?;
        let stage = ConversionStage::new(
            converter,
            &self.settings.area,
            &self.settings.conversion,
            &self.settings.paths.processed_dir,
        );
        let report = stage.run(&raw)?;
        info!(
            converted = report.converted.len(),
            existing = report.existing.len(),
            failed = report.failed.len(),
            "conversion finished"
        );
        Ok(report)
    }

    pub fn inspect(&self) -> Result<Inventory> {
        let raw = self.raw_catalog()?;
        let derived = self.derived_catalog()?;
        let (index, extraction_failures) = GranuleIndex::build(self.reader.as_ref(), &raw.all_files());
        Ok(Inventory {
            raw,
            derived,
            index,
            extraction_failures,
        })
    }

    pub fn sweep_products(&self, now: NaiveDateTime, dry_run: bool) -> (SweepReport, SweepReport) {
        let retention = &self.settings.retention;
        let raw = FileSweep::new("raw", retention.raw)
            .with_dry_run(dry_run)
            .sweep(&self.settings.paths.raw_dir, now);
        let derived = FileSweep::new("derived", retention.derived)
            .with_dry_run(dry_run)
            .sweep(&self.settings.paths.processed_dir, now);
        (raw, derived)
    }

    pub fn sweep_outputs(&self, now: NaiveDateTime, dry_run: bool) -> SweepReport {
        DirectorySweep::new(self.settings.retention.output_window())
            .with_dry_run(dry_run)
            .sweep(&self.settings.paths.output_dir, now)
    }

    pub fn prune(&self, now: NaiveDateTime, dry_run: bool) -> RetentionRun {
        let (raw, derived) = self.sweep_products(now, dry_run);
        let output = self.sweep_outputs(now, dry_run);
        RetentionRun {
            raw,
            derived,
            output,
        }
    }

    pub fn animate(&self, max_frames: Option<usize>) -> Vec<SequenceOutcome> {
        let sequence = &self.settings.sequence;
        SequenceBuilder::new(
            &self.settings.paths.output_dir,
            max_frames.or(sequence.max_frames),
            sequence.frame_duration_ms,
        )
        .build_all()
    }

    /// Index raw granules, aggregate derived products and render the
    /// composites into today's run directory.
    pub async fn aggregate(&self, now: NaiveDateTime, progress: ProgressReporter) -> Result<AggregationRun> {
        let run_dir = self
            .settings
            .paths
            .output_dir
            .join(run_directory_name(now.date()));
        if let Err(e) = std::fs::create_dir_all(&run_dir) {
            error!(path = %run_dir.display(), error = %e, "cannot create run directory");
            return Err(e.into());
        }

        let raw = self.raw_catalog()?;
        let derived = self.derived_catalog()?;
        info!(
            raw = raw.total_files(),
            derived = derived.total_files(),
            "catalogs scanned"
        );

        let reader = Arc::clone(&self.reader);
        let aggregation_settings = self.settings.aggregation.clone();
        let (aggregation, extraction_failures) = tokio::task::spawn_blocking(move || {
            let (index, failures) = GranuleIndex::build(reader.as_ref(), &raw.all_files());
            info!(granules = index.len(), excluded = failures.len(), "granule index ready");
            let aggregator = PollutantAggregator::new(reader.as_ref(), &index, aggregation_settings);
            aggregator
                .aggregate_all(&derived, &progress)
                .map(|report| (report, failures))
        })
        .await??;

        let mut run = AggregationRun {
            run_dir,
            aggregation,
            extraction_failures,
            rendered: Vec::new(),
            exported: Vec::new(),
            render_failures: 0,
            summary: None,
        };
        self.render_all(now, &mut run);

        if !run.aggregation.composites.is_empty() {
            let path = run.run_dir.join(SUMMARY_FILE);
            match write_summary(&run.aggregation.composites, &path) {
                Ok(_) => run.summary = Some(path),
                Err(e) => warn!(path = %path.display(), error = %e, "summary not written"),
            }
        }

        Ok(run)
    }

    fn render_all(&self, now: NaiveDateTime, run: &mut AggregationRun) {
        let render = &self.settings.render;
        let scale_bar_m = scale_bar_distance(
            render.scale_bar_latitude,
            render.scale_bar_lon_a,
            render.scale_bar_lon_b,
        );

        for composite in &run.aggregation.composites {
            let name = self.rendered_name(composite, now);
            let image_path = run.run_dir.join(name.file_name("png"));
            let request = RenderRequest::for_composite(composite, scale_bar_m);

            match self.renderer.render(&request, &image_path) {
                Ok(()) => {
                    info!(pollutant = %composite.pollutant, path = %image_path.display(), "rendered");
                    run.rendered.push(image_path);
                }
                Err(e) => {
                    error!(pollutant = %composite.pollutant, error = %e, "render failed");
                    run.render_failures += 1;
                    continue;
                }
            }

            if render.export_geotiff {
                let tiff_path = run.run_dir.join(name.file_name("tif"));
                match export_geotiff(composite, render.epsg, &tiff_path) {
                    Ok(()) => run.exported.push(tiff_path),
                    Err(e) => {
                        warn!(pollutant = %composite.pollutant, error = %e, "GeoTIFF export failed")
                    }
                }
            }
        }
    }

    fn rendered_name(&self, composite: &CompositeGrid, now: NaiveDateTime) -> RenderedName {
        let (start, end) = self
            .settings
            .windows
            .for_pollutant(composite.pollutant)
            .bounds(now);
        RenderedName::new(composite.pollutant, start, end)
    }

    /// Full batch: conversion, product sweeps, aggregation, output sweep and
    /// animations.
    pub async fn run(
        &self,
        now: NaiveDateTime,
        converter: Option<&dyn ProductConverter>,
        options: &BatchOptions,
        progress: ProgressReporter,
    ) -> Result<BatchRun> {
        let conversion = match converter {
            Some(converter) if self.settings.conversion.enabled => Some(self.convert(converter)?),
            _ => None,
        };

        let product_sweeps = if options.skip_retention {
            None
        } else {
            Some(self.sweep_products(now, false))
        };

        // Output retention and animations depend only on what is already on
        // disk, so they run even when aggregation fails.
        let aggregation = self.aggregate(now, progress).await;

        let retention = product_sweeps.map(|(raw, derived)| RetentionRun {
            raw,
            derived,
            output: self.sweep_outputs(now, false),
        });

        let animations = self.animate(options.max_frames);

        let aggregation = match aggregation {
            Ok(aggregation) => aggregation,
            Err(e) => {
                error!(error = %e, "aggregation failed; output retention and animations completed");
                return Err(e);
            }
        };

        Ok(BatchRun {
            conversion,
            retention,
            aggregation,
            animations,
        })
    }
}

fn export_geotiff(composite: &CompositeGrid, epsg: u16, path: &Path) -> Result<()> {
    GeoTiffWriter::new(epsg).write(&composite.values, &composite.definition, path)
}
