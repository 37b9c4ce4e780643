use chrono::{NaiveDateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use crate::cli::args::{Cli, Commands};
use crate::error::Result;
use crate::models::Pollutant;
use crate::processors::{
    AggregationRun, BatchOptions, ConversionReport, HarpCommandConverter, ProductConverter,
    RetentionRun, RunProcessor,
};
use crate::readers::JsonProductStore;
use crate::retention::SweepReport;
use crate::settings::Settings;
use crate::utils::logging::init_logging;
use crate::utils::progress::ProgressReporter;
use crate::writers::{PngRenderer, SequenceOutcome};

pub async fn run(cli: Cli) -> Result<()> {
    init_logging(cli.verbose, cli.log_file.as_deref())?;

    let settings = Settings::load(cli.config.as_deref())?;
    info!(area = %settings.area.name, output = %settings.paths.output_dir.display(), "settings loaded");

    if converts_products(settings.conversion.enabled, &cli.command) {
        warn!(
            program = %settings.conversion.program,
            "converter output is not JSON; derived products it writes cannot be read by the JSON product store"
        );
    }

    let renderer = PngRenderer::new(settings.render.pixels_per_cell);
    let converter = HarpCommandConverter::new(settings.conversion.program.clone());
    let processor = RunProcessor::new(
        settings,
        Arc::new(JsonProductStore::new()),
        Arc::new(renderer),
    );
    let now = run_instant();
    let progress = || {
        ProgressReporter::new(
            Pollutant::ALL.len() as u64,
            "Aggregating pollutants...",
            cli.quiet,
        )
    };

    match cli.command {
        Commands::Run {
            skip_retention,
            max_frames,
        } => {
            println!("Running batch for {}", now.format("%Y-%m-%d %H:%M UTC"));
            let options = BatchOptions {
                skip_retention,
                max_frames,
            };
            let batch = processor
                .run(now, Some(&converter as &dyn ProductConverter), &options, progress())
                .await?;

            if let Some(conversion) = &batch.conversion {
                print_conversion(conversion);
            }
            if let Some(retention) = &batch.retention {
                print_retention(retention);
            }
            print_aggregation(&batch.aggregation);
            print_animations(&batch.animations);
            println!("Batch complete!");
        }

        Commands::Convert => {
            let report = processor.convert(&converter)?;
            print_conversion(&report);
        }

        Commands::Aggregate => {
            let run = processor.aggregate(now, progress()).await?;
            print_aggregation(&run);
        }

        Commands::Animate { max_frames } => {
            let animations = processor.animate(max_frames);
            print_animations(&animations);
        }

        Commands::Prune { dry_run } => {
            if dry_run {
                println!("Dry run: nothing will be deleted");
            }
            let retention = processor.prune(now, dry_run);
            print_retention(&retention);
        }

        Commands::Inspect { granules } => {
            inspect(&processor, granules)?;
        }
    }

    Ok(())
}

/// Whether this invocation runs the L2 to L3 conversion stage.
fn converts_products(enabled: bool, command: &Commands) -> bool {
    match command {
        Commands::Convert => true,
        Commands::Run { .. } => enabled,
        _ => false,
    }
}

fn inspect(processor: &RunProcessor, list_granules: bool) -> Result<()> {
    let inventory = processor.inspect()?;

    println!("{:<6} {:>8} {:>8}", "Tag", "Raw", "Derived");
    for pollutant in Pollutant::ALL {
        println!(
            "{:<6} {:>8} {:>8}",
            pollutant.tag(),
            inventory.raw.files(pollutant).len(),
            inventory.derived.files(pollutant).len()
        );
    }

    println!(
        "\nGranule index: {} indexed, {} excluded",
        inventory.index.len(),
        inventory.extraction_failures.len()
    );
    if list_granules {
        for granule in inventory.index.chronological() {
            println!(
                "  {}  {} -> {}",
                granule.filename,
                granule.start.format("%Y-%m-%dT%H:%M:%SZ"),
                granule.end.format("%Y-%m-%dT%H:%M:%SZ")
            );
        }
    }
    for failure in &inventory.extraction_failures {
        println!("  excluded {}: {}", failure.path.display(), failure.error);
    }
    Ok(())
}

fn print_conversion(report: &ConversionReport) {
    println!(
        "Conversion: {} converted, {} already present, {} failed",
        report.converted.len(),
        report.existing.len(),
        report.failed.len()
    );
}

fn print_sweep(label: &str, report: &SweepReport) {
    let verb = if report.dry_run { "would delete" } else { "deleted" };
    println!(
        "{:<8} {} {}, retained {}, skipped {}, failed {}",
        label,
        verb,
        report.deleted.len(),
        report.retained.len(),
        report.skipped.len(),
        report.failed.len()
    );
    for path in &report.deleted {
        println!("  {}", path.display());
    }
}

fn print_retention(retention: &RetentionRun) {
    println!("Retention:");
    print_sweep("raw", &retention.raw);
    print_sweep("derived", &retention.derived);
    print_sweep("output", &retention.output);

    let totals = retention.totals();
    let verb = if totals.dry_run { "would delete" } else { "deleted" };
    println!(
        "{:<8} {} {} of {} entries",
        "total",
        verb,
        totals.deleted.len(),
        totals.total()
    );
}

fn print_aggregation(run: &AggregationRun) {
    println!("Run directory: {}", run.run_dir.display());
    for composite in &run.aggregation.composites {
        let summary = composite.summary();
        println!(
            "  {:<5} {} files, {} days, {}/{} cells defined, mean {}",
            summary.pollutant,
            summary.members,
            summary.daily_bins,
            summary.defined_cells,
            summary.total_cells,
            summary
                .mean
                .map(|m| format!("{:.4e} {}", m, summary.unit))
                .unwrap_or_else(|| "n/a".to_string())
        );
    }
    for failure in &run.aggregation.failures {
        println!("  {:<5} failed: {}", failure.pollutant.tag(), failure.error);
    }
    for pollutant in &run.aggregation.skipped {
        println!("  {:<5} skipped: no derived products", pollutant.tag());
    }
    if !run.extraction_failures.is_empty() {
        println!(
            "  {} raw granules excluded from the index",
            run.extraction_failures.len()
        );
    }
    println!(
        "Rendered {} images ({} failed), exported {} GeoTIFFs",
        run.rendered.len(),
        run.render_failures,
        run.exported.len()
    );
    if let Some(summary) = &run.summary {
        println!("Summary: {}", summary.display());
    }
}

fn print_animations(animations: &[SequenceOutcome]) {
    for outcome in animations {
        match outcome {
            SequenceOutcome::Written {
                pollutant,
                path,
                frames,
            } => println!("Animation {}: {} frames -> {}", pollutant, frames, path.display()),
            SequenceOutcome::Skipped { pollutant } => {
                println!("Animation {}: no images, skipped", pollutant)
            }
        }
    }
}

/// Wall-clock instant used for every age and window computation of a run.
pub fn run_instant() -> NaiveDateTime {
    Utc::now().naive_utc()
}
