use chrono::{Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use ndarray::{array, Array2};
use pretty_assertions::assert_eq;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use s5p_composite::models::{
    GridDefinition, Pollutant, ProcessingLevel, SOURCE_PRODUCT_ATTR, TIME_COVERAGE_END_ATTR,
    TIME_COVERAGE_START_ATTR,
};
use s5p_composite::processors::{RunProcessor, TimeIndexedDataset};
use s5p_composite::readers::{Catalog, GranuleIndex, JsonProductStore, ProductDocument};
use s5p_composite::settings::{PathSettings, Settings};
use s5p_composite::utils::naming::{run_directory_name, RenderedName};
use s5p_composite::utils::progress::ProgressReporter;
use s5p_composite::writers::{PngRenderer, SequenceBuilder, SequenceOutcome};
use s5p_composite::ProcessingError;

const STREAM: &str = "NRTI";

fn raw_name(pollutant: Pollutant, day: u32) -> String {
    format!(
        "S5P_{}_{}_202305{:02}T050000_202305{:02}T064100_28833_03_020500_202305{:02}T081231.nc",
        STREAM,
        pollutant.product_type(ProcessingLevel::L2),
        day,
        day,
        day
    )
}

fn derived_name(pollutant: Pollutant, day: u32) -> String {
    raw_name(pollutant, day).replacen("L2__", "L3__", 1)
}

fn grid_for(values: &Array2<f32>) -> GridDefinition {
    let (rows, cols) = values.dim();
    GridDefinition::new(rows, cols, 5.0, 95.0, 0.01, 0.01)
}

struct Workspace {
    _dir: TempDir,
    paths: PathSettings,
    store: JsonProductStore,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let paths = PathSettings::rooted_at(dir.path());
        Self {
            _dir: dir,
            paths,
            store: JsonProductStore::new(),
        }
    }

    fn add_raw(&self, pollutant: Pollutant, day: u32) -> PathBuf {
        let path = self.paths.raw_dir.join(raw_name(pollutant, day));
        let document = ProductDocument::default()
            .with_attribute(TIME_COVERAGE_START_ATTR, format!("2023-05-{:02}T05:00:00Z", day))
            .with_attribute(TIME_COVERAGE_END_ATTR, format!("2023-05-{:02}T06:41:00Z", day));
        self.store.write_document(&path, &document).unwrap();
        path
    }

    fn add_derived(&self, pollutant: Pollutant, day: u32, source: &str, values: &Array2<f32>) -> PathBuf {
        let path = self.paths.processed_dir.join(derived_name(pollutant, day));
        let document = ProductDocument::new(grid_for(values))
            .with_attribute(SOURCE_PRODUCT_ATTR, source)
            .with_field(pollutant.field(), values);
        self.store.write_document(&path, &document).unwrap();
        path
    }

    fn processor(&self) -> RunProcessor {
        let mut settings = Settings::default();
        settings.paths = self.paths.clone();
        settings.aggregation.max_workers = 2;
        RunProcessor::new(
            settings,
            Arc::new(JsonProductStore::new()),
            Arc::new(PngRenderer::new(1)),
        )
    }
}

fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2023, 5, 4)
        .unwrap()
        .and_hms_opt(7, 0, 0)
        .unwrap()
}

#[tokio::test]
async fn test_three_days_without_native_time_give_elementwise_mean() {
    let workspace = Workspace::new();
    let grids = [
        array![[1.0e-4, 2.0e-4], [3.0e-4, 4.0e-4]],
        array![[2.0e-4, 3.0e-4], [4.0e-4, 5.0e-4]],
        array![[3.0e-4, 4.0e-4], [5.0e-4, 6.0e-4]],
    ];
    for (i, grid) in grids.iter().enumerate() {
        let day = i as u32 + 1;
        workspace.add_raw(Pollutant::No2, day);
        workspace.add_derived(Pollutant::No2, day, &raw_name(Pollutant::No2, day), grid);
    }

    let run = workspace
        .processor()
        .aggregate(now(), ProgressReporter::silent())
        .await
        .unwrap();

    assert_eq!(run.aggregation.composites.len(), 1);
    let composite = &run.aggregation.composites[0];
    assert_eq!(composite.pollutant, Pollutant::No2);
    assert_eq!(composite.bin_count, 3);
    for (value, expected) in composite
        .values
        .iter()
        .zip(array![[2.0e-4f32, 3.0e-4], [4.0e-4, 5.0e-4]].iter())
    {
        assert!((value - expected).abs() < 1e-9, "{} != {}", value, expected);
    }

    let image = run
        .run_dir
        .join(RenderedName::new(
            Pollutant::No2,
            NaiveDate::from_ymd_opt(2023, 4, 27).unwrap(),
            NaiveDate::from_ymd_opt(2023, 5, 4).unwrap(),
        )
        .file_name("png"));
    assert_eq!(run.rendered, vec![image.clone()]);
    assert!(image.exists());
    assert!(run.run_dir.join("summary.csv").exists());
}

#[tokio::test]
async fn test_unknown_provenance_fails_only_that_pollutant() {
    let workspace = Workspace::new();
    for day in 1..=3 {
        workspace.add_raw(Pollutant::Hcho, day);
        workspace.add_derived(Pollutant::Hcho, day, &raw_name(Pollutant::Hcho, day), &array![[1.0e-4]]);
        workspace.add_raw(Pollutant::So2, day);
    }
    workspace.add_derived(Pollutant::So2, 1, &raw_name(Pollutant::So2, 1), &array![[1.0e-3]]);
    workspace.add_derived(Pollutant::So2, 2, "S5P_NRTI_L2__SO2____20230502T999999.nc", &array![[1.0e-3]]);

    let run = workspace
        .processor()
        .aggregate(now(), ProgressReporter::silent())
        .await
        .unwrap();

    let produced: Vec<Pollutant> = run.aggregation.composites.iter().map(|c| c.pollutant).collect();
    assert_eq!(produced, vec![Pollutant::Hcho]);
    assert_eq!(run.aggregation.failures.len(), 1);
    assert_eq!(run.aggregation.failures[0].pollutant, Pollutant::So2);
    assert!(matches!(
        run.aggregation.failures[0].error,
        ProcessingError::UnresolvedTime { .. }
    ));
    assert_eq!(run.rendered.len(), 1);
}

#[test]
fn test_combination_preserves_input_values() {
    let workspace = Workspace::new();
    let first = array![[1.25e-4, f32::NAN], [0.0, 7.5e-5]];
    let second = array![[3.0e-4, 2.0e-4], [f32::NAN, 1.0e-6]];
    workspace.add_raw(Pollutant::Co, 1);
    workspace.add_raw(Pollutant::Co, 2);
    let paths = vec![
        workspace.add_derived(Pollutant::Co, 2, &raw_name(Pollutant::Co, 2), &second),
        workspace.add_derived(Pollutant::Co, 1, &raw_name(Pollutant::Co, 1), &first),
    ];

    let raw = Catalog::scan(&workspace.paths.raw_dir, ProcessingLevel::L2).unwrap();
    let (index, failures) = GranuleIndex::build(&workspace.store, &raw.all_files());
    assert!(failures.is_empty());

    let dataset = TimeIndexedDataset::open(&workspace.store, &paths, Pollutant::Co.field(), |p, h| {
        index.resolve_time_label(p, h)
    })
    .unwrap();

    let frames: Vec<_> = dataset.frames().collect::<Result<_, _>>().unwrap();
    assert_eq!(frames[0].0, Utc.with_ymd_and_hms(2023, 5, 1, 5, 0, 0).unwrap());
    for ((_, loaded), original) in frames.iter().zip([&first, &second]) {
        for (a, b) in loaded.iter().zip(original.iter()) {
            assert!(a.to_bits() == b.to_bits() || (a.is_nan() && b.is_nan()));
        }
    }
}

fn render_run_dirs(output: &Path, pollutant: Pollutant, count: i64) {
    let first = NaiveDate::from_ymd_opt(2023, 4, 1).unwrap();
    for offset in 0..count {
        let day = first + Duration::days(offset);
        let dir = output.join(run_directory_name(day));
        std::fs::create_dir_all(&dir).unwrap();
        let name = RenderedName::new(pollutant, day - Duration::days(7), day).file_name("png");
        image::RgbImage::from_pixel(3, 3, image::Rgb([offset as u8 * 10, 0, 0]))
            .save(dir.join(name))
            .unwrap();
    }
}

#[test]
fn test_animation_keeps_eight_most_recent_of_ten() {
    let workspace = Workspace::new();
    let output = &workspace.paths.output_dir;
    render_run_dirs(output, Pollutant::Ch4, 10);

    let builder = SequenceBuilder::new(output, Some(8), 1000);
    let frames = builder.discover(Pollutant::Ch4);
    let dirs: Vec<String> = frames
        .iter()
        .map(|p| p.parent().unwrap().file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        dirs,
        (2..10)
            .map(|d| run_directory_name(NaiveDate::from_ymd_opt(2023, 4, 1).unwrap() + Duration::days(d)))
            .collect::<Vec<_>>()
    );

    let outcomes = builder.build_all();
    assert!(outcomes.contains(&SequenceOutcome::Written {
        pollutant: Pollutant::Ch4,
        path: output.join("CH4.gif"),
        frames: 8,
    }));
    assert!(outcomes.contains(&SequenceOutcome::Skipped {
        pollutant: Pollutant::No2
    }));
}

#[test]
fn test_prune_is_idempotent() {
    let workspace = Workspace::new();
    // now() is 2023-05-04: NRT threshold 04-27, delayed 04-20, output 04-06.
    let old_raw = workspace.paths.raw_dir.join(raw_name(Pollutant::No2, 1).replace("20230501", "20230426"));
    std::fs::create_dir_all(&workspace.paths.raw_dir).unwrap();
    std::fs::write(&old_raw, b"{}").unwrap();
    workspace.add_raw(Pollutant::No2, 1);
    let old_ch4 = workspace
        .paths
        .processed_dir
        .join(derived_name(Pollutant::Ch4, 1).replace("20230501", "20230420"));
    std::fs::create_dir_all(&workspace.paths.processed_dir).unwrap();
    std::fs::write(&old_ch4, b"{}").unwrap();
    render_run_dirs(&workspace.paths.output_dir, Pollutant::Co, 10);

    let processor = workspace.processor();
    let first = processor.prune(now(), false);
    assert_eq!(first.raw.deleted, vec![old_raw.clone()]);
    assert_eq!(first.raw.retained.len(), 1);
    assert!(first.derived.deleted.is_empty());
    assert_eq!(first.derived.retained, vec![old_ch4.clone()]);
    // Run directories 2023_04_01 .. 2023_04_05 are older than 28 days.
    assert_eq!(first.output.deleted.len(), 5);
    assert!(!old_raw.exists());

    let second = processor.prune(now(), false);
    assert!(second.raw.deleted.is_empty());
    assert!(second.derived.deleted.is_empty());
    assert!(second.output.deleted.is_empty());
    assert_eq!(second.output.retained.len(), 5);
}
