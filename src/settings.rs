//! Layered configuration: built-in defaults, an optional file, then
//! `S5P__`-prefixed environment variables.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use validator::Validate;

use crate::error::{ProcessingError, Result};
use crate::models::{AvailabilityClass, Pollutant};
use crate::processors::ReductionStrategy;
use crate::utils::constants::*;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub paths: PathSettings,
    pub area: AreaOfInterest,
    pub windows: ObservationWindows,
    pub retention: RetentionSettings,
    pub aggregation: AggregationSettings,
    pub sequence: SequenceSettings,
    pub render: RenderSettings,
    pub conversion: ConversionSettings,
}

impl Settings {
    pub fn load(file: Option<&Path>) -> Result<Self> {
        // Defaults form the base layer so a partial section override keeps
        // the built-in values of its other fields.
        let mut builder = Config::builder().add_source(Config::try_from(&Settings::default())?);
        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(true));
        }
        let settings: Settings = builder
            .add_source(
                Environment::with_prefix("S5P")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        self.area.validate()?;
        self.area.check_bounds()?;
        self.windows.near_real_time.validate()?;
        self.windows.delayed.validate()?;
        self.retention.raw.validate()?;
        self.retention.derived.validate()?;
        self.retention.validate()?;
        self.aggregation.validate()?;
        self.sequence.validate()?;
        self.render.validate()?;
        self.conversion.validate()?;

        for (category, windows) in [("raw", &self.retention.raw), ("derived", &self.retention.derived)] {
            if windows.delayed_days <= windows.near_real_time_days {
                return Err(ProcessingError::Config(format!(
                    "retention.{}: delayed_days ({}) must exceed near_real_time_days ({})",
                    category, windows.delayed_days, windows.near_real_time_days
                )));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    pub raw_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from(RAW_DIR),
            processed_dir: PathBuf::from(PROCESSED_DIR),
            output_dir: PathBuf::from(OUTPUT_DIR),
        }
    }
}

impl PathSettings {
    /// Resolve all three roots under a common base directory.
    pub fn rooted_at(base: &Path) -> Self {
        let defaults = Self::default();
        Self {
            raw_dir: base.join(defaults.raw_dir),
            processed_dir: base.join(defaults.processed_dir),
            output_dir: base.join(defaults.output_dir),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AreaOfInterest {
    #[validate(length(min = 1))]
    pub name: String,

    #[validate(range(min = -90.0, max = 90.0))]
    pub lat_min: f64,

    #[validate(range(min = -90.0, max = 90.0))]
    pub lat_max: f64,

    #[validate(range(min = -180.0, max = 180.0))]
    pub lon_min: f64,

    #[validate(range(min = -180.0, max = 180.0))]
    pub lon_max: f64,

    #[validate(range(min = 0.0001, max = 5.0))]
    pub cell_size: f64,
}

impl Default for AreaOfInterest {
    fn default() -> Self {
        Self {
            name: AOI_NAME.to_string(),
            lat_min: AOI_MIN_LAT,
            lat_max: AOI_MAX_LAT,
            lon_min: AOI_MIN_LON,
            lon_max: AOI_MAX_LON,
            cell_size: AOI_CELL_SIZE,
        }
    }
}

impl AreaOfInterest {
    fn check_bounds(&self) -> Result<()> {
        if self.lat_min >= self.lat_max || self.lon_min >= self.lon_max {
            return Err(ProcessingError::Config(format!(
                "area '{}' has an empty extent",
                self.name
            )));
        }
        Ok(())
    }

    /// Number of bin edges along latitude and longitude.
    pub fn edge_counts(&self) -> (usize, usize) {
        let lat = ((self.lat_max - self.lat_min) / self.cell_size).round() as usize;
        let lon = ((self.lon_max - self.lon_min) / self.cell_size).round() as usize;
        (lat, lon)
    }
}

/// Sensing period a run's composite describes, relative to the run time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate)]
pub struct ObservationWindow {
    #[validate(range(max = 60))]
    pub lag_days: u32,

    #[validate(range(min = 1, max = 60))]
    pub span_days: u32,
}

impl ObservationWindow {
    pub fn bounds(&self, now: NaiveDateTime) -> (NaiveDate, NaiveDate) {
        let end = now - Duration::days(self.lag_days as i64);
        let start = end - Duration::days(self.span_days as i64);
        (start.date(), end.date())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservationWindows {
    pub near_real_time: ObservationWindow,
    pub delayed: ObservationWindow,
}

impl Default for ObservationWindows {
    fn default() -> Self {
        Self {
            near_real_time: ObservationWindow {
                lag_days: NRT_LAG_DAYS,
                span_days: WINDOW_SPAN_DAYS,
            },
            delayed: ObservationWindow {
                lag_days: DELAYED_LAG_DAYS,
                span_days: WINDOW_SPAN_DAYS,
            },
        }
    }
}

impl ObservationWindows {
    pub fn for_pollutant(&self, pollutant: Pollutant) -> ObservationWindow {
        match pollutant.availability() {
            AvailabilityClass::NearRealTime => self.near_real_time,
            AvailabilityClass::DelayedOnly => self.delayed,
        }
    }
}

/// Keep-if-newer-than windows for one file category.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ClassRetention {
    #[validate(range(min = 1, max = 3650))]
    pub near_real_time_days: u32,

    #[validate(range(min = 1, max = 3650))]
    pub delayed_days: u32,
}

impl Default for ClassRetention {
    fn default() -> Self {
        Self {
            near_real_time_days: NRT_RETENTION_DAYS,
            delayed_days: DELAYED_RETENTION_DAYS,
        }
    }
}

impl ClassRetention {
    pub fn window(&self, class: AvailabilityClass) -> Duration {
        let days = match class {
            AvailabilityClass::NearRealTime => self.near_real_time_days,
            AvailabilityClass::DelayedOnly => self.delayed_days,
        };
        Duration::days(days as i64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RetentionSettings {
    pub raw: ClassRetention,
    pub derived: ClassRetention,

    #[validate(range(min = 1, max = 3650))]
    pub output_days: u32,
}

impl Default for RetentionSettings {
    fn default() -> Self {
        Self {
            raw: ClassRetention::default(),
            derived: ClassRetention::default(),
            output_days: OUTPUT_RETENTION_DAYS,
        }
    }
}

impl RetentionSettings {
    pub fn output_window(&self) -> Duration {
        Duration::days(self.output_days as i64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AggregationSettings {
    /// Reduction applied to the samples inside one daily bin.
    pub bin_reduction: ReductionStrategy,
    /// Reduction applied across the daily bins.
    pub composite_reduction: ReductionStrategy,

    #[validate(range(min = 1, max = 256))]
    pub max_workers: usize,
}

impl Default for AggregationSettings {
    fn default() -> Self {
        Self {
            bin_reduction: ReductionStrategy::PropagateUndefined,
            composite_reduction: ReductionStrategy::PropagateUndefined,
            max_workers: num_cpus::get().clamp(1, MAX_WORKERS),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SequenceSettings {
    #[validate(range(min = 1))]
    pub max_frames: Option<usize>,

    #[validate(range(min = 10, max = 60000))]
    pub frame_duration_ms: u32,
}

impl Default for SequenceSettings {
    fn default() -> Self {
        Self {
            max_frames: None,
            frame_duration_ms: FRAME_DURATION_MS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RenderSettings {
    #[validate(range(min = 1, max = 16))]
    pub pixels_per_cell: u32,

    #[validate(range(min = -89.0, max = 89.0))]
    pub scale_bar_latitude: f64,

    pub scale_bar_lon_a: f64,
    pub scale_bar_lon_b: f64,

    pub export_geotiff: bool,
    pub epsg: u16,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            pixels_per_cell: 1,
            scale_bar_latitude: SCALE_BAR_LATITUDE,
            scale_bar_lon_a: SCALE_BAR_LON_A,
            scale_bar_lon_b: SCALE_BAR_LON_B,
            export_geotiff: false,
            epsg: DEFAULT_EPSG,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ConversionSettings {
    pub enabled: bool,

    #[validate(length(min = 1))]
    pub program: String,

    #[validate(range(max = 100))]
    pub min_validity: u32,
}

impl Default for ConversionSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            program: HARP_CONVERT_PROGRAM.to_string(),
            min_validity: MIN_VALIDITY,
        }
    }
}
