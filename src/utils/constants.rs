/// Directory names
pub const RAW_DIR: &str = "Products_Raw";
pub const PROCESSED_DIR: &str = "Products_Processed";
pub const OUTPUT_DIR: &str = "Output";

/// Run summary written into every run directory
pub const SUMMARY_FILE: &str = "summary.csv";

/// Area of interest (Thailand and surroundings)
pub const AOI_NAME: &str = "Thailand";
pub const AOI_MIN_LAT: f64 = 5.0;
pub const AOI_MAX_LAT: f64 = 21.0;
pub const AOI_MIN_LON: f64 = 95.0;
pub const AOI_MAX_LON: f64 = 110.0;
pub const AOI_CELL_SIZE: f64 = 0.01;

/// Observation windows in days
pub const NRT_LAG_DAYS: u32 = 0;
pub const DELAYED_LAG_DAYS: u32 = 7;
pub const WINDOW_SPAN_DAYS: u32 = 7;

/// Retention windows in days
pub const NRT_RETENTION_DAYS: u32 = 7;
pub const DELAYED_RETENTION_DAYS: u32 = 14;
pub const OUTPUT_RETENTION_DAYS: u32 = 28;

/// Animation defaults
pub const FRAME_DURATION_MS: u32 = 1000;

/// Scale bar calibration: one degree of longitude at the latitude of interest
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;
pub const SCALE_BAR_LATITUDE: f64 = 14.0;
pub const SCALE_BAR_LON_A: f64 = 100.0;
pub const SCALE_BAR_LON_B: f64 = 101.0;

/// Conversion defaults
pub const HARP_CONVERT_PROGRAM: &str = "harpconvert";
pub const MIN_VALIDITY: u32 = 75;

/// Coordinate reference system of exported rasters
pub const DEFAULT_EPSG: u16 = 4326;

/// Upper bound of the aggregation worker pool, matching the settings validation
pub const MAX_WORKERS: usize = 256;
