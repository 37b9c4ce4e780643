use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Global attributes of a product file.
pub type Attributes = BTreeMap<String, String>;

/// Attribute naming the raw granule an L3 product was derived from.
pub const SOURCE_PRODUCT_ATTR: &str = "source_product";
pub const TIME_COVERAGE_START_ATTR: &str = "time_coverage_start";
pub const TIME_COVERAGE_END_ATTR: &str = "time_coverage_end";

/// Regular latitude/longitude grid. Row 0 is the southernmost row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridDefinition {
    pub rows: usize,
    pub cols: usize,
    /// Latitude of the southern edge of row 0.
    pub lat_origin: f64,
    /// Longitude of the western edge of column 0.
    pub lon_origin: f64,
    pub lat_step: f64,
    pub lon_step: f64,
}

impl GridDefinition {
    pub fn new(
        rows: usize,
        cols: usize,
        lat_origin: f64,
        lon_origin: f64,
        lat_step: f64,
        lon_step: f64,
    ) -> Self {
        Self {
            rows,
            cols,
            lat_origin,
            lon_origin,
            lat_step,
            lon_step,
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn cell_count(&self) -> usize {
        self.rows * self.cols
    }

    pub fn extent(&self) -> GeoExtent {
        GeoExtent {
            lon_min: self.lon_origin,
            lon_max: self.lon_origin + self.cols as f64 * self.lon_step,
            lat_min: self.lat_origin,
            lat_max: self.lat_origin + self.rows as f64 * self.lat_step,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoExtent {
    pub lon_min: f64,
    pub lon_max: f64,
    pub lat_min: f64,
    pub lat_max: f64,
}

/// Everything about a product file except its variable payloads.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductHeader {
    pub attributes: Attributes,
    pub grid: Option<GridDefinition>,
    /// Native time coordinate, when the file carries one.
    pub time: Option<DateTime<Utc>>,
}

impl ProductHeader {
    pub fn source_product(&self) -> Option<&str> {
        self.attributes.get(SOURCE_PRODUCT_ATTR).map(String::as_str)
    }
}
