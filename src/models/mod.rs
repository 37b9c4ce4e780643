pub mod composite;
pub mod granule;
pub mod grid;
pub mod pollutant;

pub use composite::{CompositeGrid, CompositeSummary, TimeCoverage};
pub use granule::{parse_instant, GranuleReference};
pub use grid::{
    Attributes, GeoExtent, GridDefinition, ProductHeader, SOURCE_PRODUCT_ATTR,
    TIME_COVERAGE_END_ATTR, TIME_COVERAGE_START_ATTR,
};
pub use pollutant::{AvailabilityClass, Pollutant, ProcessingLevel};
