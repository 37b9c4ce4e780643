use chrono::{DateTime, NaiveDate, Utc};
use ndarray::Array2;
use serde::Serialize;

use crate::models::{GridDefinition, Pollutant};

/// First and last time labels that contributed to a composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeCoverage {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeCoverage {
    pub fn first_day(&self) -> NaiveDate {
        self.start.date_naive()
    }

    pub fn last_day(&self) -> NaiveDate {
        self.end.date_naive()
    }

    /// Number of calendar days spanned, inclusive.
    pub fn day_count(&self) -> usize {
        (self.last_day() - self.first_day()).num_days() as usize + 1
    }
}

/// Time-averaged field for one pollutant over one run. NaN marks undefined cells.
#[derive(Debug, Clone)]
pub struct CompositeGrid {
    pub pollutant: Pollutant,
    pub definition: GridDefinition,
    pub values: Array2<f32>,
    pub coverage: TimeCoverage,
    pub member_count: usize,
    pub bin_count: usize,
}

impl CompositeGrid {
    pub fn defined_cells(&self) -> usize {
        self.values.iter().filter(|v| !v.is_nan()).count()
    }

    pub fn summary(&self) -> CompositeSummary {
        let mut count = 0usize;
        let mut sum = 0.0f64;
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;

        for &value in self.values.iter().filter(|v| !v.is_nan()) {
            count += 1;
            sum += value as f64;
            min = min.min(value);
            max = max.max(value);
        }

        let (mean, min, max) = if count > 0 {
            (Some(sum / count as f64), Some(min), Some(max))
        } else {
            (None, None, None)
        };

        CompositeSummary {
            pollutant: self.pollutant.tag().to_string(),
            coverage_start: self.coverage.start.to_rfc3339(),
            coverage_end: self.coverage.end.to_rfc3339(),
            members: self.member_count,
            daily_bins: self.bin_count,
            defined_cells: count,
            total_cells: self.values.len(),
            mean,
            min,
            max,
            unit: self.pollutant.units().to_string(),
        }
    }
}

/// One row of the per-run summary table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositeSummary {
    pub pollutant: String,
    pub coverage_start: String,
    pub coverage_end: String,
    pub members: usize,
    pub daily_bins: usize,
    pub defined_cells: usize,
    pub total_cells: usize,
    pub mean: Option<f64>,
    pub min: Option<f32>,
    pub max: Option<f32>,
    pub unit: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ndarray::array;

    fn composite(values: Array2<f32>) -> CompositeGrid {
        let (rows, cols) = values.dim();
        CompositeGrid {
            pollutant: Pollutant::No2,
            definition: GridDefinition::new(rows, cols, 5.0, 95.0, 0.01, 0.01),
            values,
            coverage: TimeCoverage {
                start: Utc.with_ymd_and_hms(2023, 5, 1, 5, 0, 0).unwrap(),
                end: Utc.with_ymd_and_hms(2023, 5, 3, 6, 0, 0).unwrap(),
            },
            member_count: 3,
            bin_count: 3,
        }
    }

    #[test]
    fn test_summary_ignores_undefined_cells() {
        let grid = composite(array![[1.0, f32::NAN], [3.0, 5.0]]);
        let summary = grid.summary();

        assert_eq!(summary.defined_cells, 3);
        assert_eq!(summary.total_cells, 4);
        assert_eq!(summary.mean, Some(3.0));
        assert_eq!(summary.min, Some(1.0));
        assert_eq!(summary.max, Some(5.0));
        assert_eq!(summary.pollutant, "NO2");
    }

    #[test]
    fn test_summary_of_empty_composite() {
        let grid = composite(Array2::from_elem((2, 2), f32::NAN));
        let summary = grid.summary();

        assert_eq!(summary.defined_cells, 0);
        assert!(summary.mean.is_none());
        assert!(summary.min.is_none());
    }

    #[test]
    fn test_coverage_day_count() {
        let grid = composite(array![[1.0]]);
        assert_eq!(grid.coverage.day_count(), 3);
    }
}
