use chrono::{DateTime, Utc};
use ndarray::Array2;
use std::path::{Path, PathBuf};

use crate::error::{ProcessingError, Result};
use crate::models::{GridDefinition, ProductHeader, TimeCoverage};
use crate::processors::resampler::{DailyResampler, ReductionStrategy, ResampleOutcome};
use crate::readers::ProductReader;

/// One derived file and the time label it was assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetMember {
    pub path: PathBuf,
    pub time: DateTime<Utc>,
}

/// Many derived files viewed as one time series of a single field.
///
/// Opening reads headers only; grids are loaded one member at a time when
/// iterated.
pub struct TimeIndexedDataset<'r> {
    reader: &'r dyn ProductReader,
    field: String,
    grid: GridDefinition,
    members: Vec<DatasetMember>,
}

impl<'r> TimeIndexedDataset<'r> {
    /// Label every file with `resolve_time` and order the members by time.
    ///
    /// Fails on the first file that cannot be labelled or whose grid
    /// definition differs from the others.
    pub fn open<F>(
        reader: &'r dyn ProductReader,
        paths: &[PathBuf],
        field: &str,
        resolve_time: F,
    ) -> Result<Self>
    where
        F: Fn(&Path, &ProductHeader) -> Result<DateTime<Utc>>,
    {
        if paths.is_empty() {
            return Err(ProcessingError::MissingData(format!(
                "no files to combine for field '{}'",
                field
            )));
        }

        let mut grid: Option<GridDefinition> = None;
        let mut members = Vec::with_capacity(paths.len());

        for path in paths {
            let header = reader.read_header(path)?;
            let definition = header.grid.ok_or_else(|| {
                ProcessingError::combination(path, "product carries no grid definition")
            })?;

            match grid {
                None => grid = Some(definition),
                Some(expected) if expected != definition => {
                    return Err(ProcessingError::combination(
                        path,
                        format!(
                            "grid definition {:?} differs from {:?}",
                            definition, expected
                        ),
                    ));
                }
                Some(_) => {}
            }

            let time = resolve_time(path, &header)?;
            members.push(DatasetMember {
                path: path.clone(),
                time,
            });
        }

        members.sort_by(|a, b| a.time.cmp(&b.time).then_with(|| a.path.cmp(&b.path)));

        let grid = grid.ok_or_else(|| ProcessingError::MissingData(field.to_string()))?;
        Ok(Self {
            reader,
            field: field.to_string(),
            grid,
            members,
        })
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn grid(&self) -> &GridDefinition {
        &self.grid
    }

    pub fn members(&self) -> &[DatasetMember] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn coverage(&self) -> Option<TimeCoverage> {
        let first = self.members.first()?;
        let last = self.members.last()?;
        Some(TimeCoverage {
            start: first.time,
            end: last.time,
        })
    }

    /// Load the grid of one member.
    pub fn load(&self, index: usize) -> Result<Array2<f32>> {
        let member = self.members.get(index).ok_or_else(|| {
            ProcessingError::MissingData(format!("dataset has no member {}", index))
        })?;
        let values = self.reader.read_field(&member.path, &self.field)?;
        if values.dim() != self.grid.shape() {
            return Err(ProcessingError::combination(
                &member.path,
                format!(
                    "field shape {:?} does not match grid {:?}",
                    values.dim(),
                    self.grid.shape()
                ),
            ));
        }
        Ok(values)
    }

    /// Members in time order with their grids, loaded lazily.
    pub fn frames(&self) -> impl Iterator<Item = Result<(DateTime<Utc>, Array2<f32>)>> + '_ {
        (0..self.members.len()).map(move |i| self.load(i).map(|v| (self.members[i].time, v)))
    }

    /// Resample to daily bins and reduce them to one grid.
    pub fn resample_daily(
        &self,
        bin_strategy: ReductionStrategy,
        composite_strategy: ReductionStrategy,
    ) -> Result<ResampleOutcome> {
        let mut resampler = DailyResampler::new(self.grid.shape(), bin_strategy, composite_strategy);
        for frame in self.frames() {
            let (time, values) = frame?;
            resampler.push(time, &values)?;
        }
        resampler.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SOURCE_PRODUCT_ATTR;
    use crate::readers::{JsonProductStore, ProductDocument};
    use chrono::TimeZone;
    use ndarray::array;
    use tempfile::TempDir;

    const FIELD: &str = "tropospheric_NO2_column_number_density";

    fn grid() -> GridDefinition {
        GridDefinition::new(2, 2, 5.0, 95.0, 0.01, 0.01)
    }

    fn write(dir: &Path, name: &str, time: DateTime<Utc>, values: &Array2<f32>) -> PathBuf {
        let path = dir.join(name);
        let document = ProductDocument::new(grid())
            .with_time(time)
            .with_field(FIELD, values);
        JsonProductStore::new().write_document(&path, &document).unwrap();
        path
    }

    fn native_time(_: &Path, header: &ProductHeader) -> Result<DateTime<Utc>> {
        header
            .time
            .ok_or_else(|| ProcessingError::MissingData("time".to_string()))
    }

    #[test]
    fn test_members_are_sorted_and_values_preserved() {
        let dir = TempDir::new().unwrap();
        let late = array![[5.0, 6.0], [7.0, f32::NAN]];
        let early = array![[1.0, 2.0], [3.0, 4.0]];
        let paths = vec![
            write(dir.path(), "b.nc", Utc.with_ymd_and_hms(2023, 5, 2, 6, 0, 0).unwrap(), &late),
            write(dir.path(), "a.nc", Utc.with_ymd_and_hms(2023, 5, 1, 6, 0, 0).unwrap(), &early),
        ];

        let store = JsonProductStore::new();
        let dataset = TimeIndexedDataset::open(&store, &paths, FIELD, native_time).unwrap();
        assert_eq!(dataset.len(), 2);
        let names: Vec<_> = dataset
            .members()
            .iter()
            .map(|m| m.path.file_name().unwrap().to_owned())
            .collect();
        assert_eq!(names, vec!["a.nc", "b.nc"]);

        let frames: Vec<_> = dataset.frames().collect::<Result<_>>().unwrap();
        assert_eq!(frames[0].1, early);
        assert_eq!(frames[1].1[[0, 1]], 6.0);
        assert!(frames[1].1[[1, 1]].is_nan());
        assert!(frames[0].0 < frames[1].0);
    }

    #[test]
    fn test_mismatched_grid_fails_combination() {
        let dir = TempDir::new().unwrap();
        let store = JsonProductStore::new();
        let first = write(
            dir.path(),
            "a.nc",
            Utc.with_ymd_and_hms(2023, 5, 1, 6, 0, 0).unwrap(),
            &Array2::zeros((2, 2)),
        );
        let other = dir.path().join("b.nc");
        let shifted = GridDefinition::new(2, 2, 6.0, 95.0, 0.01, 0.01);
        store
            .write_document(
                &other,
                &ProductDocument::new(shifted)
                    .with_time(Utc.with_ymd_and_hms(2023, 5, 2, 6, 0, 0).unwrap())
                    .with_field(FIELD, &Array2::zeros((2, 2))),
            )
            .unwrap();

        let result = TimeIndexedDataset::open(&store, &[first, other], FIELD, native_time);
        assert!(matches!(result, Err(ProcessingError::Combination { .. })));
    }

    #[test]
    fn test_unresolvable_member_fails_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("orphan.nc");
        let store = JsonProductStore::new();
        store
            .write_document(
                &path,
                &ProductDocument::new(grid())
                    .with_attribute(SOURCE_PRODUCT_ATTR, "missing.nc")
                    .with_field(FIELD, &Array2::zeros((2, 2))),
            )
            .unwrap();

        let resolve = |path: &Path, header: &ProductHeader| -> Result<DateTime<Utc>> {
            Err(ProcessingError::UnresolvedTime {
                path: path.to_path_buf(),
                source_product: header.source_product().unwrap_or_default().to_string(),
            })
        };
        let result = TimeIndexedDataset::open(&store, &[path], FIELD, resolve);
        assert!(matches!(result, Err(ProcessingError::UnresolvedTime { .. })));
    }

    #[test]
    fn test_empty_file_list_is_missing_data() {
        let store = JsonProductStore::new();
        let result = TimeIndexedDataset::open(&store, &[], FIELD, native_time);
        assert!(matches!(result, Err(ProcessingError::MissingData(_))));
    }
}
