use chrono::{DateTime, Utc};
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{ProcessingError, Result};
use crate::models::{
    parse_instant, GranuleReference, ProductHeader, TIME_COVERAGE_END_ATTR,
    TIME_COVERAGE_START_ATTR,
};
use crate::readers::ProductReader;

/// Raw file that could not be indexed, with the reason.
#[derive(Debug)]
pub struct ExtractionFailure {
    pub path: PathBuf,
    pub error: ProcessingError,
}

/// Acquisition windows of the raw granules, keyed by filename.
///
/// Built once per run and handed to the aggregator to label derived files
/// that carry no time coordinate of their own.
#[derive(Debug, Clone, Default)]
pub struct GranuleIndex {
    granules: HashMap<String, GranuleReference>,
}

impl GranuleIndex {
    /// Read the declared acquisition window of every raw file.
    ///
    /// Unreadable files and files missing either attribute are logged and
    /// left out of the index; they are returned alongside it.
    pub fn build<R: ProductReader + ?Sized>(
        reader: &R,
        paths: &[PathBuf],
    ) -> (Self, Vec<ExtractionFailure>) {
        let results: Vec<(PathBuf, Result<GranuleReference>)> = paths
            .par_iter()
            .map(|path| (path.clone(), Self::extract(reader, path)))
            .collect();

        let mut granules = HashMap::with_capacity(results.len());
        let mut failures = Vec::new();

        for (path, result) in results {
            match result {
                Ok(granule) => {
                    granules.insert(granule.filename.clone(), granule);
                }
                Err(error) => {
                    warn!(path = %path.display(), error = %error, "excluding raw granule from index");
                    failures.push(ExtractionFailure { path, error });
                }
            }
        }

        debug!(indexed = granules.len(), failed = failures.len(), "granule index built");
        (Self { granules }, failures)
    }

    /// Read one raw file's acquisition window.
    pub fn extract<R: ProductReader + ?Sized>(reader: &R, path: &Path) -> Result<GranuleReference> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ProcessingError::read(path, "path has no UTF-8 file name"))?;

        let attributes = reader.read_attributes(path)?;
        let instant = |attribute: &str| -> Result<DateTime<Utc>> {
            let raw = attributes
                .get(attribute)
                .ok_or_else(|| ProcessingError::MetadataMissing {
                    path: path.to_path_buf(),
                    attribute: attribute.to_string(),
                })?;
            parse_instant(raw).map_err(|e| {
                ProcessingError::read(path, format!("attribute '{}' = '{}': {}", attribute, raw, e))
            })
        };

        let start = instant(TIME_COVERAGE_START_ATTR)?;
        let end = instant(TIME_COVERAGE_END_ATTR)?;
        if end < start {
            warn!(file = filename, %start, %end, "granule ends before it starts");
        }

        Ok(GranuleReference::new(filename.to_string(), start, end))
    }

    pub fn get(&self, filename: &str) -> Option<&GranuleReference> {
        self.granules.get(filename)
    }

    /// Time label of a derived product: its native time coordinate, or the
    /// acquisition start of the granule it names as its source.
    pub fn resolve_time_label(&self, path: &Path, header: &ProductHeader) -> Result<DateTime<Utc>> {
        if let Some(time) = header.time {
            return Ok(time);
        }

        let source = header.source_product().unwrap_or_default();
        self.granules
            .get(source)
            .map(|granule| granule.start)
            .ok_or_else(|| ProcessingError::UnresolvedTime {
                path: path.to_path_buf(),
                source_product: source.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.granules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.granules.is_empty()
    }

    /// Granules ordered by acquisition start.
    pub fn chronological(&self) -> Vec<&GranuleReference> {
        let mut granules: Vec<_> = self.granules.values().collect();
        granules.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.filename.cmp(&b.filename)));
        granules
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GridDefinition, SOURCE_PRODUCT_ATTR};
    use crate::readers::{JsonProductStore, ProductDocument};
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn raw(dir: &Path, name: &str, start: Option<&str>, end: Option<&str>) -> PathBuf {
        let path = dir.join(name);
        let mut document = ProductDocument::default();
        if let Some(start) = start {
            document = document.with_attribute(TIME_COVERAGE_START_ATTR, start);
        }
        if let Some(end) = end {
            document = document.with_attribute(TIME_COVERAGE_END_ATTR, end);
        }
        JsonProductStore::new().write_document(&path, &document).unwrap();
        path
    }

    #[test]
    fn test_build_indexes_by_filename() {
        let dir = TempDir::new().unwrap();
        let paths = vec![
            raw(dir.path(), "a.nc", Some("2023-05-01T05:00:00Z"), Some("2023-05-01T06:41:00Z")),
            raw(dir.path(), "b.nc", Some("2023-05-02T05:00:00Z"), Some("2023-05-02T06:41:00Z")),
        ];

        let (index, failures) = GranuleIndex::build(&JsonProductStore::new(), &paths);
        assert!(failures.is_empty());
        assert_eq!(index.len(), 2);
        assert_eq!(
            index.get("b.nc").unwrap().start,
            Utc.with_ymd_and_hms(2023, 5, 2, 5, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_bad_files_are_excluded_not_fatal() {
        let dir = TempDir::new().unwrap();
        let missing_end = raw(dir.path(), "no_end.nc", Some("2023-05-01T05:00:00Z"), None);
        let corrupt = dir.path().join("corrupt.nc");
        std::fs::write(&corrupt, b"not a product").unwrap();
        let good = raw(dir.path(), "good.nc", Some("2023-05-01T05:00:00Z"), Some("2023-05-01T06:00:00Z"));

        let (index, failures) =
            GranuleIndex::build(&JsonProductStore::new(), &[missing_end, corrupt, good]);

        assert_eq!(index.len(), 1);
        assert!(index.get("good.nc").is_some());
        assert_eq!(failures.len(), 2);
        assert!(failures
            .iter()
            .any(|f| matches!(f.error, ProcessingError::MetadataMissing { .. })));
        assert!(failures
            .iter()
            .any(|f| matches!(f.error, ProcessingError::Read { .. })));
    }

    #[test]
    fn test_extraction_is_repeatable() {
        let dir = TempDir::new().unwrap();
        let path = raw(dir.path(), "a.nc", Some("2023-05-01T05:00:00Z"), Some("2023-05-01T06:00:00Z"));
        let before = std::fs::read(&path).unwrap();

        let store = JsonProductStore::new();
        let first = GranuleIndex::extract(&store, &path).unwrap();
        let second = GranuleIndex::extract(&store, &path).unwrap();

        assert_eq!(first, second);
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_resolve_time_label() {
        let dir = TempDir::new().unwrap();
        let path = raw(dir.path(), "a.nc", Some("2023-05-01T05:00:00Z"), Some("2023-05-01T06:00:00Z"));
        let (index, _) = GranuleIndex::build(&JsonProductStore::new(), &[path]);

        let mut header = ProductHeader {
            attributes: [(SOURCE_PRODUCT_ATTR.to_string(), "a.nc".to_string())]
                .into_iter()
                .collect(),
            grid: Some(GridDefinition::new(1, 1, 0.0, 0.0, 1.0, 1.0)),
            time: None,
        };
        let derived = Path::new("derived.nc");

        assert_eq!(
            index.resolve_time_label(derived, &header).unwrap(),
            Utc.with_ymd_and_hms(2023, 5, 1, 5, 0, 0).unwrap()
        );

        let native = Utc.with_ymd_and_hms(2023, 4, 30, 0, 0, 0).unwrap();
        header.time = Some(native);
        assert_eq!(index.resolve_time_label(derived, &header).unwrap(), native);

        header.time = None;
        header
            .attributes
            .insert(SOURCE_PRODUCT_ATTR.to_string(), "unknown.nc".to_string());
        assert!(matches!(
            index.resolve_time_label(derived, &header),
            Err(ProcessingError::UnresolvedTime { .. })
        ));
    }
}
