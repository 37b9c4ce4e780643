use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::Result;
use crate::models::{Pollutant, ProcessingLevel};
use crate::utils::naming::ProductFilename;

/// Product files of one processing level, grouped by pollutant.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    files: BTreeMap<Pollutant, Vec<PathBuf>>,
}

impl Catalog {
    /// Scan `dir` for product files of `level`.
    ///
    /// Every pollutant gets an entry. A missing directory yields an empty
    /// catalog; files whose names do not decode are ignored.
    pub fn scan(dir: &Path, level: ProcessingLevel) -> Result<Self> {
        let mut files: BTreeMap<Pollutant, Vec<PathBuf>> =
            Pollutant::ALL.iter().map(|p| (*p, Vec::new())).collect();

        if !dir.is_dir() {
            debug!(dir = %dir.display(), "catalog directory absent");
            return Ok(Self { files });
        }

        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            match ProductFilename::parse(name) {
                Ok(product) if product.level == level => {
                    if let Some(list) = files.get_mut(&product.pollutant) {
                        list.push(path);
                    }
                }
                Ok(_) => {}
                Err(e) => debug!(file = name, error = %e, "skipping non-product file"),
            }
        }

        Ok(Self { files })
    }

    pub fn files(&self, pollutant: Pollutant) -> &[PathBuf] {
        self.files.get(&pollutant).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (Pollutant, &[PathBuf])> {
        self.files.iter().map(|(p, files)| (*p, files.as_slice()))
    }

    /// All files of every pollutant.
    pub fn all_files(&self) -> Vec<PathBuf> {
        self.files.values().flatten().cloned().collect()
    }

    pub fn total_files(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }
}
