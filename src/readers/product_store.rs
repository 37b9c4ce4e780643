use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::{ProcessingError, Result};
use crate::models::{Attributes, GridDefinition, ProductHeader};

/// Read access to product containers.
///
/// Raw granules only need [`ProductReader::read_attributes`]; derived grids are
/// opened through the header and field readers.
pub trait ProductReader: Send + Sync {
    fn read_attributes(&self, path: &Path) -> Result<Attributes>;

    fn read_header(&self, path: &Path) -> Result<ProductHeader>;

    /// Load one gridded variable. Undefined cells are NaN.
    fn read_field(&self, path: &Path, field: &str) -> Result<Array2<f32>>;
}

/// On-disk layout of the JSON product container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductDocument {
    #[serde(default)]
    pub attributes: Attributes,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid: Option<GridDefinition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,

    /// Row-major cell values, `null` where undefined.
    #[serde(default)]
    pub variables: BTreeMap<String, Vec<Option<f32>>>,
}

impl ProductDocument {
    pub fn new(grid: GridDefinition) -> Self {
        Self {
            grid: Some(grid),
            ..Default::default()
        }
    }

    pub fn with_attribute(mut self, key: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    /// Store a grid; NaN cells become `null`. Infinite cells are kept and
    /// rejected by [`JsonProductStore::write_document`].
    pub fn with_field(mut self, name: &str, values: &Array2<f32>) -> Self {
        let cells = values
            .iter()
            .map(|v| if v.is_nan() { None } else { Some(*v) })
            .collect();
        self.variables.insert(name.to_string(), cells);
        self
    }
}

/// Header-only view; serde skips the variable payloads.
#[derive(Deserialize)]
struct HeaderDocument {
    #[serde(default)]
    attributes: Attributes,
    #[serde(default)]
    grid: Option<GridDefinition>,
    #[serde(default)]
    time: Option<DateTime<Utc>>,
}

/// Product container stored as one JSON document per file.
#[derive(Debug, Clone, Default)]
pub struct JsonProductStore;

impl JsonProductStore {
    pub fn new() -> Self {
        Self
    }

    fn open(&self, path: &Path) -> Result<BufReader<File>> {
        let file = File::open(path).map_err(|e| ProcessingError::read(path, e))?;
        Ok(BufReader::new(file))
    }

    pub fn read_document(&self, path: &Path) -> Result<ProductDocument> {
        serde_json::from_reader(self.open(path)?).map_err(|e| ProcessingError::read(path, e))
    }

    pub fn write_document(&self, path: &Path, document: &ProductDocument) -> Result<()> {
        // JSON has no infinity; serde_json would write `null`.
        for (name, cells) in &document.variables {
            if cells.iter().flatten().any(|v| v.is_infinite()) {
                return Err(ProcessingError::InvalidFormat(format!(
                    "field '{}' for {} holds infinite values",
                    name,
                    path.display()
                )));
            }
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, document)?;
        writer.flush()?;
        Ok(())
    }
}

impl ProductReader for JsonProductStore {
    fn read_attributes(&self, path: &Path) -> Result<Attributes> {
        Ok(self.read_header(path)?.attributes)
    }

    fn read_header(&self, path: &Path) -> Result<ProductHeader> {
        let header: HeaderDocument =
            serde_json::from_reader(self.open(path)?).map_err(|e| ProcessingError::read(path, e))?;
        Ok(ProductHeader {
            attributes: header.attributes,
            grid: header.grid,
            time: header.time,
        })
    }

    fn read_field(&self, path: &Path, field: &str) -> Result<Array2<f32>> {
        let mut document = self.read_document(path)?;
        let grid = document.grid.ok_or_else(|| {
            ProcessingError::combination(path, "product carries no grid definition")
        })?;
        let cells = document.variables.remove(field).ok_or_else(|| {
            ProcessingError::combination(path, format!("field '{}' not present", field))
        })?;

        if cells.len() != grid.cell_count() {
            return Err(ProcessingError::combination(
                path,
                format!(
                    "field '{}' has {} cells, grid expects {}x{}",
                    field,
                    cells.len(),
                    grid.rows,
                    grid.cols
                ),
            ));
        }

        let values = cells.into_iter().map(|c| c.unwrap_or(f32::NAN)).collect();
        Ok(Array2::from_shape_vec(grid.shape(), values)?)
    }
}
