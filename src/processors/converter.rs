use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};

use crate::error::{ProcessingError, Result};
use crate::models::{Pollutant, ProcessingLevel};
use crate::readers::Catalog;
use crate::settings::{AreaOfInterest, ConversionSettings};
use crate::utils::naming::ProductFilename;

/// Declarative operation list turning one raw granule of `pollutant` into a
/// gridded product over `area`.
pub fn harp_operations(pollutant: Pollutant, area: &AreaOfInterest, min_validity: u32) -> String {
    let (lat_edges, lon_edges) = area.edge_counts();
    [
        format!("{}>{}", pollutant.validity_field(), min_validity),
        "derive(datetime_stop {time})".to_string(),
        format!("latitude>{} [degree_north]", area.lat_min),
        format!("latitude<{} [degree_north]", area.lat_max),
        format!("longitude>{} [degree_east]", area.lon_min),
        format!("longitude<{} [degree_east]", area.lon_max),
        format!(
            "bin_spatial({}, {}, {}, {}, {}, {})",
            lat_edges, area.lat_min, area.cell_size, lon_edges, area.lon_min, area.cell_size
        ),
        "derive(latitude {latitude})".to_string(),
        "derive(longitude {longitude})".to_string(),
        format!(
            "keep({}, latitude, longitude, latitude_bounds, longitude_bounds)",
            pollutant.field()
        ),
    ]
    .join(";")
}

/// External L2 to L3 transform.
pub trait ProductConverter: Send + Sync {
    fn convert(&self, input: &Path, output: &Path, operations: &str) -> Result<()>;
}

/// Runs `<program> -a <operations> <input> <output>`.
#[derive(Debug, Clone)]
pub struct HarpCommandConverter {
    program: String,
}

impl HarpCommandConverter {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl ProductConverter for HarpCommandConverter {
    fn convert(&self, input: &Path, output: &Path, operations: &str) -> Result<()> {
        let conversion_error = |reason: String| ProcessingError::Conversion {
            path: input.to_path_buf(),
            reason,
        };

        let result = Command::new(&self.program)
            .arg("-a")
            .arg(operations)
            .arg(input)
            .arg(output)
            .output()
            .map_err(|e| conversion_error(format!("cannot start '{}': {}", self.program, e)))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(conversion_error(format!(
                "{} exited with {}: {}",
                self.program,
                result.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct ConversionReport {
    pub converted: Vec<PathBuf>,
    /// Raw files whose derived product already existed.
    pub existing: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

/// Converts every raw file that has no derived counterpart yet.
pub struct ConversionStage<'a> {
    converter: &'a dyn ProductConverter,
    area: &'a AreaOfInterest,
    min_validity: u32,
    processed_dir: PathBuf,
}

impl<'a> ConversionStage<'a> {
    pub fn new(
        converter: &'a dyn ProductConverter,
        area: &'a AreaOfInterest,
        settings: &ConversionSettings,
        processed_dir: &Path,
    ) -> Self {
        Self {
            converter,
            area,
            min_validity: settings.min_validity,
            processed_dir: processed_dir.to_path_buf(),
        }
    }

    /// Where the derived form of `raw` is written.
    pub fn derived_path(&self, raw: &Path) -> Result<PathBuf> {
        let name = raw
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ProcessingError::read(raw, "path has no UTF-8 file name"))?;
        let derived = ProductFilename::parse(name)?.with_level(ProcessingLevel::L3);
        Ok(self.processed_dir.join(derived.to_string()))
    }

    pub fn run(&self, raw: &Catalog) -> Result<ConversionReport> {
        std::fs::create_dir_all(&self.processed_dir)?;
        let mut report = ConversionReport::default();

        for (pollutant, files) in raw.iter() {
            let operations = harp_operations(pollutant, self.area, self.min_validity);
            debug!(pollutant = %pollutant, operations = %operations, "conversion operations");

            for input in files {
                let output = match self.derived_path(input) {
                    Ok(output) => output,
                    Err(e) => {
                        warn!(path = %input.display(), error = %e, "cannot name derived product");
                        report.failed.push(input.clone());
                        continue;
                    }
                };

                if output.exists() {
                    debug!(path = %input.display(), "derived product exists, skipping");
                    report.existing.push(input.clone());
                    continue;
                }

                match self.converter.convert(input, &output, &operations) {
                    Ok(()) => {
                        info!(pollutant = %pollutant, path = %output.display(), "converted");
                        report.converted.push(input.clone());
                    }
                    Err(e) => {
                        warn!(pollutant = %pollutant, path = %input.display(), error = %e, "conversion failed, skipping");
                        report.failed.push(input.clone());
                    }
                }
            }
        }

        Ok(report)
    }
}
