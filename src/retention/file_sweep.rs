use chrono::{NaiveDate, NaiveDateTime};
use std::path::Path;
use tracing::{debug, error, info, warn};

use crate::retention::SweepReport;
use crate::settings::ClassRetention;
use crate::utils::naming::{acquisition_date, ProductFilename};

/// Removes product files whose acquisition date is older than the window
/// of their pollutant's availability class.
#[derive(Debug, Clone)]
pub struct FileSweep {
    category: &'static str,
    windows: ClassRetention,
    dry_run: bool,
}

impl FileSweep {
    pub fn new(category: &'static str, windows: ClassRetention) -> Self {
        Self {
            category,
            windows,
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Oldest acquisition date still kept for `product`.
    pub fn threshold(&self, product: &ProductFilename, now: NaiveDateTime) -> NaiveDate {
        (now - self.windows.window(product.pollutant.availability())).date()
    }

    pub fn sweep(&self, dir: &Path, now: NaiveDateTime) -> SweepReport {
        let mut report = SweepReport::new(self.dry_run);

        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(category = self.category, dir = %dir.display(), error = %e, "nothing to sweep");
                return report;
            }
        };

        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();

            let date = match acquisition_date(&name) {
                Ok(date) => date,
                Err(e) => {
                    warn!(category = self.category, path = %path.display(), error = %e, "skipping file without acquisition date");
                    report.skipped.push(path);
                    continue;
                }
            };
            let product = match ProductFilename::parse(&name) {
                Ok(product) => product,
                Err(e) => {
                    warn!(category = self.category, path = %path.display(), error = %e, "skipping file of unknown product type");
                    report.skipped.push(path);
                    continue;
                }
            };

            let threshold = self.threshold(&product, now);
            if date >= threshold {
                report.retained.push(path);
                continue;
            }

            info!(
                category = self.category,
                path = %path.display(),
                class = product.pollutant.availability().label(),
                date = %date,
                threshold = %threshold,
                dry_run = self.dry_run,
                "deleting outdated product"
            );
            if self.dry_run {
                report.deleted.push(path);
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => report.deleted.push(path),
                Err(e) => {
                    error!(path = %path.display(), error = %e, "failed to delete product");
                    report.failed.push(path);
                }
            }
        }

        report.sort();
        report
    }
}
