use chrono::{Duration, NaiveDateTime};
use std::path::Path;
use tracing::{debug, error, info, warn};

use crate::retention::SweepReport;
use crate::utils::naming::parse_run_directory;

/// Removes run directories older than the output window. Files directly in
/// the output root are left alone.
#[derive(Debug, Clone)]
pub struct DirectorySweep {
    window: Duration,
    dry_run: bool,
}

impl DirectorySweep {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn sweep(&self, output_root: &Path, now: NaiveDateTime) -> SweepReport {
        let mut report = SweepReport::new(self.dry_run);
        let threshold = (now - self.window).date();

        let entries = match std::fs::read_dir(output_root) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %output_root.display(), error = %e, "no output root to sweep");
                return report;
            }
        };

        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();

            let date = match parse_run_directory(&name) {
                Ok(date) => date,
                Err(_) => {
                    warn!(path = %path.display(), "skipping directory not named YYYY_MM_DD");
                    report.skipped.push(path);
                    continue;
                }
            };

            if date >= threshold {
                report.retained.push(path);
                continue;
            }

            info!(
                path = %path.display(),
                date = %date,
                threshold = %threshold,
                dry_run = self.dry_run,
                "deleting outdated run directory"
            );
            if self.dry_run {
                report.deleted.push(path);
                continue;
            }
            match std::fs::remove_dir_all(&path) {
                Ok(()) => report.deleted.push(path),
                Err(e) => {
                    error!(path = %path.display(), error = %e, "failed to delete run directory");
                    report.failed.push(path);
                }
            }
        }

        report.sort();
        report
    }
}
