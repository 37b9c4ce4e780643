//! Age-based pruning of raw products, derived products and run directories.
//!
//! Sweeps never fail the run: every problem is logged against the entry it
//! concerns and counted in the report.

pub mod directory_sweep;
pub mod file_sweep;

pub use directory_sweep::DirectorySweep;
pub use file_sweep::FileSweep;

use std::path::PathBuf;

/// What a sweep did with each entry it looked at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub retained: Vec<PathBuf>,
    /// Removed, or due for removal in a dry run.
    pub deleted: Vec<PathBuf>,
    /// Names that could not be classified.
    pub skipped: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
    pub dry_run: bool,
}

impl SweepReport {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Default::default()
        }
    }

    pub fn total(&self) -> usize {
        self.retained.len() + self.deleted.len() + self.skipped.len() + self.failed.len()
    }

    pub fn merge(&mut self, other: SweepReport) {
        self.retained.extend(other.retained);
        self.deleted.extend(other.deleted);
        self.skipped.extend(other.skipped);
        self.failed.extend(other.failed);
        self.dry_run |= other.dry_run;
    }

    fn sort(&mut self) {
        self.retained.sort();
        self.deleted.sort();
        self.skipped.sort();
        self.failed.sort();
    }
}
