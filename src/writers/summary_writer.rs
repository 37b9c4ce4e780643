use std::path::Path;
use tracing::debug;

use crate::error::Result;
use crate::models::CompositeGrid;

/// Write one CSV row per composite, replacing any previous file.
pub fn write_summary(composites: &[CompositeGrid], path: &Path) -> Result<usize> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    for composite in composites {
        writer.serialize(composite.summary())?;
    }
    writer.flush()?;

    debug!(path = %path.display(), rows = composites.len(), "summary written");
    Ok(composites.len())
}
