use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProcessingError>;

#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Product container error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("GeoTIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("Grid shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("Date parsing error: {0}")]
    DateParse(#[from] chrono::ParseError),

    #[error("Cannot read {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Attribute '{attribute}' missing from {path}")]
    MetadataMissing { path: PathBuf, attribute: String },

    #[error("Cannot assign a time label to {path}: source granule '{source_product}' is not indexed")]
    UnresolvedTime { path: PathBuf, source_product: String },

    #[error("Cannot combine {path} into the time series: {reason}")]
    Combination { path: PathBuf, reason: String },

    #[error("No acquisition date encoded in '{name}'")]
    FilenameDate { name: String },

    #[error("Rendering {path} failed: {reason}")]
    Render { path: PathBuf, reason: String },

    #[error("Conversion of {path} failed: {reason}")]
    Conversion { path: PathBuf, reason: String },

    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required data: {0}")]
    MissingData(String),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Async task error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl ProcessingError {
    pub fn read(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        ProcessingError::Read {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn combination(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        ProcessingError::Combination {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
