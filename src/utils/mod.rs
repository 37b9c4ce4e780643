pub mod constants;
pub mod geodesy;
pub mod logging;
pub mod naming;
pub mod progress;

pub use constants::*;
pub use geodesy::{haversine_distance, scale_bar_distance};
pub use logging::init_logging;
pub use naming::{acquisition_date, ProductFilename, RenderedName};
pub use progress::ProgressReporter;
