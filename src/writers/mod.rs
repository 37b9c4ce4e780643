pub mod geotiff_writer;
pub mod image_writer;
pub mod sequence_writer;
pub mod summary_writer;

pub use geotiff_writer::GeoTiffWriter;
pub use image_writer::{PngRenderer, RenderRequest, Renderer};
pub use sequence_writer::{SequenceBuilder, SequenceOutcome};
pub use summary_writer::write_summary;
