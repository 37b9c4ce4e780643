pub mod catalog;
pub mod granule_index;
pub mod product_store;

pub use catalog::Catalog;
pub use granule_index::{ExtractionFailure, GranuleIndex};
pub use product_store::{JsonProductStore, ProductDocument, ProductReader};
