//! CSV bulk loaders for the farm graph

pub mod errors;
pub mod loader;
pub mod mapping;

pub use errors::{IngestionError, Result};
pub use loader::{BulkLoader, LoadReport};
pub use mapping::{CsvRow, Entity};
