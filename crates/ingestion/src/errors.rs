//! Ingestion error types

use provato_common::graph::GraphError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("CSV error in {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("Graph write failed: {0}")]
    Graph(#[from] GraphError),

    #[error("File not found: {0}")]
    FileNotFound(String),
}

pub type Result<T> = std::result::Result<T, IngestionError>;
