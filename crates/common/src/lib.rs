//! Provato Common Library
//!
//! Shared code for the Provato gateway and loaders including:
//! - Graph client (Neo4j and in-memory stores)
//! - Retrieval engine producing grounded facts
//! - Language-model gateway
//! - Conversation history storage
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod config;
pub mod errors;
pub mod graph;
pub mod llm;
pub mod metrics;
pub mod retrieval;
pub mod session;

// Re-export commonly used types
pub use config::AppConfig;
pub use errors::{AppError, Result};
pub use graph::{GraphStore, MemoryGraph, Neo4jGraph};
pub use llm::{CompletionModel, LanguageGateway};
pub use retrieval::{RetrievalEngine, RetrievalResult};
pub use session::HistoryStore;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
