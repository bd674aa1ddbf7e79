//! Firelite: an embedded engine that compiles Firestore REST `StructuredQuery`
//! requests into an executable form and runs them over an in-memory document set.

pub mod config;
pub mod document;
pub mod engine;
pub mod errors;
pub mod field_path;
pub mod query;
pub mod store;
pub mod utils;
pub mod value;

pub use config::EngineConfig;
pub use document::Document;
pub use engine::Engine;
pub use errors::DbError;
pub use field_path::FieldPath;
pub use query::{QueryResult, QuerySpec, QueryTarget, StructuredQuery};
pub use store::{DocumentSource, MemoryStore};
pub use value::TypedValue;

/// Initializes logging from `FIRELITE_LOG_*` environment variables.
///
/// # Errors
/// Returns an error if the log directory or appenders cannot be created.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    utils::logger::configure_from_env()
}
