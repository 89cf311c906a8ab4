//! Searchdex - a concurrent session manager for on-disk full-text indexes
//!
//! Searchdex sits between async callers and tantivy's blocking index
//! structures. It caches one session per index path (directory handle,
//! reader, writer), applies a reopen/evict/close protocol around them,
//! dispatches every engine operation to a bounded worker pool, and delivers
//! results through single-fire async completions. Per path, at most one
//! writer is ever live and mutations are serialized; searches always observe
//! the latest committed state.

pub mod config;
pub mod document;
pub mod error;
pub mod manager;

mod engine;
mod pipeline;
mod session;

pub use config::ManagerConfig;
pub use document::{
    Document, DocumentCount, Field, FieldFlags, ScoredDocument, SearchResponse, StoredField,
    ID_FIELD, TYPE_FIELD,
};
pub use error::SearchdexError;
pub use manager::SearchManager;

/// Type alias for Results using SearchdexError
pub type Result<T> = std::result::Result<T, SearchdexError>;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
