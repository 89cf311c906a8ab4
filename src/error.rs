//! Error types for searchdex operations
//!
//! Every engine fault is caught at a module boundary and converted into a
//! [`SearchdexError`] value carrying the engine's message text. Workers never
//! propagate a panic to the caller; the pipeline converts one into
//! [`SearchdexError::Unknown`] before the completion fires.

use std::fmt::Display;
use thiserror::Error;

/// Main error type for all searchdex operations
#[derive(Debug, Error)]
pub enum SearchdexError {
    /// Directory, reader, or writer could not be opened or created
    #[error("index open failed: {0}")]
    Open(String),

    /// Query text was rejected by the engine's query grammar
    #[error("query parse failed: {0}")]
    QueryParse(String),

    /// Any other engine fault, including ones with no recoverable detail
    #[error("unknown engine failure: {0}")]
    Unknown(String),

    /// Configuration validation failed
    #[error("invalid configuration: {field} - {reason}")]
    Config { field: String, reason: String },
}

impl SearchdexError {
    /// Wrap an open/create failure, preserving the underlying message text
    pub fn open(err: impl Display) -> Self {
        Self::Open(err.to_string())
    }

    /// Wrap an unclassified engine fault
    pub fn unknown(err: impl Display) -> Self {
        Self::Unknown(err.to_string())
    }

    /// Create a configuration validation error
    pub fn config_error(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Config {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<tantivy::query::QueryParserError> for SearchdexError {
    fn from(err: tantivy::query::QueryParserError) -> Self {
        Self::QueryParse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_error_display() {
        let err = SearchdexError::open("no such directory: /tmp/missing");
        assert_eq!(
            err.to_string(),
            "index open failed: no such directory: /tmp/missing"
        );
    }

    #[test]
    fn test_config_error_display() {
        let err = SearchdexError::config_error("writer_heap_bytes", "must be at least 15 MB");
        assert_eq!(
            err.to_string(),
            "invalid configuration: writer_heap_bytes - must be at least 15 MB"
        );
    }

    #[test]
    fn test_query_parse_conversion() {
        let parse_err = tantivy::query::QueryParserError::AllButQueryForbidden;
        let err: SearchdexError = parse_err.into();
        assert!(matches!(err, SearchdexError::QueryParse(_)));
    }
}
