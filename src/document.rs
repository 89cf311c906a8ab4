//! Document model and result structures
//!
//! A [`Document`] is a mutable, ordered list of (name, value, flags) fields.
//! No content validation happens here; invalid values are rejected by the
//! engine at mutation time and surfaced from the enclosing task.
//!
//! Search results are projected into [`ScoredDocument`] values holding a
//! copy of every stored field plus the relevance score, with no retained
//! reference to engine-internal storage.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Reserved field carrying the caller-supplied document id
pub const ID_FIELD: &str = "_id";

/// Reserved field targeted by delete-by-type
pub const TYPE_FIELD: &str = "_type";

bitflags! {
    /// How a field is treated at indexing time
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FieldFlags: u32 {
        /// Keep a verbatim copy retrievable from search hits
        const STORE = 1;
        /// Make the field searchable
        const INDEX = 2;
        /// Run the field value through the analyzer; without this an
        /// indexed field matches only as one exact term
        const TOKENIZE = 4;
    }
}

impl FieldFlags {
    /// Stored, analyzed full-text field
    pub fn fulltext() -> Self {
        Self::STORE | Self::INDEX | Self::TOKENIZE
    }

    /// Stored, exact-match field
    pub fn keyword() -> Self {
        Self::STORE | Self::INDEX
    }
}

/// One (name, value, flags) entry of a [`Document`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub value: String,
    pub flags: FieldFlags,
}

/// An ordered, mutable field list submitted with a mutation request
///
/// Populated by the caller via [`add_field`](Document::add_field), then read
/// exactly once by the mutation task that consumes it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    fields: Vec<Field>,
}

impl Document {
    /// Create an empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field triple, preserving insertion order
    pub fn add_field(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
        flags: FieldFlags,
    ) -> &mut Self {
        self.fields.push(Field {
            name: name.into(),
            value: value.into(),
            flags,
        });
        self
    }

    /// Empty the field list
    pub fn clear(&mut self) {
        self.fields.clear();
    }

    /// All fields in insertion order
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Remove every field with the given name, returning how many were dropped
    pub fn remove_fields(&mut self, name: &str) -> usize {
        let before = self.fields.len();
        self.fields.retain(|f| f.name != name);
        before - self.fields.len()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A stored (name, value) pair copied out of a search hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredField {
    pub name: String,
    pub value: String,
}

/// One search hit: stored fields in their original order plus the score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredDocument {
    /// Relevance score assigned by the engine (higher is more relevant)
    pub score: f32,
    /// Copies of the hit's stored fields, insertion order preserved
    pub fields: Vec<StoredField>,
}

impl ScoredDocument {
    /// First stored value for the given field name, if present
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }

    /// The hit's document id
    pub fn id(&self) -> Option<&str> {
        self.field(ID_FIELD)
    }
}

/// Result of a search: hits ordered by descending score, plus elapsed time
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResponse {
    pub hits: Vec<ScoredDocument>,
    pub elapsed: Duration,
}

/// Result of a document-count query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentCount {
    pub count: u64,
    pub elapsed: Duration,
}
