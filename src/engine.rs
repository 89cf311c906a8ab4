//! Thin wrapper around the tantivy engine
//!
//! Every direct tantivy call lives here: schema construction, directory
//! open/create, lock file handling, reader/writer acquisition, the
//! update-by-term ingest path, segment merging, and search-hit projection.
//! The rest of the crate only passes `Index`/`IndexReader`/`IndexWriter`
//! handles around; errors cross this boundary as [`SearchdexError`] values
//! with the engine's message text preserved.
//!
//! Documents are dynamic but tantivy schemas are not, so each index carries
//! one fixed catch-all schema: `_id` and `_type` as raw terms, `content` for
//! analyzed values, `keyword` for exact-match values, and a store-only
//! `stored` field holding the JSON-encoded stored field list used to project
//! search hits back into caller-visible documents.

use crate::document::{Document, FieldFlags, ScoredDocument, StoredField, ID_FIELD, TYPE_FIELD};
use crate::error::SearchdexError;
use std::path::Path;
use tantivy::{
    collector::TopDocs,
    query::QueryParser,
    schema::{Field, Schema, Value, STORED, STRING, TEXT},
    Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term,
};

/// Catch-all field receiving every analyzed (INDEX | TOKENIZE) value
const CONTENT_FIELD: &str = "content";

/// Catch-all field receiving every exact-match (INDEX without TOKENIZE) value
const KEYWORD_FIELD: &str = "keyword";

/// Store-only field holding the JSON-encoded stored field list
const STORED_FIELD: &str = "stored";

/// Lock file tantivy holds while a writer is live
const WRITER_LOCK_FILENAME: &str = ".tantivy-writer.lock";

/// Resolved schema fields of one index
#[derive(Debug, Clone, Copy)]
pub(crate) struct IndexSchema {
    pub id: Field,
    pub doc_type: Field,
    pub content: Field,
    pub keyword: Field,
    pub stored: Field,
}

impl IndexSchema {
    /// Build the fixed schema used by every index this crate creates
    fn schema() -> Schema {
        let mut builder = Schema::builder();
        builder.add_text_field(ID_FIELD, STRING | STORED);
        builder.add_text_field(TYPE_FIELD, STRING);
        builder.add_text_field(CONTENT_FIELD, TEXT);
        builder.add_text_field(KEYWORD_FIELD, STRING);
        builder.add_text_field(STORED_FIELD, STORED);
        builder.build()
    }

    /// Resolve the field handles of an opened index
    pub(crate) fn for_index(index: &Index) -> Result<Self, SearchdexError> {
        let schema = index.schema();
        let field = |name: &str| schema.get_field(name).map_err(SearchdexError::unknown);
        Ok(Self {
            id: field(ID_FIELD)?,
            doc_type: field(TYPE_FIELD)?,
            content: field(CONTENT_FIELD)?,
            keyword: field(KEYWORD_FIELD)?,
            stored: field(STORED_FIELD)?,
        })
    }
}

/// Exact-match key targeted by a delete operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TermKey {
    Id,
    DocType,
}

/// Whether a committed index already exists under `path`
pub(crate) fn index_exists(path: &Path) -> bool {
    path.join("meta.json").exists()
}

/// Whether a writer lock file is present under `path`
pub(crate) fn is_locked(path: &Path) -> bool {
    path.join(WRITER_LOCK_FILENAME).exists()
}

/// Remove a leftover writer lock file
///
/// The lock is advisory while a writer is live; a file surviving a crashed
/// process would otherwise block the next writer open.
pub(crate) fn unlock(path: &Path) -> Result<(), SearchdexError> {
    match std::fs::remove_file(path.join(WRITER_LOCK_FILENAME)) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(SearchdexError::open(err)),
    }
}

/// Open the index at `path`, creating a brand-new one when permitted
pub(crate) fn open_index(path: &Path, create_if_missing: bool) -> Result<Index, SearchdexError> {
    if index_exists(path) {
        return Index::open_in_dir(path).map_err(SearchdexError::open);
    }
    if !create_if_missing {
        return Err(SearchdexError::Open(format!(
            "index does not exist: {}",
            path.display()
        )));
    }
    std::fs::create_dir_all(path).map_err(SearchdexError::open)?;
    Index::create_in_dir(path, IndexSchema::schema()).map_err(SearchdexError::open)
}

/// Open a manually reloaded reader over the index's current committed state
pub(crate) fn open_reader(index: &Index) -> Result<IndexReader, SearchdexError> {
    index
        .reader_builder()
        .reload_policy(ReloadPolicy::Manual)
        .try_into()
        .map_err(SearchdexError::open)
}

/// Open a writer with the given heap budget
///
/// Single indexing thread: mutations for one path are serialized by the
/// session lock, so extra writer threads would only fragment the budget.
pub(crate) fn open_writer(
    index: &Index,
    heap_bytes: usize,
) -> Result<IndexWriter<TantivyDocument>, SearchdexError> {
    index
        .writer_with_num_threads::<TantivyDocument>(1, heap_bytes)
        .map_err(SearchdexError::open)
}

/// Atomically replace the document keyed `_id = doc_id` with `document`
///
/// Delete-then-insert against the writer; visible to readers after the
/// caller commits. Any caller-supplied `_id` field has already been
/// stripped; the stored `_id` entry is appended after the caller's fields.
pub(crate) fn update_document(
    writer: &IndexWriter<TantivyDocument>,
    schema: &IndexSchema,
    doc_id: &str,
    document: &Document,
) -> Result<(), SearchdexError> {
    let mut indexed = TantivyDocument::default();
    let mut stored = Vec::new();

    for field in document.fields() {
        if field.name == ID_FIELD {
            continue;
        }
        if field.flags.contains(FieldFlags::INDEX) {
            if field.name == TYPE_FIELD {
                indexed.add_text(schema.doc_type, &field.value);
            } else if field.flags.contains(FieldFlags::TOKENIZE) {
                indexed.add_text(schema.content, &field.value);
            } else {
                indexed.add_text(schema.keyword, &field.value);
            }
        }
        if field.flags.contains(FieldFlags::STORE) {
            stored.push(StoredField {
                name: field.name.clone(),
                value: field.value.clone(),
            });
        }
    }

    stored.push(StoredField {
        name: ID_FIELD.to_string(),
        value: doc_id.to_string(),
    });
    indexed.add_text(schema.id, doc_id);

    let payload = serde_json::to_string(&stored).map_err(SearchdexError::unknown)?;
    indexed.add_text(schema.stored, payload);

    writer.delete_term(Term::from_field_text(schema.id, doc_id));
    writer
        .add_document(indexed)
        .map_err(SearchdexError::unknown)?;
    Ok(())
}

/// Mark every document matching the exact term for deletion
///
/// Takes effect at the next commit. A term matching nothing is not an error.
pub(crate) fn delete_documents(
    writer: &IndexWriter<TantivyDocument>,
    schema: &IndexSchema,
    key: TermKey,
    value: &str,
) {
    let field = match key {
        TermKey::Id => schema.id,
        TermKey::DocType => schema.doc_type,
    };
    writer.delete_term(Term::from_field_text(field, value));
}

/// Parse `query_text` and collect up to `max_hits` scored documents
///
/// The deterministic default fields are `_id`, `content`, and `keyword`, so
/// bare terms match both exact ids and document content. Hits arrive in
/// descending score order with ties broken by internal document address.
pub(crate) fn search(
    index: &Index,
    reader: &IndexReader,
    schema: &IndexSchema,
    query_text: &str,
    max_hits: usize,
) -> Result<Vec<ScoredDocument>, SearchdexError> {
    let parser = QueryParser::for_index(index, vec![schema.id, schema.content, schema.keyword]);
    let query = parser.parse_query(query_text)?;

    let searcher = reader.searcher();
    let top_docs = searcher
        .search(&query, &TopDocs::with_limit(max_hits))
        .map_err(SearchdexError::unknown)?;

    let mut hits = Vec::with_capacity(top_docs.len());
    for (score, address) in top_docs {
        let doc: TantivyDocument = searcher.doc(address).map_err(SearchdexError::unknown)?;
        hits.push(ScoredDocument {
            score,
            fields: stored_fields(schema, &doc)?,
        });
    }
    Ok(hits)
}

/// Number of live (non-deleted) documents visible to the reader
pub(crate) fn num_docs(reader: &IndexReader) -> u64 {
    reader.searcher().num_docs()
}

/// Merge all searchable segments of the index through a transient writer
pub(crate) fn optimize(index: &Index, heap_bytes: usize) -> Result<(), SearchdexError> {
    let mut writer = open_writer(index, heap_bytes)?;
    let segments = index
        .searchable_segment_ids()
        .map_err(SearchdexError::unknown)?;
    if segments.len() > 1 {
        writer
            .merge(&segments)
            .wait()
            .map_err(SearchdexError::unknown)?;
    }
    writer
        .wait_merging_threads()
        .map_err(SearchdexError::unknown)
}

/// Copy the stored field list out of a retrieved hit
fn stored_fields(
    schema: &IndexSchema,
    doc: &TantivyDocument,
) -> Result<Vec<StoredField>, SearchdexError> {
    let Some(payload) = doc.get_first(schema.stored).and_then(|v| v.as_str()) else {
        return Ok(Vec::new());
    };
    serde_json::from_str(payload).map_err(SearchdexError::unknown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fulltext_doc(body: &str) -> Document {
        let mut doc = Document::new();
        doc.add_field("body", body, FieldFlags::fulltext());
        doc
    }

    #[test]
    fn test_open_missing_index_without_create_fails() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing");

        let err = open_index(&path, false).unwrap_err();
        assert!(matches!(err, SearchdexError::Open(_)));
        assert!(!index_exists(&path));
    }

    #[test]
    fn test_create_then_reopen_index() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("idx");

        open_index(&path, true).unwrap();
        assert!(index_exists(&path));

        let reopened = open_index(&path, false).unwrap();
        IndexSchema::for_index(&reopened).unwrap();
    }

    #[test]
    fn test_update_then_search_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let index = open_index(temp_dir.path(), true).unwrap();
        let schema = IndexSchema::for_index(&index).unwrap();

        let mut writer = open_writer(&index, 15_000_000).unwrap();
        update_document(&writer, &schema, "doc-1", &fulltext_doc("hello world")).unwrap();
        writer.commit().unwrap();

        let reader = open_reader(&index).unwrap();
        let hits = search(&index, &reader, &schema, "hello", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id(), Some("doc-1"));
        assert_eq!(hits[0].field("body"), Some("hello world"));
    }

    #[test]
    fn test_update_replaces_instead_of_appending() {
        let temp_dir = TempDir::new().unwrap();
        let index = open_index(temp_dir.path(), true).unwrap();
        let schema = IndexSchema::for_index(&index).unwrap();

        let mut writer = open_writer(&index, 15_000_000).unwrap();
        update_document(&writer, &schema, "doc-1", &fulltext_doc("first body")).unwrap();
        update_document(&writer, &schema, "doc-1", &fulltext_doc("second body")).unwrap();
        writer.commit().unwrap();

        let reader = open_reader(&index).unwrap();
        assert_eq!(num_docs(&reader), 1);
        let hits = search(&index, &reader, &schema, "doc-1", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].field("body"), Some("second body"));
    }

    #[test]
    fn test_unindexed_field_is_stored_but_not_searchable() {
        let temp_dir = TempDir::new().unwrap();
        let index = open_index(temp_dir.path(), true).unwrap();
        let schema = IndexSchema::for_index(&index).unwrap();

        let mut doc = Document::new();
        doc.add_field("secret", "hidden", FieldFlags::STORE);

        let mut writer = open_writer(&index, 15_000_000).unwrap();
        update_document(&writer, &schema, "doc-1", &doc).unwrap();
        writer.commit().unwrap();

        let reader = open_reader(&index).unwrap();
        assert!(search(&index, &reader, &schema, "hidden", 10)
            .unwrap()
            .is_empty());

        let by_id = search(&index, &reader, &schema, "doc-1", 10).unwrap();
        assert_eq!(by_id.len(), 1);
        assert_eq!(by_id[0].field("secret"), Some("hidden"));
    }

    #[test]
    fn test_unlock_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        assert!(!is_locked(temp_dir.path()));
        unlock(temp_dir.path()).unwrap();

        std::fs::write(temp_dir.path().join(WRITER_LOCK_FILENAME), b"").unwrap();
        assert!(is_locked(temp_dir.path()));
        unlock(temp_dir.path()).unwrap();
        assert!(!is_locked(temp_dir.path()));
    }

    #[test]
    fn test_malformed_query_is_parse_error() {
        let temp_dir = TempDir::new().unwrap();
        let index = open_index(temp_dir.path(), true).unwrap();
        let schema = IndexSchema::for_index(&index).unwrap();
        let reader = open_reader(&index).unwrap();

        let err = search(&index, &reader, &schema, "hello AND", 10).unwrap_err();
        assert!(matches!(err, SearchdexError::QueryParse(_)));
    }
}
