//! Concurrent search session manager
//!
//! [`SearchManager`] is the caller-facing surface: document mutations and
//! queries against any number of on-disk indexes, each identified by a
//! filesystem path. Every method enqueues the blocking engine work on the
//! pipeline and returns immediately to the async caller; the awaited future
//! delivers the (error, result) outcome exactly once.
//!
//! Per index path, mutations are serialized, the cached reader is evicted
//! after every mutation and search so the next acquisition observes fresh
//! committed state, and at most one writer is ever live.

use crate::config::ManagerConfig;
use crate::document::{Document, DocumentCount, ScoredDocument, SearchResponse, ID_FIELD};
use crate::engine::{self, IndexSchema, TermKey};
use crate::error::SearchdexError;
use crate::pipeline::TaskPipeline;
use crate::session::{SessionRegistry, SessionState};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Session manager over on-disk full-text indexes
///
/// Cheap to clone; clones share the same session registry and worker pool.
/// Dropping the last clone while tasks are in flight keeps the registry
/// alive until the last worker finishes.
///
/// # Examples
///
/// ```rust,no_run
/// use searchdex::{Document, FieldFlags, SearchManager};
///
/// # async fn example() -> searchdex::Result<()> {
/// let manager = SearchManager::new()?;
///
/// let mut doc = Document::new();
/// doc.add_field("title", "hello world", FieldFlags::fulltext());
/// manager.add_document("doc-1", doc, "./data/articles").await?;
///
/// let response = manager.search("./data/articles", "hello").await?;
/// assert_eq!(response.hits[0].id(), Some("doc-1"));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SearchManager {
    inner: Arc<ManagerInner>,
    pipeline: TaskPipeline,
}

struct ManagerInner {
    config: ManagerConfig,
    registry: SessionRegistry,
}

impl SearchManager {
    /// Create a manager with the default configuration
    pub fn new() -> Result<Self, SearchdexError> {
        Self::with_config(ManagerConfig::default())
    }

    /// Create a manager with the given configuration
    pub fn with_config(config: ManagerConfig) -> Result<Self, SearchdexError> {
        let config = config.build()?;
        let pipeline = TaskPipeline::new(config.max_concurrent_tasks);
        info!(
            max_concurrent_tasks = config.max_concurrent_tasks,
            writer_heap_bytes = config.writer_heap_bytes,
            "created search manager"
        );
        Ok(Self {
            inner: Arc::new(ManagerInner {
                config,
                registry: SessionRegistry::new(),
            }),
            pipeline,
        })
    }

    /// Add or replace the document stored under `doc_id`
    ///
    /// Any `_id` field supplied inside the document is discarded and replaced
    /// by `doc_id`. An existing document with the same id is atomically
    /// replaced, not duplicated. Returns the elapsed execution time.
    pub async fn add_document(
        &self,
        doc_id: impl Into<String>,
        document: Document,
        index_path: impl AsRef<Path>,
    ) -> Result<Duration, SearchdexError> {
        self.add_documents(vec![(doc_id.into(), document)], index_path)
            .await
    }

    /// Add or replace a batch of documents against one index
    ///
    /// Batch members are applied in the order supplied. A failure on member
    /// N leaves members 1..N-1 committed; no rollback is attempted.
    pub async fn add_documents(
        &self,
        batch: Vec<(String, Document)>,
        index_path: impl AsRef<Path>,
    ) -> Result<Duration, SearchdexError> {
        let inner = Arc::clone(&self.inner);
        let path = index_path.as_ref().to_path_buf();
        self.pipeline
            .submit(move || inner.index_batch(&path, batch))
            .await
    }

    /// Delete the document stored under `doc_id`
    ///
    /// Deleting an id that matches nothing still succeeds; a missing index
    /// is an error. Returns the elapsed execution time.
    pub async fn delete_document(
        &self,
        doc_id: impl Into<String>,
        index_path: impl AsRef<Path>,
    ) -> Result<Duration, SearchdexError> {
        let inner = Arc::clone(&self.inner);
        let path = index_path.as_ref().to_path_buf();
        let doc_id = doc_id.into();
        self.pipeline
            .submit(move || inner.delete_by_term(&path, TermKey::Id, &doc_id))
            .await
    }

    /// Delete every document whose `_type` field equals `type_value`
    pub async fn delete_documents_by_type(
        &self,
        type_value: impl Into<String>,
        index_path: impl AsRef<Path>,
    ) -> Result<Duration, SearchdexError> {
        let inner = Arc::clone(&self.inner);
        let path = index_path.as_ref().to_path_buf();
        let type_value = type_value.into();
        self.pipeline
            .submit(move || inner.delete_by_term(&path, TermKey::DocType, &type_value))
            .await
    }

    /// Execute `query_text` against the index at `index_path`
    ///
    /// Hits are ordered by descending relevance score with stable ties and
    /// carry a copy of every stored field. The reader cache entry for the
    /// path is evicted afterwards so every search revalidates freshness.
    pub async fn search(
        &self,
        index_path: impl AsRef<Path>,
        query_text: impl Into<String>,
    ) -> Result<SearchResponse, SearchdexError> {
        let inner = Arc::clone(&self.inner);
        let path = index_path.as_ref().to_path_buf();
        let query_text = query_text.into();
        self.pipeline
            .submit(move || inner.run_search(&path, &query_text))
            .await
    }

    /// Merge the index's segments to improve subsequent read performance
    ///
    /// Exclusive with every other writer-path task for the same path.
    pub async fn optimize(&self, index_path: impl AsRef<Path>) -> Result<(), SearchdexError> {
        let inner = Arc::clone(&self.inner);
        let path = index_path.as_ref().to_path_buf();
        self.pipeline
            .submit(move || inner.optimize_index(&path))
            .await
    }

    /// Number of live documents in the index; 0 when no index exists yet
    pub async fn document_count(
        &self,
        index_path: impl AsRef<Path>,
    ) -> Result<DocumentCount, SearchdexError> {
        let inner = Arc::clone(&self.inner);
        let path = index_path.as_ref().to_path_buf();
        self.pipeline
            .submit(move || inner.count_documents(&path))
            .await
    }

    /// Flush and release every cached writer, e.g. at process shutdown
    ///
    /// Subsequent mutations reopen their writer lazily.
    pub async fn close_writer(&self) -> Result<(), SearchdexError> {
        let inner = Arc::clone(&self.inner);
        self.pipeline.submit(move || inner.close_writers()).await
    }
}

impl ManagerInner {
    /// Apply an ordered batch of (id, document) pairs to one index
    fn index_batch(
        &self,
        path: &Path,
        mut batch: Vec<(String, Document)>,
    ) -> Result<Duration, SearchdexError> {
        let session = self.registry.session(path);
        let mut state = session.lock();
        state.ensure_writer(self.config.writer_heap_bytes)?;

        let start = Instant::now();
        let outcome = Self::apply_batch(&mut state, &mut batch);
        state.evict_reader();
        outcome?;

        let elapsed = start.elapsed();
        debug!(
            path = %path.display(),
            documents = batch.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "indexed batch"
        );
        Ok(elapsed)
    }

    fn apply_batch(
        state: &mut SessionState,
        batch: &mut [(String, Document)],
    ) -> Result<(), SearchdexError> {
        let (index, writer) = state.writer_parts()?;
        let schema = IndexSchema::for_index(index)?;

        let mut failure = None;
        for (doc_id, document) in batch.iter_mut() {
            document.remove_fields(ID_FIELD);
            if let Err(err) = engine::update_document(writer, &schema, doc_id, document) {
                failure = Some(err);
                break;
            }
        }

        // members applied before a failure stay committed
        let committed = writer.commit();
        if let Some(err) = failure {
            return Err(err);
        }
        committed.map_err(SearchdexError::unknown)?;
        Ok(())
    }

    /// Delete every document matching one exact term
    fn delete_by_term(
        &self,
        path: &Path,
        key: TermKey,
        value: &str,
    ) -> Result<Duration, SearchdexError> {
        let session = self.registry.session(path);
        let mut state = session.lock();

        if !engine::index_exists(state.path()) {
            return Err(missing_index(state.path()));
        }
        state.ensure_writer(self.config.writer_heap_bytes)?;

        let start = Instant::now();
        let outcome = Self::apply_delete(&mut state, key, value);
        state.evict_reader();
        outcome?;

        let elapsed = start.elapsed();
        debug!(
            path = %path.display(),
            term = value,
            elapsed_ms = elapsed.as_millis() as u64,
            "deleted documents by term"
        );
        Ok(elapsed)
    }

    fn apply_delete(
        state: &mut SessionState,
        key: TermKey,
        value: &str,
    ) -> Result<(), SearchdexError> {
        let (index, writer) = state.writer_parts()?;
        let schema = IndexSchema::for_index(index)?;
        engine::delete_documents(writer, &schema, key, value);
        writer.commit().map_err(SearchdexError::unknown)?;
        Ok(())
    }

    /// Parse and execute a query, projecting hits into scored documents
    fn run_search(&self, path: &Path, query_text: &str) -> Result<SearchResponse, SearchdexError> {
        let session = self.registry.session(path);
        let mut state = session.lock();

        let start = Instant::now();
        let outcome = self.execute_query(&mut state, query_text);
        state.evict_reader();
        let hits = outcome?;

        let elapsed = start.elapsed();
        debug!(
            path = %path.display(),
            query = query_text,
            hits = hits.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "executed search"
        );
        Ok(SearchResponse { hits, elapsed })
    }

    fn execute_query(
        &self,
        state: &mut SessionState,
        query_text: &str,
    ) -> Result<Vec<ScoredDocument>, SearchdexError> {
        let reader = state.acquire_reader()?;
        let index = state.index()?;
        let schema = IndexSchema::for_index(index)?;
        engine::search(
            index,
            &reader,
            &schema,
            query_text,
            self.config.max_search_hits,
        )
    }

    /// Merge all segments through a transient writer
    fn optimize_index(&self, path: &Path) -> Result<(), SearchdexError> {
        let session = self.registry.session(path);
        let mut state = session.lock();

        state.evict_reader();
        // the engine permits one live writer per directory, so the cached
        // writer must be flushed and released before the transient one opens
        state.close_writer()?;

        let exists = engine::index_exists(state.path());
        if exists && engine::is_locked(state.path()) {
            engine::unlock(state.path())?;
        }
        let index = state.ensure_index(!exists)?;
        engine::optimize(index, self.config.writer_heap_bytes)?;

        info!(path = %path.display(), "optimized index");
        Ok(())
    }

    /// Count live documents; a missing index counts as empty
    fn count_documents(&self, path: &Path) -> Result<DocumentCount, SearchdexError> {
        let session = self.registry.session(path);
        let mut state = session.lock();

        let start = Instant::now();
        if !engine::index_exists(state.path()) {
            return Ok(DocumentCount {
                count: 0,
                elapsed: start.elapsed(),
            });
        }

        let outcome = state.acquire_reader().map(|reader| engine::num_docs(&reader));
        state.evict_reader();
        let count = outcome?;

        Ok(DocumentCount {
            count,
            elapsed: start.elapsed(),
        })
    }

    /// Flush and drop every cached writer
    fn close_writers(&self) -> Result<(), SearchdexError> {
        for session in self.registry.sessions() {
            session.lock().close_writer()?;
        }
        Ok(())
    }
}

fn missing_index(path: &Path) -> SearchdexError {
    SearchdexError::Open(format!("index does not exist: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::FieldFlags;
    use tempfile::TempDir;

    fn titled(title: &str) -> Document {
        let mut doc = Document::new();
        doc.add_field("title", title, FieldFlags::fulltext());
        doc
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_add_then_search_by_id() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("idx");
        let manager = SearchManager::new().unwrap();

        manager
            .add_document("doc-1", titled("hello world"), &path)
            .await
            .unwrap();

        let response = manager.search(&path, "doc-1").await.unwrap();
        assert_eq!(response.hits.len(), 1);
        assert_eq!(response.hits[0].id(), Some("doc-1"));
        assert_eq!(response.hits[0].field("title"), Some("hello world"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_search_missing_index_is_open_error() {
        let temp_dir = TempDir::new().unwrap();
        let manager = SearchManager::new().unwrap();

        let err = manager
            .search(temp_dir.path().join("absent"), "anything")
            .await
            .unwrap_err();
        assert!(matches!(err, SearchdexError::Open(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delete_on_missing_index_is_open_error() {
        let temp_dir = TempDir::new().unwrap();
        let manager = SearchManager::new().unwrap();

        let err = manager
            .delete_document("doc-1", temp_dir.path().join("absent"))
            .await
            .unwrap_err();
        assert!(matches!(err, SearchdexError::Open(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_malformed_query_is_parse_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("idx");
        let manager = SearchManager::new().unwrap();

        manager
            .add_document("doc-1", titled("hello"), &path)
            .await
            .unwrap();

        let err = manager.search(&path, "hello AND").await.unwrap_err();
        assert!(matches!(err, SearchdexError::QueryParse(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_close_writer_then_mutate_reopens_lazily() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("idx");
        let manager = SearchManager::new().unwrap();

        manager
            .add_document("doc-1", titled("first"), &path)
            .await
            .unwrap();
        manager.close_writer().await.unwrap();
        manager
            .add_document("doc-2", titled("second"), &path)
            .await
            .unwrap();

        let count = manager.document_count(&path).await.unwrap();
        assert_eq!(count.count, 2);
    }
}
