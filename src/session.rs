//! Index session registry
//!
//! Owns the mapping from index path to [`Session`] and applies the
//! create/reopen/close protocol around the cached directory, reader, and
//! writer handles. Each session's state sits behind its own mutex, held for
//! the full duration of any engine operation on that path, so acquisition,
//! reopen, eviction, and close are atomic per path and at most one writer is
//! ever live for an index. The mutexes are only locked from worker tasks,
//! never on the async control threads.

use crate::engine;
use crate::error::SearchdexError;
use parking_lot::{Mutex, MutexGuard};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tantivy::{Index, IndexReader, IndexWriter, TantivyDocument};
use tracing::{debug, warn};

/// Per-path cache of open sessions
pub(crate) struct SessionRegistry {
    sessions: Mutex<HashMap<PathBuf, Arc<Session>>>,
}

impl SessionRegistry {
    pub(crate) fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Look up or create the session for `path`
    pub(crate) fn session(&self, path: &Path) -> Arc<Session> {
        let key = normalize(path);
        let mut sessions = self.sessions.lock();
        Arc::clone(
            sessions
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Session::new(key))),
        )
    }

    /// Snapshot of every open session
    pub(crate) fn sessions(&self) -> Vec<Arc<Session>> {
        self.sessions.lock().values().cloned().collect()
    }
}

/// Lexical normalization; the path is the unit of resource sharing, so two
/// spellings of the same directory must map to one key
fn normalize(path: &Path) -> PathBuf {
    path.components().collect()
}

/// One open index: cached directory handle plus optional reader and writer
pub(crate) struct Session {
    state: Mutex<SessionState>,
}

impl Session {
    fn new(path: PathBuf) -> Self {
        Self {
            state: Mutex::new(SessionState {
                path,
                index: None,
                reader: None,
                writer: None,
            }),
        }
    }

    /// Take exclusive ownership of the session for one engine operation
    pub(crate) fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock()
    }
}

/// Mutable resources of a session; only reachable through [`Session::lock`]
pub(crate) struct SessionState {
    path: PathBuf,
    index: Option<Index>,
    reader: Option<IndexReader>,
    writer: Option<IndexWriter<TantivyDocument>>,
}

impl SessionState {
    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Open (or return the cached) directory handle for this path
    pub(crate) fn ensure_index(&mut self, create_if_missing: bool) -> Result<&Index, SearchdexError> {
        match self.index.take() {
            Some(index) => Ok(&*self.index.insert(index)),
            None => {
                let index = engine::open_index(&self.path, create_if_missing)?;
                debug!(path = %self.path.display(), "opened index directory");
                Ok(&*self.index.insert(index))
            }
        }
    }

    /// Cached directory handle; an error if nothing has been opened yet
    pub(crate) fn index(&self) -> Result<&Index, SearchdexError> {
        self.index
            .as_ref()
            .ok_or_else(|| SearchdexError::unknown("index handle requested before open"))
    }

    /// Acquire a reader over the index's current committed state
    ///
    /// A cached reader is revalidated against the index before reuse, so a
    /// reader whose segments were superseded by a writer commit never serves
    /// stale results.
    pub(crate) fn acquire_reader(&mut self) -> Result<IndexReader, SearchdexError> {
        if let Some(reader) = &self.reader {
            reader.reload().map_err(SearchdexError::open)?;
            debug!(path = %self.path.display(), "reopened cached reader");
            return Ok(reader.clone());
        }
        let index = self.ensure_index(false)?;
        let reader = engine::open_reader(index)?;
        debug!(path = %self.path.display(), "opened fresh reader");
        Ok(self.reader.insert(reader).clone())
    }

    /// Close and evict the cached reader; a no-op when none is cached
    ///
    /// Called after every mutation and search so the next acquisition
    /// observes post-mutation state instead of an arbitrarily stale cache.
    pub(crate) fn evict_reader(&mut self) {
        if self.reader.take().is_some() {
            debug!(path = %self.path.display(), "evicted cached reader");
        }
    }

    /// Open (or keep) the path's single cached writer
    ///
    /// Creates a brand-new index when none exists, and clears a lock file
    /// left behind by a crashed writer before opening.
    pub(crate) fn ensure_writer(&mut self, heap_bytes: usize) -> Result<(), SearchdexError> {
        if self.writer.is_some() {
            return Ok(());
        }
        let exists = engine::index_exists(&self.path);
        if exists && engine::is_locked(&self.path) {
            warn!(path = %self.path.display(), "clearing leftover writer lock");
            engine::unlock(&self.path)?;
        }
        let index = self.ensure_index(!exists)?;
        let writer = engine::open_writer(index, heap_bytes)?;
        debug!(path = %self.path.display(), "opened index writer");
        self.writer = Some(writer);
        Ok(())
    }

    /// Cached directory and writer handles for a mutation
    pub(crate) fn writer_parts(
        &mut self,
    ) -> Result<(&Index, &mut IndexWriter<TantivyDocument>), SearchdexError> {
        match (self.index.as_ref(), self.writer.as_mut()) {
            (Some(index), Some(writer)) => Ok((index, writer)),
            _ => Err(SearchdexError::unknown(
                "writer requested before acquisition",
            )),
        }
    }

    /// Flush and close the cached writer; the next mutation reopens it lazily
    pub(crate) fn close_writer(&mut self) -> Result<(), SearchdexError> {
        if let Some(mut writer) = self.writer.take() {
            writer.commit().map_err(SearchdexError::unknown)?;
            writer
                .wait_merging_threads()
                .map_err(SearchdexError::unknown)?;
            debug!(path = %self.path.display(), "closed index writer");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_registry_returns_same_session_for_same_path() {
        let registry = SessionRegistry::new();
        let a = registry.session(Path::new("/tmp/idx"));
        let b = registry.session(Path::new("/tmp/idx/"));
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_registry_separates_distinct_paths() {
        let registry = SessionRegistry::new();
        let a = registry.session(Path::new("/tmp/idx-a"));
        let b = registry.session(Path::new("/tmp/idx-b"));
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(registry.sessions().len(), 2);
    }

    #[test]
    fn test_acquire_reader_on_missing_index_fails() {
        let temp_dir = TempDir::new().unwrap();
        let registry = SessionRegistry::new();
        let session = registry.session(&temp_dir.path().join("nope"));

        let err = session.lock().acquire_reader().err().unwrap();
        assert!(matches!(err, SearchdexError::Open(_)));
    }

    #[test]
    fn test_writer_creates_missing_index() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("fresh");
        let registry = SessionRegistry::new();
        let session = registry.session(&path);

        let mut state = session.lock();
        state.ensure_writer(15_000_000).unwrap();
        assert!(engine::index_exists(&path));

        // second call reuses the cached writer
        state.ensure_writer(15_000_000).unwrap();
        state.close_writer().unwrap();
    }

    #[test]
    fn test_reader_survives_reacquisition_and_eviction() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("idx");
        let registry = SessionRegistry::new();
        let session = registry.session(&path);

        let mut state = session.lock();
        state.ensure_writer(15_000_000).unwrap();
        state.close_writer().unwrap();

        let first = state.acquire_reader().unwrap();
        let second = state.acquire_reader().unwrap();
        assert_eq!(
            engine::num_docs(&first),
            engine::num_docs(&second)
        );

        state.evict_reader();
        state.evict_reader(); // idempotent
        state.acquire_reader().unwrap();
    }
}
