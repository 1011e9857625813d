//! Execute-once benchmark setup.
//!
//! Building the oracle and every backend table is expensive, and every
//! read benchmark wants the same state. [`SessionCell`] runs the setup the
//! first time it is asked and hands out the same [`Session`] afterwards.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use once_cell::sync::OnceCell;

use crate::backends::{BackendKind, Table};
use crate::config::BenchConfig;
use crate::error::Result;
use crate::oracle::{sample_entries, Entry, Oracle};

/// Shared, read-only state for a benchmark process.
#[derive(Debug)]
pub struct Session {
    oracle: Oracle,
    entries: Vec<Entry>,
    tables: Vec<Table>,
}

impl Session {
    /// Stream the corpus into the oracle, sample entries, and build one table
    /// per configured backend.
    pub fn load(config: &BenchConfig) -> Result<Self> {
        config.validate()?;
        let path = config.corpus_path.as_path();

        let started = Instant::now();
        let oracle = Oracle::from_corpus(path)?;
        tracing::info!(
            path = %path.display(),
            records = oracle.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "corpus streamed"
        );

        let entries = sample_entries(&oracle, config.seed);

        let mut tables = Vec::with_capacity(config.backends.len());
        for &kind in &config.backends {
            let started = Instant::now();
            let table = Table::from_corpus(kind, path, config.scratch_root())?;
            tracing::info!(
                backend = kind.name(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "build done"
            );
            tables.push(table);
        }

        Ok(Self {
            oracle,
            entries,
            tables,
        })
    }

    pub fn oracle(&self) -> &Oracle {
        &self.oracle
    }

    /// The oracle as a shuffled list of read targets.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Tables in configuration order.
    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    /// The table for `kind`, if it was configured.
    pub fn table(&self, kind: BackendKind) -> Option<&Table> {
        self.tables.iter().find(|table| table.kind() == kind)
    }

    /// Remove every table's backing files.
    ///
    /// A session held in a static is never dropped, so binaries call this
    /// before exiting, usually through [`SessionCell::release_on_drop`].
    /// The tables must not be read afterwards.
    pub fn release(&self) {
        for table in &self.tables {
            table.purge();
        }
        tracing::debug!(tables = self.tables.len(), "session released");
    }
}

/// Lazily initialized holder for a [`Session`].
///
/// Concurrent first calls block until one of them has finished loading. A
/// failed load leaves the cell empty.
#[derive(Debug, Default)]
pub struct SessionCell {
    cell: OnceCell<Session>,
    loads: AtomicUsize,
}

impl SessionCell {
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::new(),
            loads: AtomicUsize::new(0),
        }
    }

    /// The session, loading it from `config` on first use.
    ///
    /// Later calls return the existing session and ignore `config`.
    pub fn get_or_load(&self, config: &BenchConfig) -> Result<&Session> {
        self.cell.get_or_try_init(|| {
            let session = Session::load(config)?;
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(session)
        })
    }

    /// The session, if it has been loaded.
    pub fn get(&self) -> Option<&Session> {
        self.cell.get()
    }

    /// Number of completed loads. Never more than one.
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Guard that releases the session, if one was loaded, when it goes out
    /// of scope. Dropping during a panic unwind releases too.
    pub fn release_on_drop(&self) -> ReleaseGuard<'_> {
        ReleaseGuard { cell: self }
    }
}

/// Releases a [`SessionCell`]'s session on drop.
#[must_use = "the session is released when the guard is dropped"]
#[derive(Debug)]
pub struct ReleaseGuard<'a> {
    cell: &'a SessionCell,
}

impl Drop for ReleaseGuard<'_> {
    fn drop(&mut self) {
        if let Some(session) = self.cell.get() {
            session.release();
        }
    }
}

static GLOBAL: SessionCell = SessionCell::new();

/// Process-wide session cell.
pub fn global() -> &'static SessionCell {
    &GLOBAL
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::write_corpus;

    fn config(dir: &tempfile::TempDir) -> BenchConfig {
        let corpus = dir.path().join("corpus");
        write_corpus(&corpus, 200, 11).unwrap();
        BenchConfig::new(corpus)
            .with_backends([BackendKind::IndexedLog, BackendKind::Memory])
            .with_seed(5)
            .with_scratch_root(dir.path())
    }

    #[test]
    fn test_loads_once() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        let cell = SessionCell::new();
        assert!(cell.get().is_none());

        let first = cell.get_or_load(&config).unwrap() as *const Session;
        let second = cell.get_or_load(&config).unwrap() as *const Session;
        assert_eq!(first, second);
        assert_eq!(cell.loads(), 1);
    }

    #[test]
    fn test_concurrent_first_use() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        let cell = SessionCell::new();

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| cell.get_or_load(&config).unwrap());
            }
        });
        assert_eq!(cell.loads(), 1);
    }

    #[test]
    fn test_session_contents() {
        let dir = tempfile::tempdir().unwrap();
        let cell = SessionCell::new();
        let session = cell.get_or_load(&config(&dir)).unwrap();

        assert_eq!(session.entries().len(), session.oracle().len());
        assert_eq!(session.tables().len(), 2);
        assert!(session.table(BackendKind::Redb).is_none());
        let table = session.table(BackendKind::IndexedLog).unwrap();
        assert_eq!(table.len().unwrap(), session.oracle().len() as u64);
    }

    #[test]
    fn test_failed_load_leaves_cell_empty() {
        let dir = tempfile::tempdir().unwrap();
        let config = BenchConfig::new(dir.path().join("missing"));
        let cell = SessionCell::new();

        assert!(cell.get_or_load(&config).is_err());
        assert!(cell.get().is_none());
        assert_eq!(cell.loads(), 0);
    }

    #[test]
    fn test_release_removes_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        let cell = SessionCell::new();
        let session = cell.get_or_load(&config).unwrap();

        let root = session
            .table(BackendKind::IndexedLog)
            .and_then(Table::scratch)
            .map(|scratch| scratch.root().to_path_buf())
            .unwrap();
        assert!(root.exists());
        session.release();
        assert!(!root.exists());
    }

    #[test]
    fn test_guard_releases_on_panic() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        let cell = SessionCell::new();
        let mut root = None;

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _release = cell.release_on_drop();
            let session = cell.get_or_load(&config).unwrap();
            root = session
                .table(BackendKind::IndexedLog)
                .and_then(Table::scratch)
                .map(|scratch| scratch.root().to_path_buf());
            panic!("bad data or lookup");
        }));

        assert!(result.is_err());
        let root = root.unwrap();
        assert!(!root.exists());
    }

    #[test]
    fn test_guard_without_session() {
        let cell = SessionCell::new();
        drop(cell.release_on_drop());
        assert!(cell.get().is_none());
    }
}
