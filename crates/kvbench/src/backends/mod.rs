//! Storage backends under comparison.
//!
//! Every backend is driven through the same two-phase contract: a
//! [`TableBuilder`] accepts `put` calls and is finalized into a read-only
//! [`TableReader`]. The driver only ever sees these traits, so timings are
//! comparable across engines with very different layouts.

pub mod indexed_log;
pub mod memory;
pub mod redb;
pub mod sled;

use std::fmt;
use std::ops::Deref;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::corpus;
use crate::error::{Error, Result};
use crate::scratch::Scratch;

pub use self::indexed_log::{IndexedLogBuilder, IndexedLogReader};
pub use self::memory::{MemoryBuilder, MemoryReader};
pub use self::redb::{RedbBuilder, RedbReader};
pub use self::sled::{SledBuilder, SledReader};

/// Write side of a backend.
pub trait TableBuilder: Send {
    /// Add a record. A later `put` for the same key replaces the earlier one.
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Flush everything and switch to the read phase.
    ///
    /// Calling `put` or `finalize` again afterwards fails with
    /// [`Error::Finalized`].
    fn finalize(&mut self) -> Result<Box<dyn TableReader>>;
}

/// Read side of a backend. Must tolerate concurrent `get` calls.
pub trait TableReader: Send + Sync {
    /// Look up `key`. `None` means the key is not stored.
    fn get(&self, key: &[u8]) -> Result<Option<Value<'_>>>;

    /// Number of distinct keys stored.
    fn len(&self) -> Result<u64>;
}

/// A value returned by [`TableReader::get`].
///
/// Backends hand out whatever is cheapest for them: a slice into their own
/// memory, a reference-counted buffer, or an owned copy. Engine-specific
/// buffer types are converted inside the adapter.
#[derive(Debug, Clone)]
pub enum Value<'a> {
    Borrowed(&'a [u8]),
    Shared(Arc<[u8]>),
    Owned(Vec<u8>),
}

impl Deref for Value<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Value::Borrowed(bytes) => bytes,
            Value::Shared(bytes) => bytes,
            Value::Owned(bytes) => bytes,
        }
    }
}

impl AsRef<[u8]> for Value<'_> {
    fn as_ref(&self) -> &[u8] {
        self
    }
}

/// The backends this harness knows how to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Append-only data log with a separate open-addressing hash index file.
    IndexedLog,
    /// sled, a log-structured embedded store.
    Sled,
    /// sled with on-the-fly block compression.
    SledCompressed,
    /// redb, a single-file copy-on-write B-tree, built once and then read.
    Redb,
    /// In-process hash map.
    Memory,
}

impl BackendKind {
    /// All backends, in reporting order.
    pub const ALL: [BackendKind; 5] = [
        BackendKind::IndexedLog,
        BackendKind::Sled,
        BackendKind::SledCompressed,
        BackendKind::Redb,
        BackendKind::Memory,
    ];

    /// Stable name used in benchmark ids, logs and the CLI.
    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::IndexedLog => "indexed-log",
            BackendKind::Sled => "sled",
            BackendKind::SledCompressed => "sled-compressed",
            BackendKind::Redb => "redb",
            BackendKind::Memory => "memory",
        }
    }

    /// Whether the backend writes files and needs a scratch directory.
    pub fn is_persistent(&self) -> bool {
        !matches!(self, BackendKind::Memory)
    }

    /// Start a build. `scratch` must be provided for persistent backends.
    pub fn builder(&self, scratch: Option<&Scratch>) -> Result<Box<dyn TableBuilder>> {
        let scratch = match (self.is_persistent(), scratch) {
            (false, _) => return Ok(Box::new(MemoryBuilder::new())),
            (true, Some(scratch)) => scratch,
            (true, None) => {
                return Err(Error::Config(format!(
                    "backend {} needs a scratch directory",
                    self.name()
                )))
            }
        };

        let builder: Box<dyn TableBuilder> = match self {
            BackendKind::IndexedLog => {
                Box::new(IndexedLogBuilder::create(scratch.path("table.data"))?)
            }
            BackendKind::Sled => Box::new(SledBuilder::create(scratch.path("table.sled"), false)?),
            BackendKind::SledCompressed => {
                Box::new(SledBuilder::create(scratch.path("table.sled"), true)?)
            }
            BackendKind::Redb => Box::new(RedbBuilder::create(scratch.path("table.redb"))?),
            BackendKind::Memory => Box::new(MemoryBuilder::new()),
        };
        Ok(builder)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        BackendKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| Error::Config(format!("unknown backend: {s}")))
    }
}

/// A finalized backend together with the files backing it.
///
/// Dropping the table closes the backend and then removes its scratch
/// directory.
pub struct Table {
    kind: BackendKind,
    // Declared before `scratch` so the backend is closed before its files go.
    reader: Box<dyn TableReader>,
    scratch: Option<Scratch>,
}

impl Table {
    /// Build a table of `kind`, letting `fill` issue the `put` calls.
    ///
    /// On error the partially written files are removed before returning.
    pub fn build<F>(kind: BackendKind, scratch_root: Option<&Path>, fill: F) -> Result<Self>
    where
        F: FnOnce(&mut dyn TableBuilder) -> Result<()>,
    {
        let scratch = if kind.is_persistent() {
            Some(match scratch_root {
                Some(root) => Scratch::new_in(root, kind.name())?,
                None => Scratch::new(kind.name())?,
            })
        } else {
            None
        };

        let mut builder = kind.builder(scratch.as_ref())?;
        fill(builder.as_mut())?;
        let reader = builder.finalize()?;
        drop(builder);

        Ok(Self {
            kind,
            reader,
            scratch,
        })
    }

    /// Build a table of `kind` from every record of the corpus at `path`.
    pub fn from_corpus(kind: BackendKind, path: &Path, scratch_root: Option<&Path>) -> Result<Self> {
        let started = Instant::now();
        let mut records = 0;
        let table = Self::build(kind, scratch_root, |builder| {
            records = corpus::stream(path, |record| builder.put(record.key, record.value))?.records;
            Ok(())
        })?;

        tracing::debug!(
            backend = kind.name(),
            records,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "table built"
        );
        Ok(table)
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Look up `key`.
    #[inline]
    pub fn get(&self, key: &[u8]) -> Result<Option<Value<'_>>> {
        self.reader.get(key)
    }

    /// Number of distinct keys stored.
    pub fn len(&self) -> Result<u64> {
        self.reader.len()
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Scratch directory backing the table, if the backend is persistent.
    pub fn scratch(&self) -> Option<&Scratch> {
        self.scratch.as_ref()
    }

    /// Remove the backing files now instead of on drop.
    pub fn purge(&self) {
        if let Some(scratch) = &self.scratch {
            scratch.purge();
        }
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("kind", &self.kind)
            .field("scratch", &self.scratch)
            .finish_non_exhaustive()
    }
}
