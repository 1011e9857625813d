//! Harness error types.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the harness.
pub type Result<T> = std::result::Result<T, Error>;

/// Harness errors.
///
/// Everything except [`Error::BadLookup`] is a setup or backend failure: the
/// fixture is unusable and the run stops. `BadLookup` is a correctness
/// violation detected by the driver while measuring.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error outside of corpus streaming.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The corpus file could not be opened.
    #[error("cannot open corpus {}: {source}", path.display())]
    CorpusOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A read failed part way through the corpus.
    #[error("corpus read failed at line {line}: {source}")]
    CorpusRead {
        line: u64,
        #[source]
        source: std::io::Error,
    },

    /// A corpus line has no `:` delimiter or an empty key.
    #[error("input file unexpected shape: line {line} is not a key:value record")]
    MalformedRecord { line: u64 },

    /// A corpus record is not valid UTF-8.
    #[error("input file unexpected shape: line {line} is not valid UTF-8")]
    InvalidUtf8 { line: u64 },

    /// `put` or `finalize` called on a builder that was already finalized.
    #[error("backend already finalized: {backend}")]
    Finalized { backend: &'static str },

    /// sled error.
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    /// redb error.
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    /// The indexed-log table files do not have the expected layout.
    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    /// A key known to the oracle was missing or returned the wrong value.
    #[error("bad data or lookup: backend {backend}, key {key:?}")]
    BadLookup { backend: &'static str, key: String },

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}
