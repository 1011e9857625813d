//! Benchmark session configuration.

use std::path::{Path, PathBuf};

use crate::backends::BackendKind;
use crate::error::{Error, Result};

/// Default corpus location, relative to the working directory.
pub const DEFAULT_CORPUS_PATH: &str = "testdata.large";

/// Number of read workers used when none is configured.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|count| count.get())
        .unwrap_or(4)
        .max(1)
}

/// Configuration for one benchmark session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchConfig {
    /// Corpus file with one `key:value` record per line.
    pub corpus_path: PathBuf,

    /// Backends to build, in reporting order.
    pub backends: Vec<BackendKind>,

    /// Parallel workers for read benchmarks.
    pub workers: usize,

    /// Seed for the entry shuffle and worker start offsets. `None` draws
    /// from the OS.
    pub seed: Option<u64>,

    /// Parent directory for table scratch directories. `None` uses the
    /// system temp dir.
    pub scratch_root: Option<PathBuf>,
}

impl BenchConfig {
    /// Configuration for the corpus at `corpus_path` with every backend.
    pub fn new(corpus_path: impl Into<PathBuf>) -> Self {
        Self {
            corpus_path: corpus_path.into(),
            backends: BackendKind::ALL.to_vec(),
            workers: default_workers(),
            seed: None,
            scratch_root: None,
        }
    }

    /// Restrict the session to `backends`.
    pub fn with_backends(mut self, backends: impl IntoIterator<Item = BackendKind>) -> Self {
        self.backends = backends.into_iter().collect();
        self
    }

    /// Set the number of read workers.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Make the read order reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Put scratch directories under `root`.
    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }

    /// Worker counts to measure: 1, powers of two below `workers`, and
    /// `workers` itself.
    pub fn worker_counts(&self) -> Vec<usize> {
        let mut counts = vec![1];
        let mut n = 2;
        while n < self.workers {
            counts.push(n);
            n *= 2;
        }
        if self.workers > 1 {
            counts.push(self.workers);
        }
        counts
    }

    pub fn scratch_root(&self) -> Option<&Path> {
        self.scratch_root.as_deref()
    }

    /// Check the configuration before any work starts.
    pub fn validate(&self) -> Result<()> {
        if self.backends.is_empty() {
            return Err(Error::Config("no backends selected".to_string()));
        }
        let mut seen = self.backends.clone();
        seen.sort();
        seen.dedup();
        if seen.len() != self.backends.len() {
            return Err(Error::Config("backend listed more than once".to_string()));
        }
        if self.workers == 0 {
            return Err(Error::Config("workers must be at least 1".to_string()));
        }
        Ok(())
    }
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CORPUS_PATH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BenchConfig::default();
        assert_eq!(config.corpus_path, PathBuf::from(DEFAULT_CORPUS_PATH));
        assert_eq!(config.backends, BackendKind::ALL.to_vec());
        assert!(config.workers >= 1);
        assert!(config.seed.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = BenchConfig::new("/data/corpus.txt")
            .with_backends([BackendKind::Memory, BackendKind::IndexedLog])
            .with_workers(0)
            .with_seed(42)
            .with_scratch_root("/tmp/scratch");

        assert_eq!(config.corpus_path, PathBuf::from("/data/corpus.txt"));
        assert_eq!(
            config.backends,
            vec![BackendKind::Memory, BackendKind::IndexedLog]
        );
        assert_eq!(config.workers, 1);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.scratch_root(), Some(Path::new("/tmp/scratch")));
    }

    #[test]
    fn test_worker_counts_follow_config() {
        let config = BenchConfig::default();
        assert_eq!(config.clone().with_workers(1).worker_counts(), vec![1]);
        assert_eq!(config.clone().with_workers(2).worker_counts(), vec![1, 2]);
        assert_eq!(config.clone().with_workers(6).worker_counts(), vec![1, 2, 4, 6]);
        assert_eq!(config.with_workers(8).worker_counts(), vec![1, 2, 4, 8]);
    }

    #[test]
    fn test_validate_rejects_bad_backends() {
        let empty = BenchConfig::default().with_backends([]);
        assert!(matches!(empty.validate(), Err(Error::Config(_))));

        let duplicate =
            BenchConfig::default().with_backends([BackendKind::Sled, BackendKind::Sled]);
        assert!(matches!(duplicate.validate(), Err(Error::Config(_))));
    }
}
