//! Ground truth for lookups and the randomized read order derived from it.

use std::collections::HashMap;
use std::path::Path;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::corpus;
use crate::error::Result;
use crate::key_view::view_bytes;

/// Key to value mapping built from one full pass over the corpus.
///
/// Keys are unique; a key that appears more than once in the corpus maps to
/// the value of its last occurrence.
#[derive(Debug, Clone, Default)]
pub struct Oracle {
    map: HashMap<String, String>,
}

impl Oracle {
    /// Create an empty oracle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the oracle from the corpus at `path`.
    pub fn from_corpus(path: impl AsRef<Path>) -> Result<Self> {
        let mut oracle = Self::new();
        corpus::stream(path, |record| {
            oracle.insert(record.key_str()?, record.value_str()?);
            Ok(())
        })?;
        Ok(oracle)
    }

    /// Insert a record, replacing any earlier value for the same key.
    pub fn insert(&mut self, key: &str, value: &str) {
        match self.map.get_mut(key) {
            Some(existing) => {
                existing.clear();
                existing.push_str(value);
            }
            None => {
                self.map.insert(key.to_string(), value.to_string());
            }
        }
    }

    /// Expected value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterate over all records in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// One benchmark read target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Entry {
    pub key: String,
    pub value: String,
}

impl Entry {
    /// The key as bytes, without copying.
    pub fn key_bytes(&self) -> &[u8] {
        view_bytes(&self.key)
    }
}

/// Capture the oracle as a shuffled list of entries.
///
/// The order is an explicit random permutation, so it matches neither corpus
/// order (which favors backends laid out in insertion order) nor the map's
/// iteration order. Entries are put in key order before shuffling, so a seed
/// reproduces the same permutation across processes.
pub fn sample_entries(oracle: &Oracle, seed: Option<u64>) -> Vec<Entry> {
    let mut entries: Vec<Entry> = oracle
        .iter()
        .map(|(key, value)| Entry {
            key: key.to_string(),
            value: value.to_string(),
        })
        .collect();

    entries.sort_unstable_by(|a, b| a.key.cmp(&b.key));
    entries.shuffle(&mut seeded_rng(seed));
    entries
}

/// RNG seeded from `seed`, or from the OS when `None`.
pub(crate) fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}
