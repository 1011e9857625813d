//! Corpus generation for benchmarks and tests.
//!
//! Generated corpora are deterministic for a given count and seed, so runs on
//! different machines measure the same data.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::Result;

/// Seed used by [`ensure_corpus`].
pub const DEFAULT_SEED: u64 = 0x6b76_6265_6e63_6821;

/// One record in this many repeats an earlier key with a new value.
const DUPLICATE_EVERY: usize = 50;

/// Size of a generated corpus.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Scale {
    /// A few hundred records, for unit tests.
    Tiny,
    /// Quick local iteration.
    Small,
    #[default]
    Medium,
    /// Close to a realistic production corpus.
    Large,
}

impl Scale {
    /// Number of records written for this scale.
    pub fn count(&self) -> usize {
        match self {
            Scale::Tiny => 200,
            Scale::Small => 10_000,
            Scale::Medium => 100_000,
            Scale::Large => 1_000_000,
        }
    }
}

/// Write `count` `key:value` records to `path`, replacing any existing file.
///
/// Keys are zero-padded counters with a random suffix; values are 16 to 128
/// alphanumeric characters. One record in fifty reuses an earlier key, so
/// the corpus holds fewer distinct keys than records.
pub fn write_corpus(path: impl AsRef<Path>, count: usize, seed: u64) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = BufWriter::new(File::create(path.as_ref())?);
    let mut keys: Vec<String> = Vec::with_capacity(count);

    for i in 0..count {
        let key = if i > 0 && i % DUPLICATE_EVERY == 0 {
            keys[rng.gen_range(0..keys.len())].clone()
        } else {
            let key = format!("key{i:08}-{}", random_string(&mut rng, 8));
            keys.push(key.clone());
            key
        };
        let len = rng.gen_range(16..=128);
        writeln!(out, "{key}:{}", random_string(&mut rng, len))?;
    }

    out.flush()?;
    tracing::debug!(path = %path.as_ref().display(), records = count, seed, "corpus written");
    Ok(())
}

/// Generate a corpus of `scale` at `path` unless a file is already there.
///
/// Returns whether a new corpus was written.
pub fn ensure_corpus(path: impl AsRef<Path>, scale: Scale) -> Result<bool> {
    let path = path.as_ref();
    if path.exists() {
        return Ok(false);
    }
    tracing::info!(path = %path.display(), records = scale.count(), "generating corpus");
    write_corpus(path, scale.count(), DEFAULT_SEED)?;
    Ok(true)
}

fn random_string(rng: &mut StdRng, len: usize) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
