//! Setup shared by the bench binaries.

#![allow(dead_code)]

use std::path::PathBuf;

use kvbench::fixtures::{ensure_corpus, Scale};
use kvbench::{session, BenchConfig, Session};

/// Corpus read by every bench, generated on first use.
pub const CORPUS_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/testdata.large");

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kvbench=info".into()),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

/// Session configuration for the bench corpus.
pub fn config() -> BenchConfig {
    let path = PathBuf::from(CORPUS_PATH);
    if let Err(e) = ensure_corpus(&path, Scale::Medium) {
        panic!("cannot prepare corpus {}: {e}", path.display());
    }
    BenchConfig::new(path)
}

/// The process-wide session, loaded from `config` on first call.
pub fn session(config: &BenchConfig) -> &'static Session {
    match session::global().get_or_load(config) {
        Ok(session) => session,
        Err(e) => panic!("benchmark setup failed: {e}"),
    }
}
