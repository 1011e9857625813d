//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use kvbench::config::{default_workers, DEFAULT_CORPUS_PATH};
use kvbench::fixtures::Scale;
use kvbench::{BackendKind, BenchConfig};

use crate::formatter::OutputFormat;

/// Oracle-verified point-lookup benchmarks for key-value backends.
#[derive(Parser, Debug)]
#[command(name = "kvbench")]
#[command(version, about = "Compare key-value backends on verified point lookups", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write a deterministic corpus file.
    Generate(GenerateArgs),
    /// Build every backend and verify it against the oracle.
    Check(CheckArgs),
    /// Run read (and optionally build) benchmarks.
    Run(RunArgs),
}

#[derive(ClapArgs, Debug)]
pub struct GenerateArgs {
    /// Output path.
    #[arg(short, long, default_value = DEFAULT_CORPUS_PATH)]
    pub output: PathBuf,

    /// Corpus size.
    #[arg(long, value_enum, default_value_t = ScaleArg::Medium)]
    pub scale: ScaleArg,

    /// Exact record count; overrides --scale.
    #[arg(long)]
    pub count: Option<usize>,

    /// Generator seed.
    #[arg(long, default_value_t = kvbench::fixtures::DEFAULT_SEED)]
    pub seed: u64,
}

impl GenerateArgs {
    pub fn count(&self) -> usize {
        self.count.unwrap_or_else(|| Scale::from(self.scale).count())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScaleArg {
    Tiny,
    Small,
    Medium,
    Large,
}

impl From<ScaleArg> for Scale {
    fn from(scale: ScaleArg) -> Self {
        match scale {
            ScaleArg::Tiny => Scale::Tiny,
            ScaleArg::Small => Scale::Small,
            ScaleArg::Medium => Scale::Medium,
            ScaleArg::Large => Scale::Large,
        }
    }
}

/// Options shared by commands that load a session.
#[derive(ClapArgs, Debug)]
pub struct SessionArgs {
    /// Corpus file with one key:value record per line.
    #[arg(short, long, default_value = DEFAULT_CORPUS_PATH)]
    pub corpus: PathBuf,

    /// Backends to include, comma separated (default: all).
    #[arg(short, long, value_delimiter = ',', value_parser = parse_backend)]
    pub backends: Vec<BackendKind>,

    /// Seed for the read order (default: random).
    #[arg(long)]
    pub seed: Option<u64>,

    /// Parent directory for scratch files (default: system temp dir).
    #[arg(long)]
    pub scratch_root: Option<PathBuf>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

impl SessionArgs {
    /// Convert to a session configuration with `workers` read workers.
    pub fn into_config(self, workers: usize) -> BenchConfig {
        let mut config = BenchConfig::new(self.corpus).with_workers(workers);
        if !self.backends.is_empty() {
            config = config.with_backends(self.backends);
        }
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        if let Some(root) = self.scratch_root {
            config = config.with_scratch_root(root);
        }
        config
    }
}

#[derive(ClapArgs, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    /// Keys known to be absent to look up per backend.
    #[arg(long, default_value_t = 10_000)]
    pub absent: usize,
}

#[derive(ClapArgs, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    /// Read workers, comma separated; each count is measured separately
    /// (0 = the session's configured parallelism).
    #[arg(short, long, value_delimiter = ',', default_value = "1,0")]
    pub workers: Vec<usize>,

    /// Reads per measurement.
    #[arg(long, default_value_t = 1_000_000)]
    pub ops: u64,

    /// Table builds per backend (0 = skip build benchmarks).
    #[arg(long, default_value_t = 0)]
    pub builds: u64,
}

impl RunArgs {
    /// Parallelism for the session: the largest explicit count, or the
    /// available parallelism when `0` is listed or nothing is.
    pub fn max_workers(&self) -> usize {
        self.workers
            .iter()
            .map(|&w| if w == 0 { default_workers() } else { w })
            .max()
            .unwrap_or_else(default_workers)
    }

    /// Session configuration sized by [`RunArgs::max_workers`], and the
    /// worker counts to measure with `0` resolved to the configured workers.
    pub fn into_config(self) -> (BenchConfig, Vec<usize>) {
        let max_workers = self.max_workers();
        let config = self.session.into_config(max_workers);
        let counts = worker_counts(&self.workers, config.workers);
        (config, counts)
    }
}

/// `workers` with `0` resolved to `configured`, deduplicated and ascending.
fn worker_counts(workers: &[usize], configured: usize) -> Vec<usize> {
    let mut counts: Vec<usize> = workers
        .iter()
        .map(|&w| if w == 0 { configured } else { w })
        .collect();
    counts.sort_unstable();
    counts.dedup();
    if counts.is_empty() {
        counts.push(configured);
    }
    counts
}

fn parse_backend(s: &str) -> Result<BackendKind, String> {
    s.parse::<BackendKind>().map_err(|e| e.to_string())
}
