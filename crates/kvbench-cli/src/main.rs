//! kvbench command-line runner.
//!
//! Generates corpora, verifies backends against the oracle, and prints
//! benchmark measurements.

mod args;
mod formatter;

use clap::Parser;
use kvbench::fixtures::write_corpus;
use kvbench::{run_builds, run_reads, session, verify_absent, verify_table, Measurement, Session};

use args::{Args, CheckArgs, Command, GenerateArgs, RunArgs};
use formatter::{format_checks, format_measurements, CheckReport};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kvbench=info,kvbench_cli=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let result = {
        let _release = session::global().release_on_drop();
        run(args)
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    match args.command {
        Command::Generate(args) => run_generate(args),
        Command::Check(args) => run_check(args),
        Command::Run(args) => run_bench(args),
    }
}

fn run_generate(args: GenerateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let count = args.count();
    write_corpus(&args.output, count, args.seed)?;
    tracing::info!(path = %args.output.display(), records = count, "corpus written");
    Ok(())
}

fn run_check(args: CheckArgs) -> Result<(), Box<dyn std::error::Error>> {
    let format = args.session.format;
    let config = args.session.into_config(1);
    let session = session::global().get_or_load(&config)?;

    let absent = absent_keys(session, args.absent);
    let mut reports = Vec::with_capacity(session.tables().len());
    for table in session.tables() {
        let verified = verify_table(table, session.oracle())?;
        let absent_checked = verify_absent(table, absent.iter().map(String::as_str))?;
        tracing::info!(backend = table.name(), verified, absent_checked, "backend verified");
        reports.push(CheckReport {
            backend: table.name().to_string(),
            stored: table.len()?,
            verified,
            absent_checked,
        });
    }

    println!("{}", format_checks(&reports, format)?);
    Ok(())
}

fn run_bench(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let (ops, builds, format) = (args.ops, args.builds, args.session.format);
    let (config, worker_counts) = args.into_config();
    let session = session::global().get_or_load(&config)?;

    let mut measurements: Vec<Measurement> = Vec::new();
    for table in session.tables() {
        for &workers in &worker_counts {
            let m = run_reads(table, session.entries(), ops, workers, config.seed)?;
            tracing::info!(
                backend = table.name(),
                workers,
                ns_per_op = m.ns_per_op(),
                "reads done"
            );
            measurements.push(m);
        }
    }

    if builds > 0 {
        for &kind in &config.backends {
            let m = run_builds(kind, &config.corpus_path, builds, config.scratch_root())?;
            tracing::info!(backend = kind.name(), builds, "builds done");
            measurements.push(m);
        }
    }

    println!("{}", format_measurements(&measurements, format)?);
    Ok(())
}

/// `count` keys that are not in the oracle.
fn absent_keys(session: &Session, count: usize) -> Vec<String> {
    (0u64..)
        .map(|i| format!("kvbench-absent-{i:08}"))
        .filter(|key| !session.oracle().contains_key(key))
        .take(count)
        .collect()
}
