//! Timed, oracle-verified workloads.
//!
//! Reads are checked inline: every value a backend returns is compared with
//! the entry it was looked up for, and the first mismatch ends the run with
//! [`Error::BadLookup`]. A benchmark that completes has therefore only ever
//! measured correct answers.

use std::hint::black_box;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use rand::Rng;
use serde::Serialize;

use crate::alloc::{self, AllocSnapshot};
use crate::backends::{BackendKind, Table};
use crate::error::{Error, Result};
use crate::oracle::{seeded_rng, Entry, Oracle};

/// Reads between checks of the shared abort flag.
const ABORT_CHECK_INTERVAL: u64 = 1024;

/// What a measurement timed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Workload {
    /// Point lookups of sampled entries.
    Get,
    /// Full table builds from the corpus.
    Create,
}

impl Workload {
    pub fn name(&self) -> &'static str {
        match self {
            Workload::Get => "get",
            Workload::Create => "create",
        }
    }
}

/// Result of one timed run.
#[derive(Debug, Clone, Serialize)]
pub struct Measurement {
    pub backend: BackendKind,
    pub workload: Workload,
    pub workers: usize,
    /// Reads performed, or tables built.
    pub ops: u64,
    pub elapsed: Duration,
    pub allocations: u64,
    pub allocated_bytes: u64,
}

impl Measurement {
    fn new(
        backend: BackendKind,
        workload: Workload,
        workers: usize,
        ops: u64,
        elapsed: Duration,
        allocs: AllocSnapshot,
    ) -> Self {
        Self {
            backend,
            workload,
            workers,
            ops,
            elapsed,
            allocations: allocs.allocations,
            allocated_bytes: allocs.bytes,
        }
    }

    fn per_op(&self, total: f64) -> f64 {
        if self.ops == 0 {
            0.0
        } else {
            total / self.ops as f64
        }
    }

    pub fn ns_per_op(&self) -> f64 {
        self.per_op(self.elapsed.as_nanos() as f64)
    }

    pub fn ops_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.ops as f64 / secs
        }
    }

    pub fn allocs_per_op(&self) -> f64 {
        self.per_op(self.allocations as f64)
    }

    pub fn bytes_per_op(&self) -> f64 {
        self.per_op(self.allocated_bytes as f64)
    }
}

/// Perform `ops` verified reads against `table`, spread over `workers`
/// threads.
///
/// Each worker starts at a random offset into `entries` and walks forward,
/// wrapping at the end, with a cursor nobody else touches. The entries and
/// the table are shared read-only. Elapsed time is wall-clock time for the
/// whole fan-out.
pub fn run_reads(
    table: &Table,
    entries: &[Entry],
    ops: u64,
    workers: usize,
    seed: Option<u64>,
) -> Result<Measurement> {
    if entries.is_empty() {
        return Err(Error::Config("no entries to read".to_string()));
    }
    let workers = workers.max(1);
    let mut rng = seeded_rng(seed);
    let starts: Vec<usize> = (0..workers)
        .map(|_| rng.gen_range(0..entries.len()))
        .collect();
    let abort = AtomicBool::new(false);

    let before = alloc::snapshot();
    let started = Instant::now();
    let result = if workers == 1 {
        read_worker(table, entries, starts[0], ops, &abort)
    } else {
        thread::scope(|scope| {
            let handles: Vec<_> = starts
                .iter()
                .enumerate()
                .map(|(worker, &start)| {
                    let quota = worker_quota(ops, workers, worker);
                    let abort = &abort;
                    scope.spawn(move || read_worker(table, entries, start, quota, abort))
                })
                .collect();

            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
                })
                .collect::<Result<()>>()
        })
    };
    let elapsed = started.elapsed();
    let allocs = alloc::snapshot().since(&before);
    result?;

    Ok(Measurement::new(
        table.kind(),
        Workload::Get,
        workers,
        ops,
        elapsed,
        allocs,
    ))
}

/// Reads assigned to `worker` out of `ops` total.
fn worker_quota(ops: u64, workers: usize, worker: usize) -> u64 {
    let workers = workers as u64;
    let worker = worker as u64;
    ops / workers + u64::from(worker < ops % workers)
}

fn read_worker(
    table: &Table,
    entries: &[Entry],
    start: usize,
    ops: u64,
    abort: &AtomicBool,
) -> Result<()> {
    let count = entries.len();
    let mut i = start;
    for n in 0..ops {
        if n % ABORT_CHECK_INTERVAL == 0 && abort.load(Ordering::Relaxed) {
            return Ok(());
        }
        if let Err(err) = check_entry(table, &entries[i]) {
            abort.store(true, Ordering::Relaxed);
            return Err(err);
        }
        i += 1;
        if i == count {
            i = 0;
        }
    }
    Ok(())
}

#[inline]
fn check_entry(table: &Table, entry: &Entry) -> Result<()> {
    match table.get(entry.key_bytes())? {
        Some(value) if &*value == entry.value.as_bytes() => Ok(()),
        found => {
            tracing::error!(
                backend = table.name(),
                key = %entry.key,
                found = found.is_some(),
                "bad data or lookup"
            );
            Err(Error::BadLookup {
                backend: table.name(),
                key: entry.key.clone(),
            })
        }
    }
}

/// Build `iterations` fresh tables of `kind` from the corpus, one after the
/// other.
///
/// Each iteration creates new backing files, streams the whole corpus, and
/// finalizes; the table is then checked for usability and dropped, which
/// removes its files. All of that is inside the timed region.
pub fn run_builds(
    kind: BackendKind,
    corpus: &Path,
    iterations: u64,
    scratch_root: Option<&Path>,
) -> Result<Measurement> {
    let before = alloc::snapshot();
    let started = Instant::now();
    for _ in 0..iterations {
        let table = Table::from_corpus(kind, corpus, scratch_root)?;
        black_box(table.len()?);
    }
    let elapsed = started.elapsed();
    let allocs = alloc::snapshot().since(&before);

    Ok(Measurement::new(
        kind,
        Workload::Create,
        1,
        iterations,
        elapsed,
        allocs,
    ))
}

/// Check every oracle record against `table`. Returns the number checked.
pub fn verify_table(table: &Table, oracle: &Oracle) -> Result<u64> {
    let mut checked = 0;
    for (key, expected) in oracle.iter() {
        match table.get(key.as_bytes())? {
            Some(value) if &*value == expected.as_bytes() => checked += 1,
            _ => {
                tracing::error!(backend = table.name(), key, "bad data or lookup");
                return Err(Error::BadLookup {
                    backend: table.name(),
                    key: key.to_string(),
                });
            }
        }
    }
    Ok(checked)
}

/// Check that none of `keys` is found in `table`. Returns the number checked.
pub fn verify_absent<'a>(table: &Table, keys: impl IntoIterator<Item = &'a str>) -> Result<u64> {
    let mut checked = 0;
    for key in keys {
        if table.get(key.as_bytes())?.is_some() {
            tracing::error!(backend = table.name(), key, "absent key found");
            return Err(Error::BadLookup {
                backend: table.name(),
                key: key.to_string(),
            });
        }
        checked += 1;
    }
    Ok(checked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::TableBuilder;
    use crate::oracle::sample_entries;

    fn oracle(count: usize) -> Oracle {
        let mut oracle = Oracle::new();
        for i in 0..count {
            oracle.insert(&format!("key{i:05}"), &format!("value{i}"));
        }
        oracle
    }

    fn table_for(kind: BackendKind, oracle: &Oracle) -> Table {
        Table::build(kind, None, |builder: &mut dyn TableBuilder| {
            for (key, value) in oracle.iter() {
                builder.put(key.as_bytes(), value.as_bytes())?;
            }
            Ok(())
        })
        .unwrap()
    }

    #[test]
    fn test_worker_quota_sums_to_ops() {
        for (ops, workers) in [(0, 1), (10, 3), (1000, 7), (5, 8)] {
            let total: u64 = (0..workers).map(|w| worker_quota(ops, workers, w)).sum();
            assert_eq!(total, ops);
        }
    }

    #[test]
    fn test_parallel_reads_verify() {
        let oracle = oracle(500);
        let entries = sample_entries(&oracle, Some(1));
        let table = table_for(BackendKind::Memory, &oracle);

        let measurement = run_reads(&table, &entries, 10_000, 4, Some(2)).unwrap();
        assert_eq!(measurement.workload, Workload::Get);
        assert_eq!(measurement.workers, 4);
        assert_eq!(measurement.ops, 10_000);
        assert!(measurement.ns_per_op() >= 0.0);
    }

    #[test]
    fn test_wrong_value_is_bad_lookup() {
        let oracle = oracle(100);
        let table = table_for(BackendKind::Memory, &oracle);
        let mut entries = sample_entries(&oracle, Some(3));
        entries[0].value.push_str("-stale");

        let err = run_reads(&table, &entries, 1_000, 2, Some(4)).unwrap_err();
        match err {
            Error::BadLookup { backend, key } => {
                assert_eq!(backend, "memory");
                assert_eq!(key, entries[0].key);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_key_is_bad_lookup() {
        let oracle = oracle(10);
        let table = table_for(BackendKind::IndexedLog, &oracle);
        let entries = vec![Entry {
            key: "not-there".to_string(),
            value: "x".to_string(),
        }];
        assert!(matches!(
            run_reads(&table, &entries, 1, 1, None),
            Err(Error::BadLookup { .. })
        ));
    }

    #[test]
    fn test_reads_need_entries() {
        let table = table_for(BackendKind::Memory, &oracle(1));
        assert!(matches!(
            run_reads(&table, &[], 10, 1, None),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_verify_helpers() {
        let oracle = oracle(1_000);
        for kind in BackendKind::ALL {
            let table = table_for(kind, &oracle);
            assert_eq!(verify_table(&table, &oracle).unwrap(), 1_000);
            let absent: Vec<String> = (0..1_000).map(|i| format!("absent{i}")).collect();
            assert_eq!(
                verify_absent(&table, absent.iter().map(String::as_str)).unwrap(),
                1_000
            );
            assert!(verify_absent(&table, ["key00001"]).is_err());
        }
    }

    #[test]
    fn test_measurement_rates() {
        let m = Measurement {
            backend: BackendKind::Memory,
            workload: Workload::Get,
            workers: 1,
            ops: 1_000,
            elapsed: Duration::from_millis(1),
            allocations: 500,
            allocated_bytes: 64_000,
        };
        assert_eq!(m.ns_per_op(), 1_000.0);
        assert_eq!(m.ops_per_sec(), 1_000_000.0);
        assert_eq!(m.allocs_per_op(), 0.5);
        assert_eq!(m.bytes_per_op(), 64.0);
    }
}
