//! Verified reads on backends that return borrowed values must not allocate.
//!
//! The allocation counters are process-wide, so this file holds a single
//! test and runs as its own binary.

use kvbench::fixtures::write_corpus;
use kvbench::{run_reads, sample_entries, BackendKind, Oracle, Table};

#[test]
fn test_borrowed_reads_do_not_allocate() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = dir.path().join("corpus");
    write_corpus(&corpus, 5_000, 37).unwrap();
    let oracle = Oracle::from_corpus(&corpus).unwrap();
    let entries = sample_entries(&oracle, Some(41));

    for kind in [BackendKind::Memory, BackendKind::IndexedLog] {
        let table = Table::from_corpus(kind, &corpus, Some(dir.path())).unwrap();
        let m = run_reads(&table, &entries, 100_000, 1, Some(43)).unwrap();
        assert_eq!(m.ops, 100_000);
        assert_eq!(m.allocations, 0, "{kind} allocated during reads");
        assert_eq!(m.allocated_bytes, 0, "{kind} allocated during reads");
    }
}
