//! kvbench - oracle-verified point-lookup benchmarks for key-value backends.
//!
//! A corpus of `key:value` lines is streamed once into an in-memory
//! [`Oracle`] and once into each storage backend. Read benchmarks then look
//! up a shuffled list of entries from parallel workers and compare every
//! returned value with the oracle, so a backend that answers wrongly fails
//! the run instead of producing a fast but meaningless number.
//!
//! # Modules
//!
//! - **corpus**: streaming parser for the input file
//! - **oracle**: ground truth and entry sampling
//! - **backends**: one adapter per engine behind a builder/reader trait pair
//! - **key_view**: zero-copy byte view of string keys
//! - **session**: execute-once setup shared by all benchmarks
//! - **driver**: timed read and build loops with inline verification
//! - **alloc**: allocation counting around the global allocator
//! - **fixtures**: deterministic corpus generation

use crate::alloc::CountingAlloc;

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: CountingAlloc<mimalloc::MiMalloc> = CountingAlloc::new(mimalloc::MiMalloc);

#[cfg(not(feature = "mimalloc"))]
#[global_allocator]
static GLOBAL: CountingAlloc<std::alloc::System> = CountingAlloc::new(std::alloc::System);

pub mod alloc;
pub mod backends;
pub mod config;
pub mod corpus;
pub mod driver;
pub mod error;
pub mod fixtures;
pub mod key_view;
pub mod oracle;
pub mod scratch;
pub mod session;

pub use backends::{BackendKind, Table, TableBuilder, TableReader, Value};
pub use config::BenchConfig;
pub use driver::{run_builds, run_reads, verify_absent, verify_table, Measurement, Workload};
pub use error::{Error, Result};
pub use fixtures::Scale;
pub use key_view::view_bytes;
pub use oracle::{sample_entries, Entry, Oracle};
pub use scratch::Scratch;
pub use session::{ReleaseGuard, Session, SessionCell};
