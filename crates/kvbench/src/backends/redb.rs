//! redb backend.
//!
//! redb commits are expensive relative to single inserts, so the builder
//! groups puts into write transactions of [`BATCH_SIZE`] records.

use std::path::Path;

use ::redb::{Database, ReadableTableMetadata, TableDefinition};

use super::{TableBuilder, TableReader, Value};
use crate::error::{Error, Result};

const NAME: &str = "redb";

const TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("entries");

/// Records per write transaction during the build.
pub const BATCH_SIZE: usize = 10_000;

fn redb_err(err: impl Into<::redb::Error>) -> Error {
    Error::Redb(err.into())
}

/// Builder writing into a fresh redb file.
pub struct RedbBuilder {
    db: Option<Database>,
    pending: Vec<(Vec<u8>, Vec<u8>)>,
}

impl RedbBuilder {
    /// Create a database file at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let db = Database::create(path.as_ref()).map_err(redb_err)?;

        // Create the table up front so an empty build is still readable.
        let txn = db.begin_write().map_err(redb_err)?;
        txn.open_table(TABLE).map_err(redb_err)?;
        txn.commit().map_err(redb_err)?;

        Ok(Self {
            db: Some(db),
            pending: Vec::with_capacity(BATCH_SIZE),
        })
    }

    fn commit_pending(&mut self) -> Result<()> {
        let db = self.db.as_ref().ok_or(Error::Finalized { backend: NAME })?;
        if self.pending.is_empty() {
            return Ok(());
        }

        let txn = db.begin_write().map_err(redb_err)?;
        {
            let mut table = txn.open_table(TABLE).map_err(redb_err)?;
            for (key, value) in self.pending.drain(..) {
                table
                    .insert(key.as_slice(), value.as_slice())
                    .map_err(redb_err)?;
            }
        }
        txn.commit().map_err(redb_err)?;
        Ok(())
    }
}

impl TableBuilder for RedbBuilder {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        if self.db.is_none() {
            return Err(Error::Finalized { backend: NAME });
        }
        self.pending.push((key.to_vec(), value.to_vec()));
        if self.pending.len() >= BATCH_SIZE {
            self.commit_pending()?;
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<Box<dyn TableReader>> {
        self.commit_pending()?;
        let db = self.db.take().ok_or(Error::Finalized { backend: NAME })?;
        Ok(Box::new(RedbReader { db }))
    }
}

/// Read handle over a committed redb file.
///
/// Each lookup opens its own read transaction, so any number of threads can
/// read at once.
pub struct RedbReader {
    db: Database,
}

impl TableReader for RedbReader {
    fn get(&self, key: &[u8]) -> Result<Option<Value<'_>>> {
        let txn = self.db.begin_read().map_err(redb_err)?;
        let table = txn.open_table(TABLE).map_err(redb_err)?;
        let found = table.get(key).map_err(redb_err)?;
        Ok(found.map(|guard| Value::Owned(guard.value().to_vec())))
    }

    fn len(&self) -> Result<u64> {
        let txn = self.db.begin_read().map_err(redb_err)?;
        let table = txn.open_table(TABLE).map_err(redb_err)?;
        table.len().map_err(redb_err)
    }
}
