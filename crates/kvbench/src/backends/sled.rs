//! sled backend.

use std::path::Path;
use std::sync::Arc;

use super::{TableBuilder, TableReader, Value};
use crate::error::{Error, Result};

/// Page cache size given to sled, in bytes.
const CACHE_CAPACITY: u64 = 256 * 1024 * 1024;

/// Builder writing into a fresh sled database.
pub struct SledBuilder {
    db: Option<::sled::Db>,
    name: &'static str,
}

impl SledBuilder {
    /// Create a database at `path`, which must not exist yet.
    pub fn create(path: impl AsRef<Path>, compression: bool) -> Result<Self> {
        let db = ::sled::Config::new()
            .path(path.as_ref())
            .cache_capacity(CACHE_CAPACITY)
            .mode(::sled::Mode::HighThroughput)
            .use_compression(compression)
            .create_new(true)
            .open()?;

        Ok(Self {
            db: Some(db),
            name: if compression { "sled-compressed" } else { "sled" },
        })
    }
}

impl TableBuilder for SledBuilder {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let db = self.db.as_ref().ok_or(Error::Finalized { backend: self.name })?;
        db.insert(key, value)?;
        Ok(())
    }

    fn finalize(&mut self) -> Result<Box<dyn TableReader>> {
        let db = self.db.take().ok_or(Error::Finalized { backend: self.name })?;
        db.flush()?;
        Ok(Box::new(SledReader { db }))
    }
}

/// Read handle over a flushed sled database.
pub struct SledReader {
    db: ::sled::Db,
}

impl TableReader for SledReader {
    #[inline]
    fn get(&self, key: &[u8]) -> Result<Option<Value<'_>>> {
        Ok(self.db.get(key)?.map(|ivec| Value::Shared(Arc::from(ivec.as_ref()))))
    }

    fn len(&self) -> Result<u64> {
        Ok(self.db.len() as u64)
    }
}
