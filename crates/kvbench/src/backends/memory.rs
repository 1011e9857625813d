//! In-process hash map backend.

use std::collections::HashMap;

use super::{TableBuilder, TableReader, Value};
use crate::error::{Error, Result};

const NAME: &str = "memory";

/// Builder for the in-memory backend.
#[derive(Debug)]
pub struct MemoryBuilder {
    map: Option<HashMap<Box<[u8]>, Box<[u8]>>>,
}

impl MemoryBuilder {
    pub fn new() -> Self {
        Self {
            map: Some(HashMap::new()),
        }
    }
}

impl Default for MemoryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TableBuilder for MemoryBuilder {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let map = self.map.as_mut().ok_or(Error::Finalized { backend: NAME })?;
        map.insert(key.into(), value.into());
        Ok(())
    }

    fn finalize(&mut self) -> Result<Box<dyn TableReader>> {
        let mut map = self.map.take().ok_or(Error::Finalized { backend: NAME })?;
        map.shrink_to_fit();
        Ok(Box::new(MemoryReader { map }))
    }
}

/// Read-only view of a finalized in-memory table.
#[derive(Debug)]
pub struct MemoryReader {
    map: HashMap<Box<[u8]>, Box<[u8]>>,
}

impl TableReader for MemoryReader {
    #[inline]
    fn get(&self, key: &[u8]) -> Result<Option<Value<'_>>> {
        Ok(self.map.get(key).map(|value| Value::Borrowed(value.as_ref())))
    }

    fn len(&self) -> Result<u64> {
        Ok(self.map.len() as u64)
    }
}
