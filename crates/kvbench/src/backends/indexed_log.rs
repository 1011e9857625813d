//! Hash-indexed append log.
//!
//! A table is two files. The data file is the append log written during the
//! build:
//!
//! ```text
//! [key_len: u32 LE][value_len: u32 LE][key][value] ...
//! ```
//!
//! The index file, written by `finalize` next to the data file with an
//! [`INDEX_SUFFIX`] suffix, is an open-addressing hash table with linear
//! probing:
//!
//! ```text
//! [magic: 8 bytes][slot_count: u64 LE][entry_count: u64 LE]
//! [hash: u64 LE][offset + 1: u64 LE] * slot_count
//! ```
//!
//! An offset of zero marks an empty slot. The slot count is a power of two at
//! least twice the number of records, so probes always reach an empty slot.
//! When a key was written more than once, the index points at its last
//! record. Readers map both files and return values borrowed from the map.

use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use super::{TableBuilder, TableReader, Value};
use crate::error::{Error, Result};

const NAME: &str = "indexed-log";

/// Suffix appended to the data file path to name the index file.
pub const INDEX_SUFFIX: &str = ".index";

const INDEX_MAGIC: &[u8; 8] = b"KVBIDX01";
const INDEX_HEADER_LEN: usize = 24;
const SLOT_LEN: usize = 16;
const RECORD_HEADER_LEN: usize = 8;
const MIN_SLOTS: usize = 16;
const WRITE_BUFFER_SIZE: usize = 64 * 1024;

/// Path of the index file belonging to `data_path`.
pub fn index_path(data_path: &Path) -> PathBuf {
    let mut path = OsString::from(data_path.as_os_str());
    path.push(INDEX_SUFFIX);
    PathBuf::from(path)
}

#[inline]
fn hash_key(key: &[u8]) -> u64 {
    let digest = blake3::hash(key);
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_le_bytes(buf)
}

#[inline]
fn read_u32(buf: &[u8], at: usize) -> u32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&buf[at..at + 4]);
    u32::from_le_bytes(b)
}

#[inline]
fn read_u64(buf: &[u8], at: usize) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(b)
}

/// Decode the record starting at `offset` in the data file.
fn record_at(data: &[u8], offset: u64) -> Result<(&[u8], &[u8])> {
    let corrupt = || Error::CorruptIndex(format!("record offset {offset} out of bounds"));

    let start = usize::try_from(offset).map_err(|_| corrupt())?;
    let header_end = start.checked_add(RECORD_HEADER_LEN).ok_or_else(corrupt)?;
    if header_end > data.len() {
        return Err(corrupt());
    }
    let key_len = read_u32(data, start) as usize;
    let value_len = read_u32(data, start + 4) as usize;
    let key_end = header_end + key_len;
    let value_end = key_end + value_len;
    if value_end > data.len() {
        return Err(corrupt());
    }
    Ok((&data[header_end..key_end], &data[key_end..value_end]))
}

fn map_file(file: &File) -> Result<Option<Mmap>> {
    if file.metadata()?.len() == 0 {
        return Ok(None);
    }
    // SAFETY: table files live in a private scratch directory and are never
    // written again once the table is finalized.
    let map = unsafe { Mmap::map(file)? };
    Ok(Some(map))
}

/// Builder appending records to a new data file.
pub struct IndexedLogBuilder {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    offset: u64,
    /// `(hash, offset)` of every record, in write order.
    records: Vec<(u64, u64)>,
}

impl IndexedLogBuilder {
    /// Create the data file at `path`. Fails if the file already exists.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new().write(true).create_new(true).open(&path)?;
        Ok(Self {
            path,
            writer: Some(BufWriter::with_capacity(WRITE_BUFFER_SIZE, file)),
            offset: 0,
            records: Vec::new(),
        })
    }

    /// Data file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_index(&self, data: &[u8]) -> Result<()> {
        let slot_count = (self.records.len() * 2).next_power_of_two().max(MIN_SLOTS);
        let mask = slot_count - 1;
        let mut slots = vec![(0u64, 0u64); slot_count];
        let mut entries = 0u64;

        for &(hash, offset) in &self.records {
            let (key, _) = record_at(data, offset)?;
            let mut i = hash as usize & mask;
            loop {
                let (slot_hash, slot_offset) = slots[i];
                if slot_offset == 0 {
                    slots[i] = (hash, offset + 1);
                    entries += 1;
                    break;
                }
                if slot_hash == hash && record_at(data, slot_offset - 1)?.0 == key {
                    slots[i].1 = offset + 1;
                    break;
                }
                i = (i + 1) & mask;
            }
        }

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(index_path(&self.path))?;
        let mut writer = BufWriter::with_capacity(WRITE_BUFFER_SIZE, file);
        writer.write_all(INDEX_MAGIC)?;
        writer.write_all(&(slot_count as u64).to_le_bytes())?;
        writer.write_all(&entries.to_le_bytes())?;
        for (hash, offset) in slots {
            writer.write_all(&hash.to_le_bytes())?;
            writer.write_all(&offset.to_le_bytes())?;
        }
        writer.flush()?;

        tracing::trace!(
            path = %self.path.display(),
            records = self.records.len(),
            entries,
            slot_count,
            "index written"
        );
        Ok(())
    }
}

impl TableBuilder for IndexedLogBuilder {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or(Error::Finalized { backend: NAME })?;

        let (key_len, value_len) = match (u32::try_from(key.len()), u32::try_from(value.len())) {
            (Ok(k), Ok(v)) => (k, v),
            _ => {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "record larger than 4 GiB",
                )))
            }
        };

        writer.write_all(&key_len.to_le_bytes())?;
        writer.write_all(&value_len.to_le_bytes())?;
        writer.write_all(key)?;
        writer.write_all(value)?;

        self.records.push((hash_key(key), self.offset));
        self.offset += (RECORD_HEADER_LEN + key.len() + value.len()) as u64;
        Ok(())
    }

    fn finalize(&mut self) -> Result<Box<dyn TableReader>> {
        let writer = self
            .writer
            .take()
            .ok_or(Error::Finalized { backend: NAME })?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        drop(file);

        let data_file = File::open(&self.path)?;
        let data = map_file(&data_file)?;
        self.write_index(data.as_deref().unwrap_or(&[]))?;
        self.records = Vec::new();

        Ok(Box::new(IndexedLogReader::open(&self.path)?))
    }
}

/// Read handle over a finalized table.
pub struct IndexedLogReader {
    data: Option<Mmap>,
    index: Mmap,
    mask: usize,
    entries: u64,
}

impl IndexedLogReader {
    /// Open the table whose data file is at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = map_file(&File::open(path)?)?;
        let index = map_file(&File::open(index_path(path))?)?
            .ok_or_else(|| Error::CorruptIndex("empty index file".to_string()))?;

        if index.len() < INDEX_HEADER_LEN || &index[..8] != INDEX_MAGIC {
            return Err(Error::CorruptIndex("bad index header".to_string()));
        }
        let slot_count = read_u64(&index, 8);
        let entries = read_u64(&index, 16);
        let expected_len = usize::try_from(slot_count)
            .ok()
            .filter(|n| n.is_power_of_two())
            .and_then(|n| n.checked_mul(SLOT_LEN))
            .and_then(|n| n.checked_add(INDEX_HEADER_LEN));
        if expected_len != Some(index.len()) || entries >= slot_count {
            return Err(Error::CorruptIndex(format!(
                "index length {} does not match {slot_count} slots",
                index.len()
            )));
        }

        Ok(Self {
            data,
            index,
            mask: slot_count as usize - 1,
            entries,
        })
    }

    #[inline]
    fn data(&self) -> &[u8] {
        self.data.as_deref().unwrap_or(&[])
    }

    #[inline]
    fn slot(&self, i: usize) -> (u64, u64) {
        let at = INDEX_HEADER_LEN + i * SLOT_LEN;
        (read_u64(&self.index, at), read_u64(&self.index, at + 8))
    }
}

impl TableReader for IndexedLogReader {
    fn get(&self, key: &[u8]) -> Result<Option<Value<'_>>> {
        let hash = hash_key(key);
        let mut i = hash as usize & self.mask;
        loop {
            let (slot_hash, slot_offset) = self.slot(i);
            if slot_offset == 0 {
                return Ok(None);
            }
            if slot_hash == hash {
                let (stored_key, value) = record_at(self.data(), slot_offset - 1)?;
                if stored_key == key {
                    return Ok(Some(Value::Borrowed(value)));
                }
            }
            i = (i + 1) & self.mask;
        }
    }

    fn len(&self) -> Result<u64> {
        Ok(self.entries)
    }
}
