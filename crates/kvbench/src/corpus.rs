//! Corpus streaming.
//!
//! A corpus is a flat text file with one `key:value` record per line. The
//! first `:` on a line separates the key from the value, so values may contain
//! further colons. There is no header and no record count; EOF ends the
//! stream.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{Error, Result};

/// Read buffer size used while scanning the corpus.
pub const READ_BUFFER_SIZE: usize = 16 * 1024;

/// Byte separating key from value.
pub const DELIMITER: u8 = b':';

/// One corpus record, borrowed from the streamer's line buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record<'a> {
    /// 1-based line number in the corpus file.
    pub line: u64,
    pub key: &'a [u8],
    pub value: &'a [u8],
}

impl<'a> Record<'a> {
    /// Split a line on its first delimiter.
    ///
    /// Returns `None` when the line has no delimiter or the key is empty.
    pub fn parse(line: u64, raw: &'a [u8]) -> Option<Self> {
        let pos = raw.iter().position(|&b| b == DELIMITER)?;
        if pos == 0 {
            return None;
        }
        Some(Self {
            line,
            key: &raw[..pos],
            value: &raw[pos + 1..],
        })
    }

    /// The key as text.
    pub fn key_str(&self) -> Result<&'a str> {
        std::str::from_utf8(self.key).map_err(|_| Error::InvalidUtf8 { line: self.line })
    }

    /// The value as text.
    pub fn value_str(&self) -> Result<&'a str> {
        std::str::from_utf8(self.value).map_err(|_| Error::InvalidUtf8 { line: self.line })
    }
}

/// Counters from one pass over a corpus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorpusStats {
    /// Number of records handed to the callback.
    pub records: u64,
    /// Number of bytes read, line endings included.
    pub bytes: u64,
}

/// Stream every record of the corpus at `path` into `on_record`.
///
/// The file is read through a [`READ_BUFFER_SIZE`] buffer and never held in
/// memory as a whole. Streaming stops at the first malformed line, read error
/// or callback error, and that error is returned. The file is closed on every
/// path when the reader goes out of scope.
pub fn stream<P, F>(path: P, mut on_record: F) -> Result<CorpusStats>
where
    P: AsRef<Path>,
    F: FnMut(Record<'_>) -> Result<()>,
{
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| Error::CorpusOpen {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);

    let mut buf = Vec::with_capacity(256);
    let mut stats = CorpusStats::default();
    let mut line = 0u64;

    loop {
        buf.clear();
        line += 1;
        let read = reader
            .read_until(b'\n', &mut buf)
            .map_err(|source| Error::CorpusRead { line, source })?;
        if read == 0 {
            break;
        }
        stats.bytes += read as u64;

        let record = Record::parse(line, trim_line_ending(&buf))
            .ok_or(Error::MalformedRecord { line })?;
        on_record(record)?;
        stats.records += 1;
    }

    tracing::debug!(
        path = %path.display(),
        records = stats.records,
        bytes = stats.bytes,
        "corpus streamed"
    );

    Ok(stats)
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn corpus(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn collect(contents: &str) -> Result<Vec<(String, String)>> {
        let file = corpus(contents);
        let mut out = Vec::new();
        stream(file.path(), |record| {
            out.push((
                record.key_str()?.to_string(),
                record.value_str()?.to_string(),
            ));
            Ok(())
        })?;
        Ok(out)
    }

    #[test]
    fn test_splits_on_first_colon() {
        let records = collect("a:1\nurl:http://example.com:80\nempty:\n").unwrap();
        assert_eq!(
            records,
            vec![
                ("a".to_string(), "1".to_string()),
                ("url".to_string(), "http://example.com:80".to_string()),
                ("empty".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn test_last_line_without_newline() {
        let records = collect("a:1\nb:2").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1], ("b".to_string(), "2".to_string()));
    }

    #[test]
    fn test_crlf_line_endings() {
        let records = collect("a:1\r\nb:2\r\n").unwrap();
        assert_eq!(records[0].1, "1");
        assert_eq!(records[1].1, "2");
    }

    #[test]
    fn test_missing_delimiter_is_fatal() {
        let err = collect("a:1\nnovalue\nb:2\n").unwrap_err();
        assert!(matches!(err, Error::MalformedRecord { line: 2 }));
    }

    #[test]
    fn test_empty_key_is_fatal() {
        let err = collect(":orphan\n").unwrap_err();
        assert!(matches!(err, Error::MalformedRecord { line: 1 }));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = stream(dir.path().join("absent"), |_| Ok(())).unwrap_err();
        assert!(matches!(err, Error::CorpusOpen { .. }));
    }

    #[test]
    fn test_callback_error_stops_stream() {
        let file = corpus("a:1\nb:2\nc:3\n");
        let mut seen = 0;
        let err = stream(file.path(), |record| {
            seen += 1;
            if record.key == b"b" {
                return Err(Error::Config("stop".into()));
            }
            Ok(())
        })
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(seen, 2);
    }

    #[test]
    fn test_stats() {
        let file = corpus("a:1\nbb:22\n");
        let stats = stream(file.path(), |_| Ok(())).unwrap();
        assert_eq!(stats.records, 2);
        assert_eq!(stats.bytes, 10);
    }

    #[test]
    fn test_invalid_utf8_reported_with_line() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"ok:1\nbad:\xff\xfe\n").unwrap();
        file.flush().unwrap();
        let err = stream(file.path(), |record| record.value_str().map(|_| ())).unwrap_err();
        assert!(matches!(err, Error::InvalidUtf8 { line: 2 }));
    }
}
