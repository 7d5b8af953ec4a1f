//! Variable-format index files and the primary key index
//!
//! A variable-format index file starts with a 4-character ASCII record-size
//! field; the rest of the file is fixed-width, space-padded text records of
//! that size, each a tab-delimited line kept sorted by its first token. One
//! flavor writes `\t;`-separated tokens, so a leading `;` is stripped from
//! every token. Record count is derived from the file size, not stored.
//!
//! The primary index (`key_<namespace>.key`) maps entry names to a 0-based
//! data file id and a 64-bit annotation offset.

use std::fs::File;
use std::path::Path;

use log::{debug, warn};
use memmap2::Mmap;

use crate::division::SkipTable;
use crate::error::{HeaderError, IndexError, Result};
use crate::query::ResultEntry;
use crate::search::{self, SortedNames};
use crate::wildcard;

/// Size of the ASCII record-size preamble in bytes
pub const SIZE_PREAMBLE: usize = 4;

/// Filename of the primary key index for a namespace
#[must_use]
pub fn key_file(namespace: &str) -> String {
    format!("key_{namespace}.key")
}

/// A single memory-mapped variable-format index file
pub struct ObdaIndexFile {
    mmap: Mmap,
    rec_size: usize,
    n_records: u64,
}

impl ObdaIndexFile {
    /// Opens an index file inside `dir`; `Ok(None)` when absent.
    ///
    /// The record size is parsed from the 4-character ASCII preamble and the
    /// record count derived as `(file_size - 4) / rec_size`.
    pub fn open(dir: &Path, filename: &str) -> Result<Option<Self>> {
        let path = dir.join(filename);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("index file absent: {}", path.display());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let len = file.metadata()?.len() as usize;
        if len < SIZE_PREAMBLE {
            return Err(HeaderError::TruncatedHeader(len, SIZE_PREAMBLE).into());
        }
        let mmap = unsafe { Mmap::map(&file)? };
        let preamble = std::str::from_utf8(&mmap[..SIZE_PREAMBLE])
            .map_err(|_| HeaderError::InvalidSizePreamble(format!("{:?}", &mmap[..4])))?;
        let rec_size: usize = preamble
            .trim()
            .parse()
            .map_err(|_| HeaderError::InvalidSizePreamble(preamble.to_string()))?;
        if rec_size == 0 {
            return Err(HeaderError::InvalidRecordSize(0).into());
        }
        let n_records = ((len - SIZE_PREAMBLE) / rec_size) as u64;
        Ok(Some(Self {
            mmap,
            rec_size,
            n_records,
        }))
    }

    #[must_use]
    pub fn rec_size(&self) -> usize {
        self.rec_size
    }

    #[must_use]
    pub fn n_records(&self) -> u64 {
        self.n_records
    }

    /// Raw padded record at `pos`
    pub fn line(&self, pos: u64) -> Result<&[u8]> {
        if pos >= self.n_records {
            return Err(IndexError::OutOfRange(pos, self.n_records).into());
        }
        let start = SIZE_PREAMBLE + pos as usize * self.rec_size;
        Ok(&self.mmap[start..start + self.rec_size])
    }
}

/// Splits a padded record into its tokens: trailing padding trimmed, fields
/// separated by `\t`, a leading `;` stripped from each token for the
/// `\t;` flavor
pub(crate) fn tokenize(line: &[u8]) -> Vec<&[u8]> {
    let end = line
        .iter()
        .rposition(|&c| !matches!(c, b' ' | b'\0' | b'\n' | b'\r'))
        .map_or(0, |i| i + 1);
    line[..end]
        .split(|&c| c == b'\t')
        .map(|token| token.strip_prefix(b";").unwrap_or(token))
        .collect()
}

/// One record of the primary key index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRecord {
    /// Entry name (the sort key)
    pub name: String,
    /// 0-based data file id
    pub file_id: u32,
    /// Byte offset of the entry's annotation in the data file
    pub ann_offset: u64,
}

/// The primary, name-sorted key index of a variable-format database
pub struct KeyIndex {
    file: ObdaIndexFile,
}

impl KeyIndex {
    /// Opens `key_<namespace>.key` inside the index directory
    pub fn open(dir: &Path, namespace: &str) -> Result<Option<Self>> {
        Ok(ObdaIndexFile::open(dir, &key_file(namespace))?.map(|file| Self { file }))
    }

    #[must_use]
    pub fn n_records(&self) -> u64 {
        self.file.n_records()
    }

    /// Positioned read of the record at `pos`.
    ///
    /// A malformed record (wrong token count, unparseable numbers) is logged
    /// and reported as `Ok(None)` rather than failing the whole query.
    pub fn record(&self, pos: u64) -> Result<Option<KeyRecord>> {
        let tokens = tokenize(self.file.line(pos)?);
        if tokens.len() < 3 {
            warn!("malformed key record at position {pos}: {} tokens", tokens.len());
            return Ok(None);
        }
        let name = String::from_utf8_lossy(tokens[0]).into_owned();
        let file_id = std::str::from_utf8(tokens[1]).ok().and_then(|t| t.parse().ok());
        let ann_offset = std::str::from_utf8(tokens[2]).ok().and_then(|t| t.parse().ok());
        let (Some(file_id), Some(ann_offset)) = (file_id, ann_offset) else {
            warn!("malformed key record at position {pos}: non-numeric field");
            return Ok(None);
        };
        Ok(Some(KeyRecord {
            name,
            file_id,
            ann_offset,
        }))
    }

    /// Exact-match lookup of a single entry name
    pub fn search(&self, id: &str, fold: bool) -> Result<Option<KeyRecord>> {
        match search::exact(self, id.as_bytes(), fold)? {
            Some(pos) => self.record(pos),
            None => Ok(None),
        }
    }

    /// Wildcard lookup over the key index; same two-phase prefix-range
    /// narrowing as the fixed format, with skip filtering per hit
    pub fn query(
        &self,
        pattern: &str,
        fold: bool,
        skip: &SkipTable,
        out: &mut Vec<ResultEntry>,
    ) -> Result<bool> {
        let pat = pattern.as_bytes();
        let prefix = wildcard::literal_prefix(pat);
        let Some((first, last)) = search::prefix_range(self, prefix, fold)? else {
            return Ok(false);
        };
        for pos in first..=last {
            let Some(record) = self.record(pos)? else {
                continue;
            };
            if wildcard::matches(pat, record.name.as_bytes(), fold) {
                if let Some(hit) = filtered_hit(&record, skip) {
                    out.push(hit);
                }
            }
        }
        Ok(true)
    }
}

impl SortedNames for KeyIndex {
    fn len(&self) -> u64 {
        self.file.n_records()
    }

    fn read_name(&self, pos: u64, buf: &mut Vec<u8>) -> Result<bool> {
        let line = self.file.line(pos)?;
        if memchr::memchr(b'\t', line).is_none() {
            warn!("malformed key record at position {pos}: no field separator");
            return Ok(false);
        }
        let tokens = tokenize(line);
        buf.clear();
        buf.extend_from_slice(tokens[0]);
        Ok(true)
    }
}

/// Converts a key record into a result, applying the skip table over the
/// 0-based file id
pub(crate) fn filtered_hit(record: &KeyRecord, skip: &SkipTable) -> Option<ResultEntry> {
    if !skip.allows(record.file_id as usize) {
        return None;
    }
    Some(ResultEntry::new(record.file_id, record.ann_offset))
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::obda::writer::{ObdaEntry, ObdaIndexWriter};
    use anyhow::Result;
    use tempfile::tempdir;

    fn write_fixture(dir: &Path, entries: &[(&str, u32, u64)]) -> Result<()> {
        let writer = ObdaIndexWriter::new(dir);
        let mut entries: Vec<ObdaEntry> = entries
            .iter()
            .map(|&(name, file, off)| ObdaEntry::new(name, file, off))
            .collect();
        writer.write_primary("ID", &mut entries)?;
        Ok(())
    }

    #[test]
    fn test_exact_round_trip() -> Result<()> {
        let dir = tempdir()?;
        write_fixture(
            dir.path(),
            &[("ABC1", 0, 1000), ("ABC2", 1, 64_000_000_000), ("ABD1", 0, 3)],
        )?;
        let index = KeyIndex::open(dir.path(), "ID")?.expect("index present");
        assert_eq!(index.n_records(), 3);

        let hit = index.search("ABC2", true)?.expect("hit");
        assert_eq!(hit.file_id, 1);
        assert_eq!(hit.ann_offset, 64_000_000_000); // offsets are 64-bit here
        assert!(index.search("ABC3", true)?.is_none());
        Ok(())
    }

    #[test]
    fn test_wildcard_range() -> Result<()> {
        let dir = tempdir()?;
        write_fixture(
            dir.path(),
            &[("ABC1", 0, 1), ("ABC2", 0, 2), ("ABD1", 0, 3), ("ABE1", 0, 4)],
        )?;
        let index = KeyIndex::open(dir.path(), "ID")?.expect("index present");
        let skip = SkipTable::keep_all(1);

        let mut out = Vec::new();
        assert!(index.query("ABC*", true, &skip, &mut out)?);
        let offsets: Vec<u64> = out.iter().map(|e| e.offset).collect();
        assert_eq!(offsets, vec![1, 2]);
        Ok(())
    }

    #[test]
    fn test_malformed_record_fails_safe() -> Result<()> {
        let dir = tempdir()?;
        // hand-built file: width 12, one record with no tabs at all
        let mut bytes = b"0012".to_vec();
        bytes.extend_from_slice(b"JUNKRECORD  ");
        std::fs::write(dir.path().join(key_file("ID")), bytes)?;

        let index = KeyIndex::open(dir.path(), "ID")?.expect("index present");
        assert_eq!(index.n_records(), 1);
        assert!(index.search("JUNKRECORD", true)?.is_none());
        assert!(index.record(0)?.is_none());
        Ok(())
    }

    #[test]
    fn test_tab_semicolon_flavor() -> Result<()> {
        let dir = tempdir()?;
        let line = b"ABC1\t;0\t;500";
        let mut bytes = format!("{:04}", line.len()).into_bytes();
        bytes.extend_from_slice(line);
        std::fs::write(dir.path().join(key_file("ID")), bytes)?;

        let index = KeyIndex::open(dir.path(), "ID")?.expect("index present");
        let record = index.record(0)?.expect("well-formed");
        assert_eq!(record.file_id, 0);
        assert_eq!(record.ann_offset, 500);
        Ok(())
    }

    #[test]
    fn test_bad_preamble_rejected() -> Result<()> {
        let dir = tempdir()?;
        std::fs::write(dir.path().join(key_file("ID")), b"00xy")?;
        assert!(KeyIndex::open(dir.path(), "ID").is_err());
        Ok(())
    }
}
