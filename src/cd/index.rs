//! Fixed-format index file access and the primary entry-name index
//!
//! Index files are memory-mapped read-only and addressed record by record:
//! record `i` of a file with record size `r` lives at byte `300 + i * r`,
//! directly after the header. [`CdIndexFile`] provides that low-level access
//! for every file of an index set; [`EntryIndex`] layers the entry-name
//! record layout and the exact/wildcard search operations on top of it.

use std::fs::File;
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};
use log::{debug, warn};
use memmap2::Mmap;

use super::header::{CdHeader, SIZE_HEADER};
use crate::division::SkipTable;
use crate::error::{HeaderError, IndexError, Result};
use crate::query::ResultEntry;
use crate::search::{self, SortedNames};
use crate::wildcard;

/// Filename of the primary entry-name index within an index directory
pub const ENTRY_INDEX_FILE: &str = "entryname.idx";

/// Bytes of an entry record taken by the non-name fields
/// (u32 annotation offset, u32 sequence offset, i16 division code)
const ENTRY_FIXED_BYTES: usize = 10;

/// A single memory-mapped fixed-format index file
///
/// Opening parses and caches the 300-byte header and validates that the
/// declared record region fits inside the file.
pub struct CdIndexFile {
    mmap: Mmap,
    header: CdHeader,
}

impl CdIndexFile {
    /// Opens an index file inside `dir`.
    ///
    /// A missing file is not an error: it reports `Ok(None)` so the caller
    /// can treat the field as contributing zero hits.
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
        if file.metadata()?.len() < SIZE_HEADER as u64 {
            return Err(
                HeaderError::TruncatedHeader(file.metadata()?.len() as usize, SIZE_HEADER).into(),
            );
        }
        let mmap = unsafe { Mmap::map(&file)? };
        let header = CdHeader::from_buffer(&mmap)?;
        let extent = SIZE_HEADER as u64
            + u64::from(header.n_records) * header.rec_size as u64;
        if extent > mmap.len() as u64 {
            return Err(IndexError::Truncated(extent, mmap.len() as u64).into());
        }
        Ok(Some(Self { mmap, header }))
    }

    /// The header parsed at open time
    #[must_use]
    pub fn header(&self) -> &CdHeader {
        &self.header
    }

    /// Record size in bytes
    #[must_use]
    pub fn rec_size(&self) -> usize {
        self.header.rec_size as usize
    }

    /// Number of records in the file
    #[must_use]
    pub fn n_records(&self) -> u64 {
        u64::from(self.header.n_records)
    }

    /// Raw bytes of the record at `pos`
    pub fn record(&self, pos: u64) -> Result<&[u8]> {
        if pos >= self.n_records() {
            return Err(IndexError::OutOfRange(pos, self.n_records()).into());
        }
        let start = SIZE_HEADER + pos as usize * self.rec_size();
        Ok(&self.mmap[start..start + self.rec_size()])
    }
}

/// One record of the entry-name index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRecord {
    /// Entry name, NUL-trimmed at the record's fixed ID width
    pub name: String,
    /// Byte offset of the entry's annotation in its division's data file
    pub ann_offset: u32,
    /// Companion sequence-file offset; carried but unused here
    pub seq_offset: u32,
    /// 1-based division code
    pub div_code: i16,
}

/// The primary, entry-name-sorted index of a fixed-format database
pub struct EntryIndex {
    file: CdIndexFile,
}

impl EntryIndex {
    /// Opens `entryname.idx` inside the index directory; `Ok(None)` when absent
    pub fn open(dir: &Path) -> Result<Option<Self>> {
        let Some(file) = CdIndexFile::open(dir, ENTRY_INDEX_FILE)? else {
            return Ok(None);
        };
        if file.rec_size() <= ENTRY_FIXED_BYTES {
            return Err(HeaderError::InvalidRecordSize(file.rec_size() as i64).into());
        }
        Ok(Some(Self { file }))
    }

    #[must_use]
    pub fn n_records(&self) -> u64 {
        self.file.n_records()
    }

    #[must_use]
    pub fn header(&self) -> &CdHeader {
        self.file.header()
    }

    /// Width of the name field in bytes
    #[must_use]
    pub fn name_width(&self) -> usize {
        self.file.rec_size() - ENTRY_FIXED_BYTES
    }

    /// Positioned read of the record at `pos` (no search)
    pub fn record(&self, pos: u64) -> Result<EntryRecord> {
        let bytes = self.file.record(pos)?;
        let width = self.name_width();
        let end = memchr::memchr(0, &bytes[..width]).unwrap_or(width);
        Ok(EntryRecord {
            name: String::from_utf8_lossy(&bytes[..end]).into_owned(),
            ann_offset: LittleEndian::read_u32(&bytes[width..width + 4]),
            seq_offset: LittleEndian::read_u32(&bytes[width + 4..width + 8]),
            div_code: LittleEndian::read_i16(&bytes[width + 8..width + 10]),
        })
    }

    /// Exact-match lookup of a single entry name
    pub fn search(&self, id: &str, fold: bool) -> Result<Option<EntryRecord>> {
        match search::exact(self, id.as_bytes(), fold)? {
            Some(pos) => Ok(Some(self.record(pos)?)),
            None => Ok(None),
        }
    }

    /// Wildcard lookup over the entry-name index.
    ///
    /// Binary-searches the pattern's literal prefix to an inclusive record
    /// range, then applies full wildcard matching across that range only.
    /// Matching hits pass through the skip table before landing in `out`.
    /// Returns false, without scanning, when no record shares the prefix.
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
            let record = self.record(pos)?;
            if wildcard::matches(pat, record.name.as_bytes(), fold) {
                if let Some(hit) = filtered_hit(&record, skip) {
                    out.push(hit);
                }
            }
        }
        Ok(true)
    }
}

impl SortedNames for EntryIndex {
    fn len(&self) -> u64 {
        self.file.n_records()
    }

    fn read_name(&self, pos: u64, buf: &mut Vec<u8>) -> Result<bool> {
        let bytes = self.file.record(pos)?;
        let width = self.name_width();
        let end = memchr::memchr(0, &bytes[..width]).unwrap_or(width);
        buf.clear();
        buf.extend_from_slice(&bytes[..end]);
        Ok(true)
    }
}

/// Converts an entry record into a result, applying division validation and
/// the skip table. Stray division codes are dropped, not fatal.
pub(crate) fn filtered_hit(record: &EntryRecord, skip: &SkipTable) -> Option<ResultEntry> {
    if record.div_code < 1 {
        warn!(
            "entry '{}' carries invalid division code {}",
            record.name, record.div_code
        );
        return None;
    }
    let division = record.div_code as u32;
    if !skip.allows(division as usize - 1) {
        return None;
    }
    Some(ResultEntry::new(division, u64::from(record.ann_offset)))
}
