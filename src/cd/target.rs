//! Secondary field lookup through `.trg`/`.hit` file pairs
//!
//! Non-id fields (accession, keyword, ...) are indexed in a pair of files per
//! field: `<field>.trg` holds the sorted field values, each pointing at a run
//! of records in the flat `<field>.hit` file, and every hit record is the
//! 1-based number of an entry-name index record. The pair is opened per query
//! field and dropped once the field is resolved, so descriptor usage stays
//! bounded however many fields a query names.

use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};
use log::warn;

use super::index::{filtered_hit, CdIndexFile, EntryIndex};
use crate::division::SkipTable;
use crate::error::{HeaderError, Result};
use crate::query::ResultEntry;
use crate::search::{self, SortedNames};
use crate::wildcard;

/// Bytes of a target record taken by the hit-run fields
/// (u32 hit count, u32 first hit)
const TARGET_FIXED_BYTES: usize = 8;

/// Record size of the `.hit` file: one u32 record number
const HIT_RECORD_BYTES: usize = 4;

/// One record of a `.trg` file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetRecord {
    /// Number of entries in the hit run; zero means the slot is empty
    pub n_hits: u32,
    /// 1-based position of the run's first record in the `.hit` file
    pub first_hit: u32,
    /// Field value, NUL-trimmed
    pub name: String,
}

/// An open `.trg`/`.hit` pair for one secondary field
pub struct TargetIndex {
    trg: CdIndexFile,
    hit: CdIndexFile,
}

impl TargetIndex {
    /// Opens the `.trg`/`.hit` pair for `field` inside the index directory.
    ///
    /// Either file being absent reports `Ok(None)`: the field contributes
    /// zero hits and the query continues.
    pub fn open(dir: &Path, field: &str) -> Result<Option<Self>> {
        let Some(trg) = CdIndexFile::open(dir, &format!("{field}.trg"))? else {
            return Ok(None);
        };
        let Some(hit) = CdIndexFile::open(dir, &format!("{field}.hit"))? else {
            return Ok(None);
        };
        if trg.rec_size() <= TARGET_FIXED_BYTES {
            return Err(HeaderError::InvalidRecordSize(trg.rec_size() as i64).into());
        }
        if hit.rec_size() != HIT_RECORD_BYTES {
            return Err(HeaderError::InvalidRecordSize(hit.rec_size() as i64).into());
        }
        Ok(Some(Self { trg, hit }))
    }

    #[must_use]
    pub fn n_records(&self) -> u64 {
        self.trg.n_records()
    }

    /// Positioned read of the target record at `pos`
    pub fn target(&self, pos: u64) -> Result<TargetRecord> {
        let bytes = self.trg.record(pos)?;
        let name_field = &bytes[TARGET_FIXED_BYTES..];
        let end = memchr::memchr(0, name_field).unwrap_or(name_field.len());
        Ok(TargetRecord {
            n_hits: LittleEndian::read_u32(&bytes[0..4]),
            first_hit: LittleEndian::read_u32(&bytes[4..8]),
            name: String::from_utf8_lossy(&name_field[..end]).into_owned(),
        })
    }

    /// Exact-match lookup of a field value.
    ///
    /// On a hit, the target's run of hit records is resolved against the
    /// primary index by positioned reads. A located slot with `n_hits == 0`
    /// counts as not found.
    pub fn search(
        &self,
        entries: &EntryIndex,
        value: &str,
        fold: bool,
        skip: &SkipTable,
        out: &mut Vec<ResultEntry>,
    ) -> Result<bool> {
        let Some(pos) = search::exact(self, value.as_bytes(), fold)? else {
            return Ok(false);
        };
        let target = self.target(pos)?;
        if target.n_hits == 0 {
            return Ok(false);
        }
        self.resolve_run(entries, &target, skip, out)?;
        Ok(true)
    }

    /// Wildcard lookup over the field values.
    ///
    /// Same two-phase prefix-range narrowing as the primary index query; each
    /// matching target record has its hit run resolved and appended. Returns
    /// false without scanning when no record shares the literal prefix.
    pub fn find(
        &self,
        entries: &EntryIndex,
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
            let target = self.target(pos)?;
            if wildcard::matches(pat, target.name.as_bytes(), fold) {
                self.resolve_run(entries, &target, skip, out)?;
            }
        }
        Ok(true)
    }

    /// Walks a target's hit run: `n_hits` 1-based record numbers starting at
    /// `.hit` position `first_hit - 1`, each decremented to a 0-based primary
    /// index position and read directly.
    fn resolve_run(
        &self,
        entries: &EntryIndex,
        target: &TargetRecord,
        skip: &SkipTable,
        out: &mut Vec<ResultEntry>,
    ) -> Result<()> {
        if target.n_hits == 0 {
            return Ok(());
        }
        if target.first_hit == 0 {
            warn!("target '{}' carries invalid hit-run start 0", target.name);
            return Ok(());
        }
        let start = u64::from(target.first_hit) - 1;
        for k in 0..u64::from(target.n_hits) {
            let bytes = self.hit.record(start + k)?;
            let number = LittleEndian::read_u32(&bytes[0..4]);
            if number == 0 {
                warn!("hit run of '{}' carries record number 0", target.name);
                continue;
            }
            let record = entries.record(u64::from(number) - 1)?;
            if let Some(hit) = filtered_hit(&record, skip) {
                out.push(hit);
            }
        }
        Ok(())
    }
}

impl SortedNames for TargetIndex {
    fn len(&self) -> u64 {
        self.trg.n_records()
    }

    fn read_name(&self, pos: u64, buf: &mut Vec<u8>) -> Result<bool> {
        let bytes = self.trg.record(pos)?;
        let name_field = &bytes[TARGET_FIXED_BYTES..];
        let end = memchr::memchr(0, name_field).unwrap_or(name_field.len());
        buf.clear();
        buf.extend_from_slice(&name_field[..end]);
        Ok(true)
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::cd::writer::{CdEntry, CdIndexWriter, CdTarget};
    use anyhow::Result;
    use tempfile::tempdir;

    fn write_fixture(dir: &Path) -> Result<()> {
        let writer = CdIndexWriter::new(dir, "testdb", "1.0");
        // primary positions: ENT0..ENT7 at records 0..7
        let mut entries: Vec<CdEntry> = (0u32..8)
            .map(|i| CdEntry::new(format!("ENT{i}"), 1, i * 100))
            .collect();
        writer.write_entries(&mut entries)?;
        Ok(())
    }

    #[test]
    fn test_hit_run_resolution() -> Result<()> {
        let dir = tempdir()?;
        write_fixture(dir.path())?;
        let writer = CdIndexWriter::new(dir.path(), "testdb", "1.0");
        // one value whose run occupies hit-file offsets 5,6,7:
        // pad the hit file with an earlier 5-hit run
        let mut targets = vec![
            CdTarget::new("KINASE", vec![0, 1, 2, 3, 4]),
            CdTarget::new("LIGASE", vec![5, 6, 7]),
        ];
        writer.write_field("keyword", &mut targets)?;

        let entries = EntryIndex::open(dir.path())?.expect("entry index");
        let index = TargetIndex::open(dir.path(), "keyword")?.expect("target index");
        let target_pos = search::exact(&index, b"LIGASE", true)?.expect("slot");
        let target = index.target(target_pos)?;
        assert_eq!(target.first_hit, 6); // 1-based start of the run
        assert_eq!(target.n_hits, 3);

        let mut out = Vec::new();
        assert!(index.search(&entries, "LIGASE", true, &SkipTable::keep_all(1), &mut out)?);
        let offsets: Vec<u64> = out.iter().map(|e| e.offset).collect();
        assert_eq!(offsets, vec![500, 600, 700]);
        Ok(())
    }

    #[test]
    fn test_empty_run_is_not_found() -> Result<()> {
        let dir = tempdir()?;
        write_fixture(dir.path())?;
        let writer = CdIndexWriter::new(dir.path(), "testdb", "1.0");
        let mut targets = vec![CdTarget::new("EMPTY", vec![])];
        writer.write_field("keyword", &mut targets)?;

        let entries = EntryIndex::open(dir.path())?.expect("entry index");
        let index = TargetIndex::open(dir.path(), "keyword")?.expect("target index");
        let mut out = Vec::new();
        assert!(!index.search(&entries, "EMPTY", true, &SkipTable::keep_all(1), &mut out)?);
        assert!(out.is_empty());
        Ok(())
    }

    #[test]
    fn test_wildcard_find_resolves_every_matching_run() -> Result<()> {
        let dir = tempdir()?;
        write_fixture(dir.path())?;
        let writer = CdIndexWriter::new(dir.path(), "testdb", "1.0");
        let mut targets = vec![
            CdTarget::new("HUMAN", vec![0]),
            CdTarget::new("KINASE", vec![1, 2]),
            CdTarget::new("KINETIN", vec![3]),
            CdTarget::new("LIGASE", vec![4]),
        ];
        writer.write_field("keyword", &mut targets)?;

        let entries = EntryIndex::open(dir.path())?.expect("entry index");
        let index = TargetIndex::open(dir.path(), "keyword")?.expect("target index");
        let mut out = Vec::new();
        assert!(index.find(&entries, "KIN*", true, &SkipTable::keep_all(1), &mut out)?);
        let mut offsets: Vec<u64> = out.iter().map(|e| e.offset).collect();
        offsets.sort_unstable();
        assert_eq!(offsets, vec![100, 200, 300]);

        out.clear();
        assert!(!index.find(&entries, "XYZ*", true, &SkipTable::keep_all(1), &mut out)?);
        Ok(())
    }

    #[test]
    fn test_missing_pair_reports_none() -> Result<()> {
        let dir = tempdir()?;
        write_fixture(dir.path())?;
        assert!(TargetIndex::open(dir.path(), "keyword")?.is_none());
        Ok(())
    }
}
