//! Fixed-format index set writer
//!
//! Builds the on-disk files the fixed-format engine reads back:
//! `entryname.idx`, `division.lkp` and per-field `.trg`/`.hit` pairs. Record
//! widths are derived from the longest value written; entries and targets are
//! sorted by case-folded name before writing so the files satisfy the sort
//! invariant the binary searches depend on.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, WriteBytesExt};

use super::division::DIVISION_FILE;
use super::header::{CdHeader, IndexDate, SIZE_HEADER};
use super::index::ENTRY_INDEX_FILE;
use crate::error::Result;

/// One entry-name record to be written
#[derive(Debug, Clone)]
pub struct CdEntry {
    pub name: String,
    pub div_code: i16,
    pub ann_offset: u32,
    pub seq_offset: u32,
}

impl CdEntry {
    pub fn new(name: impl Into<String>, div_code: i16, ann_offset: u32) -> Self {
        Self {
            name: name.into(),
            div_code,
            ann_offset,
            seq_offset: 0,
        }
    }
}

/// One secondary field value with the 0-based primary record positions it
/// hits; stored 1-based on disk
#[derive(Debug, Clone)]
pub struct CdTarget {
    pub value: String,
    pub hits: Vec<u32>,
}

impl CdTarget {
    pub fn new(value: impl Into<String>, hits: Vec<u32>) -> Self {
        Self {
            value: value.into(),
            hits,
        }
    }
}

/// Writes the files of one fixed-format index set into a directory
pub struct CdIndexWriter {
    dir: PathBuf,
    db_name: String,
    release: String,
    date: IndexDate,
}

impl CdIndexWriter {
    pub fn new(dir: &Path, db_name: impl Into<String>, release: impl Into<String>) -> Self {
        Self {
            dir: dir.to_path_buf(),
            db_name: db_name.into(),
            release: release.into(),
            date: IndexDate::default(),
        }
    }

    #[must_use]
    pub fn with_date(mut self, date: IndexDate) -> Self {
        self.date = date;
        self
    }

    fn header(&self, n_records: u32, rec_size: i16) -> CdHeader {
        CdHeader {
            file_size: SIZE_HEADER as u32 + n_records * rec_size as u32,
            n_records,
            rec_size,
            db_name: self.db_name.clone(),
            release: self.release.clone(),
            date: self.date,
        }
    }

    fn create(&self, filename: &str) -> Result<BufWriter<File>> {
        Ok(BufWriter::new(File::create(self.dir.join(filename))?))
    }

    /// Writes `entryname.idx`, sorting the entries by case-folded name first
    pub fn write_entries(&self, entries: &mut [CdEntry]) -> Result<()> {
        entries.sort_by_key(|e| e.name.to_ascii_uppercase());
        let width = entries.iter().map(|e| e.name.len()).max().unwrap_or(1);
        let rec_size = (width + 10) as i16;

        let mut out = self.create(ENTRY_INDEX_FILE)?;
        self.header(entries.len() as u32, rec_size)
            .write_bytes(&mut out)?;
        for entry in entries {
            write_name(&mut out, &entry.name, width)?;
            out.write_u32::<LittleEndian>(entry.ann_offset)?;
            out.write_u32::<LittleEndian>(entry.seq_offset)?;
            out.write_i16::<LittleEndian>(entry.div_code)?;
        }
        out.flush()?;
        Ok(())
    }

    /// Writes `division.lkp`; division codes are assigned 1-based in list order
    pub fn write_divisions(&self, filenames: &[String]) -> Result<()> {
        let width = filenames.iter().map(String::len).max().unwrap_or(1);
        let rec_size = (width + 2) as i16;

        let mut out = self.create(DIVISION_FILE)?;
        self.header(filenames.len() as u32, rec_size)
            .write_bytes(&mut out)?;
        for (i, filename) in filenames.iter().enumerate() {
            out.write_i16::<LittleEndian>(i as i16 + 1)?;
            write_name(&mut out, filename, width)?;
        }
        out.flush()?;
        Ok(())
    }

    /// Writes the `.trg`/`.hit` pair for one secondary field.
    ///
    /// Targets are sorted by case-folded value; hit runs are laid out
    /// back-to-back in the `.hit` file with every record number stored
    /// 1-based, and each target records the 1-based position of its run.
    pub fn write_field(&self, field: &str, targets: &mut [CdTarget]) -> Result<()> {
        targets.sort_by_key(|t| t.value.to_ascii_uppercase());
        let width = targets.iter().map(|t| t.value.len()).max().unwrap_or(1);
        let rec_size = (width + 8) as i16;
        let total_hits: usize = targets.iter().map(|t| t.hits.len()).sum();

        let mut trg = self.create(&format!("{field}.trg"))?;
        self.header(targets.len() as u32, rec_size)
            .write_bytes(&mut trg)?;
        let mut first_hit: u32 = 1;
        for target in targets.iter() {
            let n_hits = target.hits.len() as u32;
            trg.write_u32::<LittleEndian>(n_hits)?;
            trg.write_u32::<LittleEndian>(if n_hits == 0 { 0 } else { first_hit })?;
            write_name(&mut trg, &target.value, width)?;
            first_hit += n_hits;
        }
        trg.flush()?;

        let mut hit = self.create(&format!("{field}.hit"))?;
        self.header(total_hits as u32, 4).write_bytes(&mut hit)?;
        for target in targets.iter() {
            for &position in &target.hits {
                hit.write_u32::<LittleEndian>(position + 1)?;
            }
        }
        hit.flush()?;
        Ok(())
    }
}

fn write_name<W: Write>(out: &mut W, name: &str, width: usize) -> Result<()> {
    let mut field = vec![0u8; width];
    let n = name.len().min(width);
    field[..n].copy_from_slice(&name.as_bytes()[..n]);
    out.write_all(&field)?;
    Ok(())
}

#[cfg(test)]
mod testing {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    #[test]
    fn test_entries_are_sorted_on_write() -> Result<()> {
        let dir = tempdir()?;
        let writer = CdIndexWriter::new(dir.path(), "db", "1.0");
        let mut entries = vec![
            CdEntry::new("zeta", 1, 3),
            CdEntry::new("ALPHA", 1, 1),
            CdEntry::new("Beta", 1, 2),
        ];
        writer.write_entries(&mut entries)?;

        let index = crate::cd::EntryIndex::open(dir.path())?.expect("index");
        assert_eq!(index.record(0)?.name, "ALPHA");
        assert_eq!(index.record(1)?.name, "Beta");
        assert_eq!(index.record(2)?.name, "zeta");
        Ok(())
    }

    #[test]
    fn test_record_width_tracks_longest_name() -> Result<()> {
        let dir = tempdir()?;
        let writer = CdIndexWriter::new(dir.path(), "db", "1.0");
        let mut entries = vec![
            CdEntry::new("A", 1, 1),
            CdEntry::new("LONGERNAME", 1, 2),
        ];
        writer.write_entries(&mut entries)?;
        let index = crate::cd::EntryIndex::open(dir.path())?.expect("index");
        assert_eq!(index.name_width(), 10);
        assert_eq!(index.record(0)?.name, "A");
        Ok(())
    }

    #[test]
    fn test_hit_file_layout() -> Result<()> {
        let dir = tempdir()?;
        let writer = CdIndexWriter::new(dir.path(), "db", "1.0");
        let mut entries: Vec<CdEntry> =
            (0u32..4).map(|i| CdEntry::new(format!("E{i}"), 1, i)).collect();
        writer.write_entries(&mut entries)?;
        let mut targets = vec![
            CdTarget::new("AAA", vec![0, 1]),
            CdTarget::new("BBB", vec![2]),
        ];
        writer.write_field("kw", &mut targets)?;

        // stored record numbers are 1-based
        let bytes = std::fs::read(dir.path().join("kw.hit"))?;
        let records = &bytes[SIZE_HEADER..];
        assert_eq!(records.len(), 12);
        assert_eq!(&records[0..4], &1u32.to_le_bytes());
        assert_eq!(&records[4..8], &2u32.to_le_bytes());
        assert_eq!(&records[8..12], &3u32.to_le_bytes());
        Ok(())
    }
}
