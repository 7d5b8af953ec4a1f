//! Division lookup table for the fixed format
//!
//! `division.lkp` maps 1-based division codes to the data files that make up
//! the logical database. Resolution re-reads the table record on every call
//! rather than caching parsed paths, so repeated lookups with interleaved
//! codes cannot leak state between divisions.

use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};

use super::index::CdIndexFile;
use crate::error::{HeaderError, IndexError, Result};

/// Filename of the division table within an index directory
pub const DIVISION_FILE: &str = "division.lkp";

/// One record of the division table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DivisionEntry {
    /// 1-based division code as stored
    pub code: i16,
    /// Data filename: the first space-free token of the record field
    pub filename: String,
    /// Optional companion filename following the first token; internal
    /// spacing beyond the separating run is kept as stored
    pub companion: Option<String>,
}

/// An open `division.lkp` table
pub struct DivisionLookup {
    file: CdIndexFile,
}

impl DivisionLookup {
    /// Opens `division.lkp` inside the index directory; `Ok(None)` when absent
    pub fn open(dir: &Path) -> Result<Option<Self>> {
        let Some(file) = CdIndexFile::open(dir, DIVISION_FILE)? else {
            return Ok(None);
        };
        if file.rec_size() <= 2 {
            return Err(HeaderError::InvalidRecordSize(file.rec_size() as i64).into());
        }
        Ok(Some(Self { file }))
    }

    /// Number of divisions in the table
    #[must_use]
    pub fn n_divisions(&self) -> u64 {
        self.file.n_records()
    }

    /// Resolves a 1-based division code to its table entry.
    ///
    /// The record at position `code - 1` is re-read and re-parsed on every
    /// call; two calls with the same code return identical entries regardless
    /// of what was resolved in between.
    pub fn resolve(&self, code: u32) -> Result<DivisionEntry> {
        if code == 0 || u64::from(code) > self.n_divisions() {
            return Err(IndexError::UnknownDivision(code).into());
        }
        let bytes = self.file.record(u64::from(code) - 1)?;
        let stored = LittleEndian::read_i16(&bytes[0..2]);
        let field = trimmed(&bytes[2..]);
        let (filename, companion) = split_tokens(field);
        Ok(DivisionEntry {
            code: stored,
            filename: filename.to_string(),
            companion: companion.map(ToString::to_string),
        })
    }

    /// Filenames of every division in code order, for skip-table construction
    pub fn filenames(&self) -> Result<Vec<String>> {
        (1..=self.n_divisions() as u32)
            .map(|code| Ok(self.resolve(code)?.filename))
            .collect()
    }
}

/// Trims the record field of trailing NUL padding and trailing spaces
fn trimmed(field: &[u8]) -> &str {
    let end = memchr::memchr(0, field).unwrap_or(field.len());
    std::str::from_utf8(&field[..end])
        .unwrap_or("")
        .trim_end_matches(' ')
}

/// Applies the record grammar `^([^ ]+)( +([^ ]+))?`: first token up to the
/// first space, optional remainder after the separating space run.
fn split_tokens(field: &str) -> (&str, Option<&str>) {
    match field.find(' ') {
        Some(cut) => {
            let rest = field[cut..].trim_start_matches(' ');
            if rest.is_empty() {
                (&field[..cut], None)
            } else {
                (&field[..cut], Some(rest))
            }
        }
        None => (field, None),
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::cd::writer::CdIndexWriter;
    use anyhow::Result;
    use tempfile::tempdir;

    fn write_fixture(dir: &Path, names: &[&str]) -> Result<()> {
        let writer = CdIndexWriter::new(dir, "testdb", "1.0");
        let names: Vec<String> = names.iter().map(ToString::to_string).collect();
        writer.write_divisions(&names)?;
        Ok(())
    }

    #[test]
    fn test_resolution_is_stateless() -> Result<()> {
        let dir = tempdir()?;
        write_fixture(dir.path(), &["est1.dat", "est2.dat", "fun1.dat"])?;
        let table = DivisionLookup::open(dir.path())?.expect("table present");

        let first = table.resolve(1)?;
        assert_eq!(first.filename, "est1.dat");
        assert_eq!(first.code, 1);

        // an intervening resolve must not disturb a repeat lookup
        let other = table.resolve(3)?;
        assert_eq!(other.filename, "fun1.dat");
        let again = table.resolve(1)?;
        assert_eq!(again, first);
        Ok(())
    }

    #[test]
    fn test_companion_token() -> Result<()> {
        let dir = tempdir()?;
        write_fixture(dir.path(), &["est1.ref est1.seq"])?;
        let table = DivisionLookup::open(dir.path())?.expect("table present");
        let entry = table.resolve(1)?;
        assert_eq!(entry.filename, "est1.ref");
        assert_eq!(entry.companion.as_deref(), Some("est1.seq"));
        Ok(())
    }

    #[test]
    fn test_out_of_range_codes() -> Result<()> {
        let dir = tempdir()?;
        write_fixture(dir.path(), &["est1.dat"])?;
        let table = DivisionLookup::open(dir.path())?.expect("table present");
        assert!(table.resolve(0).is_err());
        assert!(table.resolve(2).is_err());
        Ok(())
    }

    #[test]
    fn test_filenames_in_code_order() -> Result<()> {
        let dir = tempdir()?;
        write_fixture(dir.path(), &["b.dat", "a.dat"])?;
        let table = DivisionLookup::open(dir.path())?.expect("table present");
        assert_eq!(table.filenames()?, vec!["b.dat", "a.dat"]);
        Ok(())
    }
}
