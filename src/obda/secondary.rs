//! Variable-format secondary indices
//!
//! A secondary index (`id_<namespace>.index`) maps a non-id field value to
//! the *primary key string* of the entry it belongs to — not to a record
//! position. Every match must therefore be re-resolved with a full
//! exact-match search against the primary index, which is materially more
//! expensive per hit than the fixed format's direct hit-run dereference and
//! is implemented exactly that way.
//!
//! Duplicate field values are stored as adjacent records, so exact lookup is
//! a range scan over the run of equal keys rather than a single probe.

use std::path::Path;

use log::warn;

use super::index::{filtered_hit, tokenize, KeyIndex, ObdaIndexFile};
use crate::division::SkipTable;
use crate::error::Result;
use crate::query::ResultEntry;
use crate::search::{self, SortedNames};
use crate::wildcard;

/// Filename of the secondary index for a namespace
#[must_use]
pub fn index_file(namespace: &str) -> String {
    format!("id_{namespace}.index")
}

/// One record of a secondary index: the field value and the primary key it
/// re-resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecondaryRecord {
    pub name: String,
    pub target: String,
}

/// An open secondary index for one namespace
pub struct SecondaryIndex {
    file: ObdaIndexFile,
}

impl SecondaryIndex {
    /// Opens `id_<namespace>.index` inside the index directory; `Ok(None)`
    /// when absent
    pub fn open(dir: &Path, namespace: &str) -> Result<Option<Self>> {
        Ok(ObdaIndexFile::open(dir, &index_file(namespace))?.map(|file| Self { file }))
    }

    #[must_use]
    pub fn n_records(&self) -> u64 {
        self.file.n_records()
    }

    /// Positioned read; malformed records are logged and reported `Ok(None)`
    pub fn record(&self, pos: u64) -> Result<Option<SecondaryRecord>> {
        let tokens = tokenize(self.file.line(pos)?);
        if tokens.len() < 2 {
            warn!(
                "malformed secondary record at position {pos}: {} tokens",
                tokens.len()
            );
            return Ok(None);
        }
        Ok(Some(SecondaryRecord {
            name: String::from_utf8_lossy(tokens[0]).into_owned(),
            target: String::from_utf8_lossy(tokens[1]).into_owned(),
        }))
    }

    /// Exact-match lookup of a field value.
    ///
    /// Locates the contiguous run of records equal to `value` and re-resolves
    /// each one's target key against the primary index.
    pub fn search(
        &self,
        primary: &KeyIndex,
        value: &str,
        fold: bool,
        skip: &SkipTable,
        out: &mut Vec<ResultEntry>,
    ) -> Result<bool> {
        let Some((first, last)) = search::prefix_range(self, value.as_bytes(), fold)? else {
            return Ok(false);
        };
        let mut found = false;
        let mut buf = Vec::new();
        for pos in first..=last {
            // the prefix range may include longer names; keep exact ones only
            if !self.read_name(pos, &mut buf)? {
                continue;
            }
            if !equal_fold(&buf, value.as_bytes(), fold) {
                continue;
            }
            found = true;
            self.resolve(primary, pos, fold, skip, out)?;
        }
        Ok(found)
    }

    /// Wildcard lookup over the field values, re-resolving every match
    /// through the primary index
    pub fn find(
        &self,
        primary: &KeyIndex,
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
        let mut buf = Vec::new();
        for pos in first..=last {
            if !self.read_name(pos, &mut buf)? {
                continue;
            }
            if wildcard::matches(pat, &buf, fold) {
                self.resolve(primary, pos, fold, skip, out)?;
            }
        }
        Ok(true)
    }

    /// Re-resolves one secondary record's target key with a full exact-match
    /// search on the primary index (no positional shortcut exists)
    fn resolve(
        &self,
        primary: &KeyIndex,
        pos: u64,
        fold: bool,
        skip: &SkipTable,
        out: &mut Vec<ResultEntry>,
    ) -> Result<()> {
        let Some(record) = self.record(pos)? else {
            return Ok(());
        };
        match primary.search(&record.target, fold)? {
            Some(entry) => {
                if let Some(hit) = filtered_hit(&entry, skip) {
                    out.push(hit);
                }
            }
            None => warn!(
                "secondary value '{}' points at unknown entry '{}'",
                record.name, record.target
            ),
        }
        Ok(())
    }
}

impl SortedNames for SecondaryIndex {
    fn len(&self) -> u64 {
        self.file.n_records()
    }

    fn read_name(&self, pos: u64, buf: &mut Vec<u8>) -> Result<bool> {
        let line = self.file.line(pos)?;
        if memchr::memchr(b'\t', line).is_none() {
            warn!("malformed secondary record at position {pos}: no field separator");
            return Ok(false);
        }
        let tokens = tokenize(line);
        buf.clear();
        buf.extend_from_slice(tokens[0]);
        Ok(true)
    }
}

fn equal_fold(a: &[u8], b: &[u8], fold: bool) -> bool {
    if fold {
        a.eq_ignore_ascii_case(b)
    } else {
        a == b
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::obda::writer::{ObdaEntry, ObdaIndexWriter};
    use anyhow::Result;
    use tempfile::tempdir;

    fn write_fixture(dir: &Path) -> Result<()> {
        let writer = ObdaIndexWriter::new(dir);
        let mut entries = vec![
            ObdaEntry::new("ENT1", 0, 100),
            ObdaEntry::new("ENT2", 0, 200),
            ObdaEntry::new("ENT3", 1, 300),
        ];
        writer.write_primary("ID", &mut entries)?;
        let mut pairs = vec![
            ("KINASE".to_string(), "ENT1".to_string()),
            ("KINASE".to_string(), "ENT3".to_string()),
            ("LIGASE".to_string(), "ENT2".to_string()),
        ];
        writer.write_secondary("KEYWORD", &mut pairs)?;
        Ok(())
    }

    #[test]
    fn test_exact_resolves_duplicate_run() -> Result<()> {
        let dir = tempdir()?;
        write_fixture(dir.path())?;
        let primary = KeyIndex::open(dir.path(), "ID")?.expect("primary");
        let index = SecondaryIndex::open(dir.path(), "KEYWORD")?.expect("secondary");

        let mut out = Vec::new();
        assert!(index.search(&primary, "KINASE", true, &SkipTable::keep_all(2), &mut out)?);
        let mut hits: Vec<(u32, u64)> = out.iter().map(|e| (e.division, e.offset)).collect();
        hits.sort_unstable();
        assert_eq!(hits, vec![(0, 100), (1, 300)]);
        Ok(())
    }

    #[test]
    fn test_exact_does_not_prefix_match() -> Result<()> {
        let dir = tempdir()?;
        let writer = ObdaIndexWriter::new(dir.path());
        let mut entries = vec![ObdaEntry::new("ENT1", 0, 100), ObdaEntry::new("ENT2", 0, 200)];
        writer.write_primary("ID", &mut entries)?;
        let mut pairs = vec![
            ("KINASE".to_string(), "ENT1".to_string()),
            ("KINASES".to_string(), "ENT2".to_string()),
        ];
        writer.write_secondary("KEYWORD", &mut pairs)?;

        let primary = KeyIndex::open(dir.path(), "ID")?.expect("primary");
        let index = SecondaryIndex::open(dir.path(), "KEYWORD")?.expect("secondary");
        let mut out = Vec::new();
        assert!(index.search(&primary, "KINASE", true, &SkipTable::keep_all(1), &mut out)?);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].offset, 100);
        Ok(())
    }

    #[test]
    fn test_find_reresolves_through_primary() -> Result<()> {
        let dir = tempdir()?;
        write_fixture(dir.path())?;
        let primary = KeyIndex::open(dir.path(), "ID")?.expect("primary");
        let index = SecondaryIndex::open(dir.path(), "KEYWORD")?.expect("secondary");

        let mut out = Vec::new();
        assert!(index.find(&primary, "*ASE", true, &SkipTable::keep_all(2), &mut out)?);
        assert_eq!(out.len(), 3);

        out.clear();
        assert!(!index.find(&primary, "ZZZ*", true, &SkipTable::keep_all(2), &mut out)?);
        Ok(())
    }

    #[test]
    fn test_dangling_target_is_dropped() -> Result<()> {
        let dir = tempdir()?;
        let writer = ObdaIndexWriter::new(dir.path());
        let mut entries = vec![ObdaEntry::new("ENT1", 0, 100)];
        writer.write_primary("ID", &mut entries)?;
        let mut pairs = vec![("KINASE".to_string(), "GONE".to_string())];
        writer.write_secondary("KEYWORD", &mut pairs)?;

        let primary = KeyIndex::open(dir.path(), "ID")?.expect("primary");
        let index = SecondaryIndex::open(dir.path(), "KEYWORD")?.expect("secondary");
        let mut out = Vec::new();
        // the value exists, its target does not: found but zero hits
        assert!(index.search(&primary, "KINASE", true, &SkipTable::keep_all(1), &mut out)?);
        assert!(out.is_empty());
        Ok(())
    }
}
