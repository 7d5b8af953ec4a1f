//! Variable-format index set writer
//!
//! Emits `config.dat` plus the `key_<ns>.key`/`id_<ns>.index` files the
//! variable-format engine reads back. Line width is computed from the widest
//! record, written as the 4-digit ASCII preamble, and every line is
//! space-padded to it. Records are sorted by case-folded first token before
//! writing.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::anyhow;

use super::config::CONFIG_FILE;
use super::index::key_file;
use super::secondary::index_file;
use crate::error::Result;

/// One primary key record to be written
#[derive(Debug, Clone)]
pub struct ObdaEntry {
    pub name: String,
    pub file_id: u32,
    pub offset: u64,
}

impl ObdaEntry {
    pub fn new(name: impl Into<String>, file_id: u32, offset: u64) -> Self {
        Self {
            name: name.into(),
            file_id,
            offset,
        }
    }
}

/// Writes the files of one variable-format index set into a directory
pub struct ObdaIndexWriter {
    dir: PathBuf,
}

impl ObdaIndexWriter {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    /// Writes `config.dat` for the given data files and namespaces
    pub fn write_config(
        &self,
        files: &[String],
        primary: &str,
        secondaries: &[&str],
    ) -> Result<()> {
        let mut out = BufWriter::new(File::create(self.dir.join(CONFIG_FILE))?);
        writeln!(out, "index\tflat/1")?;
        for (id, name) in files.iter().enumerate() {
            writeln!(out, "fileid_{id}\t{name}")?;
        }
        writeln!(out, "primary_namespace\t{primary}")?;
        if !secondaries.is_empty() {
            writeln!(out, "secondary_namespaces\t{}", secondaries.join(" "))?;
        }
        out.flush()?;
        Ok(())
    }

    /// Writes `key_<namespace>.key`, sorting entries by case-folded name
    pub fn write_primary(&self, namespace: &str, entries: &mut [ObdaEntry]) -> Result<()> {
        entries.sort_by_key(|e| e.name.to_ascii_uppercase());
        let mut ids = itoa::Buffer::new();
        let mut offsets = itoa::Buffer::new();
        let lines: Vec<String> = entries
            .iter()
            .map(|e| {
                format!(
                    "{}\t{}\t{}",
                    e.name,
                    ids.format(e.file_id),
                    offsets.format(e.offset)
                )
            })
            .collect();
        self.write_lines(&key_file(namespace), &lines)
    }

    /// Writes `id_<namespace>.index`, sorting pairs by case-folded value
    pub fn write_secondary(&self, namespace: &str, pairs: &mut [(String, String)]) -> Result<()> {
        pairs.sort_by_key(|(value, _)| value.to_ascii_uppercase());
        let lines: Vec<String> = pairs
            .iter()
            .map(|(value, target)| format!("{value}\t{target}"))
            .collect();
        self.write_lines(&index_file(namespace), &lines)
    }

    fn write_lines(&self, filename: &str, lines: &[String]) -> Result<()> {
        let width = lines.iter().map(String::len).max().unwrap_or(1);
        if width > 9999 {
            return Err(anyhow!("record width {width} exceeds the preamble field").into());
        }

        let mut out = BufWriter::new(File::create(self.dir.join(filename))?);
        write!(out, "{width:04}")?;
        for line in lines {
            out.write_all(line.as_bytes())?;
            for _ in line.len()..width {
                out.write_all(b" ")?;
            }
        }
        out.flush()?;
        Ok(())
    }
}
