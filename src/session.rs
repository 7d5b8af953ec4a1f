//! Query sessions
//!
//! A [`QuerySession`] owns everything one logical query needs: the open
//! primary index, the division map, the skip table and, while iterating, the
//! currently open data file. The lifecycle is open → resolve → iterate →
//! close, with the result list drained one entry at a time so a multi-entry
//! consumer can pull records incrementally and reuse the open data file when
//! consecutive hits land in the same division.
//!
//! The index format is a closed enum: both engines are compiled in and
//! selected by `match`, there is no runtime-extensible method registry.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::cd::{self, DivisionLookup, EntryIndex, TargetIndex};
use crate::division::SkipTable;
use crate::error::{IndexError, QueryError, Result};
use crate::obda::{self, KeyIndex, ObdaConfig, SecondaryIndex};
use crate::query::{QueryField, ResultEntry, ResultSet};
use crate::wildcard;

/// The supported on-disk index formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexFormat {
    /// Fixed-record binary index set (1-based division codes)
    EmblCd,
    /// Variable-record OBDA flat index set (0-based file ids)
    Obda,
}

/// Everything the caller supplies to describe one database query
#[derive(Debug, Clone)]
pub struct DatabaseSpec {
    /// Logical database name, used in error reports
    pub name: String,
    /// Which index format the database uses
    pub format: IndexFormat,
    /// Directory holding the index files
    pub index_dir: PathBuf,
    /// Directory holding the data files; defaults to the index directory
    pub data_dir: Option<PathBuf>,
    /// Explicit data filename wildcard; `None` means `*`
    pub filename_filter: Option<String>,
    /// Space-separated exclusion wildcards for withdrawn data files
    pub exclude: Option<String>,
    /// Query terms, consumed in list order
    pub fields: Vec<QueryField>,
    /// Compare entry names without case folding
    pub case_sensitive_id: bool,
}

impl DatabaseSpec {
    pub fn new(name: impl Into<String>, format: IndexFormat, index_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            format,
            index_dir: index_dir.into(),
            data_dir: None,
            filename_filter: None,
            exclude: None,
            fields: Vec::new(),
            case_sensitive_id: false,
        }
    }

    #[must_use]
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_filename_filter(mut self, filter: impl Into<String>) -> Self {
        self.filename_filter = Some(filter.into());
        self
    }

    #[must_use]
    pub fn with_exclude(mut self, exclude: impl Into<String>) -> Self {
        self.exclude = Some(exclude.into());
        self
    }

    #[must_use]
    pub fn with_field(mut self, field: QueryField) -> Self {
        self.fields.push(field);
        self
    }

    #[must_use]
    pub fn case_sensitive(mut self) -> Self {
        self.case_sensitive_id = true;
        self
    }
}

/// Format-specific session state opened once per query
enum Backend {
    Cd {
        entries: EntryIndex,
        divisions: DivisionLookup,
    },
    Obda {
        config: ObdaConfig,
        primary: KeyIndex,
    },
}

/// The data file currently positioned for the caller
struct OpenDivision {
    division: u32,
    path: PathBuf,
    file: File,
}

/// An opened-and-seeked data file handle for one result entry.
///
/// `same_file` tells a multi-entry consumer whether this is the handle it was
/// already reading (reset your buffer in place) or a newly opened division
/// (reattach).
pub struct PositionedEntry<'a> {
    pub file: &'a mut File,
    pub path: &'a Path,
    pub division: u32,
    pub offset: u64,
    pub same_file: bool,
}

/// Per-query state machine over one logical database
pub struct QuerySession {
    spec: DatabaseSpec,
    backend: Backend,
    skip: SkipTable,
    results: VecDeque<ResultEntry>,
    current: Option<OpenDivision>,
}

impl QuerySession {
    /// Opens the session: validates the configuration, opens the division
    /// map and primary index, builds the skip table.
    ///
    /// Any failure here is fatal to the whole session; the caller sees no
    /// partial results.
    pub fn open(spec: DatabaseSpec) -> Result<Self> {
        if spec.index_dir.as_os_str().is_empty() {
            return Err(QueryError::MissingIndexDirectory(spec.name.clone()).into());
        }
        let (backend, filenames) = match spec.format {
            IndexFormat::EmblCd => {
                let divisions = DivisionLookup::open(&spec.index_dir)?
                    .ok_or_else(|| QueryError::MissingDivisionTable(spec.name.clone()))?;
                let entries = EntryIndex::open(&spec.index_dir)?
                    .ok_or_else(|| QueryError::MissingEntryIndex(spec.name.clone()))?;
                let filenames = divisions.filenames()?;
                (Backend::Cd { entries, divisions }, filenames)
            }
            IndexFormat::Obda => {
                let config = ObdaConfig::load(&spec.index_dir)?;
                let primary = KeyIndex::open(&spec.index_dir, &config.primary_namespace)?
                    .ok_or_else(|| QueryError::MissingEntryIndex(spec.name.clone()))?;
                let filenames = config.files.clone();
                (Backend::Obda { config, primary }, filenames)
            }
        };
        let skip = SkipTable::build(
            &filenames,
            spec.filename_filter.as_deref(),
            spec.exclude.as_deref(),
        );
        Ok(Self {
            spec,
            backend,
            skip,
            results: VecDeque::new(),
            current: None,
        })
    }

    /// Resolves a single-entry lookup: every field value is taken literally
    /// and searched exact-match. Returns the number of results.
    pub fn resolve_entry(&mut self) -> Result<usize> {
        self.resolve(true)
    }

    /// Resolves a multi-result wildcard query across all fields. Returns the
    /// number of results.
    pub fn resolve_query(&mut self) -> Result<usize> {
        self.resolve(false)
    }

    /// Routes to [`Self::resolve_entry`] unless any field pattern carries a
    /// wildcard, in which case the query path is taken.
    pub fn resolve_auto(&mut self) -> Result<usize> {
        let wild = self
            .spec
            .fields
            .iter()
            .any(|field| wildcard::is_wild(field.pattern.as_bytes()));
        self.resolve(!wild)
    }

    fn resolve(&mut self, exact: bool) -> Result<usize> {
        let mut set = ResultSet::new();
        for field in &self.spec.fields {
            if set.short_circuits(field.link) {
                debug!("field '{}' skipped: an earlier field already matched", field.field);
                continue;
            }
            let mut hits = Vec::new();
            match self.field_hits(field, exact, &mut hits) {
                Ok(found) => {
                    if !found {
                        debug!("field '{}' matched nothing in '{}'", field.field, self.spec.name);
                    }
                }
                // a failed field is not fatal: it contributes zero hits and
                // OR-linked siblings may still succeed
                Err(e) => {
                    warn!("search on field '{}' of '{}' failed: {e}", field.field, self.spec.name);
                    hits.clear();
                }
            }
            set.combine(field.link, &hits);
        }
        let sorted = set.into_sorted();
        let count = sorted.len();
        self.results = sorted.into();
        Ok(count)
    }

    /// Resolves one field against the primary or a secondary index.
    ///
    /// Secondary index files are opened here and dropped on return, so the
    /// per-field file pair never outlives the field's resolution.
    fn field_hits(&self, field: &QueryField, exact: bool, out: &mut Vec<ResultEntry>) -> Result<bool> {
        let fold = !self.spec.case_sensitive_id;
        match &self.backend {
            Backend::Cd { entries, .. } => {
                if field.is_id() {
                    if exact {
                        match entries.search(&field.pattern, fold)? {
                            Some(record) => {
                                if let Some(hit) = cd::index::filtered_hit(&record, &self.skip) {
                                    out.push(hit);
                                }
                                Ok(true)
                            }
                            None => Ok(false),
                        }
                    } else {
                        entries.query(&field.pattern, fold, &self.skip, out)
                    }
                } else {
                    let Some(target) = TargetIndex::open(&self.spec.index_dir, &field.field)? else {
                        warn!(
                            "no '{}' index for database '{}'",
                            field.field, self.spec.name
                        );
                        return Ok(false);
                    };
                    if exact {
                        target.search(entries, &field.pattern, true, &self.skip, out)
                    } else {
                        target.find(entries, &field.pattern, true, &self.skip, out)
                    }
                }
            }
            Backend::Obda { config, primary } => {
                let is_primary = field.is_id()
                    || field.field.eq_ignore_ascii_case(&config.primary_namespace);
                if is_primary {
                    if exact {
                        match primary.search(&field.pattern, fold)? {
                            Some(record) => {
                                if let Some(hit) = obda::index::filtered_hit(&record, &self.skip) {
                                    out.push(hit);
                                }
                                Ok(true)
                            }
                            None => Ok(false),
                        }
                    } else {
                        primary.query(&field.pattern, fold, &self.skip, out)
                    }
                } else {
                    let Some(secondary) =
                        SecondaryIndex::open(&self.spec.index_dir, &field.field)?
                    else {
                        warn!(
                            "no '{}' index for database '{}'",
                            field.field, self.spec.name
                        );
                        return Ok(false);
                    };
                    if exact {
                        secondary.search(primary, &field.pattern, true, &self.skip, out)
                    } else {
                        secondary.find(primary, &field.pattern, true, &self.skip, out)
                    }
                }
            }
        }
    }

    /// Number of results not yet consumed by [`Self::next_entry`]
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.results.len()
    }

    /// Whether the result list has been drained
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.results.is_empty()
    }

    /// Pops the next result and hands back its data file, opened and seeked.
    ///
    /// The data file stays open across calls; it is replaced only when a
    /// result lands in a different division. Once the result list is empty
    /// this returns `Ok(None)` without touching the filesystem.
    pub fn next_entry(&mut self) -> Result<Option<PositionedEntry<'_>>> {
        let Some(entry) = self.results.pop_front() else {
            return Ok(None);
        };
        let same_file = self
            .current
            .as_ref()
            .is_some_and(|c| c.division == entry.division);
        if !same_file {
            let path = self.division_path(entry.division)?;
            let file = File::open(&path)?;
            self.current = Some(OpenDivision {
                division: entry.division,
                path,
                file,
            });
        }
        let Some(current) = self.current.as_mut() else {
            return Ok(None); // just assigned above
        };
        current.file.seek(SeekFrom::Start(entry.offset))?;
        let OpenDivision { path, file, .. } = current;
        Ok(Some(PositionedEntry {
            file,
            path: path.as_path(),
            division: entry.division,
            offset: entry.offset,
            same_file,
        }))
    }

    /// Resolves a division code to the full path of its data file
    fn division_path(&self, division: u32) -> Result<PathBuf> {
        let filename = match &self.backend {
            Backend::Cd { divisions, .. } => divisions.resolve(division)?.filename,
            Backend::Obda { config, .. } => config
                .files
                .get(division as usize)
                .cloned()
                .ok_or(IndexError::UnknownDivision(division))?,
        };
        let filename = PathBuf::from(filename);
        if filename.is_absolute() {
            return Ok(filename);
        }
        let dir = self.spec.data_dir.as_deref().unwrap_or(&self.spec.index_dir);
        Ok(dir.join(filename))
    }

    /// Releases the open data file and drops any unconsumed results
    pub fn close(&mut self) {
        self.current = None;
        self.results.clear();
    }
}
