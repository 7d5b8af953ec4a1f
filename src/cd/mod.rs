//! # cd
//!
//! The fixed-record index format, modeled on the historical CD-ROM
//! distribution layout: every file of an index set carries the same 300-byte
//! binary header, and records are fixed-width and sorted by case-folded name.
//!
//! An index set consists of:
//! - `entryname.idx` — the primary entry-name index ([`EntryIndex`])
//! - `division.lkp` — the division code → data file table ([`DivisionLookup`])
//! - `<field>.trg` + `<field>.hit` — one pair per secondary field
//!   ([`TargetIndex`])
//!
//! Division codes in this format are 1-based; see [`crate::obda`] for the
//! variable-record format with 0-based file indices.

pub mod division;
pub mod header;
pub mod index;
pub mod target;
pub mod writer;

pub use division::{DivisionEntry, DivisionLookup, DIVISION_FILE};
pub use header::{CdHeader, IndexDate, SIZE_HEADER};
pub use index::{CdIndexFile, EntryIndex, EntryRecord, ENTRY_INDEX_FILE};
pub use target::{TargetIndex, TargetRecord};
pub use writer::{CdEntry, CdIndexWriter, CdTarget};
