//! # flatidx
//!
//! Embedded indexing and retrieval for flat-file sequence databases: resolves
//! identifier and field queries against large biological sequence archives
//! without loading them into a relational database.
//!
//! Two on-disk index formats are supported:
//!
//! - [`cd`] — the fixed-record binary format modeled on the historical CD-ROM
//!   distribution layout (`entryname.idx`, `division.lkp`, `.trg`/`.hit`)
//! - [`obda`] — the variable-record OBDA flat format (`config.dat`,
//!   `key_*.key`, `id_*.index`)
//!
//! A [`QuerySession`] turns a [`DatabaseSpec`] — database name, index
//! directory, and a list of [`QueryField`] terms combined with boolean links —
//! into a stream of positioned data file handles, one per matched entry,
//! ready for downstream record parsing. Record content is never interpreted
//! here; this crate only locates it.
//!
//! ```no_run
//! use flatidx::{DatabaseSpec, IndexFormat, QueryField, QueryLink, QuerySession};
//!
//! # fn main() -> flatidx::Result<()> {
//! let spec = DatabaseSpec::new("embl", IndexFormat::EmblCd, "/data/embl/index")
//!     .with_data_dir("/data/embl")
//!     .with_field(QueryField::new("id", "HSFAU*", QueryLink::Init));
//! let mut session = QuerySession::open(spec)?;
//! session.resolve_query()?;
//! while let Some(entry) = session.next_entry()? {
//!     // parse the record starting at the seeked position
//!     let _ = (entry.division, entry.offset, entry.same_file);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cd;
mod division;
mod error;
pub mod obda;
mod query;
mod search;
mod session;
mod wildcard;

pub use division::SkipTable;
pub use error::{Error, HeaderError, IndexError, QueryError, Result};
pub use query::{QueryField, QueryLink, ResultEntry, ResultSet};
pub use search::SortedNames;
pub use session::{DatabaseSpec, IndexFormat, PositionedEntry, QuerySession};
