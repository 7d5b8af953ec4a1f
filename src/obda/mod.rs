//! # obda
//!
//! The variable-record index format (Open Biological Data Access flat
//! convention): a `config.dat` manifest names the data files and namespaces,
//! and each index file is fixed-width padded text with a 4-character ASCII
//! record-size preamble and tab-delimited fields.
//!
//! File ids in this format are 0-based; see [`crate::cd`] for the
//! fixed-record format with 1-based division codes.

pub mod config;
pub mod index;
pub mod secondary;
pub mod writer;

pub use config::{ObdaConfig, CONFIG_FILE};
pub use index::{KeyIndex, KeyRecord, ObdaIndexFile, SIZE_PREAMBLE};
pub use secondary::{SecondaryIndex, SecondaryRecord};
pub use writer::{ObdaEntry, ObdaIndexWriter};
