/// Custom Result type for flatidx operations, wrapping the custom [`Error`] type
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the flatidx library, encompassing all possible error cases
/// that can occur while opening and querying flat-file database indices.
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub enum Error {
    /// Errors related to index file header processing
    HeaderError(#[from] HeaderError),
    /// Errors that occur while reading index records
    IndexError(#[from] IndexError),
    /// Errors in query construction and session handling
    QueryError(#[from] QueryError),
    /// Standard I/O errors from the Rust standard library
    IoError(#[from] std::io::Error),
    /// UTF-8 encoding/decoding errors
    Utf8Error(#[from] std::str::Utf8Error),
    /// Generic errors that can occur in any part of the system
    AnyhowError(#[from] anyhow::Error),
}

/// Errors specific to parsing and validating index file headers
#[derive(thiserror::Error, Debug)]
pub enum HeaderError {
    /// The header declares a non-positive record size
    #[error("Invalid record size in index header: {0}")]
    InvalidRecordSize(i64),

    /// The file is too small to contain a full header
    ///
    /// # Arguments
    /// * First `usize` - The actual number of bytes available
    /// * Second `usize` - The expected header size
    #[error("Index file too small for header: {0} bytes, expected at least {1}")]
    TruncatedHeader(usize, usize),

    /// The variable-format ASCII record-size preamble is not a decimal number
    #[error("Invalid record size preamble: {0:?}")]
    InvalidSizePreamble(String),
}

/// Errors that can occur while reading index records
#[derive(thiserror::Error, Debug)]
pub enum IndexError {
    /// Attempted to access a record index that is beyond the available range
    ///
    /// # Arguments
    /// * First `u64` - The requested record position
    /// * Second `u64` - The number of records in the file
    #[error("Requested record position ({0}) is out of record range ({1})")]
    OutOfRange(u64, u64),

    /// The record region of the file is shorter than the header-declared extent
    #[error("Index file truncated: record region ends at byte {0}, file has {1} bytes")]
    Truncated(u64, u64),

    /// A division code stored in an index record has no entry in the division table
    #[error("Unknown division code in index record: {0}")]
    UnknownDivision(u32),
}

/// Errors in query construction and session lifecycle handling
#[derive(thiserror::Error, Debug)]
pub enum QueryError {
    /// No index directory was configured for the database
    #[error("No index directory configured for database '{0}'")]
    MissingIndexDirectory(String),

    /// The database's entry-name index could not be opened
    #[error("No entry index found for database '{0}'")]
    MissingEntryIndex(String),

    /// The database's division lookup table could not be opened
    #[error("No division table found for database '{0}'")]
    MissingDivisionTable(String),

    /// The OBDA config.dat manifest is absent or malformed
    ///
    /// # Arguments
    /// * First `String` - The manifest path
    /// * Second `String` - A description of the defect
    #[error("Bad OBDA manifest {0}: {1}")]
    BadManifest(String, String),
}
