//! Fixed-format index file header
//!
//! Every file of a fixed-format index set (`entryname.idx`, `division.lkp`,
//! and the `.trg`/`.hit` pairs) starts with the same 300-byte header carrying
//! the file size, record count, record size and release metadata. The header
//! is parsed once when a file is opened and cached read-only in the handle.

use byteorder::{ByteOrder, LittleEndian};
use std::io::{Read, Write};

use crate::error::{HeaderError, Result};

/// Size of the fixed-format header in bytes
///
/// Only the first 50 bytes are meaningful; the remainder is reserved.
pub const SIZE_HEADER: usize = 300;

const DB_NAME_WIDTH: usize = 24;
const RELEASE_WIDTH: usize = 12;

/// Release date stored in the header as three small integers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexDate {
    pub day: u8,
    pub month: u8,
    pub year: u8,
}

/// Header of one fixed-format index file
///
/// Layout (little endian):
/// - Bytes 0-3: `file_size` (u32)
/// - Bytes 4-7: `n_records` (u32)
/// - Bytes 8-9: `rec_size` (i16)
/// - Bytes 10-33: database name (NUL padded)
/// - Bytes 34-45: release string (NUL padded)
/// - Bytes 46-49: date (pad, day, month, year)
/// - Bytes 50-299: reserved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdHeader {
    /// Total file size in bytes, including this header
    pub file_size: u32,

    /// Number of records following the header
    pub n_records: u32,

    /// Size of each record in bytes
    pub rec_size: i16,

    /// Database name, NUL-trimmed
    pub db_name: String,

    /// Release string, NUL-trimmed
    pub release: String,

    /// Release date
    pub date: IndexDate,
}

impl CdHeader {
    /// Parses a header from a fixed-size byte array.
    ///
    /// # Errors
    ///
    /// Returns [`HeaderError::InvalidRecordSize`] when the declared record
    /// size is not positive; a file with such a header cannot be addressed
    /// record-by-record.
    pub fn from_bytes(buffer: &[u8; SIZE_HEADER]) -> Result<Self> {
        let file_size = LittleEndian::read_u32(&buffer[0..4]);
        let n_records = LittleEndian::read_u32(&buffer[4..8]);
        let rec_size = LittleEndian::read_i16(&buffer[8..10]);
        if rec_size <= 0 {
            return Err(HeaderError::InvalidRecordSize(i64::from(rec_size)).into());
        }
        let db_name = trimmed_string(&buffer[10..10 + DB_NAME_WIDTH]);
        let release = trimmed_string(&buffer[34..34 + RELEASE_WIDTH]);
        let date = IndexDate {
            day: buffer[47],
            month: buffer[48],
            year: buffer[49],
        };
        Ok(Self {
            file_size,
            n_records,
            rec_size,
            db_name,
            release,
            date,
        })
    }

    /// Parses a header from the beginning of an arbitrarily sized buffer
    pub fn from_buffer(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < SIZE_HEADER {
            return Err(HeaderError::TruncatedHeader(buffer.len(), SIZE_HEADER).into());
        }
        let mut bytes = [0u8; SIZE_HEADER];
        bytes.copy_from_slice(&buffer[..SIZE_HEADER]);
        Self::from_bytes(&bytes)
    }

    /// Reads a header from a reader
    pub fn from_reader<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buffer = [0u8; SIZE_HEADER];
        reader.read_exact(&mut buffer)?;
        Self::from_bytes(&buffer)
    }

    /// Serializes the header and writes it to a writer
    pub fn write_bytes<W: Write>(&self, writer: &mut W) -> Result<()> {
        let mut buffer = [0u8; SIZE_HEADER];
        LittleEndian::write_u32(&mut buffer[0..4], self.file_size);
        LittleEndian::write_u32(&mut buffer[4..8], self.n_records);
        LittleEndian::write_i16(&mut buffer[8..10], self.rec_size);
        write_padded(&mut buffer[10..10 + DB_NAME_WIDTH], &self.db_name);
        write_padded(&mut buffer[34..34 + RELEASE_WIDTH], &self.release);
        buffer[47] = self.date.day;
        buffer[48] = self.date.month;
        buffer[49] = self.date.year;
        writer.write_all(&buffer)?;
        Ok(())
    }
}

fn trimmed_string(field: &[u8]) -> String {
    let end = memchr::memchr(0, field).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

fn write_padded(field: &mut [u8], value: &str) {
    let bytes = value.as_bytes();
    let n = bytes.len().min(field.len());
    field[..n].copy_from_slice(&bytes[..n]);
}

#[cfg(test)]
mod testing {
    use super::*;
    use anyhow::Result;

    fn sample() -> CdHeader {
        CdHeader {
            file_size: 300 + 3 * 30,
            n_records: 3,
            rec_size: 30,
            db_name: "embl".to_string(),
            release: "87.0".to_string(),
            date: IndexDate {
                day: 14,
                month: 7,
                year: 6,
            },
        }
    }

    #[test]
    fn test_round_trip() -> Result<()> {
        let header = sample();
        let mut buffer = Vec::new();
        header.write_bytes(&mut buffer)?;
        assert_eq!(buffer.len(), SIZE_HEADER);
        let parsed = CdHeader::from_buffer(&buffer)?;
        assert_eq!(parsed, header);
        Ok(())
    }

    #[test]
    fn test_byte_layout() -> Result<()> {
        let mut buffer = Vec::new();
        sample().write_bytes(&mut buffer)?;
        assert_eq!(&buffer[0..4], &390u32.to_le_bytes());
        assert_eq!(&buffer[4..8], &3u32.to_le_bytes());
        assert_eq!(&buffer[8..10], &30i16.to_le_bytes());
        assert_eq!(&buffer[10..14], b"embl");
        assert_eq!(buffer[14], 0);
        assert_eq!(&buffer[34..38], b"87.0");
        assert_eq!(&buffer[46..50], [0, 14, 7, 6]);
        Ok(())
    }

    #[test]
    fn test_rejects_zero_record_size() {
        let buffer = [0u8; SIZE_HEADER];
        assert!(CdHeader::from_bytes(&buffer).is_err());
    }

    #[test]
    fn test_rejects_short_buffer() {
        assert!(CdHeader::from_buffer(&[0u8; 40]).is_err());
    }
}
