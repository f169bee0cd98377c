//! TAP tape images.
//!
//! A TAP file is a sequence of records, each a 2-byte little-endian length
//! followed by that many bytes: the flag byte, the payload and an XOR
//! checksum over flag and payload.
//!
//! A saved program is usually two records:
//!   1. Header (flag $00, 17 bytes of metadata)
//!   2. Data (flag $FF, the program or bytes themselves)
//!
//! Blocks are kept byte-for-byte, bad checksums included: the ROM loader
//! reports those itself and some protected tapes depend on it.

use std::io::Write;

use thiserror::Error;

/// Flag byte of a header block.
pub const HEADER_FLAG: u8 = 0x00;
/// Flag byte of a data block.
pub const DATA_FLAG: u8 = 0xFF;

#[derive(Debug, Error)]
pub enum TapError {
    #[error("truncated TAP file: expected 2-byte length at offset {offset}")]
    TruncatedLength { offset: usize },
    #[error("TAP record at offset {offset} has length {len}, minimum is 2 (flag + checksum)")]
    RecordTooShort { offset: usize, len: usize },
    #[error("truncated TAP record at offset {offset}: need {need} bytes, only {remain} remain")]
    TruncatedRecord {
        offset: usize,
        need: usize,
        remain: usize,
    },
    #[error("TAP block of {0} bytes does not fit a 16-bit length")]
    BlockTooLong(usize),
    #[error("I/O error writing TAP: {0}")]
    Io(#[from] std::io::Error),
}

/// One tape block: flag, payload and checksum as they appear on tape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapBlock {
    bytes: Vec<u8>,
}

impl TapBlock {
    /// Wrap raw block bytes (flag first, checksum last).
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Build a block from a flag and payload, appending the checksum.
    #[must_use]
    pub fn with_checksum(flag: u8, payload: &[u8]) -> Self {
        let mut bytes = Vec::with_capacity(payload.len() + 2);
        bytes.push(flag);
        bytes.extend_from_slice(payload);
        bytes.push(checksum(flag, payload));
        Self { bytes }
    }

    /// All bytes of the block, as the tape signal carries them.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn flag(&self) -> u8 {
        self.bytes.first().copied().unwrap_or(0)
    }

    /// Bytes between the flag and the checksum.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        match self.bytes.len() {
            0..=2 => &[],
            n => &self.bytes[1..n - 1],
        }
    }

    #[must_use]
    pub fn is_header(&self) -> bool {
        self.flag() < 0x80
    }

    /// XOR over every byte, checksum included, is zero for a good block.
    #[must_use]
    pub fn checksum_ok(&self) -> bool {
        self.bytes.iter().fold(0, |acc, &b| acc ^ b) == 0
    }
}

/// XOR checksum of a flag byte and payload.
#[must_use]
pub fn checksum(flag: u8, payload: &[u8]) -> u8 {
    payload.iter().fold(flag, |acc, &b| acc ^ b)
}

/// A parsed TAP image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TapFile {
    pub blocks: Vec<TapBlock>,
}

impl TapFile {
    pub fn parse(data: &[u8]) -> Result<Self, TapError> {
        let mut blocks = Vec::new();
        let mut offset = 0;

        while offset < data.len() {
            if offset + 2 > data.len() {
                return Err(TapError::TruncatedLength { offset });
            }
            let len = usize::from(u16::from_le_bytes([data[offset], data[offset + 1]]));
            if len < 2 {
                return Err(TapError::RecordTooShort { offset, len });
            }
            let start = offset + 2;
            if start + len > data.len() {
                return Err(TapError::TruncatedRecord {
                    offset,
                    need: len,
                    remain: data.len() - start,
                });
            }
            blocks.push(TapBlock::from_bytes(data[start..start + len].to_vec()));
            offset = start + len;
        }

        Ok(Self { blocks })
    }

    /// Serialise every block as a TAP record.
    pub fn to_bytes(&self) -> Result<Vec<u8>, TapError> {
        let mut out = Vec::new();
        for block in &self.blocks {
            write_block(&mut out, block.bytes())?;
        }
        Ok(out)
    }
}

/// Write one block as a TAP record (length word, then the bytes).
pub fn write_block(out: &mut impl Write, bytes: &[u8]) -> Result<(), TapError> {
    let len = u16::try_from(bytes.len()).map_err(|_| TapError::BlockTooLong(bytes.len()))?;
    out.write_all(&len.to_le_bytes())?;
    out.write_all(bytes)?;
    Ok(())
}
