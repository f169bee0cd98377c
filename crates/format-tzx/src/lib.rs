//! TZX tape images.
//!
//! TZX describes the tape signal itself: ROM-timed data blocks, turbo
//! blocks with custom pulse widths, raw tones and pulse sequences. A file
//! starts with a 10-byte header (`"ZXTape!" + 0x1A + major + minor`) and
//! continues with blocks, each introduced by an ID byte.
//!
//! Blocks that only steer playback (loops, calls, jumps) or carry
//! unsupported encodings are skipped by their declared lengths and reported
//! as [`TzxBlock::Unsupported`].
//!
//! Reference: <https://worldofspectrum.net/TZXformat.html>

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TzxError {
    #[error("TZX file too short for header (need 10 bytes)")]
    TooShort,
    #[error("invalid TZX magic (expected \"ZXTape!\" + 0x1A)")]
    BadMagic,
    #[error("truncated TZX {context} at offset {offset}: need {need} bytes, {remain} remain")]
    Truncated {
        context: &'static str,
        offset: usize,
        need: usize,
        remain: usize,
    },
    #[error("invalid used bits {used_bits} in TZX {context} at offset {offset}")]
    InvalidUsedBits {
        context: &'static str,
        offset: usize,
        used_bits: u8,
    },
}

/// A parsed TZX file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TzxFile {
    pub major: u8,
    pub minor: u8,
    pub blocks: Vec<TzxBlock>,
}

/// A single TZX block. Pulse lengths are in 3.5 MHz tacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TzxBlock {
    /// $10: data with ROM loader timing.
    StandardSpeed { pause_ms: u16, data: Vec<u8> },
    /// $11: data with custom timing.
    TurboSpeed {
        pilot_pulse: u16,
        sync1: u16,
        sync2: u16,
        zero_pulse: u16,
        one_pulse: u16,
        pilot_count: u16,
        /// Bits used in the last byte, 1 to 8.
        used_bits: u8,
        pause_ms: u16,
        data: Vec<u8>,
    },
    /// $12: one pulse width repeated.
    PureTone { pulse_len: u16, count: u16 },
    /// $13: arbitrary pulse widths.
    PulseSequence { pulses: Vec<u16> },
    /// $14: data bits without pilot or sync.
    PureData {
        zero_pulse: u16,
        one_pulse: u16,
        used_bits: u8,
        pause_ms: u16,
        data: Vec<u8>,
    },
    /// $20: silence; 0 means stop the tape.
    Pause { duration_ms: u16 },
    /// $21
    GroupStart { name: String },
    /// $22
    GroupEnd,
    /// $30
    TextDescription { text: String },
    /// $32: `(id, text)` pairs.
    ArchiveInfo { entries: Vec<(u8, String)> },
    /// Any other block, skipped.
    Unsupported { block_id: u8 },
}

impl TzxBlock {
    /// Data bytes of a block the ROM loader can read directly.
    #[must_use]
    pub fn rom_data(&self) -> Option<&[u8]> {
        match self {
            Self::StandardSpeed { data, .. } | Self::TurboSpeed { data, .. } => Some(data),
            _ => None,
        }
    }
}

const MAGIC: &[u8; 8] = b"ZXTape!\x1A";

impl TzxFile {
    pub fn parse(data: &[u8]) -> Result<Self, TzxError> {
        if data.len() < 10 {
            return Err(TzxError::TooShort);
        }
        if &data[0..8] != MAGIC {
            return Err(TzxError::BadMagic);
        }

        let mut reader = Reader { data, pos: 10 };
        let mut blocks = Vec::new();
        while reader.pos < data.len() {
            let block_id = reader.u8("block id")?;
            blocks.push(reader.block(block_id)?);
        }

        Ok(Self {
            major: data[8],
            minor: data[9],
            blocks,
        })
    }

    /// True when `data` starts with the TZX signature.
    #[must_use]
    pub fn is_tzx(data: &[u8]) -> bool {
        data.starts_with(MAGIC)
    }
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize, context: &'static str) -> Result<&'a [u8], TzxError> {
        let remain = self.data.len() - self.pos;
        if n > remain {
            return Err(TzxError::Truncated {
                context,
                offset: self.pos,
                need: n,
                remain,
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self, context: &'static str) -> Result<u8, TzxError> {
        Ok(self.take(1, context)?[0])
    }

    /// Bits used in the last data byte. A stored 0 means a full byte.
    fn used_bits(&mut self, context: &'static str) -> Result<u8, TzxError> {
        let offset = self.pos;
        match self.u8(context)? {
            0 => Ok(8),
            used_bits @ 1..=8 => Ok(used_bits),
            used_bits => Err(TzxError::InvalidUsedBits {
                context,
                offset,
                used_bits,
            }),
        }
    }

    fn u16(&mut self, context: &'static str) -> Result<u16, TzxError> {
        let b = self.take(2, context)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u24(&mut self, context: &'static str) -> Result<usize, TzxError> {
        let b = self.take(3, context)?;
        Ok(usize::from(b[0]) | usize::from(b[1]) << 8 | usize::from(b[2]) << 16)
    }

    fn u32(&mut self, context: &'static str) -> Result<usize, TzxError> {
        let b = self.take(4, context)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as usize)
    }

    fn text(&mut self, len: usize, context: &'static str) -> Result<String, TzxError> {
        Ok(String::from_utf8_lossy(self.take(len, context)?).into_owned())
    }

    fn block(&mut self, block_id: u8) -> Result<TzxBlock, TzxError> {
        let block = match block_id {
            0x10 => {
                let pause_ms = self.u16("standard speed header")?;
                let len = usize::from(self.u16("standard speed header")?);
                TzxBlock::StandardSpeed {
                    pause_ms,
                    data: self.take(len, "standard speed data")?.to_vec(),
                }
            }
            0x11 => {
                let ctx = "turbo speed header";
                let pilot_pulse = self.u16(ctx)?;
                let sync1 = self.u16(ctx)?;
                let sync2 = self.u16(ctx)?;
                let zero_pulse = self.u16(ctx)?;
                let one_pulse = self.u16(ctx)?;
                let pilot_count = self.u16(ctx)?;
                let used_bits = self.used_bits(ctx)?;
                let pause_ms = self.u16(ctx)?;
                let len = self.u24(ctx)?;
                TzxBlock::TurboSpeed {
                    pilot_pulse,
                    sync1,
                    sync2,
                    zero_pulse,
                    one_pulse,
                    pilot_count,
                    used_bits,
                    pause_ms,
                    data: self.take(len, "turbo speed data")?.to_vec(),
                }
            }
            0x12 => TzxBlock::PureTone {
                pulse_len: self.u16("pure tone")?,
                count: self.u16("pure tone")?,
            },
            0x13 => {
                let count = self.u8("pulse sequence")?;
                let pulses = (0..count)
                    .map(|_| self.u16("pulse sequence"))
                    .collect::<Result<_, _>>()?;
                TzxBlock::PulseSequence { pulses }
            }
            0x14 => {
                let ctx = "pure data header";
                let zero_pulse = self.u16(ctx)?;
                let one_pulse = self.u16(ctx)?;
                let used_bits = self.used_bits(ctx)?;
                let pause_ms = self.u16(ctx)?;
                let len = self.u24(ctx)?;
                TzxBlock::PureData {
                    zero_pulse,
                    one_pulse,
                    used_bits,
                    pause_ms,
                    data: self.take(len, "pure data")?.to_vec(),
                }
            }
            0x20 => TzxBlock::Pause {
                duration_ms: self.u16("pause")?,
            },
            0x21 => {
                let len = usize::from(self.u8("group start")?);
                TzxBlock::GroupStart {
                    name: self.text(len, "group name")?,
                }
            }
            0x22 => TzxBlock::GroupEnd,
            0x30 => {
                let len = usize::from(self.u8("text description")?);
                TzxBlock::TextDescription {
                    text: self.text(len, "text description")?,
                }
            }
            0x32 => self.archive_info()?,
            _ => {
                self.skip(block_id)?;
                TzxBlock::Unsupported { block_id }
            }
        };
        Ok(block)
    }

    fn archive_info(&mut self) -> Result<TzxBlock, TzxError> {
        let len = usize::from(self.u16("archive info")?);
        let body = self.take(len, "archive info")?;
        let mut inner = Reader { data: body, pos: 0 };
        let count = inner.u8("archive info").unwrap_or(0);
        let mut entries = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            let (Ok(id), Ok(text_len)) = (inner.u8("archive entry"), inner.u8("archive entry"))
            else {
                break;
            };
            let text_len = usize::from(text_len).min(body.len() - inner.pos);
            entries.push((id, inner.text(text_len, "archive entry")?));
        }
        Ok(TzxBlock::ArchiveInfo { entries })
    }

    /// Skip a block this reader does not model.
    fn skip(&mut self, block_id: u8) -> Result<(), TzxError> {
        let len = match block_id {
            // Direct recording: 5 bytes, then a 24-bit data length
            0x15 => {
                self.take(5, "direct recording header")?;
                self.u24("direct recording header")?
            }
            0x23 | 0x24 => 2,
            0x25 | 0x27 => 0,
            0x26 => 2 * usize::from(self.u16("call sequence")?),
            0x28 => usize::from(self.u16("select block")?),
            0x2A => 4,
            0x2B => 5,
            0x31 => {
                self.u8("message")?;
                usize::from(self.u8("message")?)
            }
            0x33 => 3 * usize::from(self.u8("hardware type")?),
            0x35 => {
                self.take(16, "custom info")?;
                self.u32("custom info")?
            }
            0x5A => 9,
            // Everything else carries a 32-bit length
            _ => self.u32("block length")?,
        };
        self.take(len, "skipped block")?;
        Ok(())
    }
}
