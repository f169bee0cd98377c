//! Bit-level tape playback.
//!
//! Every block is reduced to a list of pulse segments followed by a pause.
//! The EAR level is high during even-numbered pulses of a block and low
//! during the pause, so the ROM loader sees an edge at every pulse boundary.

use format_spectrum_tap::TapFile;
use format_tzx::{TzxBlock, TzxFile};

use super::pulse::{
    BIT0_PULSE, BIT1_PULSE, PILOT_PULSE, SYNC1_PULSE, SYNC2_PULSE, TERM_SYNC_PULSE,
};
use crate::error::SpectrumError;

/// Pilot pulses before a header block.
pub const HEADER_PILOT_PULSES: u32 = 8063;
/// Pilot pulses before a data block.
pub const DATA_PILOT_PULSES: u32 = 3223;
/// Tacts per millisecond at 3.5 MHz.
pub const TACTS_PER_MS: u64 = 3500;
/// Gap after a TAP block.
pub const DEFAULT_PAUSE_MS: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Tone { length: u32, count: u32 },
    Pulses(Vec<u32>),
    Data {
        zero: u32,
        one: u32,
        used_bits: u8,
        bytes: Vec<u8>,
    },
}

impl Segment {
    /// Data bits with `used_bits` of the last byte played; 0 plays the whole
    /// byte and anything above 8 is capped.
    fn data(zero: u16, one: u16, used_bits: u8, bytes: Vec<u8>) -> Self {
        Self::Data {
            zero: zero.into(),
            one: one.into(),
            used_bits: match used_bits {
                0 => 8,
                n => n.min(8),
            },
            bytes,
        }
    }

    fn pulse_count(&self) -> usize {
        match self {
            Self::Tone { count, .. } => *count as usize,
            Self::Pulses(pulses) => pulses.len(),
            Self::Data {
                used_bits, bytes, ..
            } => match bytes.len() {
                0 => 0,
                n => 2 * ((n - 1) * 8 + usize::from(*used_bits)),
            },
        }
    }

    fn pulse(&self, index: usize) -> u32 {
        match self {
            Self::Tone { length, .. } => *length,
            Self::Pulses(pulses) => pulses[index],
            Self::Data {
                zero, one, bytes, ..
            } => {
                let bit = index / 2;
                if bytes[bit / 8] & (0x80 >> (bit % 8)) != 0 {
                    *one
                } else {
                    *zero
                }
            }
        }
    }
}

/// One playable block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapeBlock {
    segments: Vec<Segment>,
    pause_tacts: u64,
    rom_data: Option<Vec<u8>>,
}

impl TapeBlock {
    /// A block as the ROM SAVE routine would write it.
    #[must_use]
    pub fn standard(bytes: Vec<u8>, pause_ms: u64) -> Self {
        let pilot_count = if bytes.first().is_some_and(|&flag| flag < 0x80) {
            HEADER_PILOT_PULSES
        } else {
            DATA_PILOT_PULSES
        };
        Self {
            segments: vec![
                Segment::Tone {
                    length: PILOT_PULSE,
                    count: pilot_count,
                },
                Segment::Pulses(vec![SYNC1_PULSE, SYNC2_PULSE]),
                Segment::Data {
                    zero: BIT0_PULSE,
                    one: BIT1_PULSE,
                    used_bits: 8,
                    bytes: bytes.clone(),
                },
                Segment::Pulses(vec![TERM_SYNC_PULSE]),
            ],
            pause_tacts: pause_ms * TACTS_PER_MS,
            rom_data: Some(bytes),
        }
    }

    fn from_tzx(block: TzxBlock) -> Option<Self> {
        let ms = |pause_ms: u16| u64::from(pause_ms) * TACTS_PER_MS;
        let block = match block {
            TzxBlock::StandardSpeed { pause_ms, data } => {
                Self::standard(data, u64::from(pause_ms))
            }
            TzxBlock::TurboSpeed {
                pilot_pulse,
                sync1,
                sync2,
                zero_pulse,
                one_pulse,
                pilot_count,
                used_bits,
                pause_ms,
                data,
            } => Self {
                segments: vec![
                    Segment::Tone {
                        length: pilot_pulse.into(),
                        count: pilot_count.into(),
                    },
                    Segment::Pulses(vec![sync1.into(), sync2.into()]),
                    Segment::data(zero_pulse, one_pulse, used_bits, data.clone()),
                ],
                pause_tacts: ms(pause_ms),
                rom_data: Some(data),
            },
            TzxBlock::PureTone { pulse_len, count } => Self::signal(
                Segment::Tone {
                    length: pulse_len.into(),
                    count: count.into(),
                },
                0,
            ),
            TzxBlock::PulseSequence { pulses } => Self::signal(
                Segment::Pulses(pulses.into_iter().map(u32::from).collect()),
                0,
            ),
            TzxBlock::PureData {
                zero_pulse,
                one_pulse,
                used_bits,
                pause_ms,
                data,
            } => Self::signal(
                Segment::data(zero_pulse, one_pulse, used_bits, data),
                ms(pause_ms),
            ),
            TzxBlock::Pause { duration_ms } => Self {
                segments: Vec::new(),
                pause_tacts: ms(duration_ms),
                rom_data: None,
            },
            TzxBlock::Unsupported { block_id } => {
                log::warn!("skipping unsupported TZX block {block_id:#04X}");
                return None;
            }
            TzxBlock::GroupStart { .. }
            | TzxBlock::GroupEnd
            | TzxBlock::TextDescription { .. }
            | TzxBlock::ArchiveInfo { .. } => return None,
        };
        Some(block)
    }

    fn signal(segment: Segment, pause_tacts: u64) -> Self {
        Self {
            segments: vec![segment],
            pause_tacts,
            rom_data: None,
        }
    }

    /// Bytes the ROM loader would read from this block, when it carries any.
    #[must_use]
    pub fn rom_data(&self) -> Option<&[u8]> {
        self.rom_data.as_deref()
    }

    #[must_use]
    pub fn pause_tacts(&self) -> u64 {
        self.pause_tacts
    }

    /// Every pulse width of the block, in order.
    pub fn pulses(&self) -> impl Iterator<Item = u32> + '_ {
        self.segments
            .iter()
            .flat_map(|segment| (0..segment.pulse_count()).map(move |i| segment.pulse(i)))
    }
}

/// Plays a list of blocks against the processor tact counter.
#[derive(Debug, Clone)]
pub struct TapePlayer {
    blocks: Vec<TapeBlock>,
    block: usize,
    segment: usize,
    pulse_in_segment: usize,
    pulse_in_block: usize,
    in_pause: bool,
    /// Tact at which the current pulse or pause ends.
    current_end: u64,
    started: bool,
}

impl TapePlayer {
    #[must_use]
    pub fn new(blocks: Vec<TapeBlock>) -> Self {
        Self {
            blocks,
            block: 0,
            segment: 0,
            pulse_in_segment: 0,
            pulse_in_block: 0,
            in_pause: false,
            current_end: 0,
            started: false,
        }
    }

    /// Build a player from a TAP or TZX image.
    pub fn from_bytes(image: &[u8]) -> Result<Self, SpectrumError> {
        if TzxFile::is_tzx(image) {
            Ok(Self::from_tzx(TzxFile::parse(image)?))
        } else {
            Ok(Self::from_tap(TapFile::parse(image)?))
        }
    }

    #[must_use]
    pub fn from_tap(tap: TapFile) -> Self {
        Self::new(
            tap.blocks
                .into_iter()
                .map(|block| TapeBlock::standard(block.bytes().to_vec(), DEFAULT_PAUSE_MS))
                .collect(),
        )
    }

    #[must_use]
    pub fn from_tzx(tzx: TzxFile) -> Self {
        Self::new(tzx.blocks.into_iter().filter_map(TapeBlock::from_tzx).collect())
    }

    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    #[must_use]
    pub fn block_index(&self) -> usize {
        self.block
    }

    #[must_use]
    pub fn current_block(&self) -> Option<&TapeBlock> {
        if self.started {
            self.blocks.get(self.block)
        } else {
            None
        }
    }

    #[must_use]
    pub fn is_at_end(&self) -> bool {
        self.started && self.block >= self.blocks.len()
    }

    /// Start playing the first block at `tact`.
    pub fn start(&mut self, tact: u64) {
        self.started = true;
        self.enter_block(0, tact);
    }

    /// Skip the rest of the current block; the next one starts at `tact`.
    pub fn next_block(&mut self, tact: u64) {
        if self.started && self.block < self.blocks.len() {
            self.enter_block(self.block + 1, tact);
        }
    }

    /// EAR level at `tact`. Tacts must not go backwards.
    pub fn ear_bit(&mut self, tact: u64) -> bool {
        if !self.started {
            return false;
        }
        while !self.is_at_end() && tact >= self.current_end {
            self.advance();
        }
        !self.is_at_end() && !self.in_pause && self.pulse_in_block % 2 == 0
    }

    fn enter_block(&mut self, index: usize, start: u64) {
        self.block = index;
        self.segment = 0;
        self.pulse_in_segment = 0;
        self.pulse_in_block = 0;
        self.in_pause = false;
        self.current_end = start;
        if index >= self.blocks.len() {
            return;
        }
        self.skip_empty_segments();
    }

    /// Move to the pulse after the one that just ended.
    fn advance(&mut self) {
        if self.in_pause {
            self.enter_block(self.block + 1, self.current_end);
            return;
        }
        self.pulse_in_segment += 1;
        self.pulse_in_block += 1;
        self.skip_empty_segments();
    }

    /// Position on the next existing pulse at or after the current one and
    /// extend `current_end` by its width, or enter the pause.
    fn skip_empty_segments(&mut self) {
        let block = &self.blocks[self.block];
        while let Some(segment) = block.segments.get(self.segment) {
            if self.pulse_in_segment < segment.pulse_count() {
                self.current_end += u64::from(segment.pulse(self.pulse_in_segment));
                return;
            }
            self.segment += 1;
            self.pulse_in_segment = 0;
        }
        self.in_pause = true;
        self.current_end += block.pause_tacts;
    }
}
