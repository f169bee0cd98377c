//! MIC pulse classification and the SAVE block recorder.

use std::fmt;

/// Pilot pulse width in tacts.
pub const PILOT_PULSE: u32 = 2168;
/// First sync pulse.
pub const SYNC1_PULSE: u32 = 667;
/// Second sync pulse.
pub const SYNC2_PULSE: u32 = 735;
/// Half of a 0 bit.
pub const BIT0_PULSE: u32 = 855;
/// Half of a 1 bit.
pub const BIT1_PULSE: u32 = 1710;
/// Pulse closing a data block.
pub const TERM_SYNC_PULSE: u32 = 947;
/// Accepted deviation from a nominal width. The pilot window is twice as
/// wide.
pub const PULSE_TOLERANCE: u32 = 24;
/// Pilot pulses required before a sync pulse is accepted.
pub const MIN_PILOT_PULSES: u32 = 3000;

/// A classified MIC pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MicPulseType {
    /// Within range but matching no nominal width.
    None,
    Bit0,
    Bit1,
    Pilot,
    Sync1,
    Sync2,
    TermSync,
    TooShort,
    TooLong,
}

/// Classify a pulse by its width in tacts.
#[must_use]
pub fn classify_pulse(length: u64) -> MicPulseType {
    let near = |nominal: u32, tolerance: u32| length.abs_diff(u64::from(nominal)) <= u64::from(tolerance);

    if length < u64::from(SYNC1_PULSE - PULSE_TOLERANCE) {
        MicPulseType::TooShort
    } else if length > u64::from(PILOT_PULSE + 2 * PULSE_TOLERANCE) {
        MicPulseType::TooLong
    } else if near(PILOT_PULSE, 2 * PULSE_TOLERANCE) {
        MicPulseType::Pilot
    } else if near(SYNC1_PULSE, PULSE_TOLERANCE) {
        MicPulseType::Sync1
    } else if near(SYNC2_PULSE, PULSE_TOLERANCE) {
        MicPulseType::Sync2
    } else if near(BIT0_PULSE, PULSE_TOLERANCE) {
        MicPulseType::Bit0
    } else if near(TERM_SYNC_PULSE, PULSE_TOLERANCE) {
        MicPulseType::TermSync
    } else if near(BIT1_PULSE, PULSE_TOLERANCE) {
        MicPulseType::Bit1
    } else {
        MicPulseType::None
    }
}

/// Where the recorder is within a saved block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SavePhase {
    #[default]
    None,
    Pilot,
    Sync1,
    Sync2,
    Data,
    /// An unexpected pulse arrived. The next pulse is handled as in `None`.
    Error,
}

impl fmt::Display for SavePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Rebuilds block bytes from the pulses the ROM SAVE routine produces.
#[derive(Debug, Default)]
pub struct SaveRecorder {
    phase: SavePhase,
    pilot_count: u32,
    /// First half of the bit being received.
    pending_half: Option<MicPulseType>,
    byte: u8,
    bit_count: u8,
    buffer: Vec<u8>,
}

impl SaveRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    #[must_use]
    pub fn phase(&self) -> SavePhase {
        self.phase
    }

    #[must_use]
    pub fn pilot_count(&self) -> u32 {
        self.pilot_count
    }

    /// Feed one classified pulse. Returns the block bytes when a terminating
    /// sync closes a block.
    pub fn process_pulse(&mut self, pulse: MicPulseType) -> Option<Vec<u8>> {
        let previous = self.phase;
        let mut completed = None;

        self.phase = match (self.phase, pulse) {
            (SavePhase::None | SavePhase::Error, MicPulseType::Pilot) => {
                self.pilot_count = 1;
                SavePhase::Pilot
            }
            (SavePhase::Pilot, MicPulseType::Pilot) => {
                self.pilot_count += 1;
                SavePhase::Pilot
            }
            (SavePhase::Pilot, MicPulseType::Sync1) if self.pilot_count >= MIN_PILOT_PULSES => {
                SavePhase::Sync1
            }
            (SavePhase::Sync1, MicPulseType::Sync2) => SavePhase::Sync2,
            (SavePhase::Sync2, MicPulseType::Bit0 | MicPulseType::Bit1) => {
                self.start_data(pulse);
                SavePhase::Data
            }
            (SavePhase::Data, MicPulseType::Bit0 | MicPulseType::Bit1) => {
                self.receive_half(pulse);
                SavePhase::Data
            }
            (SavePhase::Data, MicPulseType::TermSync) => {
                completed = Some(std::mem::take(&mut self.buffer));
                SavePhase::None
            }
            _ => SavePhase::Error,
        };

        if self.phase != previous {
            log::trace!("save phase {previous} -> {} on {pulse:?}", self.phase);
        }
        completed
    }

    fn start_data(&mut self, first_half: MicPulseType) {
        self.pending_half = Some(first_half);
        self.byte = 0;
        self.bit_count = 0;
        self.buffer.clear();
    }

    fn receive_half(&mut self, half: MicPulseType) {
        if self.pending_half != Some(half) {
            self.pending_half = Some(half);
            return;
        }
        self.pending_half = None;
        self.byte = self.byte << 1 | u8::from(half == MicPulseType::Bit1);
        self.bit_count += 1;
        if self.bit_count == 8 {
            self.buffer.push(self.byte);
            self.byte = 0;
            self.bit_count = 0;
        }
    }
}
