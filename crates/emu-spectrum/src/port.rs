//! ULA port $FE.
//!
//! Writes: bits 0-2 border colour, bit 3 MIC, bit 4 EAR.
//! Reads: bits 0-4 keyboard half-rows, bit 6 EAR input, bits 5 and 7 high.

use crate::device::{Device, DeviceKind};

/// Latch for the last value written to the ULA port.
#[derive(Debug, Default)]
pub struct PortDevice {
    last_fe: u8,
}

impl PortDevice {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Any even port address selects the ULA.
    #[must_use]
    pub fn is_ula_port(port: u16) -> bool {
        port & 0x0001 == 0
    }

    pub fn write(&mut self, value: u8) {
        self.last_fe = value;
    }

    #[must_use]
    pub fn last_written(&self) -> u8 {
        self.last_fe
    }

    #[must_use]
    pub fn border(&self) -> u8 {
        self.last_fe & 0x07
    }

    #[must_use]
    pub fn mic(&self) -> bool {
        self.last_fe & 0x08 != 0
    }

    #[must_use]
    pub fn ear(&self) -> bool {
        self.last_fe & 0x10 != 0
    }

    /// Compose the value read from the port.
    #[must_use]
    pub fn read_value(keyboard: u8, ear: bool) -> u8 {
        keyboard & 0x1F | 0xA0 | u8::from(ear) << 6
    }
}

impl Device for PortDevice {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Port
    }

    fn reset(&mut self) {
        self.last_fe = 0;
    }
}
