//! Memory and I/O bus interface seen by the processor.

/// Result of a bus read: the data byte plus any wait states the access
/// incurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadResult {
    pub data: u8,
    /// Extra T-states inserted by contention.
    pub wait: u8,
}

impl ReadResult {
    /// A read with no wait states.
    #[must_use]
    pub const fn new(data: u8) -> Self {
        Self { data, wait: 0 }
    }

    /// A read delayed by `wait` T-states.
    #[must_use]
    pub const fn with_wait(data: u8, wait: u8) -> Self {
        Self { data, wait }
    }
}

/// Memory and I/O bus.
///
/// The processor passes its own tact counter with every access so that the
/// bus can look up the contention delay for the raster position at which the
/// access happens. Writes return the wait states they incurred.
///
/// The `*_uncontended` variants exist for tooling and ROM traps that must
/// touch memory without disturbing timing.
pub trait Bus {
    /// Read a byte from memory.
    fn read(&mut self, addr: u16, tact: u64) -> ReadResult;

    /// Write a byte to memory. Returns wait states.
    fn write(&mut self, addr: u16, value: u8, tact: u64) -> u8;

    /// Read a byte from an I/O port.
    fn io_read(&mut self, port: u16, tact: u64) -> ReadResult;

    /// Write a byte to an I/O port. Returns wait states.
    fn io_write(&mut self, port: u16, value: u8, tact: u64) -> u8;

    /// Read memory without contention or side effects.
    fn read_uncontended(&self, addr: u16) -> u8;

    /// Write memory without contention.
    fn write_uncontended(&mut self, addr: u16, value: u8);
}
