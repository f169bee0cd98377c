//! Spectrum memory subsystem.
//!
//! The trait abstracts ROM paging and contention so the bus doesn't need to
//! know which memory board is fitted.

#![allow(clippy::cast_possible_truncation)] // u16 addresses index into arrays.

use crate::device::{AttachContext, Device, DeviceKind};
use crate::error::SpectrumError;

/// Size of one ROM page.
pub const ROM_SIZE: usize = 0x4000;

/// Memory interface for Spectrum boards.
///
/// `peek()` is what the renderer and diagnostics use: no side effects, no
/// contention. Contention itself is applied by the bus, which asks
/// `contended_page()` for every access.
pub trait SpectrumMemory: Device {
    fn read(&self, addr: u16) -> u8;

    /// ROM writes are silently ignored.
    fn write(&mut self, addr: u16, value: u8);

    fn peek(&self, addr: u16) -> u8 {
        self.read(addr)
    }

    /// Is this address in contended RAM?
    fn contended_page(&self, addr: u16) -> bool;

    /// Index of the ROM page mapped at $0000.
    fn selected_rom(&self) -> u8 {
        0
    }

    /// Page in another ROM. No-op on single-ROM boards.
    fn select_rom(&mut self, _index: u8) {}

    /// Load the ROM image. The length must be a whole number of pages.
    fn copy_rom(&mut self, image: &[u8]) -> Result<(), SpectrumError>;
}

/// 48K Spectrum memory: 16K ROM + 48K RAM.
///
/// Layout:
/// - $0000-$3FFF: ROM
/// - $4000-$7FFF: RAM (contended, screen at $4000-$5AFF)
/// - $8000-$FFFF: RAM (uncontended)
pub struct Memory48K {
    rom: Box<[u8; ROM_SIZE]>,
    ram: Box<[u8; 0xC000]>,
}

impl Memory48K {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rom: Box::new([0; ROM_SIZE]),
            ram: Box::new([0; 0xC000]),
        }
    }

    /// Copy `data` into RAM starting at `addr`. Bytes that would land in ROM
    /// or past $FFFF are dropped.
    pub fn load(&mut self, addr: u16, data: &[u8]) {
        for (offset, &byte) in data.iter().enumerate() {
            let Some(target) = usize::from(addr).checked_add(offset) else {
                break;
            };
            if target > 0xFFFF {
                break;
            }
            self.write(target as u16, byte);
        }
    }
}

impl Default for Memory48K {
    fn default() -> Self {
        Self::new()
    }
}

impl Device for Memory48K {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Memory
    }

    fn reset(&mut self) {
        self.ram.fill(0);
    }

    fn attach(&mut self, ctx: &mut AttachContext<'_>) -> Result<(), SpectrumError> {
        self.copy_rom(ctx.rom)
    }
}

impl SpectrumMemory for Memory48K {
    fn read(&self, addr: u16) -> u8 {
        let addr = addr as usize;
        if addr < ROM_SIZE {
            self.rom[addr]
        } else {
            self.ram[addr - ROM_SIZE]
        }
    }

    fn write(&mut self, addr: u16, value: u8) {
        let addr = addr as usize;
        if addr >= ROM_SIZE {
            self.ram[addr - ROM_SIZE] = value;
        }
    }

    fn contended_page(&self, addr: u16) -> bool {
        (0x4000..0x8000).contains(&addr)
    }

    fn copy_rom(&mut self, image: &[u8]) -> Result<(), SpectrumError> {
        if image.len() != ROM_SIZE {
            return Err(SpectrumError::RomSize {
                expected: ROM_SIZE,
                actual: image.len(),
            });
        }
        self.rom.copy_from_slice(image);
        Ok(())
    }
}
