//! Spectrum system bus.
//!
//! The bus owns memory and every device the processor reaches through
//! memory or I/O cycles. Memory contention is looked up in the screen
//! timing table by the frame tact of the access.

use std::rc::Rc;

use emu_core::{Bus, ReadResult};
use sinclair_ula::ScreenTiming;

use crate::beeper::BeeperDevice;
use crate::device::PeripheralDevice;
use crate::keyboard::KeyboardDevice;
use crate::memory::SpectrumMemory;
use crate::port::PortDevice;
use crate::screen::ScreenDevice;
use crate::tape::TapeDevice;

pub struct SpectrumBus {
    pub(crate) memory: Box<dyn SpectrumMemory>,
    pub(crate) port: PortDevice,
    pub(crate) screen: ScreenDevice,
    pub(crate) beeper: BeeperDevice,
    pub(crate) keyboard: KeyboardDevice,
    pub(crate) tape: TapeDevice,
    pub(crate) sound: Option<Box<dyn PeripheralDevice>>,
    pub(crate) floppy: Option<Box<dyn PeripheralDevice>>,
    timing: Rc<ScreenTiming>,
    /// Processor tact at which the current frame started.
    pub(crate) frame_start_tact: u64,
    clock_multiplier: u32,
    contended: bool,
}

impl SpectrumBus {
    pub(crate) fn new(
        memory: Box<dyn SpectrumMemory>,
        screen: ScreenDevice,
        beeper: BeeperDevice,
        sound: Option<Box<dyn PeripheralDevice>>,
        floppy: Option<Box<dyn PeripheralDevice>>,
        clock_multiplier: u32,
        contended: bool,
    ) -> Self {
        let timing = Rc::clone(screen.timing());
        Self {
            memory,
            port: PortDevice::new(),
            screen,
            beeper,
            keyboard: KeyboardDevice::new(),
            tape: TapeDevice::new(),
            sound,
            floppy,
            timing,
            frame_start_tact: 0,
            clock_multiplier,
            contended,
        }
    }

    /// Machine tacts into the current frame for a processor tact.
    #[must_use]
    pub fn frame_tact(&self, tact: u64) -> u32 {
        (tact.saturating_sub(self.frame_start_tact) / u64::from(self.clock_multiplier)) as u32
    }

    /// Processor tact scaled back to the machine clock.
    #[must_use]
    pub fn machine_tact(&self, tact: u64) -> u64 {
        tact / u64::from(self.clock_multiplier)
    }

    #[must_use]
    pub fn memory(&self) -> &dyn SpectrumMemory {
        self.memory.as_ref()
    }

    pub fn memory_mut(&mut self) -> &mut dyn SpectrumMemory {
        self.memory.as_mut()
    }

    #[must_use]
    pub fn port(&self) -> &PortDevice {
        &self.port
    }

    #[must_use]
    pub fn screen(&self) -> &ScreenDevice {
        &self.screen
    }

    #[must_use]
    pub fn beeper(&self) -> &BeeperDevice {
        &self.beeper
    }

    pub fn keyboard_mut(&mut self) -> &mut KeyboardDevice {
        &mut self.keyboard
    }

    #[must_use]
    pub fn tape(&self) -> &TapeDevice {
        &self.tape
    }

    pub fn tape_mut(&mut self) -> &mut TapeDevice {
        &mut self.tape
    }

    /// Render frame tacts `from..to` from the current memory contents.
    pub(crate) fn render_screen(&mut self, from: u32, to: u32) {
        if to > from {
            self.screen.render(from, to - 1, self.memory.as_ref());
        }
    }

    fn memory_contention(&self, addr: u16, tact: u64) -> u8 {
        if self.contended && self.memory.contended_page(addr) {
            self.timing.contention_value(self.frame_tact(tact))
        } else {
            0
        }
    }

    fn io_contention(&self, port: u16, tact: u64) -> u8 {
        if !self.contended {
            return 0;
        }
        self.timing.io_contention(
            self.frame_tact(tact),
            PortDevice::is_ula_port(port),
            self.memory.contended_page(port),
        )
    }

    fn read_ula_port(&mut self, port: u16, tact: u64) -> u8 {
        let keys = self.keyboard.read((port >> 8) as u8);
        let ear = if self.tape.is_loading() {
            let bit = self.tape.ear_bit(self.machine_tact(tact));
            self.beeper.process_ear_bit(true, bit, self.frame_tact(tact));
            bit
        } else {
            self.port.ear()
        };
        PortDevice::read_value(keys, ear)
    }

    fn write_ula_port(&mut self, value: u8, tact: u64) {
        self.port.write(value);
        self.screen.set_border_color(self.port.border());
        self.tape.process_mic_bit(self.port.mic(), self.machine_tact(tact));
        self.beeper
            .process_ear_bit(false, self.port.ear(), self.frame_tact(tact));
    }

    fn peripherals(&mut self) -> impl Iterator<Item = &mut Box<dyn PeripheralDevice>> {
        self.sound.iter_mut().chain(self.floppy.iter_mut())
    }
}

impl Bus for SpectrumBus {
    fn read(&mut self, addr: u16, tact: u64) -> ReadResult {
        ReadResult::with_wait(self.memory.read(addr), self.memory_contention(addr, tact))
    }

    fn write(&mut self, addr: u16, value: u8, tact: u64) -> u8 {
        let wait = self.memory_contention(addr, tact);
        self.memory.write(addr, value);
        wait
    }

    fn io_read(&mut self, port: u16, tact: u64) -> ReadResult {
        let wait = self.io_contention(port, tact);
        let data = if PortDevice::is_ula_port(port) {
            self.read_ula_port(port, tact)
        } else {
            self.peripherals()
                .find_map(|device| device.io_read(port))
                .unwrap_or(0xFF)
        };
        ReadResult::with_wait(data, wait)
    }

    fn io_write(&mut self, port: u16, value: u8, tact: u64) -> u8 {
        let wait = self.io_contention(port, tact);
        if PortDevice::is_ula_port(port) {
            self.write_ula_port(value, tact);
        } else if !self.peripherals().any(|device| device.io_write(port, value)) {
            log::trace!("unhandled write {value:#04X} to port {port:#06X}");
        }
        wait
    }

    fn read_uncontended(&self, addr: u16) -> u8 {
        self.memory.peek(addr)
    }

    fn write_uncontended(&mut self, addr: u16, value: u8) {
        self.memory.write(addr, value);
    }
}
