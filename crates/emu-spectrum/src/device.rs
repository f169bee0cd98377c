//! Device binding protocol.
//!
//! Devices implement whichever capabilities they need: every device has a
//! lifecycle ([`Device`]), some follow the frame ([`FrameBoundDevice`]) and
//! some react to each retired instruction ([`CpuBoundDevice`]). The engine
//! calls each capability on the devices that have it, in attach order.

use std::fmt;

use emu_core::Registers;

use crate::device_info::DeviceInfoCollection;
use crate::error::SpectrumError;
use crate::memory::SpectrumMemory;

/// Device roles, listed in attach order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Rom,
    Memory,
    Port,
    Cpu,
    Screen,
    Beeper,
    Keyboard,
    Interrupt,
    Tape,
    Sound,
    Floppy,
}

impl DeviceKind {
    /// Later devices may rely on earlier ones being attached.
    pub const ATTACH_ORDER: [Self; 11] = [
        Self::Rom,
        Self::Memory,
        Self::Port,
        Self::Cpu,
        Self::Screen,
        Self::Beeper,
        Self::Keyboard,
        Self::Interrupt,
        Self::Tape,
        Self::Sound,
        Self::Floppy,
    ];
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What a device can see while it attaches.
pub struct AttachContext<'a> {
    /// Configuration and providers; devices take the providers they own.
    pub device_info: &'a mut DeviceInfoCollection,
    /// ROM image loaded by the ROM device; empty before it attaches.
    pub rom: &'a [u8],
}

/// Lifecycle shared by every device.
pub trait Device {
    fn kind(&self) -> DeviceKind;

    /// Return to power-on state. Providers and configuration are kept.
    fn reset(&mut self);

    /// Bind to configuration and providers. Called once, in attach order.
    fn attach(&mut self, _ctx: &mut AttachContext<'_>) -> Result<(), SpectrumError> {
        Ok(())
    }
}

/// A device with per-frame state.
pub trait FrameBoundDevice {
    fn on_new_frame(&mut self);

    /// `overflow` is how many tacts the last instruction ran past the end
    /// of the frame; those tacts belong to the next frame.
    fn on_frame_completed(&mut self, overflow: u32);
}

/// Machine state handed to CPU-bound devices after each instruction.
pub struct CpuOpContext<'a> {
    pub registers: &'a mut Registers,
    /// Processor tacts divided by the clock multiplier.
    pub tacts: u64,
    pub memory: &'a mut dyn SpectrumMemory,
    /// Loading may bypass the tape signal.
    pub fast_tape_mode: bool,
}

/// A device notified after every fully retired instruction.
pub trait CpuBoundDevice {
    fn on_cpu_operation_completed(&mut self, ctx: &mut CpuOpContext<'_>);
}

/// An optional peripheral (sound chip, floppy controller) that decodes its
/// own ports.
pub trait PeripheralDevice: Device + FrameBoundDevice {
    /// `None` when the port is not decoded by this device.
    fn io_read(&mut self, port: u16) -> Option<u8>;

    /// Returns true when the port was decoded by this device.
    fn io_write(&mut self, port: u16, value: u8) -> bool;
}

/// Attach one device, logging the step.
pub(crate) fn attach_device<D: Device + ?Sized>(
    device: &mut D,
    device_info: &mut DeviceInfoCollection,
    rom: &[u8],
) -> Result<(), SpectrumError> {
    log::debug!("attaching {} device", device.kind());
    device.attach(&mut AttachContext { device_info, rom })
}
