//! Maskable interrupt window.
//!
//! The ULA holds INT low for a short window starting at the configured
//! interrupt tact. The device raises INT at most once per frame, only when
//! the processor can accept it, and revokes it once the window has passed.

use emu_core::{StateFlags, Z80Cpu};

use crate::device::{Device, DeviceKind, FrameBoundDevice};

/// Tacts of the longest instruction; the window stays open this long after
/// the interrupt tact.
pub const LONGEST_OP_TACTS: u32 = 23;

#[derive(Debug)]
pub struct InterruptDevice {
    interrupt_tact: u32,
    raised: bool,
    revoked: bool,
    frame_count: u64,
}

impl InterruptDevice {
    #[must_use]
    pub fn new(interrupt_tact: u32) -> Self {
        Self {
            interrupt_tact,
            raised: false,
            revoked: false,
            frame_count: 0,
        }
    }

    #[must_use]
    pub fn interrupt_tact(&self) -> u32 {
        self.interrupt_tact
    }

    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.raised
    }

    #[must_use]
    pub fn is_revoked(&self) -> bool {
        self.revoked
    }

    /// Interrupts raised since reset.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Poll with the current frame tact before each instruction.
    pub fn check_for_interrupt(&mut self, cpu: &mut dyn Z80Cpu, current_tact: u32) {
        if self.revoked || current_tact < self.interrupt_tact {
            return;
        }
        if current_tact > self.interrupt_tact + LONGEST_OP_TACTS {
            let mut flags = cpu.state_flags();
            flags.remove(StateFlags::INT);
            cpu.set_state_flags(flags);
            self.revoked = true;
            return;
        }
        if self.raised || cpu.is_interrupt_blocked() {
            return;
        }
        let mut flags = cpu.state_flags();
        flags.insert(StateFlags::INT);
        cpu.set_state_flags(flags);
        self.raised = true;
        self.frame_count += 1;
    }
}

impl Device for InterruptDevice {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Interrupt
    }

    fn reset(&mut self) {
        self.raised = false;
        self.revoked = false;
        self.frame_count = 0;
    }
}

impl FrameBoundDevice for InterruptDevice {
    fn on_new_frame(&mut self) {
        self.raised = false;
        self.revoked = false;
    }

    fn on_frame_completed(&mut self, _overflow: u32) {}
}
