//! Processor contract.
//!
//! The instruction decode/execute unit lives outside this workspace. The
//! engine only needs to retire one instruction at a time, read the tact
//! counter, and raise or revoke the INT line through the state flags.

use thiserror::Error;

use crate::bus::Bus;
use crate::registers::Registers;

/// Interrupt and halt signal state of the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct StateFlags(u8);

impl StateFlags {
    pub const NONE: Self = Self(0);
    /// Maskable interrupt line is asserted.
    pub const INT: Self = Self(0x01);
    /// Non-maskable interrupt is pending.
    pub const NMI: Self = Self(0x02);
    /// Reset is pending.
    pub const RESET: Self = Self(0x04);
    /// The processor executed HALT and is waiting for an interrupt.
    pub const HALTED: Self = Self(0x08);

    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl core::ops::BitOr for StateFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// A processor fault that aborts the current run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CpuError {
    #[error("invalid opcode {opcode:#04X} at {pc:#06X}")]
    InvalidOpcode { pc: u16, opcode: u8 },
    #[error("processor fault: {0}")]
    Fault(String),
}

/// A Z80 processor as seen by the execution engine.
pub trait Z80Cpu {
    /// Total T-states executed since reset. Monotonic.
    fn tacts(&self) -> u64;

    /// Register file.
    fn registers(&self) -> &Registers;

    /// Mutable register file, used by ROM traps such as the tape fast load.
    fn registers_mut(&mut self) -> &mut Registers;

    fn state_flags(&self) -> StateFlags;

    fn set_state_flags(&mut self, flags: StateFlags);

    /// True while an instruction is only partially retired (prefix bytes
    /// consumed, opcode not yet executed).
    fn is_in_op_execution(&self) -> bool;

    /// True when the processor cannot accept a maskable interrupt right now
    /// (just after EI or a DD/FD prefix).
    fn is_interrupt_blocked(&self) -> bool;

    /// Execute exactly one instruction (or accept a pending interrupt).
    fn execute_cpu_cycle(&mut self, bus: &mut dyn Bus) -> Result<(), CpuError>;

    /// Length of the instruction at PC when it is call-like (CALL, RST,
    /// DJNZ, LDIR and friends); 0 otherwise.
    fn call_instruction_length(&self, bus: &dyn Bus) -> u16;

    fn reset(&mut self);

    fn pc(&self) -> u16 {
        self.registers().pc
    }

    fn is_halted(&self) -> bool {
        self.state_flags().contains(StateFlags::HALTED)
    }
}
