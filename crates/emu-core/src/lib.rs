//! Collaborator contracts for the Spectrum execution core.
//!
//! The execution engine never sees a concrete Z80 or a concrete memory
//! board. It drives them through the narrow surfaces defined here: a bus
//! that reports wait states, a processor that retires one instruction at a
//! time, and a cooperative cancellation token polled between instructions.

mod bus;
mod cancel;
mod cpu;
mod observable;
mod registers;

pub use bus::{Bus, ReadResult};
pub use cancel::{CancellationToken, NeverCancel};
pub use cpu::{CpuError, StateFlags, Z80Cpu};
pub use observable::{Observable, Value};
pub use registers::{CF, HF, NF, PF, Registers, SF, ZF};
