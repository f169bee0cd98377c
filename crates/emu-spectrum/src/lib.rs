//! Cycle-accurate ZX Spectrum execution engine.
//!
//! The engine drives a Z80 (supplied through [`emu_core::Z80Cpu`]) and the
//! 48K family's timing-sensitive devices in lockstep: contended memory, the
//! raster renderer, the ULA interrupt window and the tape interface with its
//! LOAD fast path and SAVE recorder.
//!
//! ```no_run
//! use emu_core::NeverCancel;
//! use emu_spectrum::{DeviceInfoCollection, ExecuteCycleOptions, SpectrumConfig, SpectrumEngine};
//! # fn demo(cpu: impl emu_core::Z80Cpu) -> Result<(), emu_spectrum::SpectrumError> {
//! let config = SpectrumConfig::load("spectrum.toml".as_ref())?;
//! let mut engine = SpectrumEngine::new(cpu, DeviceInfoCollection::from_config(&config))?;
//! engine.run(&NeverCancel, &ExecuteCycleOptions::default());
//! # Ok(())
//! # }
//! ```

mod beeper;
mod bus;
mod config;
mod debug;
mod device;
mod device_info;
mod diagnostics;
mod engine;
mod error;
mod interrupt;
mod keyboard;
mod memory;
mod options;
mod port;
mod providers;
mod rom;
mod screen;
pub mod tape;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use beeper::BeeperDevice;
pub use bus::SpectrumBus;
pub use config::{
    BeeperConfiguration, CpuConfiguration, MemoryConfiguration, RomConfiguration,
    SpectrumConfig, TapeConfiguration, clamp_clock_multiplier,
};
pub use debug::DebugState;
pub use device::{
    AttachContext, CpuBoundDevice, CpuOpContext, Device, DeviceKind, FrameBoundDevice,
    PeripheralDevice,
};
pub use device_info::{DeviceInfo, DeviceInfoCollection};
pub use diagnostics::Diagnostics;
pub use engine::SpectrumEngine;
pub use error::SpectrumError;
pub use interrupt::{InterruptDevice, LONGEST_OP_TACTS};
pub use keyboard::KeyboardDevice;
pub use memory::{Memory48K, ROM_SIZE, SpectrumMemory};
pub use options::{DebugStepMode, EmulationMode, ExecuteCycleOptions, ExecutionCompletionReason};
pub use port::PortDevice;
pub use providers::{AudioSink, FileTapeProvider, FrameSink, MemoryTapeProvider, TapeProvider};
pub use rom::RomDevice;
pub use screen::ScreenDevice;
pub use tape::{TapeDevice, TapeEvent, TapeOperationMode};
