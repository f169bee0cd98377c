//! Machine configuration.
//!
//! Every section and field has a default, so an empty file describes a
//! standard 48K Spectrum.
//!
//! ```toml
//! [screen]
//! contention_type = "gate-array"
//!
//! [cpu]
//! clock_multiplier = 2
//!
//! [tape]
//! input = "games/manic.tzx"
//! output_dir = "saves"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use sinclair_ula::ScreenGeometry;

use crate::error::SpectrumError;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SpectrumConfig {
    pub screen: ScreenGeometry,
    pub cpu: CpuConfiguration,
    pub memory: MemoryConfiguration,
    pub beeper: BeeperConfiguration,
    pub tape: TapeConfiguration,
    pub rom: RomConfiguration,
}

impl SpectrumConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, SpectrumError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, SpectrumError> {
        let text = std::fs::read_to_string(path).map_err(|e| SpectrumError::file(path, e))?;
        Self::from_toml_str(&text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CpuConfiguration {
    /// Processor clock at multiplier 1, in Hz.
    pub base_clock_frequency: u32,
    /// Turbo factor. Clamped to 1, 2, 4 or 8 by [`clamp_clock_multiplier`].
    pub clock_multiplier: u32,
}

impl Default for CpuConfiguration {
    fn default() -> Self {
        Self {
            base_clock_frequency: 3_500_000,
            clock_multiplier: 1,
        }
    }
}

/// Round a configured clock multiplier down to 1, 2, 4 or 8.
#[must_use]
pub fn clamp_clock_multiplier(value: u32) -> u32 {
    match value {
        0..=1 => 1,
        2..=3 => 2,
        4..=7 => 4,
        _ => 8,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MemoryConfiguration {
    /// Apply ULA contention to $4000-$7FFF.
    pub contended: bool,
}

impl Default for MemoryConfiguration {
    fn default() -> Self {
        Self { contended: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct BeeperConfiguration {
    pub sample_rate: u32,
    /// Sample value while the EAR line is high.
    pub volume: f32,
}

impl Default for BeeperConfiguration {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            volume: 0.5,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TapeConfiguration {
    /// TAP or TZX image played when the ROM enters LOAD.
    pub input: Option<PathBuf>,
    /// Directory that receives TAP files recorded by SAVE.
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RomConfiguration {
    /// 16K ROM image. Ignored when the host supplies ROM bytes directly.
    pub path: Option<PathBuf>,
}
