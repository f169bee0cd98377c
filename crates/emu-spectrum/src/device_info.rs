//! Configuration and providers per device kind.

use std::path::PathBuf;

use sinclair_ula::ScreenGeometry;

use crate::config::{
    BeeperConfiguration, CpuConfiguration, MemoryConfiguration, RomConfiguration,
    SpectrumConfig, TapeConfiguration,
};
use crate::device::{DeviceKind, PeripheralDevice};
use crate::memory::SpectrumMemory;
use crate::providers::{AudioSink, FileTapeProvider, FrameSink, TapeProvider};

/// Configuration of one device plus the host object it talks to.
pub struct DeviceInfo<C, P = ()> {
    pub configuration: C,
    pub provider: P,
}

impl<C, P: Default> DeviceInfo<C, P> {
    fn new(configuration: C) -> Self {
        Self {
            configuration,
            provider: P::default(),
        }
    }
}

/// Everything the engine needs to build its devices, keyed by device kind.
///
/// Built once before the engine; devices take their providers out of it
/// while they attach.
pub struct DeviceInfoCollection {
    /// ROM image supplied by the host, preferred over `configuration.path`.
    pub rom: DeviceInfo<RomConfiguration, Option<Vec<u8>>>,
    /// Memory board; a 48K board when absent.
    pub memory: DeviceInfo<MemoryConfiguration, Option<Box<dyn SpectrumMemory>>>,
    pub cpu: DeviceInfo<CpuConfiguration>,
    pub screen: DeviceInfo<ScreenGeometry, Option<Box<dyn FrameSink>>>,
    pub beeper: DeviceInfo<BeeperConfiguration, Option<Box<dyn AudioSink>>>,
    pub tape: DeviceInfo<TapeConfiguration, Option<Box<dyn TapeProvider>>>,
    pub sound: Option<Box<dyn PeripheralDevice>>,
    pub floppy: Option<Box<dyn PeripheralDevice>>,
}

impl DeviceInfoCollection {
    /// Collection for a configuration. When the tape section names an input
    /// image or an output directory, a [`FileTapeProvider`] is installed.
    #[must_use]
    pub fn from_config(config: &SpectrumConfig) -> Self {
        let tape_provider: Option<Box<dyn TapeProvider>> =
            if config.tape.input.is_some() || config.tape.output_dir.is_some() {
                Some(Box::new(FileTapeProvider::new(
                    config.tape.input.clone(),
                    config
                        .tape
                        .output_dir
                        .clone()
                        .unwrap_or_else(|| PathBuf::from(".")),
                )))
            } else {
                None
            };

        Self {
            rom: DeviceInfo::new(config.rom.clone()),
            memory: DeviceInfo::new(config.memory),
            cpu: DeviceInfo::new(config.cpu),
            screen: DeviceInfo::new(config.screen),
            beeper: DeviceInfo::new(config.beeper),
            tape: DeviceInfo {
                configuration: config.tape.clone(),
                provider: tape_provider,
            },
            sound: None,
            floppy: None,
        }
    }

    #[must_use]
    pub fn with_rom(mut self, image: Vec<u8>) -> Self {
        self.rom.provider = Some(image);
        self
    }

    #[must_use]
    pub fn with_memory(mut self, memory: Box<dyn SpectrumMemory>) -> Self {
        self.memory.provider = Some(memory);
        self
    }

    #[must_use]
    pub fn with_frame_sink(mut self, sink: Box<dyn FrameSink>) -> Self {
        self.screen.provider = Some(sink);
        self
    }

    #[must_use]
    pub fn with_audio_sink(mut self, sink: Box<dyn AudioSink>) -> Self {
        self.beeper.provider = Some(sink);
        self
    }

    #[must_use]
    pub fn with_tape_provider(mut self, provider: Box<dyn TapeProvider>) -> Self {
        self.tape.provider = Some(provider);
        self
    }

    #[must_use]
    pub fn with_sound(mut self, device: Box<dyn PeripheralDevice>) -> Self {
        self.sound = Some(device);
        self
    }

    #[must_use]
    pub fn with_floppy(mut self, device: Box<dyn PeripheralDevice>) -> Self {
        self.floppy = Some(device);
        self
    }

    /// Whether a device of this kind will be attached.
    #[must_use]
    pub fn is_present(&self, kind: DeviceKind) -> bool {
        match kind {
            DeviceKind::Sound => self.sound.is_some(),
            DeviceKind::Floppy => self.floppy.is_some(),
            _ => true,
        }
    }
}

impl Default for DeviceInfoCollection {
    fn default() -> Self {
        Self::from_config(&SpectrumConfig::default())
    }
}
