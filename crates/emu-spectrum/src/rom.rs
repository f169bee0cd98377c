//! ROM image device.

use crate::device::{AttachContext, Device, DeviceKind};
use crate::error::SpectrumError;
use crate::memory::ROM_SIZE;

/// Holds the ROM image the memory board copies at attach time.
///
/// Bytes supplied by the host take precedence over `rom.path` in the
/// configuration. The image must be a single 16K page.
#[derive(Debug, Default)]
pub struct RomDevice {
    image: Vec<u8>,
}

impl RomDevice {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn image(&self) -> &[u8] {
        &self.image
    }
}

impl Device for RomDevice {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Rom
    }

    fn reset(&mut self) {}

    fn attach(&mut self, ctx: &mut AttachContext<'_>) -> Result<(), SpectrumError> {
        let info = &mut ctx.device_info.rom;
        let image = match (info.provider.take(), &info.configuration.path) {
            (Some(bytes), _) => bytes,
            (None, Some(path)) => std::fs::read(path).map_err(|e| SpectrumError::file(path, e))?,
            (None, None) => return Err(SpectrumError::MissingRom),
        };
        if image.len() != ROM_SIZE {
            return Err(SpectrumError::RomSize {
                expected: ROM_SIZE,
                actual: image.len(),
            });
        }
        log::debug!("ROM image attached ({} bytes)", image.len());
        self.image = image;
        Ok(())
    }
}
