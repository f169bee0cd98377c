//! Host-level failures.
//!
//! Execution never fails through these: cancellation, timeouts and
//! breakpoints are completion reasons. `SpectrumError` covers what can go
//! wrong while building a machine or talking to the host file system.

use std::path::PathBuf;

use format_spectrum_tap::TapError;
use format_tzx::TzxError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpectrumError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot read {}: {source}", path.display())]
    File {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
    #[error("ROM image must be {expected} bytes, got {actual}")]
    RomSize { expected: usize, actual: usize },
    #[error("no ROM image configured")]
    MissingRom,
    #[error("malformed TAP image: {0}")]
    Tap(#[from] TapError),
    #[error("malformed TZX image: {0}")]
    Tzx(#[from] TzxError),
}

impl SpectrumError {
    pub(crate) fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::File {
            path: path.into(),
            source,
        }
    }
}
