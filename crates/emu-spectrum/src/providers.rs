//! Host-side providers: where frames and audio go, where tape content comes
//! from and where saved blocks end up.

use std::io::{Cursor, Read};
use std::path::PathBuf;

use crate::error::SpectrumError;

/// Receives completed frames.
pub trait FrameSink {
    fn start_new_frame(&mut self);

    /// `pixels` holds one palette index per pixel, row-major.
    fn display_frame(&mut self, pixels: &[u8]);
}

/// Receives one frame's worth of beeper samples at a time.
pub trait AudioSink {
    fn add_samples(&mut self, samples: &[f32]);
}

/// Tape content for LOAD and a destination for SAVE.
pub trait TapeProvider {
    /// Sequential reader over a TAP or TZX image, `None` when no tape is
    /// inserted.
    fn content(&mut self) -> Result<Option<Box<dyn Read>>, SpectrumError>;

    /// Start a new output file for a SAVE session.
    fn create_tape_file(&mut self) -> Result<(), SpectrumError>;

    /// Name the current output file.
    fn set_name(&mut self, name: &str);

    /// Append one saved block (flag, payload and checksum).
    fn save_tape_block(&mut self, block: &[u8]) -> Result<(), SpectrumError>;

    /// Close the current output file.
    fn finalize_tape_file(&mut self) -> Result<(), SpectrumError>;
}

/// Keeps tape content and everything saved in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryTapeProvider {
    content: Option<Vec<u8>>,
    name: Option<String>,
    current: Vec<Vec<u8>>,
    /// Finalised files as `(name, blocks)`.
    files: Vec<(Option<String>, Vec<Vec<u8>>)>,
}

impl MemoryTapeProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider playing `image` (TAP or TZX bytes).
    #[must_use]
    pub fn with_content(image: Vec<u8>) -> Self {
        Self {
            content: Some(image),
            ..Self::default()
        }
    }

    pub fn insert(&mut self, image: Vec<u8>) {
        self.content = Some(image);
    }

    pub fn eject(&mut self) {
        self.content = None;
    }

    /// Blocks saved since the last `create_tape_file`.
    #[must_use]
    pub fn saved_blocks(&self) -> &[Vec<u8>] {
        &self.current
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[must_use]
    pub fn finalized_files(&self) -> &[(Option<String>, Vec<Vec<u8>>)] {
        &self.files
    }
}

impl TapeProvider for MemoryTapeProvider {
    fn content(&mut self) -> Result<Option<Box<dyn Read>>, SpectrumError> {
        Ok(self
            .content
            .clone()
            .map(|bytes| Box::new(Cursor::new(bytes)) as Box<dyn Read>))
    }

    fn create_tape_file(&mut self) -> Result<(), SpectrumError> {
        self.name = None;
        self.current.clear();
        Ok(())
    }

    fn set_name(&mut self, name: &str) {
        self.name = Some(name.to_owned());
    }

    fn save_tape_block(&mut self, block: &[u8]) -> Result<(), SpectrumError> {
        self.current.push(block.to_vec());
        Ok(())
    }

    fn finalize_tape_file(&mut self) -> Result<(), SpectrumError> {
        self.files
            .push((self.name.clone(), std::mem::take(&mut self.current)));
        Ok(())
    }
}

/// Reads tape content from a file and writes saved sessions as TAP files.
///
/// Saved blocks are buffered and written to `<output_dir>/<name>.tap` when
/// the session is finalised. Unnamed sessions are written as `saved.tap`.
/// Characters other than ASCII letters, digits, `-` and `_` in the name are
/// replaced with `_`, so the file always lands inside `output_dir`.
#[derive(Debug, Clone)]
pub struct FileTapeProvider {
    input: Option<PathBuf>,
    output_dir: PathBuf,
    name: Option<String>,
    buffer: Vec<u8>,
}

impl FileTapeProvider {
    #[must_use]
    pub fn new(input: Option<PathBuf>, output_dir: PathBuf) -> Self {
        Self {
            input,
            output_dir,
            name: None,
            buffer: Vec::new(),
        }
    }

    /// Path the current session will be written to.
    #[must_use]
    pub fn output_path(&self) -> PathBuf {
        let stem: String = self
            .name
            .as_deref()
            .unwrap_or_default()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let stem = if stem.is_empty() { "saved" } else { &stem };
        self.output_dir.join(format!("{stem}.tap"))
    }
}

impl TapeProvider for FileTapeProvider {
    fn content(&mut self) -> Result<Option<Box<dyn Read>>, SpectrumError> {
        let Some(path) = &self.input else {
            return Ok(None);
        };
        let file = std::fs::File::open(path).map_err(|e| SpectrumError::file(path, e))?;
        Ok(Some(Box::new(std::io::BufReader::new(file))))
    }

    fn create_tape_file(&mut self) -> Result<(), SpectrumError> {
        self.name = None;
        self.buffer.clear();
        Ok(())
    }

    fn set_name(&mut self, name: &str) {
        self.name = Some(name.to_owned());
    }

    fn save_tape_block(&mut self, block: &[u8]) -> Result<(), SpectrumError> {
        format_spectrum_tap::write_block(&mut self.buffer, block)?;
        Ok(())
    }

    fn finalize_tape_file(&mut self) -> Result<(), SpectrumError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let path = self.output_path();
        std::fs::create_dir_all(&self.output_dir)
            .map_err(|e| SpectrumError::file(&self.output_dir, e))?;
        std::fs::write(&path, &self.buffer).map_err(|e| SpectrumError::file(&path, e))?;
        log::info!("wrote {} bytes to {}", self.buffer.len(), path.display());
        self.buffer.clear();
        Ok(())
    }
}
