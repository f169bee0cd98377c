//! Beeper: turns EAR level changes into a per-frame sample buffer.
//!
//! Sample `i` of a frame is taken at frame tact `i * clock / sample_rate`.
//! Level changes fill the buffer up to the tact at which they happen; the
//! rest of the frame is filled when the frame completes, and the buffer is
//! handed to the audio sink.

use crate::config::BeeperConfiguration;
use crate::device::{AttachContext, Device, DeviceKind, FrameBoundDevice};
use crate::error::SpectrumError;
use crate::providers::AudioSink;

pub struct BeeperDevice {
    sample_rate: u32,
    volume: f32,
    clock: u64,
    frame_tacts: u32,
    samples: Vec<f32>,
    level: bool,
    /// EAR follows the tape instead of port writes while loading.
    tape_override: bool,
    muted: bool,
    sink: Option<Box<dyn AudioSink>>,
}

impl BeeperDevice {
    /// `clock` is the machine clock in Hz (tacts per second at the frame
    /// rate, not the turbo clock).
    #[must_use]
    pub fn new(config: BeeperConfiguration, clock: u32, frame_tacts: u32) -> Self {
        Self {
            sample_rate: config.sample_rate.max(1),
            volume: config.volume,
            clock: u64::from(clock.max(1)),
            frame_tacts,
            samples: Vec::new(),
            level: false,
            tape_override: false,
            muted: false,
            sink: None,
        }
    }

    /// Samples in one complete frame.
    #[must_use]
    pub fn samples_per_frame(&self) -> usize {
        (u64::from(self.frame_tacts) * u64::from(self.sample_rate) / self.clock) as usize
    }

    /// Samples of the frame in progress.
    #[must_use]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    #[must_use]
    pub fn level(&self) -> bool {
        self.level
    }

    #[must_use]
    pub fn tape_override(&self) -> bool {
        self.tape_override
    }

    pub fn set_tape_override(&mut self, from_tape: bool) {
        self.tape_override = from_tape;
    }

    /// Stop handing buffers to the sink. Sampling continues.
    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    /// Record an EAR change at `frame_tact`. Changes from the source that is
    /// not currently selected are ignored.
    pub fn process_ear_bit(&mut self, from_tape: bool, level: bool, frame_tact: u32) {
        if from_tape != self.tape_override {
            return;
        }
        self.fill_until(frame_tact);
        self.level = level;
    }

    fn fill_until(&mut self, frame_tact: u32) {
        let limit = self.samples_per_frame();
        let value = if self.level { self.volume } else { 0.0 };
        while self.samples.len() < limit {
            let sample_tact = self.samples.len() as u64 * self.clock / u64::from(self.sample_rate);
            if sample_tact >= u64::from(frame_tact) {
                break;
            }
            self.samples.push(value);
        }
    }
}

impl Device for BeeperDevice {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Beeper
    }

    fn reset(&mut self) {
        self.samples.clear();
        self.level = false;
        self.tape_override = false;
    }

    fn attach(&mut self, ctx: &mut AttachContext<'_>) -> Result<(), SpectrumError> {
        if let Some(sink) = ctx.device_info.beeper.provider.take() {
            self.sink = Some(sink);
        }
        Ok(())
    }
}

impl FrameBoundDevice for BeeperDevice {
    fn on_new_frame(&mut self) {
        self.samples.clear();
    }

    fn on_frame_completed(&mut self, _overflow: u32) {
        self.fill_until(self.frame_tacts);
        if self.muted {
            return;
        }
        if let Some(sink) = &mut self.sink {
            sink.add_samples(&self.samples);
        }
    }
}
