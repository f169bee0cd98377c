//! Screen device: the renderer plus the frame sink it feeds.

use std::rc::Rc;

use sinclair_ula::{ScreenRenderer, ScreenTiming};

use crate::device::{AttachContext, Device, DeviceKind, FrameBoundDevice};
use crate::error::SpectrumError;
use crate::memory::SpectrumMemory;
use crate::providers::FrameSink;

pub struct ScreenDevice {
    renderer: ScreenRenderer,
    sink: Option<Box<dyn FrameSink>>,
    /// Frames are still rendered but not handed to the sink.
    suppress_delivery: bool,
}

impl ScreenDevice {
    #[must_use]
    pub fn new(timing: Rc<ScreenTiming>) -> Self {
        Self {
            renderer: ScreenRenderer::new(timing),
            sink: None,
            suppress_delivery: false,
        }
    }

    #[must_use]
    pub fn timing(&self) -> &Rc<ScreenTiming> {
        self.renderer.timing()
    }

    #[must_use]
    pub fn renderer(&self) -> &ScreenRenderer {
        &self.renderer
    }

    #[must_use]
    pub fn pixel_buffer(&self) -> &[u8] {
        self.renderer.pixel_buffer()
    }

    pub fn set_border_color(&mut self, color: u8) {
        self.renderer.set_border_color(color);
    }

    pub fn set_suppress_delivery(&mut self, suppress: bool) {
        self.suppress_delivery = suppress;
    }

    /// Render frame tacts `from..=to` from screen memory.
    pub fn render(&mut self, from: u32, to: u32, memory: &dyn SpectrumMemory) {
        self.renderer.render(from, to, |addr| memory.peek(addr));
    }
}

impl Device for ScreenDevice {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Screen
    }

    fn reset(&mut self) {
        self.renderer.reset();
    }

    fn attach(&mut self, ctx: &mut AttachContext<'_>) -> Result<(), SpectrumError> {
        if let Some(sink) = ctx.device_info.screen.provider.take() {
            self.sink = Some(sink);
        }
        Ok(())
    }
}

impl FrameBoundDevice for ScreenDevice {
    fn on_new_frame(&mut self) {
        if let Some(sink) = &mut self.sink {
            sink.start_new_frame();
        }
    }

    fn on_frame_completed(&mut self, _overflow: u32) {
        self.renderer.frame_completed();
        if self.suppress_delivery {
            return;
        }
        if let Some(sink) = &mut self.sink {
            sink.display_frame(self.renderer.pixel_buffer());
        }
    }
}
