//! Raster renderer driven by the timing table.

use std::rc::Rc;

use crate::timing::{RenderingPhase, RenderingTact, ScreenTiming};

/// Walks the timing table and paints palette indices into a pixel buffer.
///
/// Screen memory is read through a closure supplied by the caller so that
/// the renderer stays independent of any memory model. Those reads never
/// incur contention.
pub struct ScreenRenderer {
    timing: Rc<ScreenTiming>,
    pixels: Vec<u8>,
    border_color: u8,
    pixel_byte1: u8,
    pixel_byte2: u8,
    attr_byte1: u8,
    attr_byte2: u8,
    flash_phase: bool,
    flash_frames: u32,
    flash_toggle_frames: u32,
}

impl ScreenRenderer {
    #[must_use]
    pub fn new(timing: Rc<ScreenTiming>) -> Self {
        let config = timing.config();
        let pixels = vec![0; config.pixel_count()];
        let flash_toggle_frames = config.flash_toggle_frames();
        Self {
            timing,
            pixels,
            border_color: 7,
            pixel_byte1: 0,
            pixel_byte2: 0,
            attr_byte1: 0,
            attr_byte2: 0,
            flash_phase: false,
            flash_frames: 0,
            flash_toggle_frames,
        }
    }

    pub fn reset(&mut self) {
        self.pixels.fill(0);
        self.border_color = 7;
        self.pixel_byte1 = 0;
        self.pixel_byte2 = 0;
        self.attr_byte1 = 0;
        self.attr_byte2 = 0;
        self.flash_phase = false;
        self.flash_frames = 0;
    }

    #[must_use]
    pub fn timing(&self) -> &Rc<ScreenTiming> {
        &self.timing
    }

    /// Palette indices, `screen_width * screen_lines` bytes.
    #[must_use]
    pub fn pixel_buffer(&self) -> &[u8] {
        &self.pixels
    }

    #[must_use]
    pub fn border_color(&self) -> u8 {
        self.border_color
    }

    pub fn set_border_color(&mut self, color: u8) {
        self.border_color = color & 0x07;
    }

    #[must_use]
    pub fn flash_phase(&self) -> bool {
        self.flash_phase
    }

    /// Count a completed frame towards the next flash toggle.
    pub fn frame_completed(&mut self) {
        self.flash_frames += 1;
        if self.flash_frames >= self.flash_toggle_frames {
            self.flash_frames = 0;
            self.flash_phase = !self.flash_phase;
        }
    }

    /// Render frame tacts `from..=to`.
    ///
    /// `to` is clamped to the last tact of the frame. When `from > to` the
    /// range wraps: the tail of the frame is rendered, then its head.
    pub fn render(&mut self, from: u32, to: u32, read_screen: impl Fn(u16) -> u8) {
        let last = self.timing.frame_tact_count().saturating_sub(1);
        let to = to.min(last);
        if from <= to {
            self.render_range(from, to, &read_screen);
        } else {
            if from <= last {
                self.render_range(from, last, &read_screen);
            }
            self.render_range(0, to, &read_screen);
        }
    }

    fn render_range(&mut self, from: u32, to: u32, read_screen: &impl Fn(u16) -> u8) {
        let timing = Rc::clone(&self.timing);
        for entry in &timing.table()[from as usize..=to as usize] {
            self.render_tact(entry, read_screen);
        }
    }

    fn render_tact(&mut self, entry: &RenderingTact, read_screen: &impl Fn(u16) -> u8) {
        let index = entry.pixel_index as usize;
        match entry.phase {
            RenderingPhase::None => {}
            RenderingPhase::Border => self.paint_border(index),
            RenderingPhase::BorderFetchPixel => {
                self.paint_border(index);
                self.pixel_byte1 = read_screen(entry.pixel_address);
            }
            RenderingPhase::BorderFetchPixelAttr => {
                self.paint_border(index);
                self.attr_byte1 = read_screen(entry.attribute_address);
            }
            RenderingPhase::DisplayB1 => self.paint_byte1(index),
            RenderingPhase::DisplayB1FetchB2 => {
                self.paint_byte1(index);
                self.pixel_byte2 = read_screen(entry.pixel_address);
            }
            RenderingPhase::DisplayB1FetchA2 => {
                self.paint_byte1(index);
                self.attr_byte2 = read_screen(entry.attribute_address);
            }
            RenderingPhase::DisplayB2 => self.paint_byte2(index),
            RenderingPhase::DisplayB2FetchB1 => {
                self.paint_byte2(index);
                self.pixel_byte1 = read_screen(entry.pixel_address);
            }
            RenderingPhase::DisplayB2FetchA1 => {
                self.paint_byte2(index);
                self.attr_byte1 = read_screen(entry.attribute_address);
            }
        }
    }

    fn paint_border(&mut self, index: usize) {
        self.pixels[index] = self.border_color;
        self.pixels[index + 1] = self.border_color;
    }

    fn paint_byte1(&mut self, index: usize) {
        let (bits, attr) = (self.pixel_byte1, self.attr_byte1);
        self.paint_pair(index, bits, attr);
        self.pixel_byte1 = bits << 2;
    }

    fn paint_byte2(&mut self, index: usize) {
        let (bits, attr) = (self.pixel_byte2, self.attr_byte2);
        self.paint_pair(index, bits, attr);
        self.pixel_byte2 = bits << 2;
    }

    fn paint_pair(&mut self, index: usize, bits: u8, attr: u8) {
        self.pixels[index] = self.color(bits & 0x80 != 0, attr);
        self.pixels[index + 1] = self.color(bits & 0x40 != 0, attr);
    }

    /// Palette index for one pixel. Attribute layout: `FBPPPIII`.
    fn color(&self, ink_pixel: bool, attr: u8) -> u8 {
        let bright = (attr & 0x40) >> 3;
        let ink = attr & 0x07 | bright;
        let paper = (attr >> 3) & 0x07 | bright;
        let inverted = attr & 0x80 != 0 && self.flash_phase;
        if ink_pixel != inverted { ink } else { paper }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScreenConfiguration;

    fn renderer() -> ScreenRenderer {
        ScreenRenderer::new(ScreenTiming::new(ScreenConfiguration::default()))
    }

    fn frame_tact(line: u32, tact_in_line: u32) -> u32 {
        line * 224 + tact_in_line
    }

    /// Screen memory with the first cell set to `bitmap`/`attr`.
    fn first_cell(bitmap: u8, attr: u8) -> impl Fn(u16) -> u8 {
        move |addr| match addr {
            0x4000 => bitmap,
            0x5800 => attr,
            _ => 0,
        }
    }

    /// Pixel-buffer offset of the first display pixel.
    const FIRST_PIXEL: usize = 48 * 352 + 48;

    #[test]
    fn border_paints_border_color() {
        let mut r = renderer();
        r.set_border_color(2);
        r.render(0, frame_tact(24, 9), |_| 0);
        assert!(r.pixel_buffer()[..20].iter().all(|&p| p == 2));
        assert_eq!(r.pixel_buffer()[20], 0);
    }

    #[test]
    fn display_cell_uses_ink_and_paper() {
        let mut r = renderer();
        // Alternating pixels, blue ink on yellow paper.
        let read = first_cell(0b1010_1010, 0b0011_0001);
        r.render(frame_tact(72, 0), frame_tact(72, 31), read);
        let cell = &r.pixel_buffer()[FIRST_PIXEL..FIRST_PIXEL + 8];
        assert_eq!(cell, [1, 6, 1, 6, 1, 6, 1, 6]);
    }

    #[test]
    fn bright_selects_upper_palette() {
        let mut r = renderer();
        let read = first_cell(0xF0, 0b0110_0010);
        r.render(frame_tact(72, 0), frame_tact(72, 31), read);
        let cell = &r.pixel_buffer()[FIRST_PIXEL..FIRST_PIXEL + 8];
        assert_eq!(cell, [10, 10, 10, 10, 12, 12, 12, 12]);
    }

    #[test]
    fn flash_swaps_after_toggle() {
        let mut r = renderer();
        for _ in 0..25 {
            r.frame_completed();
        }
        assert!(r.flash_phase());
        let read = first_cell(0xFF, 0b1000_1010);
        r.render(frame_tact(72, 0), frame_tact(72, 31), read);
        assert_eq!(r.pixel_buffer()[FIRST_PIXEL], 1);
    }

    #[test]
    fn render_clamps_to_frame_end() {
        let mut r = renderer();
        r.set_border_color(5);
        r.render(frame_tact(311, 0), 1_000_000, |_| 0);
        let last_row = 287 * 352;
        assert!(r.pixel_buffer()[last_row..].iter().all(|&p| p == 5));
    }

    #[test]
    fn render_wraps_around_frame_end() {
        let mut r = renderer();
        r.set_border_color(4);
        r.render(frame_tact(311, 170), frame_tact(24, 1), |_| 0);
        let buffer = r.pixel_buffer();
        assert_eq!(buffer[buffer.len() - 1], 4);
        assert_eq!(&buffer[..4], [4, 4, 4, 4]);
        assert_eq!(buffer[4], 0);
    }
}
