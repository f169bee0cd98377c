//! Raster geometry.

use serde::{Deserialize, Serialize};

/// Which delay table the memory controller applies to contended accesses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentionType {
    /// Ferranti ULA (48K, 128K, +2).
    #[default]
    Ula,
    /// Amstrad gate array (+2A, +3).
    GateArray,
}

/// ULA contention delays by display sub-phase.
const ULA_DELAYS: [u8; 8] = [5, 4, 3, 2, 1, 0, 0, 6];
/// Gate-array contention delays by display sub-phase.
const GATE_ARRAY_DELAYS: [u8; 8] = [1, 0, 7, 6, 5, 4, 3, 2];

impl ContentionType {
    /// Delay table indexed by the 8-tact display sub-phase.
    #[must_use]
    pub const fn delays(self) -> &'static [u8; 8] {
        match self {
            Self::Ula => &ULA_DELAYS,
            Self::GateArray => &GATE_ARRAY_DELAYS,
        }
    }
}

/// Raw geometry as it appears in a machine configuration file. Line counts
/// are raster lines; times are CPU tacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenGeometry {
    pub vertical_sync_lines: u32,
    pub non_visible_border_top_lines: u32,
    pub border_top_lines: u32,
    pub display_lines: u32,
    pub border_bottom_lines: u32,
    pub non_visible_border_bottom_lines: u32,
    pub horizontal_blanking_time: u32,
    pub border_left_time: u32,
    pub display_line_time: u32,
    pub border_right_time: u32,
    pub non_visible_border_right_time: u32,
    pub pixel_data_prefetch_time: u32,
    pub attribute_data_prefetch_time: u32,
    /// Frame tact at which the ULA asserts INT.
    pub interrupt_tact: u32,
    pub contention_type: ContentionType,
    /// Frames per second.
    pub refresh_rate: u32,
}

impl ScreenGeometry {
    /// ZX Spectrum 48K (PAL).
    #[must_use]
    pub const fn spectrum_48k() -> Self {
        Self {
            vertical_sync_lines: 8,
            non_visible_border_top_lines: 16,
            border_top_lines: 48,
            display_lines: 192,
            border_bottom_lines: 48,
            non_visible_border_bottom_lines: 0,
            horizontal_blanking_time: 40,
            border_left_time: 24,
            display_line_time: 128,
            border_right_time: 24,
            non_visible_border_right_time: 8,
            pixel_data_prefetch_time: 2,
            attribute_data_prefetch_time: 1,
            interrupt_tact: 11,
            contention_type: ContentionType::Ula,
            refresh_rate: 50,
        }
    }
}

impl Default for ScreenGeometry {
    fn default() -> Self {
        Self::spectrum_48k()
    }
}

/// Geometry plus every value derived from it.
///
/// Build once with [`ScreenConfiguration::new`] and share it; none of the
/// derived values are recomputed afterwards. A geometry whose frame has no
/// tacts is replaced by [`ScreenGeometry::spectrum_48k`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenConfiguration {
    pub geometry: ScreenGeometry,
    /// Border top + display + border bottom.
    pub screen_lines: u32,
    pub first_display_line: u32,
    pub last_display_line: u32,
    pub border_left_pixels: u32,
    pub border_right_pixels: u32,
    pub display_width: u32,
    /// Visible pixels per raster line.
    pub screen_width: u32,
    /// Tacts per raster line.
    pub screen_line_time: u32,
    pub raster_lines: u32,
    /// Tacts per frame.
    pub frame_tact_count: u32,
    pub first_display_pixel_tact: u32,
    pub first_screen_pixel_tact: u32,
}

impl ScreenConfiguration {
    #[must_use]
    pub fn new(geometry: ScreenGeometry) -> Self {
        let g = &geometry;
        let screen_lines = g.border_top_lines + g.display_lines + g.border_bottom_lines;
        let first_display_line =
            g.vertical_sync_lines + g.non_visible_border_top_lines + g.border_top_lines;
        let last_display_line = (first_display_line + g.display_lines).saturating_sub(1);
        let border_left_pixels = 2 * g.border_left_time;
        let border_right_pixels = 2 * g.border_right_time;
        let display_width = 2 * g.display_line_time;
        let screen_width = border_left_pixels + display_width + border_right_pixels;
        let screen_line_time = g.border_left_time
            + g.display_line_time
            + g.border_right_time
            + g.non_visible_border_right_time
            + g.horizontal_blanking_time;
        let raster_lines = first_display_line
            + g.display_lines
            + g.border_bottom_lines
            + g.non_visible_border_bottom_lines;
        if raster_lines == 0 || screen_line_time == 0 {
            return Self::new(ScreenGeometry::spectrum_48k());
        }

        Self {
            geometry,
            screen_lines,
            first_display_line,
            last_display_line,
            border_left_pixels,
            border_right_pixels,
            display_width,
            screen_width,
            screen_line_time,
            raster_lines,
            frame_tact_count: raster_lines * screen_line_time,
            first_display_pixel_tact: first_display_line * screen_line_time + g.border_left_time,
            first_screen_pixel_tact: (g.vertical_sync_lines + g.non_visible_border_top_lines)
                * screen_line_time,
        }
    }

    /// First raster line that produces pixels.
    #[must_use]
    pub fn first_visible_line(&self) -> u32 {
        self.geometry.vertical_sync_lines + self.geometry.non_visible_border_top_lines
    }

    /// Frames between flash phase toggles: half the refresh rate, rounded.
    #[must_use]
    pub fn flash_toggle_frames(&self) -> u32 {
        self.geometry.refresh_rate.div_ceil(2).max(1)
    }

    /// Pixel buffer length in bytes (one palette index per pixel).
    #[must_use]
    pub fn pixel_count(&self) -> usize {
        (self.screen_width * self.screen_lines) as usize
    }
}

impl Default for ScreenConfiguration {
    fn default() -> Self {
        Self::new(ScreenGeometry::default())
    }
}
