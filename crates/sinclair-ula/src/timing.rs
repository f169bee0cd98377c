//! Per-tact rendering and contention table.
//!
//! Every tact of a frame maps to one [`RenderingTact`]. The display area
//! repeats an 8-tact pattern: the ULA shows two pixels per tact from the
//! byte it already holds while fetching the pixel and attribute bytes of the
//! next character cell. Two extra fetch tacts sit in the left border of every
//! display line to load the first cell.
//!
//! ```text
//! sub-phase  0        1        2   3   4   5   6        7
//!            B1+FB2   B1+FA2   B1  B1  B2  B2  B2+FB1   B2+FA1
//! ```

use std::rc::Rc;

use crate::config::ScreenConfiguration;

/// What the ULA does during one tact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderingPhase {
    /// Blanking or sync: nothing is drawn.
    #[default]
    None,
    /// Two border pixels.
    Border,
    /// Border, and fetch the first pixel byte of the line.
    BorderFetchPixel,
    /// Border, and fetch the first attribute byte of the line.
    BorderFetchPixelAttr,
    /// Two pixels from the first held byte.
    DisplayB1,
    DisplayB1FetchB2,
    DisplayB1FetchA2,
    /// Two pixels from the second held byte.
    DisplayB2,
    DisplayB2FetchB1,
    DisplayB2FetchA1,
}

impl RenderingPhase {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Border => "Border",
            Self::BorderFetchPixel => "BorderFetchPixel",
            Self::BorderFetchPixelAttr => "BorderFetchPixelAttr",
            Self::DisplayB1 => "DisplayB1",
            Self::DisplayB1FetchB2 => "DisplayB1FetchB2",
            Self::DisplayB1FetchA2 => "DisplayB1FetchA2",
            Self::DisplayB2 => "DisplayB2",
            Self::DisplayB2FetchB1 => "DisplayB2FetchB1",
            Self::DisplayB2FetchA1 => "DisplayB2FetchA1",
        }
    }
}

/// One table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderingTact {
    pub phase: RenderingPhase,
    /// Wait states for a contended access at this tact.
    pub contention: u8,
    /// Pixel byte fetched at this tact (fetch phases only).
    pub pixel_address: u16,
    /// Attribute byte fetched at this tact (fetch phases only).
    pub attribute_address: u16,
    /// First of the two pixel-buffer slots written at this tact.
    pub pixel_index: u32,
}

/// Build the table for one frame. The result has exactly
/// `config.frame_tact_count` entries.
#[must_use]
pub fn build_timing_table(config: &ScreenConfiguration) -> Vec<RenderingTact> {
    let delays = config.geometry.contention_type.delays();
    (0..config.frame_tact_count)
        .map(|tact| {
            let line = tact / config.screen_line_time;
            let tact_in_line = tact % config.screen_line_time;
            rendering_tact(config, delays, line, tact_in_line)
        })
        .collect()
}

fn rendering_tact(
    config: &ScreenConfiguration,
    delays: &[u8; 8],
    line: u32,
    tact_in_line: u32,
) -> RenderingTact {
    let g = &config.geometry;
    let first_visible_line = config.first_visible_line();
    let visible_lines =
        first_visible_line..config.raster_lines - g.non_visible_border_bottom_lines;
    let visible_tacts = config.screen_line_time
        - g.non_visible_border_right_time
        - g.horizontal_blanking_time;
    if !visible_lines.contains(&line) || tact_in_line >= visible_tacts {
        return RenderingTact::default();
    }

    let mut entry = RenderingTact {
        phase: RenderingPhase::Border,
        pixel_index: (line - first_visible_line) * config.screen_width + 2 * tact_in_line,
        ..RenderingTact::default()
    };

    if !(config.first_display_line..=config.last_display_line).contains(&line) {
        return entry;
    }

    let display_start = g.border_left_time;
    let display_end = display_start + g.display_line_time;
    if (display_start..display_end).contains(&tact_in_line) {
        let sub_phase = ((tact_in_line - display_start) & 7) as usize;
        let last_cell = tact_in_line >= display_end - 2;
        entry.contention = delays[sub_phase];
        entry.phase = match sub_phase {
            0 => {
                entry.pixel_address = pixel_address(config, line, tact_in_line + 4);
                RenderingPhase::DisplayB1FetchB2
            }
            1 => {
                entry.attribute_address = attribute_address(config, line, tact_in_line + 3);
                RenderingPhase::DisplayB1FetchA2
            }
            2 | 3 => RenderingPhase::DisplayB1,
            4 | 5 => RenderingPhase::DisplayB2,
            6 if !last_cell => {
                entry.pixel_address = pixel_address(config, line, tact_in_line + 2);
                RenderingPhase::DisplayB2FetchB1
            }
            7 if !last_cell => {
                entry.attribute_address = attribute_address(config, line, tact_in_line + 1);
                RenderingPhase::DisplayB2FetchA1
            }
            _ => RenderingPhase::DisplayB2,
        };
    } else if display_start.checked_sub(g.pixel_data_prefetch_time) == Some(tact_in_line) {
        entry.phase = RenderingPhase::BorderFetchPixel;
        entry.contention = delays[6];
        entry.pixel_address = pixel_address(config, line, tact_in_line);
    } else if display_start.checked_sub(g.attribute_data_prefetch_time) == Some(tact_in_line) {
        entry.phase = RenderingPhase::BorderFetchPixelAttr;
        entry.contention = delays[7];
        entry.attribute_address = attribute_address(config, line, tact_in_line);
    }
    entry
}

/// Bitmap address fetched for a display line at `tact_in_line`.
///
/// The direct row/column address `010R RRRR RRRC CCCC` is permuted into the
/// Spectrum's interleaved layout `010R RrrR RRRC CCCC` (thirds, then pixel
/// row within a cell, then cell row).
#[must_use]
pub fn pixel_address(config: &ScreenConfiguration, line: u32, tact_in_line: u32) -> u16 {
    let g = &config.geometry;
    let row = line - config.first_display_line;
    let col = 2 * (tact_in_line + g.pixel_data_prefetch_time - g.border_left_time);
    let direct = 0x4000 | (col >> 3) | (row << 5);
    ((direct & 0xF81F) | ((direct & 0x0700) >> 3) | ((direct & 0x00E0) << 3)) as u16
}

/// Attribute address fetched for a display line at `tact_in_line`.
#[must_use]
pub fn attribute_address(config: &ScreenConfiguration, line: u32, tact_in_line: u32) -> u16 {
    let g = &config.geometry;
    let row = line - config.first_display_line;
    let col = 2 * (tact_in_line + g.attribute_data_prefetch_time - g.border_left_time);
    (0x5800 + ((col >> 3) | ((row >> 3) << 5))) as u16
}

/// The screen configuration and its timing table, shared read-only by the
/// renderer, the bus and diagnostics.
#[derive(Debug)]
pub struct ScreenTiming {
    config: ScreenConfiguration,
    table: Vec<RenderingTact>,
}

impl ScreenTiming {
    #[must_use]
    pub fn new(config: ScreenConfiguration) -> Rc<Self> {
        let table = build_timing_table(&config);
        Rc::new(Self { config, table })
    }

    #[must_use]
    pub fn config(&self) -> &ScreenConfiguration {
        &self.config
    }

    #[must_use]
    pub fn table(&self) -> &[RenderingTact] {
        &self.table
    }

    #[must_use]
    pub fn frame_tact_count(&self) -> u32 {
        self.config.frame_tact_count
    }

    /// Entry for a frame tact; wraps past the end of the frame.
    #[must_use]
    pub fn entry(&self, frame_tact: u32) -> &RenderingTact {
        &self.table[(frame_tact % self.config.frame_tact_count) as usize]
    }

    /// Memory contention delay at a frame tact.
    #[must_use]
    pub fn contention_value(&self, frame_tact: u32) -> u8 {
        self.entry(frame_tact).contention
    }

    /// Total delay for an I/O cycle starting at `frame_tact`.
    ///
    /// `ula_port` is true when A0 is clear. `contended_high` is true when the
    /// high byte of the port address falls in $40-$7F.
    ///
    /// | high $40-$7F | A0 = 0 | pattern         |
    /// |--------------|--------|-----------------|
    /// | no           | yes    | N:1, C:3        |
    /// | no           | no     | N:4             |
    /// | yes          | yes    | C:1, C:3        |
    /// | yes          | no     | C:1, C:1, C:1, C:1 |
    #[must_use]
    pub fn io_contention(&self, frame_tact: u32, ula_port: bool, contended_high: bool) -> u8 {
        let delay_at = |offset: u32| self.contention_value(frame_tact + offset);
        match (contended_high, ula_port) {
            (false, false) => 0,
            (false, true) => delay_at(1),
            (true, true) => {
                let d0 = delay_at(0);
                d0 + delay_at(1 + u32::from(d0))
            }
            (true, false) => {
                let mut total = 0u8;
                for step in 0..4 {
                    total += delay_at(step + u32::from(total));
                }
                total
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ContentionType, ScreenGeometry};

    fn spectrum_48k() -> Rc<ScreenTiming> {
        ScreenTiming::new(ScreenConfiguration::default())
    }

    fn frame_tact(line: u32, tact_in_line: u32) -> u32 {
        line * 224 + tact_in_line
    }

    #[test]
    fn table_covers_whole_frame() {
        let timing = spectrum_48k();
        assert_eq!(timing.table().len(), 69_888);
    }

    #[test]
    fn border_entries_stay_inside_pixel_buffer() {
        let timing = spectrum_48k();
        let limit = timing.config().pixel_count() as u32;
        for entry in timing.table() {
            if entry.phase == RenderingPhase::Border {
                assert!(entry.pixel_index + 1 < limit);
            }
        }
    }

    #[test]
    fn sync_and_blanking_are_invisible() {
        let timing = spectrum_48k();
        assert_eq!(timing.entry(0).phase, RenderingPhase::None);
        assert_eq!(timing.entry(frame_tact(23, 0)).phase, RenderingPhase::None);
        assert_eq!(timing.entry(frame_tact(24, 0)).phase, RenderingPhase::Border);
        assert_eq!(timing.entry(frame_tact(24, 175)).phase, RenderingPhase::Border);
        assert_eq!(timing.entry(frame_tact(24, 176)).phase, RenderingPhase::None);
        assert_eq!(timing.entry(frame_tact(311, 175)).phase, RenderingPhase::Border);
    }

    #[test]
    fn pixel_index_follows_raster_position() {
        let timing = spectrum_48k();
        assert_eq!(timing.entry(frame_tact(24, 0)).pixel_index, 0);
        assert_eq!(timing.entry(frame_tact(25, 3)).pixel_index, 352 + 6);
    }

    #[test]
    fn display_line_phases() {
        let timing = spectrum_48k();
        let line = 72;
        let phase = |t| timing.entry(frame_tact(line, t)).phase;

        assert_eq!(phase(21), RenderingPhase::Border);
        assert_eq!(phase(22), RenderingPhase::BorderFetchPixel);
        assert_eq!(phase(23), RenderingPhase::BorderFetchPixelAttr);
        assert_eq!(phase(24), RenderingPhase::DisplayB1FetchB2);
        assert_eq!(phase(25), RenderingPhase::DisplayB1FetchA2);
        assert_eq!(phase(26), RenderingPhase::DisplayB1);
        assert_eq!(phase(27), RenderingPhase::DisplayB1);
        assert_eq!(phase(28), RenderingPhase::DisplayB2);
        assert_eq!(phase(29), RenderingPhase::DisplayB2);
        assert_eq!(phase(30), RenderingPhase::DisplayB2FetchB1);
        assert_eq!(phase(31), RenderingPhase::DisplayB2FetchA1);
        // Last cell of the line fetches nothing further.
        assert_eq!(phase(150), RenderingPhase::DisplayB2);
        assert_eq!(phase(151), RenderingPhase::DisplayB2);
        assert_eq!(phase(152), RenderingPhase::Border);
    }

    #[test]
    fn fetch_addresses_walk_the_first_line() {
        let timing = spectrum_48k();
        let entry = |t| *timing.entry(frame_tact(72, t));

        assert_eq!(entry(22).pixel_address, 0x4000);
        assert_eq!(entry(23).attribute_address, 0x5800);
        assert_eq!(entry(24).pixel_address, 0x4001);
        assert_eq!(entry(25).attribute_address, 0x5801);
        assert_eq!(entry(30).pixel_address, 0x4002);
        assert_eq!(entry(31).attribute_address, 0x5802);
        assert_eq!(entry(144).pixel_address, 0x401F);
        assert_eq!(entry(145).attribute_address, 0x581F);
    }

    #[test]
    fn pixel_address_interleaves_rows() {
        let config = ScreenConfiguration::default();
        assert_eq!(pixel_address(&config, 73, 22), 0x4100);
        assert_eq!(pixel_address(&config, 80, 22), 0x4020);
        assert_eq!(pixel_address(&config, 72 + 64, 22), 0x4800);
        assert_eq!(pixel_address(&config, 263, 22), 0x57E0);
        assert_eq!(attribute_address(&config, 80, 23), 0x5820);
        assert_eq!(attribute_address(&config, 263, 23), 0x5AE0);
    }

    #[test]
    fn ula_contention_pattern() {
        let timing = spectrum_48k();
        let delays: Vec<u8> = (22..34)
            .map(|t| timing.contention_value(frame_tact(72, t)))
            .collect();
        assert_eq!(delays, [0, 6, 5, 4, 3, 2, 1, 0, 0, 6, 5, 4]);
        // Border lines are never contended.
        assert_eq!(timing.contention_value(frame_tact(71, 24)), 0);
    }

    #[test]
    fn gate_array_contention_pattern() {
        let geometry = ScreenGeometry {
            contention_type: ContentionType::GateArray,
            ..ScreenGeometry::default()
        };
        let timing = ScreenTiming::new(ScreenConfiguration::new(geometry));
        let delays: Vec<u8> = (22..32)
            .map(|t| timing.contention_value(frame_tact(72, t)))
            .collect();
        assert_eq!(delays, [3, 2, 1, 0, 7, 6, 5, 4, 3, 2]);
    }

    #[test]
    fn contention_value_is_stable() {
        let timing = spectrum_48k();
        for tact in [0, 14_335, 16_152, 16_153, 69_887] {
            assert_eq!(timing.contention_value(tact), timing.contention_value(tact));
        }
        assert_eq!(timing.contention_value(69_888 + 16_153), timing.contention_value(16_153));
    }

    #[test]
    fn io_contention_patterns() {
        let timing = spectrum_48k();
        let start = frame_tact(72, 24);
        assert_eq!(timing.io_contention(start, false, false), 0);
        // N:1 then C:3 at 25 -> 4
        assert_eq!(timing.io_contention(start, true, false), 4);
        // C at 24 (5), then C at 30 (0)
        assert_eq!(timing.io_contention(start, true, true), 5);
        // Outside the display area nothing is contended.
        assert_eq!(timing.io_contention(frame_tact(10, 24), false, true), 0);
    }
}
