//! Sinclair ULA raster timing.
//!
//! The ULA's behaviour within a frame is a pure function of the raster
//! geometry, so it is precomputed once into a table with one entry per CPU
//! tact. The execution engine indexes the table for memory contention and
//! the renderer walks it to paint the screen.
//!
//! # Timing (48K PAL)
//!
//! - 224 tacts per line: 24 left border, 128 display, 24 right border,
//!   8 non-visible, 40 horizontal blanking
//! - 312 lines per frame: 8 vsync, 16 non-visible, 48 border, 192 display,
//!   48 border
//! - 69,888 tacts per frame
//!
//! # Pixel buffer
//!
//! 352x288 palette indices (0-15, see [`PALETTE`]): 48 border pixels either
//! side of the 256-pixel display, 48 border lines above and below it.
//!
//! # Screen memory layout
//!
//! Bitmap at $4000-$57FF, attributes at $5800-$5AFF.
//! Bitmap address: `010Y7 Y6Y2 Y1Y0 Y5Y4Y3 X4X3X2X1X0`
//! Attribute address: `0101 10Y7 Y6Y5 Y4Y3 X4X3X2X1X0`

mod config;
mod palette;
mod renderer;
mod timing;

pub use config::{ContentionType, ScreenConfiguration, ScreenGeometry};
pub use palette::{PALETTE, to_argb};
pub use renderer::ScreenRenderer;
pub use timing::{
    RenderingPhase, RenderingTact, ScreenTiming, attribute_address, build_timing_table,
    pixel_address,
};
