//! Spectrum colours.

/// ARGB32 colour for each palette index in the pixel buffer.
///
/// Index = `bright << 3 | grb`, where the three low bits are the ink or paper
/// colour (black, blue, red, magenta, green, cyan, yellow, white). Normal
/// colours drive the guns at 0xCD, bright ones at 0xFF.
pub const PALETTE: [u32; 16] = [
    0xFF00_0000,
    0xFF00_00CD,
    0xFFCD_0000,
    0xFFCD_00CD,
    0xFF00_CD00,
    0xFF00_CDCD,
    0xFFCD_CD00,
    0xFFCD_CDCD,
    0xFF00_0000,
    0xFF00_00FF,
    0xFFFF_0000,
    0xFFFF_00FF,
    0xFF00_FF00,
    0xFF00_FFFF,
    0xFFFF_FF00,
    0xFFFF_FFFF,
];

/// Convert a palette-index pixel buffer to ARGB32.
#[must_use]
pub fn to_argb(pixels: &[u8]) -> Vec<u32> {
    pixels
        .iter()
        .map(|&index| PALETTE[usize::from(index & 0x0F)])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bright_black_is_still_black() {
        assert_eq!(PALETTE[0], PALETTE[8]);
        assert_eq!(to_argb(&[7, 15]), [0xFFCD_CDCD, 0xFFFF_FFFF]);
    }
}
