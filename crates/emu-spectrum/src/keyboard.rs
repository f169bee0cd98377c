//! ZX Spectrum keyboard.
//!
//! An 8×5 matrix of half-rows read through port $FE. Each cleared bit of the
//! port's high byte (A8-A15) selects one half-row; several rows can be
//! scanned at once.
//!
//! | Addr bit | Row | Keys (bit 0-4)       |
//! |----------|-----|----------------------|
//! | A8       | 0   | Shift, Z, X, C, V    |
//! | A9       | 1   | A, S, D, F, G        |
//! | A10      | 2   | Q, W, E, R, T        |
//! | A11      | 3   | 1, 2, 3, 4, 5        |
//! | A12      | 4   | 0, 9, 8, 7, 6        |
//! | A13      | 5   | P, O, I, U, Y        |
//! | A14      | 6   | Enter, L, K, J, H    |
//! | A15      | 7   | Space, Sym, M, N, B  |
//!
//! A pressed key reads as 0.

use crate::device::{Device, DeviceKind};

/// Keyboard matrix. Rows store 1 for a pressed key; `read()` inverts.
#[derive(Debug, Default)]
pub struct KeyboardDevice {
    rows: [u8; 8],
}

impl KeyboardDevice {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set or clear a key. `row` is 0-7, `bit` is 0-4; anything else is
    /// ignored.
    pub fn set_key(&mut self, row: usize, bit: u8, pressed: bool) {
        if row < 8 && bit < 5 {
            if pressed {
                self.rows[row] |= 1 << bit;
            } else {
                self.rows[row] &= !(1 << bit);
            }
        }
    }

    pub fn release_all(&mut self) {
        self.rows = [0; 8];
    }

    /// Key bits for a port read with high address byte `addr_high`.
    ///
    /// The matrix is passive, so with several keys down current can flow
    /// through shared columns into rows that were not selected (ghosting).
    /// Rows reachable that way contribute their columns too.
    ///
    /// Returns bits 0-4 active low, bits 5-7 set.
    #[must_use]
    pub fn read(&self, addr_high: u8) -> u8 {
        let mut active_rows: u8 = !addr_high;
        loop {
            let cols = self.columns(active_rows);
            let mut reached = active_rows;
            for (i, &row) in self.rows.iter().enumerate() {
                if row & cols != 0 {
                    reached |= 1 << i;
                }
            }
            if reached == active_rows {
                return !cols & 0x1F | 0xE0;
            }
            active_rows = reached;
        }
    }

    fn columns(&self, active_rows: u8) -> u8 {
        self.rows
            .iter()
            .enumerate()
            .filter(|(i, _)| active_rows & (1 << i) != 0)
            .fold(0, |cols, (_, &row)| cols | row)
    }
}

impl Device for KeyboardDevice {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Keyboard
    }

    fn reset(&mut self) {
        self.release_all();
    }
}
