//! Machine state snapshots and path queries.

use emu_core::{Observable, Registers, Value, Z80Cpu};

use crate::engine::SpectrumEngine;
use crate::options::ExecutionCompletionReason;
use crate::tape::{SavePhase, TapeOperationMode};

/// A copy of the state a debugger shows after each run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostics {
    pub registers: Registers,
    pub cpu_tacts: u64,
    pub frame_tact: u32,
    pub raster_line: u32,
    pub raster_column: u32,
    /// Memory contention delay at the current frame tact.
    pub contention: u8,
    pub phase: &'static str,
    pub frame_count: u64,
    /// Interrupts raised since reset.
    pub interrupt_count: u64,
    pub overflow: u32,
    pub tape_mode: TapeOperationMode,
    pub save_phase: SavePhase,
    pub completion_reason: ExecutionCompletionReason,
}

const QUERY_PATHS: &[&str] = &[
    "cpu.pc",
    "cpu.sp",
    "cpu.tacts",
    "cpu.halted",
    "ula.line",
    "ula.tact",
    "ula.phase",
    "ula.contention",
    "ula.border",
    "tape.mode",
    "tape.save_phase",
    "frame_count",
    "overflow",
    "memory.<addr>",
];

impl<C: Z80Cpu> SpectrumEngine<C> {
    #[must_use]
    pub fn diagnostics(&self) -> Diagnostics {
        let frame_tact = self.current_frame_tact();
        let timing = self.screen_timing();
        let line_time = timing.config().screen_line_time;
        let entry = timing.entry(frame_tact);
        Diagnostics {
            registers: *self.cpu().registers(),
            cpu_tacts: self.cpu().tacts(),
            frame_tact,
            raster_line: frame_tact / line_time,
            raster_column: frame_tact % line_time,
            contention: entry.contention,
            phase: entry.phase.label(),
            frame_count: self.frame_count(),
            interrupt_count: self.interrupt().frame_count(),
            overflow: self.overflow(),
            tape_mode: self.bus().tape().mode(),
            save_phase: self.bus().tape().save_phase(),
            completion_reason: self.completion_reason(),
        }
    }
}

impl<C: Z80Cpu> Observable for SpectrumEngine<C> {
    fn query(&self, path: &str) -> Option<Value> {
        if let Some(addr) = path.strip_prefix("memory.") {
            let addr = parse_address(addr)?;
            return Some(self.bus().memory().peek(addr).into());
        }

        let frame_tact = self.current_frame_tact();
        let timing = self.screen_timing();
        let line_time = timing.config().screen_line_time;
        let value = match path {
            "cpu.pc" => self.cpu().pc().into(),
            "cpu.sp" => self.cpu().registers().sp.into(),
            "cpu.tacts" => self.cpu().tacts().into(),
            "cpu.halted" => self.cpu().is_halted().into(),
            "ula.line" => u64::from(frame_tact / line_time).into(),
            "ula.tact" => u64::from(frame_tact % line_time).into(),
            "ula.phase" => timing.entry(frame_tact).phase.label().into(),
            "ula.contention" => timing.contention_value(frame_tact).into(),
            "ula.border" => self.bus().screen().renderer().border_color().into(),
            "tape.mode" => self.bus().tape().mode().to_string().into(),
            "tape.save_phase" => self.bus().tape().save_phase().to_string().into(),
            "frame_count" => self.frame_count().into(),
            "overflow" => u64::from(self.overflow()).into(),
            _ => return None,
        };
        Some(value)
    }

    fn query_paths(&self) -> &'static [&'static str] {
        QUERY_PATHS
    }
}

/// Parse `0x4000`, `$4000` or `16384`.
fn parse_address(s: &str) -> Option<u16> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u16::from_str_radix(hex, 16).ok()
    } else if let Some(hex) = s.strip_prefix('$') {
        u16::from_str_radix(hex, 16).ok()
    } else {
        s.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_forms() {
        assert_eq!(parse_address("0x4000"), Some(0x4000));
        assert_eq!(parse_address("$5800"), Some(0x5800));
        assert_eq!(parse_address("16384"), Some(0x4000));
        assert_eq!(parse_address("0x10000"), None);
        assert_eq!(parse_address("screen"), None);
    }
}
