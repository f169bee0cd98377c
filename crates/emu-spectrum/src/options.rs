//! Per-run execution options and the reasons a run ends.

use std::fmt;

/// When `run` returns of its own accord.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmulationMode {
    /// Stop on frame completion or when the debug step policy says so.
    Debugger,
    /// Stop once the processor executes HALT.
    UntilHalt,
    /// Stop at the end of the current frame.
    #[default]
    UntilFrameEnds,
    /// Stop when PC reaches the termination point.
    UntilExecutionPoint,
    /// Never stop on frame end; only cancellation or a timeout ends the run.
    Continuous,
}

/// Debug stop policy in [`EmulationMode::Debugger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebugStepMode {
    #[default]
    StopAtBreakpoint,
    StepInto,
    StepOver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecuteCycleOptions {
    pub emulation_mode: EmulationMode,
    pub debug_step_mode: DebugStepMode,
    pub termination_point: u16,
    /// ROM page that must be selected for a termination point below $4000.
    pub termination_rom: u8,
    /// Processor tacts before the run times out; 0 disables the limit.
    pub timeout_tacts: u64,
    pub disable_screen_rendering: bool,
    /// Keep emulating but do not deliver frames or audio to the host.
    pub fast_vm_mode: bool,
    /// Copy tape blocks straight into memory when the ROM loads them.
    pub fast_tape_mode: bool,
}

impl ExecuteCycleOptions {
    #[must_use]
    pub fn new(emulation_mode: EmulationMode) -> Self {
        Self {
            emulation_mode,
            ..Self::default()
        }
    }

    /// Run until PC reaches `address` with ROM page `rom` selected.
    #[must_use]
    pub fn until_execution_point(address: u16, rom: u8) -> Self {
        Self {
            emulation_mode: EmulationMode::UntilExecutionPoint,
            termination_point: address,
            termination_rom: rom,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn debugger(step_mode: DebugStepMode) -> Self {
        Self {
            emulation_mode: EmulationMode::Debugger,
            debug_step_mode: step_mode,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, tacts: u64) -> Self {
        self.timeout_tacts = tacts;
        self
    }

    #[must_use]
    pub fn with_fast_tape(mut self, enabled: bool) -> Self {
        self.fast_tape_mode = enabled;
        self
    }

    #[must_use]
    pub fn with_fast_vm(mut self, enabled: bool) -> Self {
        self.fast_vm_mode = enabled;
        self
    }

    #[must_use]
    pub fn without_rendering(mut self) -> Self {
        self.disable_screen_rendering = true;
        self
    }
}

/// Why the last `run` returned. Exactly one per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionCompletionReason {
    #[default]
    None,
    Cancelled,
    Timeout,
    TerminationPointReached,
    BreakpointReached,
    Halted,
    FrameCompleted,
    /// The processor reported a fault.
    Exception,
}

impl ExecutionCompletionReason {
    /// Whether `run` reports success for this reason.
    #[must_use]
    pub fn is_success(self) -> bool {
        !matches!(self, Self::Cancelled | Self::Timeout | Self::Exception)
    }
}

impl fmt::Display for ExecutionCompletionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_run_one_frame() {
        let options = ExecuteCycleOptions::default();
        assert_eq!(options.emulation_mode, EmulationMode::UntilFrameEnds);
        assert_eq!(options.timeout_tacts, 0);
        assert!(!options.fast_tape_mode);
    }

    #[test]
    fn builders() {
        let options = ExecuteCycleOptions::until_execution_point(0x0008, 0)
            .with_timeout(1000)
            .with_fast_tape(true);
        assert_eq!(options.emulation_mode, EmulationMode::UntilExecutionPoint);
        assert_eq!(options.termination_point, 0x0008);
        assert_eq!(options.timeout_tacts, 1000);
        assert!(options.fast_tape_mode);
    }

    #[test]
    fn failure_reasons() {
        assert!(ExecutionCompletionReason::FrameCompleted.is_success());
        assert!(ExecutionCompletionReason::Halted.is_success());
        assert!(!ExecutionCompletionReason::Timeout.is_success());
        assert!(!ExecutionCompletionReason::Cancelled.is_success());
        assert!(!ExecutionCompletionReason::Exception.is_success());
    }
}
