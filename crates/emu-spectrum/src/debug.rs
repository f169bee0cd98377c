//! Debug stop policy and the breakpoint registry.

use std::collections::BTreeSet;

use crate::options::DebugStepMode;

/// State carried between debugger runs.
#[derive(Debug, Default)]
pub struct DebugState {
    breakpoints: BTreeSet<u16>,
    /// PC of the last debug stop, so a run resumed on a breakpoint does not
    /// stop on it again before executing anything.
    last_stop: Option<u16>,
    /// Return address of a call being stepped over.
    imminent_breakpoint: Option<u16>,
}

impl DebugState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the breakpoint was already set.
    pub fn add_breakpoint(&mut self, address: u16) -> bool {
        self.breakpoints.insert(address)
    }

    pub fn remove_breakpoint(&mut self, address: u16) -> bool {
        self.breakpoints.remove(&address)
    }

    pub fn clear_breakpoints(&mut self) {
        self.breakpoints.clear();
    }

    pub fn breakpoints(&self) -> impl Iterator<Item = u16> + '_ {
        self.breakpoints.iter().copied()
    }

    #[must_use]
    pub fn imminent_breakpoint(&self) -> Option<u16> {
        self.imminent_breakpoint
    }

    /// Drop the pending return address of a step-over.
    pub fn cancel_step_over(&mut self) {
        self.imminent_breakpoint = None;
    }

    /// Forget per-session stop state. Breakpoints are kept.
    pub fn reset(&mut self) {
        self.last_stop = None;
        self.imminent_breakpoint = None;
    }

    /// Decide whether to stop before executing the instruction at `pc`.
    ///
    /// `executed` counts instructions run so far in this call.
    /// `call_length` is only consulted when stepping over; it returns the
    /// length of the instruction at `pc` when it is call-like, else 0.
    pub fn should_stop(
        &mut self,
        mode: DebugStepMode,
        pc: u16,
        executed: u64,
        call_length: impl FnOnce() -> u16,
    ) -> bool {
        if mode != DebugStepMode::StepOver {
            self.cancel_step_over();
        }
        let stop = match mode {
            DebugStepMode::StepInto => executed > 0,
            DebugStepMode::StopAtBreakpoint => {
                self.breakpoints.contains(&pc) && (executed > 0 || self.last_stop != Some(pc))
            }
            DebugStepMode::StepOver => match self.imminent_breakpoint {
                Some(target) if target == pc => {
                    self.imminent_breakpoint = None;
                    true
                }
                Some(_) => false,
                None if executed > 0 => true,
                None => {
                    let length = call_length();
                    if length > 0 {
                        self.imminent_breakpoint = Some(pc.wrapping_add(length));
                    }
                    false
                }
            },
        };
        if stop {
            self.last_stop = Some(pc);
        }
        stop
    }
}
