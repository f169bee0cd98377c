//! Execution engine.
//!
//! The engine owns the processor and every device, and advances them in
//! lockstep one instruction at a time. A run ends when the emulation mode
//! says so, or on cancellation, timeout or a processor fault.

use std::rc::Rc;

use emu_core::{CancellationToken, CpuError, Z80Cpu};
use sinclair_ula::{ScreenConfiguration, ScreenTiming};

use crate::beeper::BeeperDevice;
use crate::bus::SpectrumBus;
use crate::config::clamp_clock_multiplier;
use crate::debug::DebugState;
use crate::device::{
    CpuBoundDevice, CpuOpContext, Device, DeviceKind, FrameBoundDevice, attach_device,
};
use crate::device_info::DeviceInfoCollection;
use crate::error::SpectrumError;
use crate::interrupt::InterruptDevice;
use crate::memory::{Memory48K, SpectrumMemory};
use crate::options::{EmulationMode, ExecuteCycleOptions, ExecutionCompletionReason};
use crate::rom::RomDevice;
use crate::screen::ScreenDevice;
use crate::tape::TapeEvent;

pub struct SpectrumEngine<C: Z80Cpu> {
    pub(crate) cpu: C,
    pub(crate) bus: SpectrumBus,
    rom: RomDevice,
    pub(crate) interrupt: InterruptDevice,
    timing: Rc<ScreenTiming>,
    clock_multiplier: u32,
    frame_tacts: u32,
    /// The previous frame finished; the next run starts a new one.
    frame_completed: bool,
    pub(crate) frame_count: u64,
    /// Tacts the last instruction of a frame ran past its end.
    pub(crate) overflow: u32,
    /// First frame tact not yet rendered.
    next_render_tact: u32,
    completion_reason: ExecutionCompletionReason,
    last_error: Option<CpuError>,
    debug: DebugState,
}

impl<C: Z80Cpu> SpectrumEngine<C> {
    /// Build the machine around `cpu` and attach every device in order.
    pub fn new(cpu: C, mut device_info: DeviceInfoCollection) -> Result<Self, SpectrumError> {
        let geometry = device_info.screen.configuration;
        let screen = ScreenConfiguration::new(geometry);
        if screen.geometry != geometry {
            log::warn!("screen geometry has an empty frame, using 48K timing");
        }
        let timing = ScreenTiming::new(screen);
        let frame_tacts = timing.frame_tact_count();
        let cpu_config = device_info.cpu.configuration;
        let clock_multiplier = clamp_clock_multiplier(cpu_config.clock_multiplier);

        let memory: Box<dyn SpectrumMemory> = device_info
            .memory
            .provider
            .take()
            .unwrap_or_else(|| Box::new(Memory48K::new()));
        let bus = SpectrumBus::new(
            memory,
            ScreenDevice::new(Rc::clone(&timing)),
            BeeperDevice::new(
                device_info.beeper.configuration,
                cpu_config.base_clock_frequency,
                frame_tacts,
            ),
            device_info.sound.take(),
            device_info.floppy.take(),
            clock_multiplier,
            device_info.memory.configuration.contended,
        );

        let mut engine = Self {
            cpu,
            bus,
            rom: RomDevice::new(),
            interrupt: InterruptDevice::new(geometry.interrupt_tact),
            timing,
            clock_multiplier,
            frame_tacts,
            frame_completed: true,
            frame_count: 0,
            overflow: 0,
            next_render_tact: 0,
            completion_reason: ExecutionCompletionReason::None,
            last_error: None,
            debug: DebugState::new(),
        };
        engine.attach_devices(&mut device_info)?;
        Ok(engine)
    }

    fn attach_devices(&mut self, info: &mut DeviceInfoCollection) -> Result<(), SpectrumError> {
        // Everything after the ROM may read its image while attaching.
        attach_device(&mut self.rom, info, &[])?;
        let rom = self.rom.image();
        for kind in DeviceKind::ATTACH_ORDER {
            match kind {
                DeviceKind::Rom => {}
                DeviceKind::Memory => attach_device(self.bus.memory.as_mut(), info, rom)?,
                DeviceKind::Port => attach_device(&mut self.bus.port, info, rom)?,
                DeviceKind::Cpu => {
                    log::debug!("attaching {kind} device");
                    self.cpu.reset();
                }
                DeviceKind::Screen => attach_device(&mut self.bus.screen, info, rom)?,
                DeviceKind::Beeper => attach_device(&mut self.bus.beeper, info, rom)?,
                DeviceKind::Keyboard => attach_device(&mut self.bus.keyboard, info, rom)?,
                DeviceKind::Interrupt => attach_device(&mut self.interrupt, info, rom)?,
                DeviceKind::Tape => attach_device(&mut self.bus.tape, info, rom)?,
                DeviceKind::Sound => {
                    if let Some(device) = self.bus.sound.as_deref_mut() {
                        attach_device(device, info, rom)?;
                    }
                }
                DeviceKind::Floppy => {
                    if let Some(device) = self.bus.floppy.as_deref_mut() {
                        attach_device(device, info, rom)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Run until the emulation mode's stop condition, cancellation, timeout
    /// or a processor fault. Returns false for the last three.
    pub fn run(
        &mut self,
        cancellation: &impl CancellationToken,
        options: &ExecuteCycleOptions,
    ) -> bool {
        self.bus.screen.set_suppress_delivery(options.fast_vm_mode);
        self.bus.beeper.set_muted(options.fast_vm_mode);

        let reason = self.execute(cancellation, options);
        self.completion_reason = reason;
        log::debug!(
            "run completed: {reason} at pc {:#06X}, frame {}",
            self.cpu.pc(),
            self.frame_count
        );
        reason.is_success()
    }

    fn execute(
        &mut self,
        cancellation: &impl CancellationToken,
        options: &ExecuteCycleOptions,
    ) -> ExecutionCompletionReason {
        let run_start = self.cpu.tacts();
        let mut executed: u64 = 0;
        if options.emulation_mode != EmulationMode::Debugger {
            self.debug.cancel_step_over();
        }

        loop {
            if cancellation.is_cancellation_requested() {
                return ExecutionCompletionReason::Cancelled;
            }
            if self.frame_completed {
                self.start_frame();
            }

            while !self.frame_completed {
                if !self.cpu.is_in_op_execution() {
                    let stop = self.stop_reason(cancellation, options, run_start, executed);
                    if let Some(reason) = stop {
                        return reason;
                    }
                }

                let frame_tact = self.current_frame_tact();
                self.interrupt.check_for_interrupt(&mut self.cpu, frame_tact);

                if let Err(err) = self.cpu.execute_cpu_cycle(&mut self.bus) {
                    log::warn!("processor fault: {err}");
                    self.last_error = Some(err);
                    return ExecutionCompletionReason::Exception;
                }
                executed += 1;

                let current = self.current_frame_tact();
                if !options.disable_screen_rendering {
                    self.render_to(current);
                }

                if options.emulation_mode == EmulationMode::UntilHalt && self.cpu.is_halted() {
                    return ExecutionCompletionReason::Halted;
                }

                self.notify_cpu_operation_completed(options.fast_tape_mode);

                self.frame_completed =
                    !self.cpu.is_in_op_execution() && current >= self.frame_tacts;
            }

            self.complete_frame();
            if matches!(
                options.emulation_mode,
                EmulationMode::UntilFrameEnds | EmulationMode::Debugger
            ) {
                return ExecutionCompletionReason::FrameCompleted;
            }
        }
    }

    /// Checks made at every instruction boundary, in priority order.
    fn stop_reason(
        &mut self,
        cancellation: &impl CancellationToken,
        options: &ExecuteCycleOptions,
        run_start: u64,
        executed: u64,
    ) -> Option<ExecutionCompletionReason> {
        if cancellation.is_cancellation_requested() {
            return Some(ExecutionCompletionReason::Cancelled);
        }
        if options.timeout_tacts > 0 && self.cpu.tacts() - run_start > options.timeout_tacts {
            return Some(ExecutionCompletionReason::Timeout);
        }
        let pc = self.cpu.pc();
        if options.emulation_mode == EmulationMode::UntilExecutionPoint
            && pc == options.termination_point
            && (pc >= 0x4000 || self.bus.memory.selected_rom() == options.termination_rom)
        {
            return Some(ExecutionCompletionReason::TerminationPointReached);
        }
        if options.emulation_mode == EmulationMode::Debugger {
            let (cpu, bus) = (&self.cpu, &self.bus);
            let stop = self.debug.should_stop(options.debug_step_mode, pc, executed, || {
                cpu.call_instruction_length(bus)
            });
            if stop {
                return Some(ExecutionCompletionReason::BreakpointReached);
            }
        }
        None
    }

    fn start_frame(&mut self) {
        let carried = u64::from(self.overflow) * u64::from(self.clock_multiplier);
        self.bus.frame_start_tact = self.cpu.tacts().saturating_sub(carried);

        self.bus.screen.on_new_frame();
        self.bus.beeper.on_new_frame();
        self.interrupt.on_new_frame();
        for device in self.bus.sound.iter_mut().chain(self.bus.floppy.iter_mut()) {
            device.on_new_frame();
        }

        // The overflow tacts were executed in the previous frame's run but
        // belong to this frame.
        self.next_render_tact = 0;
        self.bus.render_screen(0, self.overflow);
        self.next_render_tact = self.overflow;
        self.frame_completed = false;
    }

    fn complete_frame(&mut self) {
        let current = self.current_frame_tact();
        self.frame_count += 1;
        self.overflow = current % self.frame_tacts;
        log::trace!("frame {} completed, overflow {}", self.frame_count, self.overflow);

        let overflow = self.overflow;
        self.bus.screen.on_frame_completed(overflow);
        self.bus.beeper.on_frame_completed(overflow);
        self.interrupt.on_frame_completed(overflow);
        for device in self.bus.sound.iter_mut().chain(self.bus.floppy.iter_mut()) {
            device.on_frame_completed(overflow);
        }
    }

    fn render_to(&mut self, current: u32) {
        let to = current.min(self.frame_tacts);
        if to > self.next_render_tact {
            self.bus.render_screen(self.next_render_tact, to);
            self.next_render_tact = to;
        }
    }

    fn notify_cpu_operation_completed(&mut self, fast_tape_mode: bool) {
        let tacts = self.cpu.tacts() / u64::from(self.clock_multiplier);
        let bus = &mut self.bus;
        bus.tape.on_cpu_operation_completed(&mut CpuOpContext {
            registers: self.cpu.registers_mut(),
            tacts,
            memory: bus.memory.as_mut(),
            fast_tape_mode,
        });
        bus.beeper.set_tape_override(bus.tape.is_loading());
    }

    /// Return every device and the processor to power-on state. Breakpoints
    /// are kept.
    pub fn reset(&mut self) {
        self.rom.reset();
        self.bus.memory.reset();
        self.bus.port.reset();
        self.cpu.reset();
        self.bus.screen.reset();
        self.bus.beeper.reset();
        self.bus.keyboard.reset();
        self.interrupt.reset();
        self.bus.tape.reset();
        for device in self.bus.sound.iter_mut().chain(self.bus.floppy.iter_mut()) {
            device.reset();
        }

        self.bus.frame_start_tact = 0;
        self.frame_completed = true;
        self.frame_count = 0;
        self.overflow = 0;
        self.next_render_tact = 0;
        self.completion_reason = ExecutionCompletionReason::None;
        self.last_error = None;
        self.debug.reset();
    }

    /// Machine tacts since the current frame started.
    #[must_use]
    pub fn current_frame_tact(&self) -> u32 {
        self.bus.frame_tact(self.cpu.tacts())
    }

    #[must_use]
    pub fn cpu(&self) -> &C {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut C {
        &mut self.cpu
    }

    #[must_use]
    pub fn bus(&self) -> &SpectrumBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut SpectrumBus {
        &mut self.bus
    }

    #[must_use]
    pub fn screen_timing(&self) -> &Rc<ScreenTiming> {
        &self.timing
    }

    #[must_use]
    pub fn rom(&self) -> &RomDevice {
        &self.rom
    }

    #[must_use]
    pub fn interrupt(&self) -> &InterruptDevice {
        &self.interrupt
    }

    #[must_use]
    pub fn clock_multiplier(&self) -> u32 {
        self.clock_multiplier
    }

    #[must_use]
    pub fn frame_tacts(&self) -> u32 {
        self.frame_tacts
    }

    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    #[must_use]
    pub fn overflow(&self) -> u32 {
        self.overflow
    }

    #[must_use]
    pub fn completion_reason(&self) -> ExecutionCompletionReason {
        self.completion_reason
    }

    /// The fault that ended the last run with `Exception`.
    #[must_use]
    pub fn last_error(&self) -> Option<&CpuError> {
        self.last_error.as_ref()
    }

    /// Palette indices of the screen, `screen_width × screen_lines`.
    #[must_use]
    pub fn pixel_buffer(&self) -> &[u8] {
        self.bus.screen.pixel_buffer()
    }

    pub fn take_tape_events(&mut self) -> Vec<TapeEvent> {
        self.bus.tape.take_events()
    }

    pub fn add_breakpoint(&mut self, address: u16) -> bool {
        self.debug.add_breakpoint(address)
    }

    pub fn remove_breakpoint(&mut self, address: u16) -> bool {
        self.debug.remove_breakpoint(address)
    }

    pub fn clear_breakpoints(&mut self) {
        self.debug.clear_breakpoints();
    }

    #[must_use]
    pub fn debug_state(&self) -> &DebugState {
        &self.debug
    }
}
