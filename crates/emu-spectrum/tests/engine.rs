//! Engine scenarios driven by the scripted test processor.
//!
//! Each test builds a 16K ROM from a few hand-assembled instructions, so
//! every tact count below can be checked against the instruction timings in
//! `emu_spectrum::testing`.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use emu_core::{CpuError, NeverCancel, Observable, StateFlags, Value, Z80Cpu};
use emu_spectrum::testing::TestCpu;
use emu_spectrum::{
    DebugStepMode, DeviceInfoCollection, EmulationMode, ExecuteCycleOptions,
    ExecutionCompletionReason, FrameSink, ROM_SIZE, SpectrumConfig, SpectrumEngine,
    SpectrumError, SpectrumMemory,
};

const FRAME_TACTS: u32 = 69_888;

/// A ROM with `code` placed at each address.
fn rom(code: &[(u16, &[u8])]) -> Vec<u8> {
    let mut rom = vec![0u8; ROM_SIZE];
    for (addr, bytes) in code {
        let start = usize::from(*addr);
        rom[start..start + bytes.len()].copy_from_slice(bytes);
    }
    rom
}

fn engine(code: &[(u16, &[u8])]) -> SpectrumEngine<TestCpu> {
    let _ = env_logger::builder().is_test(true).try_init();
    SpectrumEngine::new(TestCpu::new(), DeviceInfoCollection::default().with_rom(rom(code)))
        .unwrap()
}

/// DI; JP $0001
const SPIN: &[(u16, &[u8])] = &[(0x0000, &[0xF3, 0xC3, 0x01, 0x00])];

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

#[test]
fn test_rom_is_required() {
    let result = SpectrumEngine::new(TestCpu::new(), DeviceInfoCollection::default());
    assert!(matches!(result, Err(SpectrumError::MissingRom)));
}

#[test]
fn test_rom_size_is_checked() {
    let info = DeviceInfoCollection::default().with_rom(vec![0; 1000]);
    let result = SpectrumEngine::new(TestCpu::new(), info);
    assert!(matches!(result, Err(SpectrumError::RomSize { actual: 1000, .. })));
}

#[test]
fn test_two_page_rom_is_rejected_at_load() {
    let info = DeviceInfoCollection::default().with_rom(vec![0; 2 * ROM_SIZE]);
    let result = SpectrumEngine::new(TestCpu::new(), info);
    assert!(matches!(result, Err(SpectrumError::RomSize { actual: 32_768, .. })));
}

// ---------------------------------------------------------------------------
// Frames
// ---------------------------------------------------------------------------

#[test]
fn test_fresh_engine_completes_one_frame() {
    let mut engine = engine(SPIN);
    assert!(engine.run(&NeverCancel, &ExecuteCycleOptions::default()));
    assert_eq!(
        engine.completion_reason(),
        ExecutionCompletionReason::FrameCompleted
    );
    assert_eq!(engine.frame_count(), 1);
    // 4 + 6989 * 10 = 69 894 tacts.
    assert_eq!(engine.cpu().tacts(), 69_894);
    assert_eq!(engine.overflow(), 6);
}

#[test]
fn test_empty_screen_geometry_uses_48k_timing() {
    let mut info = DeviceInfoCollection::default().with_rom(rom(SPIN));
    info.screen.configuration.display_line_time = 0;
    info.screen.configuration.border_left_time = 0;
    info.screen.configuration.border_right_time = 0;
    info.screen.configuration.non_visible_border_right_time = 0;
    info.screen.configuration.horizontal_blanking_time = 0;
    let mut engine = SpectrumEngine::new(TestCpu::new(), info).unwrap();
    assert_eq!(engine.frame_tacts(), FRAME_TACTS);
    assert!(engine.run(&NeverCancel, &ExecuteCycleOptions::default()));
    assert_eq!(engine.overflow(), 6);
}

#[test]
fn test_overflow_carries_into_next_frame() {
    let mut engine = engine(SPIN);
    engine.run(&NeverCancel, &ExecuteCycleOptions::default());
    engine.run(&NeverCancel, &ExecuteCycleOptions::default());
    assert_eq!(engine.frame_count(), 2);
    // The second frame started at 69 888; 6989 more jumps end at 139 784.
    assert_eq!(engine.cpu().tacts(), 139_784);
    assert_eq!(engine.overflow(), 8);
}

#[test]
fn test_clock_multiplier_stretches_frame() {
    let mut config = SpectrumConfig::default();
    config.cpu.clock_multiplier = 2;
    let info = DeviceInfoCollection::from_config(&config).with_rom(rom(SPIN));
    let mut engine = SpectrumEngine::new(TestCpu::new(), info).unwrap();
    assert_eq!(engine.clock_multiplier(), 2);

    engine.run(&NeverCancel, &ExecuteCycleOptions::default());
    assert_eq!(engine.cpu().tacts(), 139_784);
    assert_eq!(engine.overflow(), 4);
}

#[test]
fn test_clock_multiplier_is_clamped() {
    for (configured, expected) in [(0, 1), (3, 2), (5, 4), (9, 8)] {
        let mut config = SpectrumConfig::default();
        config.cpu.clock_multiplier = configured;
        let info = DeviceInfoCollection::from_config(&config).with_rom(rom(SPIN));
        let engine = SpectrumEngine::new(TestCpu::new(), info).unwrap();
        assert_eq!(engine.clock_multiplier(), expected, "multiplier {configured}");
    }
}

// ---------------------------------------------------------------------------
// Stop conditions
// ---------------------------------------------------------------------------

#[test]
fn test_termination_point_in_rom() {
    let mut engine = engine(&[
        (0x0000, &[0xC3, 0x08, 0x00]),
        (0x0008, &[0xC3, 0x08, 0x00]),
    ]);
    let options = ExecuteCycleOptions::until_execution_point(0x0008, 0);
    assert!(engine.run(&NeverCancel, &options));
    assert_eq!(
        engine.completion_reason(),
        ExecutionCompletionReason::TerminationPointReached
    );
    assert_eq!(engine.cpu().pc(), 0x0008);
}

#[test]
fn test_termination_point_requires_matching_rom_page() {
    let mut engine = engine(&[
        (0x0000, &[0xC3, 0x08, 0x00]),
        (0x0008, &[0xC3, 0x08, 0x00]),
    ]);
    let options = ExecuteCycleOptions::until_execution_point(0x0008, 1).with_timeout(1000);
    assert!(!engine.run(&NeverCancel, &options));
    assert_eq!(engine.completion_reason(), ExecutionCompletionReason::Timeout);
}

#[test]
fn test_continuous_mode_runs_until_timeout() {
    let mut engine = engine(SPIN);
    let options = ExecuteCycleOptions::new(EmulationMode::Continuous).with_timeout(200_000);
    assert!(!engine.run(&NeverCancel, &options));
    assert_eq!(engine.completion_reason(), ExecutionCompletionReason::Timeout);
    assert_eq!(engine.frame_count(), 2);
    assert!(engine.cpu().tacts() > 200_000);
}

#[test]
fn test_cancellation_before_first_instruction() {
    let mut engine = engine(SPIN);
    assert!(!engine.run(&true, &ExecuteCycleOptions::default()));
    assert_eq!(engine.completion_reason(), ExecutionCompletionReason::Cancelled);
    assert_eq!(engine.cpu().tacts(), 0);
}

#[test]
fn test_cancellation_through_shared_flag() {
    let flag = Arc::new(AtomicBool::new(false));
    let mut engine = engine(SPIN);
    assert!(engine.run(&Arc::clone(&flag), &ExecuteCycleOptions::default()));

    flag.store(true, Ordering::Relaxed);
    assert!(!engine.run(&Arc::clone(&flag), &ExecuteCycleOptions::default()));
    assert_eq!(engine.completion_reason(), ExecutionCompletionReason::Cancelled);
    assert_eq!(engine.frame_count(), 1);
}

#[test]
fn test_until_halt() {
    // NOP; NOP; HALT
    let mut engine = engine(&[(0x0000, &[0x00, 0x00, 0x76])]);
    assert!(engine.run(&NeverCancel, &ExecuteCycleOptions::new(EmulationMode::UntilHalt)));
    assert_eq!(engine.completion_reason(), ExecutionCompletionReason::Halted);
    assert_eq!(engine.cpu().pc(), 0x0003);
    assert_eq!(engine.frame_count(), 0);
}

#[test]
fn test_processor_fault_ends_run() {
    let mut engine = engine(&[(0x0000, &[0x00, 0xED, 0xB0])]);
    assert!(!engine.run(&NeverCancel, &ExecuteCycleOptions::default()));
    assert_eq!(engine.completion_reason(), ExecutionCompletionReason::Exception);
    assert_eq!(
        engine.last_error(),
        Some(&CpuError::InvalidOpcode {
            pc: 0x0001,
            opcode: 0xED
        })
    );
}

// ---------------------------------------------------------------------------
// Debugger
// ---------------------------------------------------------------------------

/// NOP; NOP; JP $0000
const LOOP: &[(u16, &[u8])] = &[(0x0000, &[0x00, 0x00, 0xC3, 0x00, 0x00])];

#[test]
fn test_breakpoint_stops_and_resumes() {
    let mut engine = engine(LOOP);
    engine.add_breakpoint(0x0002);
    let options = ExecuteCycleOptions::debugger(DebugStepMode::StopAtBreakpoint);

    assert!(engine.run(&NeverCancel, &options));
    assert_eq!(
        engine.completion_reason(),
        ExecutionCompletionReason::BreakpointReached
    );
    assert_eq!(engine.cpu().pc(), 0x0002);
    assert_eq!(engine.cpu().tacts(), 8);

    // Resuming on the breakpoint runs one full loop before stopping again.
    assert!(engine.run(&NeverCancel, &options));
    assert_eq!(engine.cpu().pc(), 0x0002);
    assert_eq!(engine.cpu().tacts(), 26);

    engine.clear_breakpoints();
    assert!(engine.run(&NeverCancel, &options));
    assert_eq!(
        engine.completion_reason(),
        ExecutionCompletionReason::FrameCompleted
    );
}

#[test]
fn test_step_into() {
    let mut engine = engine(LOOP);
    let options = ExecuteCycleOptions::debugger(DebugStepMode::StepInto);
    engine.run(&NeverCancel, &options);
    assert_eq!(engine.cpu().pc(), 0x0001);
    engine.run(&NeverCancel, &options);
    assert_eq!(engine.cpu().pc(), 0x0002);
    engine.run(&NeverCancel, &options);
    assert_eq!(engine.cpu().pc(), 0x0000);
}

#[test]
fn test_step_over_call() {
    // CALL $0010; NOP ... $0010: NOP; NOP; RET
    let mut engine = engine(&[
        (0x0000, &[0xCD, 0x10, 0x00, 0x00]),
        (0x0010, &[0x00, 0x00, 0xC9]),
    ]);
    let options = ExecuteCycleOptions::debugger(DebugStepMode::StepOver);
    assert!(engine.run(&NeverCancel, &options));
    assert_eq!(
        engine.completion_reason(),
        ExecutionCompletionReason::BreakpointReached
    );
    assert_eq!(engine.cpu().pc(), 0x0003);
    assert_eq!(engine.cpu().tacts(), 17 + 4 + 4 + 10);
    assert_eq!(engine.debug_state().imminent_breakpoint(), None);
}

// ---------------------------------------------------------------------------
// Interrupts and screen
// ---------------------------------------------------------------------------

#[test]
fn test_interrupt_raised_once_per_frame() {
    // EI; HALT; JP $0001 ... $0038: EI; RET
    let mut engine = engine(&[
        (0x0000, &[0xFB, 0x76, 0xC3, 0x01, 0x00]),
        (0x0038, &[0xFB, 0xC9]),
    ]);
    engine.run(&NeverCancel, &ExecuteCycleOptions::default());
    assert_eq!(engine.interrupt().frame_count(), 1);
    assert!(engine.cpu().is_halted());

    engine.run(&NeverCancel, &ExecuteCycleOptions::default());
    assert_eq!(engine.interrupt().frame_count(), 2);
    assert_eq!(engine.frame_count(), 2);
}

#[test]
fn test_interrupt_revoked_while_processor_blocked() {
    // EI; JP $0001 ... $0038: HALT
    let mut engine = engine(&[
        (0x0000, &[0xFB, 0xC3, 0x01, 0x00]),
        (0x0038, &[0x76]),
    ]);
    engine.cpu_mut().set_interrupt_blocked(true);
    // A stale request left over from before the window.
    engine.cpu_mut().set_state_flags(StateFlags::INT);

    engine.run(&NeverCancel, &ExecuteCycleOptions::default());
    assert_eq!(engine.interrupt().frame_count(), 0);
    assert!(!engine.interrupt().is_raised());
    assert!(engine.interrupt().is_revoked());
    assert!(!engine.cpu().state_flags().contains(StateFlags::INT));
    assert!(!engine.cpu().is_halted());
    assert_eq!(engine.cpu().pc(), 0x0001);

    // Unblocked, the next frame's window is taken.
    engine.cpu_mut().set_interrupt_blocked(false);
    engine.run(&NeverCancel, &ExecuteCycleOptions::default());
    assert_eq!(engine.interrupt().frame_count(), 1);
    assert!(engine.cpu().is_halted());
}

#[test]
fn test_border_write_reaches_pixels() {
    // LD A,2; OUT ($FE),A; JP $0004
    let mut engine = engine(&[(0x0000, &[0x3E, 0x02, 0xD3, 0xFE, 0xC3, 0x04, 0x00])]);
    // White paper in the first attribute cell.
    engine.bus_mut().memory_mut().write(0x5800, 0x38);
    engine.run(&NeverCancel, &ExecuteCycleOptions::default());
    let pixels = engine.pixel_buffer();
    assert_eq!(pixels.len(), 352 * 288);
    assert_eq!(pixels[0], 2);
    assert_eq!(pixels[pixels.len() - 1], 2);
    assert_eq!(pixels[48 * 352 + 48], 7);
    assert_eq!(engine.query("ula.border"), Some(Value::U8(2)));
}

#[test]
fn test_disabled_rendering_leaves_buffer_untouched() {
    let mut engine = engine(&[(0x0000, &[0x3E, 0x02, 0xD3, 0xFE, 0xC3, 0x04, 0x00])]);
    let options = ExecuteCycleOptions::default().without_rendering();
    engine.run(&NeverCancel, &options);
    assert!(engine.pixel_buffer().iter().all(|&p| p == 0));
}

struct CountingSink(Rc<RefCell<usize>>);

impl FrameSink for CountingSink {
    fn start_new_frame(&mut self) {}

    fn display_frame(&mut self, _pixels: &[u8]) {
        *self.0.borrow_mut() += 1;
    }
}

#[test]
fn test_fast_vm_mode_skips_frame_delivery() {
    let frames = Rc::new(RefCell::new(0));
    let info = DeviceInfoCollection::default()
        .with_rom(rom(SPIN))
        .with_frame_sink(Box::new(CountingSink(Rc::clone(&frames))));
    let mut engine = SpectrumEngine::new(TestCpu::new(), info).unwrap();

    engine.run(&NeverCancel, &ExecuteCycleOptions::default());
    assert_eq!(*frames.borrow(), 1);
    engine.run(&NeverCancel, &ExecuteCycleOptions::default().with_fast_vm(true));
    assert_eq!(*frames.borrow(), 1);
    assert_eq!(engine.frame_count(), 2);
}

#[test]
fn test_reset_restarts_frame_accounting() {
    let mut engine = engine(SPIN);
    engine.run(&NeverCancel, &ExecuteCycleOptions::default());
    engine.reset();
    assert_eq!(engine.frame_count(), 0);
    assert_eq!(engine.overflow(), 0);
    assert_eq!(engine.cpu().tacts(), 0);
    assert_eq!(engine.completion_reason(), ExecutionCompletionReason::None);

    engine.run(&NeverCancel, &ExecuteCycleOptions::default());
    assert_eq!(engine.overflow(), 6);
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

#[test]
fn test_queries_and_snapshot() {
    let mut engine = engine(SPIN);
    engine.bus_mut().memory_mut().write(0x8000, 0x5A);
    engine.run(&NeverCancel, &ExecuteCycleOptions::default());

    assert_eq!(engine.query("cpu.pc"), Some(Value::U16(0x0001)));
    assert_eq!(engine.query("frame_count"), Some(Value::U64(1)));
    assert_eq!(engine.query("memory.0x8000"), Some(Value::U8(0x5A)));
    assert_eq!(engine.query("memory.$8000"), Some(Value::U8(0x5A)));
    assert_eq!(engine.query("tape.mode"), Some(Value::String("Passive".into())));
    assert_eq!(engine.query("no.such.path"), None);
    assert!(engine.query_paths().contains(&"ula.phase"));

    let diagnostics = engine.diagnostics();
    assert_eq!(diagnostics.frame_count, 1);
    assert_eq!(diagnostics.overflow, 6);
    assert_eq!(diagnostics.frame_tact, FRAME_TACTS + 6);
    assert_eq!(diagnostics.raster_line, 312);
    assert_eq!(diagnostics.phase, "None");
}
