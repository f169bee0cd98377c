//! Tape device.
//!
//! The device watches the program counter after every instruction. When the
//! ROM enters its LOAD routine the device plays the inserted tape on the EAR
//! line (or, in fast tape mode, copies each block straight into memory).
//! When the ROM enters its SAVE routine the device measures MIC pulses and
//! rebuilds the saved blocks.

mod player;
mod pulse;

pub use player::{
    DATA_PILOT_PULSES, DEFAULT_PAUSE_MS, HEADER_PILOT_PULSES, TACTS_PER_MS, TapeBlock,
    TapePlayer,
};
pub use pulse::{
    BIT0_PULSE, BIT1_PULSE, MIN_PILOT_PULSES, MicPulseType, PILOT_PULSE, PULSE_TOLERANCE,
    SYNC1_PULSE, SYNC2_PULSE, SaveRecorder, SavePhase, TERM_SYNC_PULSE, classify_pulse,
};

use std::fmt;
use std::io::Read;

use emu_core::{CF, HF, NF, PF, Registers, SF, ZF};

use crate::device::{AttachContext, CpuBoundDevice, CpuOpContext, Device, DeviceKind};
use crate::error::SpectrumError;
use crate::memory::SpectrumMemory;
use crate::providers::TapeProvider;

/// Entry of the ROM's LD-BYTES loop.
pub const LOAD_BYTES_ROUTINE: u16 = 0x056C;
/// Where LD-BYTES goes when the block type does not match.
pub const LOAD_BYTES_INVALID_HEADER: u16 = 0x05B6;
/// Where LD-BYTES continues after the last byte.
pub const LOAD_BYTES_RESUME: u16 = 0x05E2;
/// Entry of the ROM's SA-BYTES routine.
pub const SAVE_BYTES_ROUTINE: u16 = 0x04C2;
/// RST 8, the ROM error restart.
pub const ERROR_ROUTINE: u16 = 0x0008;
/// MIC silence that ends a SAVE session.
pub const SAVE_SILENCE_TACTS: u64 = 17_500_000;
/// Length of a saved header block (flag, 17 header bytes, checksum).
pub const HEADER_BLOCK_LENGTH: usize = 19;
/// Offset of the file name within a header block.
pub const NAME_OFFSET: usize = 2;
pub const NAME_LENGTH: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TapeOperationMode {
    #[default]
    Passive,
    Load,
    Save,
}

impl fmt::Display for TapeOperationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Notifications raised by the tape device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapeEvent {
    EnteredLoadMode,
    LeftLoadMode,
    LoadCompleted,
    EnteredSaveMode,
    LeftSaveMode,
    /// One block was copied into memory by the fast loader.
    FastLoadCompleted,
}

pub type TapeObserver = Box<dyn FnMut(TapeEvent)>;

pub struct TapeDevice {
    mode: TapeOperationMode,
    provider: Option<Box<dyn TapeProvider>>,
    player: Option<TapePlayer>,
    recorder: SaveRecorder,
    last_mic: bool,
    last_mic_tact: u64,
    blocks_saved: usize,
    events: Vec<TapeEvent>,
    observers: Vec<TapeObserver>,
}

impl TapeDevice {
    #[must_use]
    pub fn new() -> Self {
        Self {
            mode: TapeOperationMode::Passive,
            provider: None,
            player: None,
            recorder: SaveRecorder::new(),
            last_mic: false,
            last_mic_tact: 0,
            blocks_saved: 0,
            events: Vec::new(),
            observers: Vec::new(),
        }
    }

    #[must_use]
    pub fn mode(&self) -> TapeOperationMode {
        self.mode
    }

    #[must_use]
    pub fn save_phase(&self) -> SavePhase {
        self.recorder.phase()
    }

    #[must_use]
    pub fn player(&self) -> Option<&TapePlayer> {
        self.player.as_ref()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.mode == TapeOperationMode::Load
    }

    /// Replace the tape provider. Takes effect on the next LOAD or SAVE.
    pub fn set_provider(&mut self, provider: Box<dyn TapeProvider>) {
        self.provider = Some(provider);
    }

    pub fn provider_mut(&mut self) -> Option<&mut (dyn TapeProvider + 'static)> {
        self.provider.as_deref_mut()
    }

    /// Register a callback invoked for every event.
    pub fn subscribe(&mut self, observer: TapeObserver) {
        self.observers.push(observer);
    }

    /// Events raised since the last call.
    pub fn take_events(&mut self) -> Vec<TapeEvent> {
        std::mem::take(&mut self.events)
    }

    /// EAR level seen by the ROM loader at machine tact `tact`.
    pub fn ear_bit(&mut self, tact: u64) -> bool {
        match (&mut self.player, self.mode) {
            (Some(player), TapeOperationMode::Load) => player.ear_bit(tact),
            _ => false,
        }
    }

    /// Track the MIC line. Every edge in SAVE mode closes a pulse.
    pub fn process_mic_bit(&mut self, mic: bool, tact: u64) {
        if self.mode != TapeOperationMode::Save || mic == self.last_mic {
            return;
        }
        let length = tact.saturating_sub(self.last_mic_tact);
        self.last_mic = mic;
        self.last_mic_tact = tact;

        if let Some(block) = self.recorder.process_pulse(classify_pulse(length)) {
            self.save_block(&block);
        }
    }

    fn notify(&mut self, event: TapeEvent) {
        for observer in &mut self.observers {
            observer(event);
        }
        self.events.push(event);
    }

    fn set_mode(&mut self, mode: TapeOperationMode) {
        log::debug!("tape mode {} -> {mode}", self.mode);
        self.mode = mode;
    }

    fn update_mode(&mut self, pc: u16, tacts: u64) {
        match self.mode {
            TapeOperationMode::Passive if pc == LOAD_BYTES_ROUTINE => self.enter_load(tacts),
            TapeOperationMode::Passive if pc == SAVE_BYTES_ROUTINE => self.enter_save(tacts),
            TapeOperationMode::Load => {
                let finished = self.player.as_ref().is_none_or(TapePlayer::is_at_end);
                if finished || pc == ERROR_ROUTINE {
                    self.leave_load();
                }
            }
            TapeOperationMode::Save => {
                if pc == ERROR_ROUTINE
                    || tacts.saturating_sub(self.last_mic_tact) > SAVE_SILENCE_TACTS
                {
                    self.leave_save();
                }
            }
            TapeOperationMode::Passive => {}
        }
    }

    fn enter_load(&mut self, tacts: u64) {
        let Some(mut player) = self.read_content() else {
            return;
        };
        if player.block_count() == 0 {
            log::debug!("tape holds no playable blocks");
            return;
        }
        player.start(tacts);
        self.player = Some(player);
        self.set_mode(TapeOperationMode::Load);
        self.notify(TapeEvent::EnteredLoadMode);
    }

    fn read_content(&mut self) -> Option<TapePlayer> {
        let provider = self.provider.as_mut()?;
        let result = provider.content().and_then(|reader| match reader {
            Some(mut reader) => {
                let mut image = Vec::new();
                reader.read_to_end(&mut image)?;
                TapePlayer::from_bytes(&image).map(Some)
            }
            None => Ok(None),
        });
        match result {
            Ok(player) => player,
            Err(err) => {
                log::warn!("cannot play tape: {err}");
                None
            }
        }
    }

    fn leave_load(&mut self) {
        self.player = None;
        self.set_mode(TapeOperationMode::Passive);
        self.notify(TapeEvent::LeftLoadMode);
        self.notify(TapeEvent::LoadCompleted);
    }

    fn enter_save(&mut self, tacts: u64) {
        self.recorder.reset();
        self.last_mic_tact = tacts;
        self.blocks_saved = 0;
        if let Some(provider) = self.provider.as_mut() {
            if let Err(err) = provider.create_tape_file() {
                log::warn!("cannot create tape file: {err}");
            }
        }
        self.set_mode(TapeOperationMode::Save);
        self.notify(TapeEvent::EnteredSaveMode);
    }

    fn leave_save(&mut self) {
        if let Some(provider) = self.provider.as_mut() {
            if let Err(err) = provider.finalize_tape_file() {
                log::warn!("cannot finalise tape file: {err}");
            }
        }
        self.set_mode(TapeOperationMode::Passive);
        self.notify(TapeEvent::LeftSaveMode);
    }

    fn save_block(&mut self, block: &[u8]) {
        let first = self.blocks_saved == 0;
        self.blocks_saved += 1;
        let Some(provider) = self.provider.as_mut() else {
            log::debug!("no tape provider, dropping {} saved bytes", block.len());
            return;
        };
        if first && block.len() == HEADER_BLOCK_LENGTH {
            // One char per byte; codes 0x80 and up keep their own code point.
            let name: String = block[NAME_OFFSET..NAME_OFFSET + NAME_LENGTH]
                .iter()
                .map(|&b| char::from(b))
                .collect();
            let name = name.trim();
            log::info!("saving tape file \"{name}\"");
            provider.set_name(name);
        }
        if let Err(err) = provider.save_tape_block(block) {
            log::warn!("cannot save tape block: {err}");
        }
    }

    /// Copy the current block into memory the way LD-BYTES would, then
    /// route the processor to where the ROM continues. Returns false when
    /// the current block carries no loadable data.
    fn fast_load(&mut self, ctx: &mut CpuOpContext<'_>) -> bool {
        let Some(player) = self.player.as_mut() else {
            return false;
        };
        let Some(data) = player.current_block().and_then(TapeBlock::rom_data) else {
            return false;
        };
        load_block(data, ctx.registers, ctx.memory);
        player.next_block(ctx.tacts);
        self.notify(TapeEvent::FastLoadCompleted);
        true
    }
}

impl Default for TapeDevice {
    fn default() -> Self {
        Self::new()
    }
}

/// LD-BYTES on a whole block.
///
/// On entry IX is the destination, DE the length and AF' holds the
/// expected flag byte with carry set for LOAD or clear for VERIFY.
fn load_block(data: &[u8], regs: &mut Registers, memory: &mut dyn SpectrumMemory) {
    regs.exchange_af();
    let verify = regs.af() & 0xFF01 == 0xFF00;

    if data.first() != Some(&regs.a) {
        regs.a ^= regs.l;
        load_failed(regs);
        return;
    }

    regs.h = regs.a;
    let mut index = 1;
    while regs.de() > 0 {
        let Some(&byte) = data.get(index) else {
            load_failed(regs);
            return;
        };
        regs.l = byte;
        if verify {
            let existing = memory.read(regs.ix);
            if existing != byte {
                regs.a = existing ^ byte;
                load_failed(regs);
                return;
            }
        } else {
            memory.write(regs.ix, byte);
        }
        regs.h ^= byte;
        index += 1;
        regs.ix = regs.ix.wrapping_add(1);
        regs.set_de(regs.de() - 1);
    }

    if let Some(&parity) = data.get(index) {
        regs.h ^= parity;
    }
    regs.a = regs.h;
    compare_with_one(regs);
    regs.pc = LOAD_BYTES_RESUME;
}

fn load_failed(regs: &mut Registers) {
    regs.f &= !(ZF | CF);
    regs.pc = LOAD_BYTES_INVALID_HEADER;
}

/// Flags of `CP 1`: carry is set exactly when A is zero.
fn compare_with_one(regs: &mut Registers) {
    let a = regs.a;
    let result = a.wrapping_sub(1);
    let mut f = NF | result & SF;
    if result == 0 {
        f |= ZF;
    }
    if a & 0x0F == 0 {
        f |= HF;
    }
    if a == 0x80 {
        f |= PF;
    }
    if a == 0 {
        f |= CF;
    }
    regs.f = f;
}

impl Device for TapeDevice {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Tape
    }

    fn reset(&mut self) {
        self.mode = TapeOperationMode::Passive;
        self.player = None;
        self.recorder.reset();
        self.last_mic = false;
        self.last_mic_tact = 0;
        self.blocks_saved = 0;
        self.events.clear();
    }

    fn attach(&mut self, ctx: &mut AttachContext<'_>) -> Result<(), SpectrumError> {
        if let Some(provider) = ctx.device_info.tape.provider.take() {
            self.provider = Some(provider);
        }
        Ok(())
    }
}

impl CpuBoundDevice for TapeDevice {
    fn on_cpu_operation_completed(&mut self, ctx: &mut CpuOpContext<'_>) {
        let pc = ctx.registers.pc;
        self.update_mode(pc, ctx.tacts);
        if ctx.fast_tape_mode && self.is_loading() && pc == LOAD_BYTES_ROUTINE {
            self.fast_load(ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Memory48K;
    use crate::providers::MemoryTapeProvider;
    use format_spectrum_tap::{TapBlock, TapFile};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn tap_image(blocks: &[TapBlock]) -> Vec<u8> {
        TapFile {
            blocks: blocks.to_vec(),
        }
        .to_bytes()
        .unwrap()
    }

    fn device_with_tape(blocks: &[TapBlock]) -> TapeDevice {
        let mut tape = TapeDevice::new();
        tape.set_provider(Box::new(MemoryTapeProvider::with_content(tap_image(blocks))));
        tape
    }

    fn op(tape: &mut TapeDevice, regs: &mut Registers, mem: &mut Memory48K, tacts: u64, fast: bool) {
        tape.on_cpu_operation_completed(&mut CpuOpContext {
            registers: regs,
            tacts,
            memory: mem,
            fast_tape_mode: fast,
        });
    }

    /// Registers as LD-BYTES sees them at its main loop.
    fn ld_bytes_registers(flag: u8, load: bool, dest: u16, len: u16) -> Registers {
        let mut regs = Registers {
            pc: LOAD_BYTES_ROUTINE,
            ix: dest,
            a_alt: flag,
            f_alt: if load { CF } else { 0 },
            ..Registers::default()
        };
        regs.set_de(len);
        regs
    }

    #[test]
    fn load_routine_enters_load_mode() {
        let mut tape = device_with_tape(&[TapBlock::with_checksum(0xFF, &[1, 2, 3])]);
        let mut mem = Memory48K::new();
        let mut regs = Registers {
            pc: LOAD_BYTES_ROUTINE,
            ..Registers::default()
        };
        op(&mut tape, &mut regs, &mut mem, 100, false);
        assert_eq!(tape.mode(), TapeOperationMode::Load);
        assert!(tape.ear_bit(100));
        assert_eq!(tape.take_events(), [TapeEvent::EnteredLoadMode]);

        regs.pc = ERROR_ROUTINE;
        op(&mut tape, &mut regs, &mut mem, 200, false);
        assert_eq!(tape.mode(), TapeOperationMode::Passive);
        assert_eq!(
            tape.take_events(),
            [TapeEvent::LeftLoadMode, TapeEvent::LoadCompleted]
        );
    }

    #[test]
    fn no_tape_stays_passive() {
        let mut tape = TapeDevice::new();
        let mut mem = Memory48K::new();
        let mut regs = Registers {
            pc: LOAD_BYTES_ROUTINE,
            ..Registers::default()
        };
        op(&mut tape, &mut regs, &mut mem, 0, true);
        assert_eq!(tape.mode(), TapeOperationMode::Passive);
        assert!(tape.take_events().is_empty());
    }

    #[test]
    fn fast_load_copies_block() {
        let payload = [0x11, 0x22, 0x33];
        let mut tape = device_with_tape(&[TapBlock::with_checksum(0xFF, &payload)]);
        let mut mem = Memory48K::new();
        let mut regs = ld_bytes_registers(0xFF, true, 0x8000, 3);

        op(&mut tape, &mut regs, &mut mem, 0, true);
        assert_eq!(mem.read(0x8000), 0x11);
        assert_eq!(mem.read(0x8002), 0x33);
        assert_eq!(regs.pc, LOAD_BYTES_RESUME);
        assert!(regs.carry());
        assert_eq!(regs.ix, 0x8003);
        assert_eq!(regs.de(), 0);
        assert!(tape.player().is_some_and(TapePlayer::is_at_end));

        regs.pc = 0x05E3;
        op(&mut tape, &mut regs, &mut mem, 10, true);
        assert_eq!(tape.mode(), TapeOperationMode::Passive);
        assert_eq!(
            tape.take_events(),
            [
                TapeEvent::EnteredLoadMode,
                TapeEvent::FastLoadCompleted,
                TapeEvent::LeftLoadMode,
                TapeEvent::LoadCompleted
            ]
        );
    }

    #[test]
    fn fast_load_flag_mismatch_takes_error_path() {
        let mut tape = device_with_tape(&[
            TapBlock::with_checksum(0x00, &[0; 17]),
            TapBlock::with_checksum(0xFF, &[1]),
        ]);
        let mut mem = Memory48K::new();
        let mut regs = ld_bytes_registers(0xFF, true, 0x8000, 1);
        regs.l = 0x0F;

        op(&mut tape, &mut regs, &mut mem, 0, true);
        assert_eq!(regs.pc, LOAD_BYTES_INVALID_HEADER);
        assert_eq!(regs.a, 0xFF ^ 0x0F);
        assert!(!regs.carry());
        assert!(!regs.zero());
        assert_eq!(mem.read(0x8000), 0);
        assert_eq!(tape.player().map(TapePlayer::block_index), Some(1));
    }

    #[test]
    fn fast_load_bad_checksum_clears_carry() {
        let mut block = TapBlock::with_checksum(0xFF, &[0x42]).bytes().to_vec();
        block[2] ^= 0x01;
        let mut tape = device_with_tape(&[TapBlock::from_bytes(block)]);
        let mut mem = Memory48K::new();
        let mut regs = ld_bytes_registers(0xFF, true, 0x9000, 1);

        op(&mut tape, &mut regs, &mut mem, 0, true);
        assert_eq!(regs.pc, LOAD_BYTES_RESUME);
        assert!(!regs.carry());
        assert_eq!(mem.read(0x9000), 0x42);
    }

    #[test]
    fn fast_verify_reports_mismatch() {
        let mut tape = device_with_tape(&[TapBlock::with_checksum(0xFF, &[0x42, 0x43])]);
        let mut mem = Memory48K::new();
        mem.write(0x9000, 0x42);
        mem.write(0x9001, 0x40);
        let mut regs = ld_bytes_registers(0xFF, false, 0x9000, 2);

        op(&mut tape, &mut regs, &mut mem, 0, true);
        assert_eq!(regs.pc, LOAD_BYTES_INVALID_HEADER);
        assert_eq!(regs.a, 0x40 ^ 0x43);
        assert!(!regs.carry());
        assert_eq!(mem.read(0x9001), 0x40);
    }

    #[test]
    fn fast_verify_accepts_matching_memory() {
        let mut tape = device_with_tape(&[TapBlock::with_checksum(0xFF, &[0x42, 0x43])]);
        let mut mem = Memory48K::new();
        mem.load(0x9000, &[0x42, 0x43]);
        let mut regs = ld_bytes_registers(0xFF, false, 0x9000, 2);

        op(&mut tape, &mut regs, &mut mem, 0, true);
        assert_eq!(regs.pc, LOAD_BYTES_RESUME);
        assert!(regs.carry());
    }

    #[test]
    fn short_block_takes_error_path() {
        let mut tape = device_with_tape(&[TapBlock::with_checksum(0xFF, &[1])]);
        let mut mem = Memory48K::new();
        let mut regs = ld_bytes_registers(0xFF, true, 0x8000, 5);

        op(&mut tape, &mut regs, &mut mem, 0, true);
        assert_eq!(regs.pc, LOAD_BYTES_INVALID_HEADER);
        assert!(!regs.carry());
    }

    fn save_pulses(tape: &mut TapeDevice, start: u64, block: &[u8]) -> u64 {
        let mut tact = start;
        let mut mic = tape.last_mic;
        for pulse in TapeBlock::standard(block.to_vec(), 0).pulses() {
            tact += u64::from(pulse);
            mic = !mic;
            tape.process_mic_bit(mic, tact);
        }
        tact
    }

    /// Lets a test inspect the provider after handing it to the device.
    struct SharedProvider(Rc<RefCell<MemoryTapeProvider>>);

    impl TapeProvider for SharedProvider {
        fn content(&mut self) -> Result<Option<Box<dyn Read>>, SpectrumError> {
            self.0.borrow_mut().content()
        }

        fn create_tape_file(&mut self) -> Result<(), SpectrumError> {
            self.0.borrow_mut().create_tape_file()
        }

        fn set_name(&mut self, name: &str) {
            self.0.borrow_mut().set_name(name);
        }

        fn save_tape_block(&mut self, block: &[u8]) -> Result<(), SpectrumError> {
            self.0.borrow_mut().save_tape_block(block)
        }

        fn finalize_tape_file(&mut self) -> Result<(), SpectrumError> {
            self.0.borrow_mut().finalize_tape_file()
        }
    }

    #[test]
    fn save_session_names_file_from_header() {
        let provider = Rc::new(RefCell::new(MemoryTapeProvider::new()));
        let mut tape = TapeDevice::new();
        tape.set_provider(Box::new(SharedProvider(Rc::clone(&provider))));
        let mut mem = Memory48K::new();
        let mut regs = Registers {
            pc: SAVE_BYTES_ROUTINE,
            ..Registers::default()
        };
        op(&mut tape, &mut regs, &mut mem, 1000, false);
        assert_eq!(tape.mode(), TapeOperationMode::Save);

        let mut header = vec![0x00, 0x03];
        header.extend_from_slice(b"prog      ");
        header.extend_from_slice(&[0; 6]);
        let header = TapBlock::with_checksum(0x00, &header[1..]);
        assert_eq!(header.bytes().len(), HEADER_BLOCK_LENGTH);
        let data = TapBlock::with_checksum(0xFF, &[9, 8, 7]);

        // The first edge measures the gap since SAVE started.
        tape.process_mic_bit(true, 10_000_000);
        let end = save_pulses(&mut tape, 10_000_000, header.bytes());
        let end = save_pulses(&mut tape, end + 3_500_000, data.bytes());
        assert_eq!(tape.save_phase(), SavePhase::None);

        regs.pc = 0x1234;
        op(&mut tape, &mut regs, &mut mem, end + SAVE_SILENCE_TACTS + 1, false);
        assert_eq!(tape.mode(), TapeOperationMode::Passive);
        assert_eq!(
            tape.take_events(),
            [TapeEvent::EnteredSaveMode, TapeEvent::LeftSaveMode]
        );

        let provider = provider.borrow();
        let files = provider.finalized_files();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].0.as_deref(), Some("prog"));
        assert_eq!(files[0].1, [header.bytes().to_vec(), data.bytes().to_vec()]);
    }

    #[test]
    fn header_name_keeps_high_bytes() {
        let provider = Rc::new(RefCell::new(MemoryTapeProvider::new()));
        let mut tape = TapeDevice::new();
        tape.set_provider(Box::new(SharedProvider(Rc::clone(&provider))));

        let mut payload = vec![0x03];
        payload.extend_from_slice(&[b'A', 0x90, 0xFF, b'b', b' ', b' ', b' ', b' ', b' ', b' ']);
        payload.extend_from_slice(&[0; 6]);
        let header = TapBlock::with_checksum(0x00, &payload);
        tape.save_block(header.bytes());

        assert_eq!(provider.borrow().name(), Some("A\u{90}\u{FF}b"));
    }

    #[test]
    fn mic_edges_ignored_outside_save() {
        let mut tape = TapeDevice::new();
        tape.process_mic_bit(true, 2168);
        assert_eq!(tape.save_phase(), SavePhase::None);
        assert!(!tape.last_mic);
    }

    #[test]
    fn observers_see_events() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut tape = TapeDevice::new();
        tape.subscribe(Box::new(move |event| sink.borrow_mut().push(event)));
        tape.enter_save(0);
        tape.leave_save();
        assert_eq!(
            *seen.borrow(),
            [TapeEvent::EnteredSaveMode, TapeEvent::LeftSaveMode]
        );
    }
}
