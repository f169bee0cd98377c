//! Scripted processor for tests.
//!
//! `TestCpu` retires a handful of Z80 instructions with their documented
//! base timings, enough to drive the engine through frames, interrupts,
//! port writes and ROM traps. Anything else is reported as an invalid
//! opcode.

use emu_core::{Bus, CpuError, Registers, StateFlags, Z80Cpu};

#[derive(Debug, Default)]
pub struct TestCpu {
    regs: Registers,
    tacts: u64,
    flags: StateFlags,
    /// EI was the last instruction.
    after_ei: bool,
    blocked: bool,
}

impl TestCpu {
    #[must_use]
    pub fn new() -> Self {
        let mut cpu = Self::default();
        cpu.reset();
        cpu
    }

    /// Force `is_interrupt_blocked` to report true.
    pub fn set_interrupt_blocked(&mut self, blocked: bool) {
        self.blocked = blocked;
    }

    fn fetch(&mut self, bus: &mut dyn Bus) -> u8 {
        let result = bus.read(self.regs.pc, self.tacts);
        self.tacts += u64::from(result.wait);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        result.data
    }

    fn fetch_word(&mut self, bus: &mut dyn Bus) -> u16 {
        let lo = self.fetch(bus);
        let hi = self.fetch(bus);
        u16::from_le_bytes([lo, hi])
    }

    fn push(&mut self, bus: &mut dyn Bus, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        self.tacts += u64::from(bus.write(self.regs.sp, hi, self.tacts));
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        self.tacts += u64::from(bus.write(self.regs.sp, lo, self.tacts));
    }

    fn pop(&mut self, bus: &mut dyn Bus) -> u16 {
        let lo = bus.read(self.regs.sp, self.tacts);
        self.regs.sp = self.regs.sp.wrapping_add(1);
        let hi = bus.read(self.regs.sp, self.tacts);
        self.regs.sp = self.regs.sp.wrapping_add(1);
        self.tacts += u64::from(lo.wait) + u64::from(hi.wait);
        u16::from_le_bytes([lo.data, hi.data])
    }

    fn bump_refresh(&mut self) {
        let r = self.regs.r;
        self.regs.r = r & 0x80 | r.wrapping_add(1) & 0x7F;
    }

    /// IM 1 acknowledge: push PC, jump to $0038.
    fn accept_interrupt(&mut self, bus: &mut dyn Bus) {
        self.flags.remove(StateFlags::HALTED);
        self.regs.iff1 = false;
        self.regs.iff2 = false;
        self.bump_refresh();
        let pc = self.regs.pc;
        self.push(bus, pc);
        self.regs.pc = 0x0038;
        self.tacts += 13;
    }
}

impl Z80Cpu for TestCpu {
    fn tacts(&self) -> u64 {
        self.tacts
    }

    fn registers(&self) -> &Registers {
        &self.regs
    }

    fn registers_mut(&mut self) -> &mut Registers {
        &mut self.regs
    }

    fn state_flags(&self) -> StateFlags {
        self.flags
    }

    fn set_state_flags(&mut self, flags: StateFlags) {
        self.flags = flags;
    }

    fn is_in_op_execution(&self) -> bool {
        false
    }

    fn is_interrupt_blocked(&self) -> bool {
        self.blocked || self.after_ei
    }

    fn execute_cpu_cycle(&mut self, bus: &mut dyn Bus) -> Result<(), CpuError> {
        if self.flags.contains(StateFlags::INT) && self.regs.iff1 && !self.is_interrupt_blocked() {
            self.accept_interrupt(bus);
            return Ok(());
        }
        self.after_ei = false;

        if self.flags.contains(StateFlags::HALTED) {
            self.bump_refresh();
            self.tacts += 4;
            return Ok(());
        }

        let pc = self.regs.pc;
        let opcode = self.fetch(bus);
        self.bump_refresh();
        let base = match opcode {
            0x00 => 4,
            0x08 => {
                self.regs.exchange_af();
                4
            }
            0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x3E => {
                let n = self.fetch(bus);
                match opcode {
                    0x06 => self.regs.b = n,
                    0x0E => self.regs.c = n,
                    0x16 => self.regs.d = n,
                    0x1E => self.regs.e = n,
                    0x26 => self.regs.h = n,
                    0x2E => self.regs.l = n,
                    _ => self.regs.a = n,
                }
                7
            }
            0x76 => {
                self.flags.insert(StateFlags::HALTED);
                4
            }
            0xC3 => {
                self.regs.pc = self.fetch_word(bus);
                10
            }
            0xC9 => {
                self.regs.pc = self.pop(bus);
                10
            }
            0xCD => {
                let target = self.fetch_word(bus);
                let ret = self.regs.pc;
                self.push(bus, ret);
                self.regs.pc = target;
                17
            }
            0xD3 => {
                let n = self.fetch(bus);
                let port = u16::from_be_bytes([self.regs.a, n]);
                self.tacts += u64::from(bus.io_write(port, self.regs.a, self.tacts));
                11
            }
            0xDB => {
                let n = self.fetch(bus);
                let port = u16::from_be_bytes([self.regs.a, n]);
                let result = bus.io_read(port, self.tacts);
                self.tacts += u64::from(result.wait);
                self.regs.a = result.data;
                11
            }
            0xF3 => {
                self.regs.iff1 = false;
                self.regs.iff2 = false;
                4
            }
            0xFB => {
                self.regs.iff1 = true;
                self.regs.iff2 = true;
                self.after_ei = true;
                4
            }
            _ => {
                self.regs.pc = pc;
                return Err(CpuError::InvalidOpcode { pc, opcode });
            }
        };
        self.tacts += base;
        Ok(())
    }

    fn call_instruction_length(&self, bus: &dyn Bus) -> u16 {
        if bus.read_uncontended(self.regs.pc) == 0xCD {
            3
        } else {
            0
        }
    }

    fn reset(&mut self) {
        self.regs = Registers {
            a: 0xFF,
            f: 0xFF,
            sp: 0xFFFF,
            ..Registers::default()
        };
        self.tacts = 0;
        self.flags = StateFlags::NONE;
        self.after_ei = false;
    }
}
