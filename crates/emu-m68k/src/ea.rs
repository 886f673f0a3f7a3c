//! Effective address resolution.
//!
//! An addressing mode resolves once into an [`Operand`]; reads and writes
//! then go through the operand, so a read-modify-write destination computes
//! its address (and takes its postincrement/predecrement) exactly once.
//! Register updates from (An)+ and -(An) are deferred through the
//! [`Exec`](crate::cpu::Exec) writeback slots and only commit if the
//! instruction completes.
//!
//! Byte operations on A7 move it by two to keep the stack word-aligned;
//! this is a classic-68k behavior, gated off for ColdFire.

use emu_core::Bus;

use crate::cc::Size;
use crate::cpu::Exec;
use crate::exception::Exception;
use crate::features::Feature;

/// A resolved operand location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    DataReg(usize),
    AddrReg(usize),
    Mem(u32),
    Imm(u32),
}

impl<B: Bus> Exec<'_, B> {
    /// A7 moves by 2 for byte-sized stack operations on classic cores.
    fn step_of(&self, size: Size, reg: usize) -> u32 {
        if size == Size::Byte && reg == 7 && self.core.features.has(Feature::M68000) {
            2
        } else {
            size.bytes()
        }
    }

    /// Index register term of an extension word: Dn or An, optionally
    /// sign-extended from a word, scaled by the 2-bit scale field.
    fn addr_index(&self, ext: u16) -> u32 {
        let rn = usize::from(ext >> 12) & 0xF;
        let mut v = if rn < 8 {
            self.dreg(rn)
        } else {
            self.areg(rn - 8)
        };
        if ext & 0x800 == 0 {
            v = v as u16 as i16 as i32 as u32;
        }
        let scale = (ext >> 9) & 3;
        v << scale
    }

    /// Indexed modes, brief and full extension word formats. `base` is the
    /// base register value, or `None` for the PC-relative flavor (the PC
    /// value is the address of the extension word).
    fn lea_indexed(&mut self, base: Option<u32>) -> Result<u32, Exception> {
        let pc_base = self.pc;
        let mut ext = self.fetch_word()?;

        if ext & 0x800 == 0 && !self.core.features.has(Feature::WordIndex) {
            return Err(Exception::Illegal);
        }
        if self.core.features.has(Feature::M68000)
            && !self.core.features.has(Feature::ScaledIndex)
        {
            // Pre-68020 cores ignore the scale field.
            ext &= !(3 << 9);
        }

        if ext & 0x100 == 0 {
            // Brief format: base + index + d8.
            let index = self.addr_index(ext);
            let d8 = (ext as i8) as i32 as u32;
            let base = base.unwrap_or(pc_base);
            return Ok(base.wrapping_add(index).wrapping_add(d8));
        }

        // Full format.
        if !self.core.features.has(Feature::ExtFull) {
            return Err(Exception::Illegal);
        }
        let bd = match (ext >> 4) & 3 {
            2 => self.fetch_word()? as i16 as i32 as u32,
            3 => self.fetch_long()?,
            _ => 0,
        };
        // Index participates in the inner sum unless suppressed or
        // deferred to post-indexing.
        let pre_index = if ext & 0x44 == 0 {
            Some(self.addr_index(ext))
        } else {
            None
        };
        let mut addr = bd;
        if ext & 0x80 == 0 {
            addr = addr.wrapping_add(base.unwrap_or(pc_base));
        }
        if let Some(idx) = pre_index {
            addr = addr.wrapping_add(idx);
        }
        if ext & 3 != 0 {
            // Memory indirect.
            let fetched = self.load(Size::Long, addr)?;
            addr = fetched;
            if ext & 0x44 == 4 {
                addr = addr.wrapping_add(self.addr_index(ext));
            }
            let od = match ext & 3 {
                2 => self.fetch_word()? as i16 as i32 as u32,
                3 => self.fetch_long()?,
                _ => 0,
            };
            addr = addr.wrapping_add(od);
        }
        Ok(addr)
    }

    /// Compute the address of an address-capable mode (LEA, PEA, JMP, and
    /// the control modes of every memory operand).
    pub fn lea(&mut self, mode: u8, reg: usize) -> Result<u32, Exception> {
        match mode {
            2 => Ok(self.areg(reg)),
            5 => {
                let d16 = self.fetch_word()? as i16 as i32 as u32;
                Ok(self.areg(reg).wrapping_add(d16))
            }
            6 => {
                let base = self.areg(reg);
                self.lea_indexed(Some(base))
            }
            7 => match reg {
                0 => Ok(self.fetch_word()? as i16 as i32 as u32),
                1 => self.fetch_long(),
                2 => {
                    let pc = self.pc;
                    let d16 = self.fetch_word()? as i16 as i32 as u32;
                    Ok(pc.wrapping_add(d16))
                }
                3 => self.lea_indexed(None),
                _ => Err(Exception::Illegal),
            },
            _ => Err(Exception::Illegal),
        }
    }

    /// Resolve any data-capable mode into an operand location, taking the
    /// postincrement/predecrement register updates (deferred).
    pub fn resolve(&mut self, mode: u8, reg: usize, size: Size) -> Result<Operand, Exception> {
        match mode {
            0 => Ok(Operand::DataReg(reg)),
            1 => {
                // Byte operations never address An directly.
                if size == Size::Byte {
                    return Err(Exception::Illegal);
                }
                Ok(Operand::AddrReg(reg))
            }
            3 => {
                let addr = self.areg(reg);
                let step = self.step_of(size, reg);
                self.delay_set_areg(reg, addr.wrapping_add(step));
                Ok(Operand::Mem(addr))
            }
            4 => {
                let step = self.step_of(size, reg);
                let addr = self.areg(reg).wrapping_sub(step);
                self.delay_set_areg(reg, addr);
                Ok(Operand::Mem(addr))
            }
            7 if reg == 4 => {
                let v = match size {
                    Size::Byte => u32::from(self.fetch_word()?) & 0xFF,
                    Size::Word => u32::from(self.fetch_word()?),
                    Size::Long => self.fetch_long()?,
                };
                Ok(Operand::Imm(v))
            }
            _ => Ok(Operand::Mem(self.lea(mode, reg)?)),
        }
    }

    /// Read through a resolved operand, zero-extended to 32 bits.
    pub fn operand_read(&mut self, op: Operand, size: Size) -> Result<u32, Exception> {
        match op {
            Operand::DataReg(r) => Ok(size.ext_unsigned(self.dreg(r))),
            Operand::AddrReg(r) => Ok(size.ext_unsigned(self.areg(r))),
            Operand::Imm(v) => Ok(size.ext_unsigned(v)),
            Operand::Mem(addr) => self.load(size, addr),
        }
    }

    /// Write through a resolved operand. Register destinations merge into
    /// the low bits; address registers take the full sign-extended value.
    pub fn operand_write(&mut self, op: Operand, size: Size, value: u32) -> Result<(), Exception> {
        match op {
            Operand::DataReg(r) => {
                self.set_dreg(size, r, value);
                Ok(())
            }
            Operand::AddrReg(r) => {
                self.set_areg(r, size.ext_signed(value) as u32);
                Ok(())
            }
            Operand::Imm(_) => Err(Exception::Illegal),
            Operand::Mem(addr) => self.store(size, addr, value),
        }
    }
}

/// Split an opcode's low six bits into (mode, register).
#[must_use]
pub fn ea_fields(code: u16) -> (u8, usize) {
    (((code >> 3) & 7) as u8, usize::from(code & 7))
}
