//! Data movement, stack management, privileged system control, and the
//! exception-return instructions.

use emu_core::Bus;

use crate::cc::Size;
use crate::cpu::{Exec, Flow};
use crate::ea::ea_fields;
use crate::exception::Exception;
use crate::features::Feature;
use crate::mmu::access;
use crate::registers::SpBank;

/// Unassigned opcode: the top nibble decides which emulator vector fires.
pub(crate) fn undef<B: Bus>(_x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    match code >> 12 {
        0xA => Err(Exception::LineA),
        0xF => Err(Exception::LineF),
        _ => Err(Exception::Illegal),
    }
}

// === moves ===

/// MOVE and MOVEA. The destination's extension words follow the source's,
/// so the source resolves (and reads) first.
pub(crate) fn move_insn<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let size = Size::from_move_bits(((code >> 12) & 3) as u8).ok_or(Exception::Illegal)?;
    let (src_mode, src_reg) = ea_fields(code);
    let src_op = x.resolve(src_mode, src_reg, size)?;
    let val = x.operand_read(src_op, size)?;

    let dst_mode = ((code >> 6) & 7) as u8;
    let dst_reg = usize::from(code >> 9) & 7;
    let dst = x.resolve(dst_mode, dst_reg, size)?;
    x.operand_write(dst, size, val)?;
    if dst_mode != 1 {
        // MOVEA leaves the flags alone.
        x.core.cc.set_logic(size, val);
    }
    Ok(Flow::Next)
}

/// MOVEM. Word-sized loads sign-extend into the full register; the
/// predecrement form walks the reversed mask and stores the base
/// register's pre-transfer value.
pub(crate) fn movem<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let to_regs = code & 0x400 != 0;
    let size = if code & 0x40 != 0 { Size::Long } else { Size::Word };
    let step = size.bytes();
    let mask = x.fetch_word()?;
    let (mode, reg) = ea_fields(code);

    let read_reg = |x: &Exec<'_, B>, i: usize| {
        if i < 8 {
            x.dreg(i)
        } else {
            x.areg(i - 8)
        }
    };

    match mode {
        3 if to_regs => {
            let mut addr = x.areg(reg);
            for i in 0..16 {
                if mask & (1 << i) == 0 {
                    continue;
                }
                let val = size.ext_signed(x.load(size, addr)?) as u32;
                if i < 8 {
                    x.set_dreg_full(i, val);
                } else {
                    x.set_areg(i - 8, val);
                }
                addr = addr.wrapping_add(step);
            }
            // The final address wins even if the base was in the list.
            x.set_areg(reg, addr);
        }
        4 if !to_regs => {
            let initial = x.areg(reg);
            let mut addr = initial;
            for i in 0..16 {
                if mask & (1 << i) == 0 {
                    continue;
                }
                // Reversed mask: bit 0 is A7, bit 15 is D0.
                let rn = 15 - i;
                addr = addr.wrapping_sub(step);
                let val = if rn == reg + 8 {
                    initial
                } else {
                    read_reg(x, rn)
                };
                x.store(size, addr, val)?;
            }
            x.set_areg(reg, addr);
        }
        _ => {
            let mut addr = x.lea(mode, reg)?;
            for i in 0..16 {
                if mask & (1 << i) == 0 {
                    continue;
                }
                if to_regs {
                    let val = size.ext_signed(x.load(size, addr)?) as u32;
                    if i < 8 {
                        x.set_dreg_full(i, val);
                    } else {
                        x.set_areg(i - 8, val);
                    }
                } else {
                    x.store(size, addr, read_reg(x, i))?;
                }
                addr = addr.wrapping_add(step);
            }
        }
    }
    Ok(Flow::Next)
}

pub(crate) fn lea<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let reg = usize::from(code >> 9) & 7;
    let (mode, ea_reg) = ea_fields(code);
    let addr = x.lea(mode, ea_reg)?;
    x.set_areg(reg, addr);
    Ok(Flow::Next)
}

pub(crate) fn pea<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let (mode, reg) = ea_fields(code);
    let addr = x.lea(mode, reg)?;
    x.push_long(addr)?;
    Ok(Flow::Next)
}

// === link / unlk ===

fn do_link<B: Bus>(x: &mut Exec<'_, B>, reg: usize, disp: u32) -> Result<Flow, Exception> {
    let sp = x.areg(7).wrapping_sub(4);
    // LINK A7 pushes the decremented value.
    let pushed = if reg == 7 { sp } else { x.areg(reg) };
    x.store(Size::Long, sp, pushed)?;
    x.set_areg(reg, sp);
    x.set_areg(7, sp.wrapping_add(disp));
    Ok(Flow::Next)
}

pub(crate) fn link<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let reg = usize::from(code) & 7;
    let disp = i32::from(x.fetch_word()? as i16) as u32;
    do_link(x, reg, disp)
}

pub(crate) fn linkl<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let reg = usize::from(code) & 7;
    let disp = x.fetch_long()?;
    do_link(x, reg, disp)
}

pub(crate) fn unlk<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let reg = usize::from(code) & 7;
    let src = x.areg(reg);
    let val = x.load(Size::Long, src)?;
    x.set_areg(7, src.wrapping_add(4));
    // UNLK A7 ends with the loaded value.
    x.set_areg(reg, val);
    Ok(Flow::Next)
}

// === status register access ===

pub(crate) fn move_from_sr<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    // Privileged from the 68010 on; the 68000 let user code read SR.
    if x.core.features.has(Feature::ExcFormat) {
        x.require_supervisor()?;
    }
    let (mode, reg) = ea_fields(code);
    let dst = x.resolve(mode, reg, Size::Word)?;
    let sr = x.core.sr();
    x.operand_write(dst, Size::Word, u32::from(sr))?;
    Ok(Flow::Next)
}

pub(crate) fn move_to_sr<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    x.require_supervisor()?;
    let (mode, reg) = ea_fields(code);
    let src_op = x.resolve(mode, reg, Size::Word)?;
    let val = x.operand_read(src_op, Size::Word)?;
    x.core.set_sr(val as u16);
    Ok(Flow::Next)
}

pub(crate) fn move_from_ccr<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let (mode, reg) = ea_fields(code);
    let dst = x.resolve(mode, reg, Size::Word)?;
    let ccr = x.core.cc.get_ccr();
    x.operand_write(dst, Size::Word, u32::from(ccr))?;
    Ok(Flow::Next)
}

pub(crate) fn move_to_ccr<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let (mode, reg) = ea_fields(code);
    let src_op = x.resolve(mode, reg, Size::Word)?;
    let val = x.operand_read(src_op, Size::Word)?;
    x.core.cc.set_ccr(val as u8);
    Ok(Flow::Next)
}

pub(crate) fn move_to_usp<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    x.require_supervisor()?;
    let reg = usize::from(code) & 7;
    let val = x.areg(reg);
    x.core.set_sp_of(SpBank::User, val);
    Ok(Flow::Next)
}

pub(crate) fn move_from_usp<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    x.require_supervisor()?;
    let reg = usize::from(code) & 7;
    let val = x.core.sp_of(SpBank::User);
    x.set_areg(reg, val);
    Ok(Flow::Next)
}

/// MOVEC. Writes can repaint cache or MMU control, so they drop the
/// decode cache.
pub(crate) fn movec<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    x.require_supervisor()?;
    let ext = x.fetch_word()?;
    let rn = usize::from(ext >> 12) & 0xF;
    let creg = ext & 0xFFF;
    if code & 1 == 0 {
        // Control register to Rn.
        let val = x.core.movec_read(creg)?;
        if rn < 8 {
            x.set_dreg_full(rn, val);
        } else {
            x.set_areg(rn - 8, val);
        }
        Ok(Flow::Next)
    } else {
        let val = if rn < 8 { x.dreg(rn) } else { x.areg(rn - 8) };
        x.core.movec_write(creg, val)?;
        Ok(Flow::NextFlush)
    }
}

/// STRLDSR: push SR, then load it from an immediate, atomically from the
/// program's point of view.
pub(crate) fn strldsr<B: Bus>(x: &mut Exec<'_, B>, _code: u16) -> Result<Flow, Exception> {
    let ext = x.fetch_word()?;
    if ext != 0x46FC {
        return Err(Exception::Illegal);
    }
    let imm = x.fetch_word()?;
    x.require_supervisor()?;
    let sr = x.core.sr();
    x.push_word(sr)?;
    x.core.set_sr(imm);
    Ok(Flow::Next)
}

// === stop / reset / halt ===

pub(crate) fn stop<B: Bus>(x: &mut Exec<'_, B>, _code: u16) -> Result<Flow, Exception> {
    x.require_supervisor()?;
    let sr = x.fetch_word()?;
    x.core.set_sr(sr);
    x.core.stopped = true;
    Ok(Flow::Next)
}

/// RESET asserts the external reset line; with no device model behind it
/// the instruction is a privileged no-op.
pub(crate) fn reset<B: Bus>(x: &mut Exec<'_, B>, _code: u16) -> Result<Flow, Exception> {
    x.require_supervisor()?;
    Ok(Flow::Next)
}

pub(crate) fn halt<B: Bus>(x: &mut Exec<'_, B>, _code: u16) -> Result<Flow, Exception> {
    x.require_supervisor()?;
    x.core.stopped = true;
    Ok(Flow::Next)
}

pub(crate) fn pulse<B: Bus>(_x: &mut Exec<'_, B>, _code: u16) -> Result<Flow, Exception> {
    Ok(Flow::Next)
}

// === exception returns ===

/// RTE. 68000 frames are bare SR/PC; format-word cores walk the frame by
/// its format nibble, unwinding throwaway interrupt frames in place.
pub(crate) fn rte<B: Bus>(x: &mut Exec<'_, B>, _code: u16) -> Result<Flow, Exception> {
    x.require_supervisor()?;

    if x.core.features.is_coldfire() {
        let sp = x.core.a[7];
        let fmt = x.load(Size::Long, sp)?;
        let pc = x.load(Size::Long, sp.wrapping_add(4))?;
        // Restore the pre-exception misalignment stashed in the frame.
        let sp = (sp | (fmt >> 28) & 3).wrapping_add(8);
        x.core.a[7] = sp;
        x.core.set_sr(fmt as u16);
        x.core.pc = pc;
        return Ok(Flow::Jump);
    }

    if !x.core.features.has(Feature::ExcFormat) {
        let sr = x.load(Size::Word, x.core.a[7])? as u16;
        let pc = x.load(Size::Long, x.core.a[7].wrapping_add(2))?;
        x.core.a[7] = x.core.a[7].wrapping_add(6);
        x.core.set_sr(sr);
        x.core.pc = pc;
        return Ok(Flow::Jump);
    }

    loop {
        let sp = x.core.a[7];
        let sr = x.load(Size::Word, sp)? as u16;
        let pc = x.load(Size::Long, sp.wrapping_add(2))?;
        let fmt = x.load(Size::Word, sp.wrapping_add(6))?;
        let mut sp = sp.wrapping_add(8);
        match fmt >> 12 {
            0 => {}
            1 => {
                // Throwaway frame: drop it, reload from the stack the
                // restored SR selects.
                x.core.a[7] = sp;
                x.core.set_sr(sr);
                continue;
            }
            2 | 3 => sp = sp.wrapping_add(4),
            4 => sp = sp.wrapping_add(8),
            7 => sp = sp.wrapping_add(52),
            _ => return Err(Exception::FormatError),
        }
        x.core.a[7] = sp;
        x.core.set_sr(sr);
        x.core.pc = pc;
        return Ok(Flow::Jump);
    }
}

pub(crate) fn rtd<B: Bus>(x: &mut Exec<'_, B>, _code: u16) -> Result<Flow, Exception> {
    let disp = i32::from(x.fetch_word()? as i16) as u32;
    let pc = x.pop_long()?;
    let sp = x.areg(7).wrapping_add(disp);
    x.set_areg(7, sp);
    x.core.pc = pc;
    Ok(Flow::Jump)
}

pub(crate) fn rts<B: Bus>(x: &mut Exec<'_, B>, _code: u16) -> Result<Flow, Exception> {
    let pc = x.pop_long()?;
    x.core.pc = pc;
    Ok(Flow::Jump)
}

pub(crate) fn rtr<B: Bus>(x: &mut Exec<'_, B>, _code: u16) -> Result<Flow, Exception> {
    let ccr = x.pop_word()?;
    let pc = x.pop_long()?;
    x.core.cc.set_ccr(ccr as u8);
    x.core.pc = pc;
    Ok(Flow::Jump)
}

// === traps ===

pub(crate) fn trap<B: Bus>(_x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    Err(Exception::Trap((code & 0xF) as u8))
}

/// BKPT: no debug module is attached, so it takes the illegal vector like
/// silicon with no breakpoint acknowledge.
pub(crate) fn bkpt<B: Bus>(_x: &mut Exec<'_, B>, _code: u16) -> Result<Flow, Exception> {
    Err(Exception::Illegal)
}

// === cache control ===

pub(crate) fn intouch<B: Bus>(x: &mut Exec<'_, B>, _code: u16) -> Result<Flow, Exception> {
    x.require_supervisor()?;
    Ok(Flow::Next)
}

/// CINV: no cache contents are modeled, but invalidation still drops the
/// decoded-block cache.
pub(crate) fn cinv<B: Bus>(x: &mut Exec<'_, B>, _code: u16) -> Result<Flow, Exception> {
    x.require_supervisor()?;
    Ok(Flow::NextFlush)
}

pub(crate) fn cpush<B: Bus>(x: &mut Exec<'_, B>, _code: u16) -> Result<Flow, Exception> {
    x.require_supervisor()?;
    Ok(Flow::NextFlush)
}

pub(crate) fn cpushl<B: Bus>(x: &mut Exec<'_, B>, _code: u16) -> Result<Flow, Exception> {
    x.require_supervisor()?;
    Ok(Flow::NextFlush)
}

// === MMU control ===

/// PFLUSH: opmode selects one page or the whole ATC, globals included or
/// not.
pub(crate) fn pflush<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    x.require_supervisor()?;
    let opmode = (code >> 3) & 3;
    let reg = usize::from(code) & 7;
    let supervisor = x.core.is_supervisor();
    match opmode {
        0 => {
            let addr = x.areg(reg);
            x.core.mmu.flush_page(addr, supervisor, true);
        }
        1 => {
            let addr = x.areg(reg);
            x.core.mmu.flush_page(addr, supervisor, false);
        }
        2 => x.core.mmu.flush_atc_nonglobal(),
        _ => x.core.mmu.flush_atc(),
    }
    Ok(Flow::NextFlush)
}

/// PTEST: run the table walk without side effects, reporting into MMUSR.
pub(crate) fn ptest<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    x.require_supervisor()?;
    let reg = usize::from(code) & 7;
    let addr = x.areg(reg);
    let mut acc = access::PTEST | access::SUPER;
    if code & 0x20 == 0 {
        acc |= access::STORE;
    }
    let (mmu, bus) = (&mut x.core.mmu, &mut *x.bus);
    mmu.ptest(bus, addr, acc);
    Ok(Flow::Next)
}

// === ColdFire debug ===

/// WDDATA: emit a value on the debug port. Privileged; nothing captures
/// the value here, so the access happens and the data is dropped.
pub(crate) fn wddata<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    x.require_supervisor()?;
    let size = Size::from_bits(((code >> 6) & 3) as u8).ok_or(Exception::Illegal)?;
    let (mode, reg) = ea_fields(code);
    let src_op = x.resolve(mode, reg, size)?;
    let _ = x.operand_read(src_op, size)?;
    Ok(Flow::Next)
}

/// WDEBUG: privileged, consumes its extension word; the debug module it
/// would configure is not modeled.
pub(crate) fn wdebug<B: Bus>(x: &mut Exec<'_, B>, _code: u16) -> Result<Flow, Exception> {
    x.require_supervisor()?;
    x.fetch_word()?;
    Ok(Flow::Next)
}
