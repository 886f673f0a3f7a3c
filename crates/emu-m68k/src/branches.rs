//! Control transfer: Bcc/BSR, JMP/JSR, DBcc, Scc and the conditional traps.

use emu_core::Bus;

use crate::cc::Size;
use crate::cpu::{Exec, Flow};
use crate::ea::ea_fields;
use crate::exception::Exception;
use crate::features::Feature;
use crate::flags::CCR_V;

/// Bcc, BRA and BSR. An 8-bit displacement of 0 selects a word
/// displacement; 0xFF selects a long one on cores that have it (BRA from
/// ISA B, all conditions on the 68020+).
pub(crate) fn branch<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let cond = ((code >> 8) & 0xF) as u8;
    let base = x.insn_pc.wrapping_add(2);
    let disp8 = code as i8;
    let disp = match disp8 {
        0 => i32::from(x.fetch_word()? as i16) as u32,
        -1 => {
            let long_ok = if cond == 0 {
                x.core.features.has(Feature::Bral) || x.core.features.has(Feature::Bccl)
            } else {
                x.core.features.has(Feature::Bccl)
            };
            if !long_ok {
                return Err(Exception::Illegal);
            }
            x.fetch_long()?
        }
        d => d as i32 as u32,
    };
    let target = base.wrapping_add(disp);

    match cond {
        0 => {}
        1 => {
            let ret = x.pc;
            x.push_long(ret)?;
        }
        c => {
            if !x.core.cc.test(c) {
                return Ok(Flow::Next);
            }
        }
    }
    x.core.pc = target;
    Ok(Flow::Jump)
}

/// JMP and JSR through any control-capable mode.
pub(crate) fn jump<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let (mode, reg) = ea_fields(code);
    let target = x.lea(mode, reg)?;
    if code & 0x40 == 0 {
        // JSR pushes the address after the last extension word.
        let ret = x.pc;
        x.push_long(ret)?;
    }
    x.core.pc = target;
    Ok(Flow::Jump)
}

/// DBcc: decrement and branch while the condition stays false. ColdFire
/// only has DBRA (the always-false condition).
pub(crate) fn dbcc<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let cond = ((code >> 8) & 0xF) as u8;
    let reg = usize::from(code) & 7;
    let base = x.pc;
    let disp = i32::from(x.fetch_word()? as i16) as u32;
    if x.core.cc.test(cond) {
        return Ok(Flow::Next);
    }
    let count = (x.dreg(reg) as u16).wrapping_sub(1);
    x.set_dreg(Size::Word, reg, u32::from(count));
    if count == 0xFFFF {
        return Ok(Flow::Next);
    }
    x.core.pc = base.wrapping_add(disp);
    Ok(Flow::Jump)
}

/// Scc: all ones when the condition holds, zero otherwise. Flags untouched.
pub(crate) fn scc<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let cond = ((code >> 8) & 0xF) as u8;
    let (mode, reg) = ea_fields(code);
    let dst = x.resolve(mode, reg, Size::Byte)?;
    let val = if x.core.cc.test(cond) { 0xFF } else { 0 };
    x.operand_write(dst, Size::Byte, val)?;
    Ok(Flow::Next)
}

/// TPF: ColdFire trapf, a no-op that swallows 0, 1 or 2 extension words.
pub(crate) fn tpf<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    match code & 7 {
        2 => {
            x.fetch_word()?;
        }
        3 => {
            x.fetch_long()?;
        }
        _ => {}
    }
    Ok(Flow::Next)
}

/// TRAPcc, with an optional word or long immediate the trap ignores.
pub(crate) fn trapcc<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    match code & 7 {
        2 => {
            x.fetch_word()?;
        }
        3 => {
            x.fetch_long()?;
        }
        _ => {}
    }
    let cond = ((code >> 8) & 0xF) as u8;
    if x.core.cc.test(cond) {
        return Err(Exception::TrapCc);
    }
    Ok(Flow::Next)
}

/// TRAPV: trap on the overflow flag.
pub(crate) fn trapv<B: Bus>(x: &mut Exec<'_, B>, _code: u16) -> Result<Flow, Exception> {
    if x.core.cc.flush() & CCR_V != 0 {
        return Err(Exception::TrapCc);
    }
    Ok(Flow::Next)
}
