//! Bitwise and move-adjacent operations: AND/OR/EOR/NOT, single-bit ops,
//! register exchange and extension, and the ColdFire bit utilities.

use emu_core::Bus;

use crate::cc::Size;
use crate::cpu::{Exec, Flow};
use crate::ea::{ea_fields, Operand};
use crate::exception::Exception;
use crate::flags::CCR_Z;

fn insn_size(code: u16) -> Result<Size, Exception> {
    Size::from_bits(((code >> 6) & 3) as u8).ok_or(Exception::Illegal)
}

// === and / or / eor / not ===

fn and_or<B: Bus>(x: &mut Exec<'_, B>, code: u16, or: bool) -> Result<Flow, Exception> {
    let size = if x.core.features.is_coldfire() {
        Size::Long
    } else {
        insn_size(code)?
    };
    let reg = usize::from(code >> 9) & 7;
    let (mode, ea_reg) = ea_fields(code);

    if code & 0x100 != 0 {
        // <ea> = <ea> op Dn
        let dst = x.resolve(mode, ea_reg, size)?;
        let dest = x.operand_read(dst, size)?;
        let src = size.ext_unsigned(x.dreg(reg));
        let res = if or { dest | src } else { dest & src };
        x.operand_write(dst, size, res)?;
        x.core.cc.set_logic(size, res);
    } else {
        let src_op = x.resolve(mode, ea_reg, size)?;
        let src = x.operand_read(src_op, size)?;
        let res = if or {
            size.ext_unsigned(x.dreg(reg)) | src
        } else {
            size.ext_unsigned(x.dreg(reg)) & src
        };
        x.set_dreg(size, reg, res);
        x.core.cc.set_logic(size, res);
    }
    Ok(Flow::Next)
}

pub(crate) fn or<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    and_or(x, code, true)
}

pub(crate) fn and<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    and_or(x, code, false)
}

/// EOR only runs register-to-memory.
pub(crate) fn eor<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let size = if x.core.features.is_coldfire() {
        Size::Long
    } else {
        insn_size(code)?
    };
    let reg = usize::from(code >> 9) & 7;
    let (mode, ea_reg) = ea_fields(code);
    let dst = x.resolve(mode, ea_reg, size)?;
    let dest = x.operand_read(dst, size)?;
    let res = dest ^ size.ext_unsigned(x.dreg(reg));
    x.operand_write(dst, size, res)?;
    x.core.cc.set_logic(size, res);
    Ok(Flow::Next)
}

pub(crate) fn not<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let size = if x.core.features.is_coldfire() {
        Size::Long
    } else {
        insn_size(code)?
    };
    let (mode, reg) = ea_fields(code);
    let dst = x.resolve(mode, reg, size)?;
    let src = x.operand_read(dst, size)?;
    let res = size.ext_unsigned(!src);
    x.operand_write(dst, size, res)?;
    x.core.cc.set_logic(size, res);
    Ok(Flow::Next)
}

// === single-bit operations ===

/// BTST/BCHG/BCLR/BSET once the bit number is known. Registers are tested
/// at long width (bit mod 32), memory at byte width (bit mod 8). Only Z
/// changes; it reflects the bit before any modification.
fn bitop<B: Bus>(x: &mut Exec<'_, B>, code: u16, bitnum: u32) -> Result<Flow, Exception> {
    let op = (code >> 6) & 3;
    let (mode, reg) = ea_fields(code);
    let (operand, size, bit) = if mode == 0 {
        (Operand::DataReg(reg), Size::Long, bitnum & 31)
    } else {
        (x.resolve(mode, reg, Size::Byte)?, Size::Byte, bitnum & 7)
    };
    // BTST reads through any data mode; the modifying forms need a
    // writable destination.
    if op != 0 && matches!(operand, Operand::Imm(_)) {
        return Err(Exception::Illegal);
    }
    let val = x.operand_read(operand, size)?;
    let mask = 1u32 << bit;

    let mut ccr = x.core.cc.flush();
    if val & mask == 0 {
        ccr |= CCR_Z;
    } else {
        ccr &= !CCR_Z;
    }
    x.core.cc.set_ccr(ccr);

    match op {
        0 => {}
        1 => x.operand_write(operand, size, val ^ mask)?,
        2 => x.operand_write(operand, size, val & !mask)?,
        _ => x.operand_write(operand, size, val | mask)?,
    }
    Ok(Flow::Next)
}

/// Bit number in a data register.
pub(crate) fn bitop_reg<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let bitnum = x.dreg(usize::from(code >> 9) & 7);
    bitop(x, code, bitnum)
}

/// Bit number in an extension word.
pub(crate) fn bitop_im<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let bitnum = u32::from(x.fetch_word()?);
    bitop(x, code, bitnum)
}

/// TAS: test the byte, then set its high bit in one locked access.
pub(crate) fn tas<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let (mode, reg) = ea_fields(code);
    let dst = x.resolve(mode, reg, Size::Byte)?;
    let val = x.operand_read(dst, Size::Byte)?;
    x.core.cc.set_logic(Size::Byte, val);
    x.operand_write(dst, Size::Byte, val | 0x80)?;
    Ok(Flow::Next)
}

// === moves and extensions ===

pub(crate) fn moveq<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let reg = usize::from(code >> 9) & 7;
    let val = (code as i8) as i32 as u32;
    x.set_dreg_full(reg, val);
    x.core.cc.set_logic(Size::Long, val);
    Ok(Flow::Next)
}

/// MOV3Q: 3-bit immediate (0 encodes -1) to a long destination.
pub(crate) fn mov3q<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let mut val = u32::from(code >> 9) & 7;
    if val == 0 {
        val = u32::MAX;
    }
    let (mode, reg) = ea_fields(code);
    let dst = x.resolve(mode, reg, Size::Long)?;
    x.operand_write(dst, Size::Long, val)?;
    x.core.cc.set_logic(Size::Long, val);
    Ok(Flow::Next)
}

/// MVS/MVZ: byte or word source extended to a full register.
pub(crate) fn mvzs<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let size = if code & 0x40 != 0 { Size::Word } else { Size::Byte };
    let zero_extend = code & 0x80 != 0;
    let reg = usize::from(code >> 9) & 7;
    let (mode, ea_reg) = ea_fields(code);
    let src_op = x.resolve(mode, ea_reg, size)?;
    let raw = x.operand_read(src_op, size)?;
    let val = if zero_extend {
        size.ext_unsigned(raw)
    } else {
        size.ext_signed(raw) as u32
    };
    x.set_dreg_full(reg, val);
    x.core.cc.set_logic(size, raw);
    Ok(Flow::Next)
}

/// EXT.W, EXT.L and EXTB.L, selected by the opmode field.
pub(crate) fn ext<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let reg = usize::from(code) & 7;
    let val = x.dreg(reg);
    match (code >> 6) & 7 {
        2 => {
            let res = val as u8 as i8 as i16 as u16;
            x.set_dreg(Size::Word, reg, u32::from(res));
            x.core.cc.set_logic(Size::Word, u32::from(res));
        }
        3 => {
            let res = val as u16 as i16 as i32 as u32;
            x.set_dreg_full(reg, res);
            x.core.cc.set_logic(Size::Long, res);
        }
        7 => {
            let res = val as u8 as i8 as i32 as u32;
            x.set_dreg_full(reg, res);
            x.core.cc.set_logic(Size::Long, res);
        }
        _ => return Err(Exception::Illegal),
    }
    Ok(Flow::Next)
}

pub(crate) fn swap<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let reg = usize::from(code) & 7;
    let val = x.dreg(reg).rotate_left(16);
    x.set_dreg_full(reg, val);
    x.core.cc.set_logic(Size::Long, val);
    Ok(Flow::Next)
}

// === register exchange ===

pub(crate) fn exg_dd<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let rx = usize::from(code >> 9) & 7;
    let ry = usize::from(code) & 7;
    let t = x.dreg(rx);
    x.set_dreg_full(rx, x.dreg(ry));
    x.set_dreg_full(ry, t);
    Ok(Flow::Next)
}

pub(crate) fn exg_aa<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let rx = usize::from(code >> 9) & 7;
    let ry = usize::from(code) & 7;
    let t = x.areg(rx);
    x.set_areg(rx, x.areg(ry));
    x.set_areg(ry, t);
    Ok(Flow::Next)
}

pub(crate) fn exg_da<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let rx = usize::from(code >> 9) & 7;
    let ry = usize::from(code) & 7;
    let t = x.dreg(rx);
    x.set_dreg_full(rx, x.areg(ry));
    x.set_areg(ry, t);
    Ok(Flow::Next)
}

// === ColdFire bit utilities ===

/// BITREV: mirror all 32 bits. Flags untouched.
pub(crate) fn bitrev<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let reg = usize::from(code) & 7;
    x.set_dreg_full(reg, x.dreg(reg).reverse_bits());
    Ok(Flow::Next)
}

/// BYTEREV: endian swap. Flags untouched.
pub(crate) fn byterev<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let reg = usize::from(code) & 7;
    x.set_dreg_full(reg, x.dreg(reg).swap_bytes());
    Ok(Flow::Next)
}

/// FF1: offset of the most significant set bit, 32 when none. Flags come
/// from the value before the scan.
pub(crate) fn ff1<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let reg = usize::from(code) & 7;
    let val = x.dreg(reg);
    x.core.cc.set_logic(Size::Long, val);
    x.set_dreg_full(reg, val.leading_zeros());
    Ok(Flow::Next)
}

/// SATS: after an overflowing long operation, clamp to the nearest
/// representable extreme. The saturated result has the opposite sign to
/// the wrapped one.
pub(crate) fn sats<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let reg = usize::from(code) & 7;
    let ccr = x.core.cc.flush();
    let mut val = x.dreg(reg);
    if ccr & crate::flags::CCR_V != 0 {
        val = ((val as i32 >> 31) as u32) ^ 0x8000_0000;
        x.set_dreg_full(reg, val);
    }
    x.core.cc.set_logic(Size::Long, val);
    Ok(Flow::Next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ff1_counts_from_the_top() {
        assert_eq!(0u32.leading_zeros(), 32);
        assert_eq!(0x8000_0000u32.leading_zeros(), 0);
        assert_eq!(1u32.leading_zeros(), 31);
    }

    #[test]
    fn sats_clamp_has_the_opposite_sign() {
        // A positive add that wrapped negative clamps to i32::MAX.
        let wrapped = 0x8000_0001u32;
        let clamped = ((wrapped as i32 >> 31) as u32) ^ 0x8000_0000;
        assert_eq!(clamped, 0x7FFF_FFFF);
        // A negative add that wrapped positive clamps to i32::MIN.
        let wrapped = 0x7FFF_FFFEu32;
        let clamped = ((wrapped as i32 >> 31) as u32) ^ 0x8000_0000;
        assert_eq!(clamped, 0x8000_0000);
    }
}
