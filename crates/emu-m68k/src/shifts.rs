//! Shift and rotate group.
//!
//! The immediate forms encode counts 1-8 (0 means 8); the register forms
//! take the count modulo 64, so a shift can exceed the operand width and
//! the flag rules for that case are modeled exactly. Rotate-through-X works
//! on the width+1 bit value X:operand.

use emu_core::Bus;

use crate::cc::{CcState, Size};
use crate::cpu::{Exec, Flow};
use crate::ea::ea_fields;
use crate::exception::Exception;
use crate::flags::{CCR_C, CCR_N, CCR_V, CCR_X, CCR_Z};

fn pack_nz(size: Size, res: u32) -> u8 {
    let mut ccr = 0;
    if size.ext_signed(res) < 0 {
        ccr |= CCR_N;
    }
    if size.ext_unsigned(res) == 0 {
        ccr |= CCR_Z;
    }
    ccr
}

/// One shift with full flag semantics. `logical` selects LS over AS.
fn do_shift(cc: &mut CcState, size: Size, val: u32, count: u32, left: bool, logical: bool) -> u32 {
    let width = size.bytes() * 8;
    let val = size.ext_unsigned(val);
    let old = cc.flush();

    if count == 0 {
        // X survives, C and V clear.
        cc.set_ccr((old & CCR_X) | pack_nz(size, val));
        return val;
    }

    let (res, carry, overflow);
    if left {
        if count < width {
            res = size.ext_unsigned(val << count);
            carry = (val >> (width - count)) & 1 != 0;
        } else {
            res = 0;
            carry = count == width && val & 1 != 0;
        }
        // ASL overflow: the sign changed at some point during the shift.
        overflow = !logical
            && if count >= width {
                val != 0
            } else {
                let mask = size.mask() << (width - count - 1) & size.mask();
                let top = val & mask;
                top != 0 && top != mask
            };
    } else if logical {
        if count < width {
            res = val >> count;
            carry = (val >> (count - 1)) & 1 != 0;
        } else {
            res = 0;
            carry = count == width && val >> (width - 1) != 0;
        }
        overflow = false;
    } else {
        let sval = size.ext_signed(val);
        let shift = count.min(width - 1);
        res = size.ext_unsigned((sval >> shift) as u32);
        carry = if count >= width {
            sval < 0
        } else {
            (val >> (count - 1)) & 1 != 0
        };
        overflow = false;
    }

    let mut ccr = pack_nz(size, res);
    if carry {
        ccr |= CCR_C | CCR_X;
    }
    if overflow {
        ccr |= CCR_V;
    }
    cc.set_ccr(ccr);
    res
}

/// Plain rotate: X untouched, C is the last bit rotated across the end.
fn do_rotate(cc: &mut CcState, size: Size, val: u32, count: u32, left: bool) -> u32 {
    let width = size.bytes() * 8;
    let val = size.ext_unsigned(val);
    let old = cc.flush();

    if count == 0 {
        cc.set_ccr((old & CCR_X) | pack_nz(size, val));
        return val;
    }

    let k = count % width;
    let res = if left {
        size.ext_unsigned((val << k) | (val >> (width - k) % width))
    } else {
        size.ext_unsigned((val >> k) | (val << (width - k) % width))
    };
    let carry = if left {
        res & 1 != 0
    } else {
        res >> (width - 1) != 0
    };
    let mut ccr = (old & CCR_X) | pack_nz(size, res);
    if carry {
        ccr |= CCR_C;
    }
    cc.set_ccr(ccr);
    res
}

/// Rotate through X: the count reduces modulo width+1, and both C and X
/// end up as the bit landing in the X position. A zero count copies X to C.
fn do_rotate_x(cc: &mut CcState, size: Size, val: u32, count: u32, left: bool) -> u32 {
    let width = size.bytes() * 8;
    let val = size.ext_unsigned(val);
    let x_in = cc.x();
    let old = cc.flush();

    let k = count % (width + 1);
    if k == 0 {
        let mut ccr = (old & CCR_X) | pack_nz(size, val);
        if x_in {
            ccr |= CCR_C;
        }
        cc.set_ccr(ccr);
        return val;
    }

    // width+1 bit rotation of X:val.
    let combined = (u64::from(x_in as u32) << width) | u64::from(val);
    let bits = width + 1;
    let rotated = if left {
        ((combined << k) | (combined >> (bits - k))) & ((1u64 << bits) - 1)
    } else {
        ((combined >> k) | (combined << (bits - k))) & ((1u64 << bits) - 1)
    };
    let res = size.ext_unsigned(rotated as u32);
    let x_out = rotated >> width != 0;
    let mut ccr = pack_nz(size, res);
    if x_out {
        ccr |= CCR_C | CCR_X;
    }
    cc.set_ccr(ccr);
    res
}

fn imm_count(code: u16) -> u32 {
    let c = u32::from(code >> 9) & 7;
    if c == 0 { 8 } else { c }
}

fn reg_count<B: Bus>(x: &Exec<'_, B>, code: u16) -> u32 {
    x.dreg(usize::from(code >> 9) & 7) & 63
}

fn shift_dreg<B: Bus>(
    x: &mut Exec<'_, B>,
    code: u16,
    size: Size,
    count: u32,
) -> Result<Flow, Exception> {
    let reg = usize::from(code) & 7;
    let left = code & 0x100 != 0;
    let logical = code & 8 != 0;
    let val = x.dreg(reg);
    let res = do_shift(&mut x.core.cc, size, val, count, left, logical);
    x.set_dreg(size, reg, res);
    Ok(Flow::Next)
}

fn rotate_dreg<B: Bus>(
    x: &mut Exec<'_, B>,
    code: u16,
    size: Size,
    count: u32,
) -> Result<Flow, Exception> {
    let reg = usize::from(code) & 7;
    let left = code & 0x100 != 0;
    let val = x.dreg(reg);
    let res = if code & 8 != 0 {
        do_rotate(&mut x.core.cc, size, val, count, left)
    } else {
        do_rotate_x(&mut x.core.cc, size, val, count, left)
    };
    x.set_dreg(size, reg, res);
    Ok(Flow::Next)
}

// === long forms (also the only ColdFire forms) ===

pub(crate) fn shift_im<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let count = imm_count(code);
    shift_dreg(x, code, Size::Long, count)
}

pub(crate) fn shift_reg<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let count = reg_count(x, code);
    shift_dreg(x, code, Size::Long, count)
}

pub(crate) fn rotate_im<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let count = imm_count(code);
    rotate_dreg(x, code, Size::Long, count)
}

pub(crate) fn rotate_reg<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let count = reg_count(x, code);
    rotate_dreg(x, code, Size::Long, count)
}

// === byte and word forms ===

pub(crate) fn shift8_im<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let count = imm_count(code);
    shift_dreg(x, code, Size::Byte, count)
}

pub(crate) fn shift16_im<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let count = imm_count(code);
    shift_dreg(x, code, Size::Word, count)
}

pub(crate) fn shift8_reg<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let count = reg_count(x, code);
    shift_dreg(x, code, Size::Byte, count)
}

pub(crate) fn shift16_reg<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let count = reg_count(x, code);
    shift_dreg(x, code, Size::Word, count)
}

pub(crate) fn rotate8_im<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let count = imm_count(code);
    rotate_dreg(x, code, Size::Byte, count)
}

pub(crate) fn rotate16_im<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let count = imm_count(code);
    rotate_dreg(x, code, Size::Word, count)
}

pub(crate) fn rotate8_reg<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let count = reg_count(x, code);
    rotate_dreg(x, code, Size::Byte, count)
}

pub(crate) fn rotate16_reg<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let count = reg_count(x, code);
    rotate_dreg(x, code, Size::Word, count)
}

// === memory forms: word operand, count fixed at one ===

pub(crate) fn shift_mem<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let (mode, reg) = ea_fields(code);
    let dst = x.resolve(mode, reg, Size::Word)?;
    let val = x.operand_read(dst, Size::Word)?;
    let left = code & 0x100 != 0;
    let logical = code & 0x200 != 0;
    let res = do_shift(&mut x.core.cc, Size::Word, val, 1, left, logical);
    x.operand_write(dst, Size::Word, res)?;
    Ok(Flow::Next)
}

pub(crate) fn rotate_mem<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let (mode, reg) = ea_fields(code);
    let dst = x.resolve(mode, reg, Size::Word)?;
    let val = x.operand_read(dst, Size::Word)?;
    let left = code & 0x100 != 0;
    let res = if code & 0x200 != 0 {
        do_rotate(&mut x.core.cc, Size::Word, val, 1, left)
    } else {
        do_rotate_x(&mut x.core.cc, Size::Word, val, 1, left)
    };
    x.operand_write(dst, Size::Word, res)?;
    Ok(Flow::Next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asl_overflow_tracks_sign_changes() {
        // 0x40 << 1 = 0x80: sign flips, V set, no carry out.
        let mut cc = CcState::default();
        let res = do_shift(&mut cc, Size::Byte, 0x40, 1, true, false);
        assert_eq!(res, 0x80);
        let ccr = cc.get_ccr();
        assert_eq!(ccr & CCR_V, CCR_V);
        assert_eq!(ccr & CCR_C, 0);

        // 0xC0 << 1 = 0x80: sign stable, carry out.
        let mut cc = CcState::default();
        let res = do_shift(&mut cc, Size::Byte, 0xC0, 1, true, false);
        assert_eq!(res, 0x80);
        let ccr = cc.get_ccr();
        assert_eq!(ccr & CCR_V, 0);
        assert_eq!(ccr & (CCR_C | CCR_X), CCR_C | CCR_X);
    }

    #[test]
    fn shifts_past_the_width() {
        // LSR.B by 8: carry is the old sign bit, result zero.
        let mut cc = CcState::default();
        assert_eq!(do_shift(&mut cc, Size::Byte, 0x80, 8, false, true), 0);
        assert_eq!(cc.get_ccr() & (CCR_C | CCR_Z), CCR_C | CCR_Z);
        // LSR.B by 9: everything including the carry is gone.
        let mut cc = CcState::default();
        assert_eq!(do_shift(&mut cc, Size::Byte, 0xFF, 9, false, true), 0);
        assert_eq!(cc.get_ccr() & CCR_C, 0);
        // ASR.B past the width keeps filling with the sign.
        let mut cc = CcState::default();
        assert_eq!(do_shift(&mut cc, Size::Byte, 0x80, 20, false, false), 0xFF);
        assert_eq!(cc.get_ccr() & (CCR_C | CCR_N), CCR_C | CCR_N);
    }

    #[test]
    fn zero_count_clears_c_keeps_x() {
        let mut cc = CcState::Flags(CCR_X | CCR_C);
        let res = do_shift(&mut cc, Size::Word, 0x8000, 0, true, true);
        assert_eq!(res, 0x8000);
        let ccr = cc.get_ccr();
        assert_eq!(ccr & CCR_C, 0);
        assert_eq!(ccr & CCR_X, CCR_X);
        assert_eq!(ccr & CCR_N, CCR_N);
    }

    #[test]
    fn rotate_carry_is_the_wrapped_bit() {
        let mut cc = CcState::default();
        let res = do_rotate(&mut cc, Size::Byte, 0x81, 1, true);
        assert_eq!(res, 0x03);
        assert_eq!(cc.get_ccr() & CCR_C, CCR_C);
        // Full-width rotate leaves the value but still reports a carry.
        let mut cc = CcState::default();
        let res = do_rotate(&mut cc, Size::Byte, 0x81, 8, true);
        assert_eq!(res, 0x81);
        assert_eq!(cc.get_ccr() & CCR_C, CCR_C);
    }

    #[test]
    fn rotate_x_threads_through_the_extend_bit() {
        // ROXL.B #1 with X set: X enters bit 0, old bit 7 becomes X and C.
        let mut cc = CcState::Flags(CCR_X);
        let res = do_rotate_x(&mut cc, Size::Byte, 0x80, 1, true);
        assert_eq!(res, 0x01);
        assert_eq!(cc.get_ccr() & (CCR_C | CCR_X), CCR_C | CCR_X);
        // Zero count: C mirrors X, value untouched.
        let mut cc = CcState::Flags(CCR_X);
        let res = do_rotate_x(&mut cc, Size::Byte, 0x55, 0, true);
        assert_eq!(res, 0x55);
        assert_eq!(cc.get_ccr() & CCR_C, CCR_C);
    }
}
