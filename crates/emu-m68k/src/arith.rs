//! Integer arithmetic: add/sub families, compares, multiply/divide,
//! bounds checks, BCD, and the compare-and-swap group.
//!
//! Flag-setting operations feed the deferred [`crate::cc`] engine where the
//! tag model fits (plain add/sub/cmp/logic); operations with carry-in,
//! sticky Z, or hardware-quirk flags compute a literal CCR instead.

use emu_core::Bus;

use crate::cc::{CcState, Size};
use crate::cpu::{Exec, Flow};
use crate::ea::{ea_fields, Operand};
use crate::exception::Exception;
use crate::features::Feature;
use crate::flags::{CCR_C, CCR_N, CCR_V, CCR_X, CCR_Z};

fn insn_size(code: u16) -> Result<Size, Exception> {
    Size::from_bits(((code >> 6) & 3) as u8).ok_or(Exception::Illegal)
}

// === add / sub ===

/// ADD/SUB with a data register on one side.
pub(crate) fn addsub<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let add = code & 0x4000 != 0;
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
        let res = apply_addsub(x, add, size, dest, src);
        x.operand_write(dst, size, res)?;
    } else {
        // Dn = Dn op <ea>
        let src_op = x.resolve(mode, ea_reg, size)?;
        let src = x.operand_read(src_op, size)?;
        let dest = size.ext_unsigned(x.dreg(reg));
        let res = apply_addsub(x, add, size, dest, src);
        x.set_dreg(size, reg, res);
    }
    Ok(Flow::Next)
}

fn apply_addsub<B: Bus>(x: &mut Exec<'_, B>, add: bool, size: Size, dest: u32, src: u32) -> u32 {
    if add {
        let res = size.ext_unsigned(dest.wrapping_add(src));
        let carry = res < size.ext_unsigned(src);
        x.core.cc.set_add(size, res, src, carry);
        res
    } else {
        let res = size.ext_unsigned(dest.wrapping_sub(src));
        let borrow = size.ext_unsigned(dest) < size.ext_unsigned(src);
        x.core.cc.set_sub(size, res, src, borrow);
        res
    }
}

/// ADDQ/SUBQ: 3-bit immediate (0 encodes 8) to any alterable destination.
pub(crate) fn addsubq<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let mut val = u32::from(code >> 9) & 7;
    if val == 0 {
        val = 8;
    }
    let sub = code & 0x100 != 0;
    let size = insn_size(code)?;
    let (mode, reg) = ea_fields(code);

    if mode == 1 {
        // Address register destination: whole register, no flags.
        let old = x.areg(reg);
        let new = if sub {
            old.wrapping_sub(val)
        } else {
            old.wrapping_add(val)
        };
        x.set_areg(reg, new);
        return Ok(Flow::Next);
    }

    let dst = x.resolve(mode, reg, size)?;
    let dest = x.operand_read(dst, size)?;
    let res = apply_addsub(x, !sub, size, dest, val);
    x.operand_write(dst, size, res)?;
    Ok(Flow::Next)
}

/// ADDA/SUBA: full-width address register arithmetic, no flags.
fn addsuba<B: Bus>(x: &mut Exec<'_, B>, code: u16, add: bool) -> Result<Flow, Exception> {
    let size = if code & 0x100 != 0 { Size::Long } else { Size::Word };
    let reg = usize::from(code >> 9) & 7;
    let (mode, ea_reg) = ea_fields(code);
    let src_op = x.resolve(mode, ea_reg, size)?;
    let src = size.ext_signed(x.operand_read(src_op, size)?) as u32;
    let old = x.areg(reg);
    let new = if add {
        old.wrapping_add(src)
    } else {
        old.wrapping_sub(src)
    };
    x.set_areg(reg, new);
    Ok(Flow::Next)
}

pub(crate) fn adda<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    addsuba(x, code, true)
}

pub(crate) fn suba<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    addsuba(x, code, false)
}

// === extended (carry-in) add / sub ===

/// `res = dest + src + X` with sticky Z. The carry-in breaks the deferred
/// tags' operand recovery, so the CCR is computed literally.
fn flags_addx(cc: &mut CcState, size: Size, dest: u32, src: u32) -> u32 {
    let x_in = cc.x();
    let old = cc.flush();
    let wide = u64::from(size.ext_unsigned(dest))
        + u64::from(size.ext_unsigned(src))
        + u64::from(x_in as u32);
    let res = size.ext_unsigned(wide as u32);
    let carry = wide > u64::from(size.mask());
    let (rd, rs, rr) = (
        size.ext_signed(dest),
        size.ext_signed(src),
        size.ext_signed(res),
    );
    let v = (rr ^ rd) & (rr ^ rs) < 0;
    let mut ccr = 0;
    if carry {
        ccr |= CCR_C | CCR_X;
    }
    if rr < 0 {
        ccr |= CCR_N;
    }
    if res == 0 && old & CCR_Z != 0 {
        ccr |= CCR_Z;
    }
    if v {
        ccr |= CCR_V;
    }
    cc.set_ccr(ccr);
    res
}

/// `res = dest - src - X` with sticky Z.
fn flags_subx(cc: &mut CcState, size: Size, dest: u32, src: u32) -> u32 {
    let x_in = cc.x();
    let old = cc.flush();
    let du = u64::from(size.ext_unsigned(dest));
    let su = u64::from(size.ext_unsigned(src)) + u64::from(x_in as u32);
    let res = size.ext_unsigned((du.wrapping_sub(su)) as u32);
    let borrow = du < su;
    let (rd, rs, rr) = (
        size.ext_signed(dest),
        size.ext_signed(src),
        size.ext_signed(res),
    );
    let v = (rd ^ rs) & (rd ^ rr) < 0;
    let mut ccr = 0;
    if borrow {
        ccr |= CCR_C | CCR_X;
    }
    if rr < 0 {
        ccr |= CCR_N;
    }
    if res == 0 && old & CCR_Z != 0 {
        ccr |= CCR_Z;
    }
    if v {
        ccr |= CCR_V;
    }
    cc.set_ccr(ccr);
    res
}

fn addsubx_reg<B: Bus>(x: &mut Exec<'_, B>, code: u16, add: bool) -> Result<Flow, Exception> {
    let size = if x.core.features.is_coldfire() {
        Size::Long
    } else {
        insn_size(code)?
    };
    let ry = usize::from(code >> 9) & 7;
    let rx = usize::from(code) & 7;
    let dest = x.dreg(ry);
    let src = x.dreg(rx);
    let res = if add {
        flags_addx(&mut x.core.cc, size, dest, src)
    } else {
        flags_subx(&mut x.core.cc, size, dest, src)
    };
    x.set_dreg(size, ry, res);
    Ok(Flow::Next)
}

fn addsubx_mem<B: Bus>(x: &mut Exec<'_, B>, code: u16, add: bool) -> Result<Flow, Exception> {
    let size = insn_size(code)?;
    let ry = usize::from(code >> 9) & 7;
    let rx = usize::from(code) & 7;
    // -(Ax) source first, then -(Ay) destination.
    let src_op = x.resolve(4, rx, size)?;
    let src = x.operand_read(src_op, size)?;
    let dst_op = x.resolve(4, ry, size)?;
    let dest = x.operand_read(dst_op, size)?;
    let res = if add {
        flags_addx(&mut x.core.cc, size, dest, src)
    } else {
        flags_subx(&mut x.core.cc, size, dest, src)
    };
    x.operand_write(dst_op, size, res)?;
    Ok(Flow::Next)
}

pub(crate) fn addx_reg<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    addsubx_reg(x, code, true)
}

pub(crate) fn addx_mem<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    addsubx_mem(x, code, true)
}

pub(crate) fn subx_reg<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    addsubx_reg(x, code, false)
}

pub(crate) fn subx_mem<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    addsubx_mem(x, code, false)
}

// === immediate arithmetic ===

/// ORI/ANDI/SUBI/ADDI/EORI/CMPI, including the CCR/SR immediate forms.
pub(crate) fn arith_im<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let op = (code >> 9) & 7;
    let size = if x.core.features.is_coldfire() {
        Size::Long
    } else {
        insn_size(code)?
    };
    let with_sr = code & 0x3F == 0x3C;
    let im = match size {
        Size::Byte | Size::Word => u32::from(x.fetch_word()?),
        Size::Long => x.fetch_long()?,
    };
    let im = size.ext_unsigned(im);

    if with_sr {
        // Only the logical ops reach CCR (byte) or SR (word).
        if !matches!(op, 0 | 1 | 5) {
            return Err(Exception::Illegal);
        }
        match size {
            Size::Byte => {
                let ccr = x.core.cc.flush();
                let new = match op {
                    0 => ccr | im as u8,
                    1 => ccr & im as u8,
                    _ => ccr ^ im as u8,
                };
                x.core.cc.set_ccr(new);
            }
            Size::Word => {
                x.require_supervisor()?;
                let sr = x.core.sr();
                let new = match op {
                    0 => sr | im as u16,
                    1 => sr & im as u16,
                    _ => sr ^ im as u16,
                };
                x.core.set_sr(new);
            }
            Size::Long => return Err(Exception::Illegal),
        }
        return Ok(Flow::Next);
    }

    let (mode, reg) = ea_fields(code);
    let dst = x.resolve(mode, reg, size)?;
    let dest = x.operand_read(dst, size)?;
    match op {
        0 => {
            let res = dest | im;
            x.core.cc.set_logic(size, res);
            x.operand_write(dst, size, res)?;
        }
        1 => {
            let res = dest & im;
            x.core.cc.set_logic(size, res);
            x.operand_write(dst, size, res)?;
        }
        2 => {
            let res = apply_addsub(x, false, size, dest, im);
            x.operand_write(dst, size, res)?;
        }
        3 => {
            let res = apply_addsub(x, true, size, dest, im);
            x.operand_write(dst, size, res)?;
        }
        5 => {
            let res = dest ^ im;
            x.core.cc.set_logic(size, res);
            x.operand_write(dst, size, res)?;
        }
        6 => x.core.cc.set_cmp(size, dest, im),
        _ => return Err(Exception::Illegal),
    }
    Ok(Flow::Next)
}

// === compares ===

pub(crate) fn cmp<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let size = if x.core.features.is_coldfire() {
        // cmp.b/cmp.w exist from ISA B; the common long form is 0x0080.
        match (code >> 6) & 3 {
            0 => Size::Byte,
            1 => Size::Word,
            _ => Size::Long,
        }
    } else {
        insn_size(code)?
    };
    let reg = usize::from(code >> 9) & 7;
    let (mode, ea_reg) = ea_fields(code);
    let src_op = x.resolve(mode, ea_reg, size)?;
    let src = x.operand_read(src_op, size)?;
    let dst = size.ext_unsigned(x.dreg(reg));
    x.core.cc.set_cmp(size, dst, src);
    Ok(Flow::Next)
}

pub(crate) fn cmpa<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let size = if code & 0x100 != 0 { Size::Long } else { Size::Word };
    let reg = usize::from(code >> 9) & 7;
    let (mode, ea_reg) = ea_fields(code);
    let src_op = x.resolve(mode, ea_reg, size)?;
    let src = size.ext_signed(x.operand_read(src_op, size)?) as u32;
    let dst = x.areg(reg);
    x.core.cc.set_cmp(Size::Long, dst, src);
    Ok(Flow::Next)
}

pub(crate) fn cmpm<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let size = insn_size(code)?;
    let ax = usize::from(code >> 9) & 7;
    let ay = usize::from(code) & 7;
    // Post-increment both, source (Ay) first.
    let src_op = x.resolve(3, ay, size)?;
    let src = x.operand_read(src_op, size)?;
    let dst_op = x.resolve(3, ax, size)?;
    let dst = x.operand_read(dst_op, size)?;
    x.core.cc.set_cmp(size, dst, src);
    Ok(Flow::Next)
}

// === single-operand ===

pub(crate) fn clr<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let size = insn_size(code)?;
    let (mode, reg) = ea_fields(code);
    let dst = x.resolve(mode, reg, size)?;
    x.operand_write(dst, size, 0)?;
    x.core.cc.set_logic(size, 0);
    Ok(Flow::Next)
}

pub(crate) fn neg<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let size = if x.core.features.is_coldfire() {
        Size::Long
    } else {
        insn_size(code)?
    };
    let (mode, reg) = ea_fields(code);
    let dst = x.resolve(mode, reg, size)?;
    let src = x.operand_read(dst, size)?;
    let res = size.ext_unsigned(0u32.wrapping_sub(src));
    // res = 0 - src, so the borrow (and X) is just "src nonzero".
    x.core.cc.set_sub(size, res, src, res != 0);
    x.operand_write(dst, size, res)?;
    Ok(Flow::Next)
}

pub(crate) fn negx<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let size = if x.core.features.is_coldfire() {
        Size::Long
    } else {
        insn_size(code)?
    };
    let (mode, reg) = ea_fields(code);
    let dst = x.resolve(mode, reg, size)?;
    let src = x.operand_read(dst, size)?;
    let res = flags_subx(&mut x.core.cc, size, 0, src);
    x.operand_write(dst, size, res)?;
    Ok(Flow::Next)
}

pub(crate) fn tst<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let size = insn_size(code)?;
    let (mode, reg) = ea_fields(code);
    let src_op = x.resolve(mode, reg, size)?;
    let src = x.operand_read(src_op, size)?;
    x.core.cc.set_logic(size, src);
    Ok(Flow::Next)
}

// === multiply ===

pub(crate) fn mulw<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let signed = code & 0x100 != 0;
    let reg = usize::from(code >> 9) & 7;
    let (mode, ea_reg) = ea_fields(code);
    let src_op = x.resolve(mode, ea_reg, Size::Word)?;
    let src = x.operand_read(src_op, Size::Word)?;
    let dst = x.dreg(reg);
    let res = if signed {
        (i32::from(dst as u16 as i16) * i32::from(src as u16 as i16)) as u32
    } else {
        u32::from(dst as u16) * u32::from(src as u16)
    };
    x.set_dreg_full(reg, res);
    x.core.cc.set_logic(Size::Long, res);
    Ok(Flow::Next)
}

pub(crate) fn mull<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let ext = x.fetch_word()?;
    let dl = usize::from(ext >> 12) & 7;
    let dh = usize::from(ext) & 7;
    let signed = ext & 0x800 != 0;
    let (mode, ea_reg) = ea_fields(code);
    let src_op = x.resolve(mode, ea_reg, Size::Long)?;
    let src = x.operand_read(src_op, Size::Long)?;
    let a = x.dreg(dl);

    if ext & 0x400 != 0 {
        if !x.core.features.has(Feature::QuadMuldiv) {
            return Err(Exception::Illegal);
        }
        // 32x32 -> 64, result in Dh:Dl.
        let res = if signed {
            (i64::from(a as i32) * i64::from(src as i32)) as u64
        } else {
            u64::from(a) * u64::from(src)
        };
        x.set_dreg_full(dl, res as u32);
        x.set_dreg_full(dh, (res >> 32) as u32);
        let mut ccr = x.core.cc.flush() & CCR_X;
        if res == 0 {
            ccr |= CCR_Z;
        }
        if res & (1 << 63) != 0 {
            ccr |= CCR_N;
        }
        x.core.cc.set_ccr(ccr);
    } else {
        // 32x32 -> 32 with overflow detection.
        let (res, overflow) = if signed {
            let wide = i64::from(a as i32) * i64::from(src as i32);
            (wide as u32, wide != i64::from(wide as i32))
        } else {
            let wide = u64::from(a) * u64::from(src);
            (wide as u32, wide > u64::from(u32::MAX))
        };
        x.set_dreg_full(dl, res);
        let mut ccr = x.core.cc.flush() & CCR_X;
        if res == 0 {
            ccr |= CCR_Z;
        }
        if (res as i32) < 0 {
            ccr |= CCR_N;
        }
        if overflow {
            ccr |= CCR_V;
        }
        x.core.cc.set_ccr(ccr);
    }
    Ok(Flow::Next)
}

// === divide ===

/// 32/16 -> 16r:16q divide.
///
/// A zero divisor traps with the destination untouched. Quotient overflow
/// leaves the destination and N unchanged, sets V, and clears C and Z;
/// this is observed 68040 behavior, not the manual's "undefined".
pub(crate) fn divw<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let signed = code & 0x100 != 0;
    let reg = usize::from(code >> 9) & 7;
    let (mode, ea_reg) = ea_fields(code);
    let src_op = x.resolve(mode, ea_reg, Size::Word)?;
    let den = x.operand_read(src_op, Size::Word)?;
    if den & 0xFFFF == 0 {
        return Err(Exception::DivideByZero);
    }
    let num = x.dreg(reg);

    let mut ccr = x.core.cc.flush() & !(CCR_C | CCR_Z);
    if signed {
        let num = num as i32;
        let den = i32::from(den as u16 as i16);
        let quot = num.wrapping_div(den);
        let rem = num.wrapping_rem(den);
        if quot != i32::from(quot as i16) {
            x.core.cc.set_ccr(ccr | CCR_V);
            return Ok(Flow::Next);
        }
        x.set_dreg_full(reg, ((rem as u32) << 16) | (quot as u32 & 0xFFFF));
        ccr &= !(CCR_V | CCR_Z | CCR_N);
        if quot as i16 == 0 {
            ccr |= CCR_Z;
        }
        if (quot as i16) < 0 {
            ccr |= CCR_N;
        }
    } else {
        let den = den & 0xFFFF;
        let quot = num / den;
        let rem = num % den;
        if quot > 0xFFFF {
            x.core.cc.set_ccr(ccr | CCR_V);
            return Ok(Flow::Next);
        }
        x.set_dreg_full(reg, (rem << 16) | quot);
        ccr &= !(CCR_V | CCR_Z | CCR_N);
        if quot as u16 == 0 {
            ccr |= CCR_Z;
        }
        if quot & 0x8000 != 0 {
            ccr |= CCR_N;
        }
    }
    x.core.cc.set_ccr(ccr);
    Ok(Flow::Next)
}

/// 32/32 and 64/32 divides (DIVU.L/DIVS.L/REMU.L/REMS.L).
pub(crate) fn divl<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let ext = x.fetch_word()?;
    let dq = usize::from(ext >> 12) & 7;
    let dr = usize::from(ext) & 7;
    let signed = ext & 0x800 != 0;
    let (mode, ea_reg) = ea_fields(code);
    let src_op = x.resolve(mode, ea_reg, Size::Long)?;
    let den = x.operand_read(src_op, Size::Long)?;
    if den == 0 {
        return Err(Exception::DivideByZero);
    }

    if ext & 0x400 != 0 {
        if !x.core.features.has(Feature::QuadMuldiv) {
            return Err(Exception::Illegal);
        }
        // 64/32: numerator is Dr:Dq.
        let num = (u64::from(x.dreg(dr)) << 32) | u64::from(x.dreg(dq));
        let mut ccr = x.core.cc.flush() & !(CCR_C | CCR_Z);
        let (quot, rem, overflow) = if signed {
            let num = num as i64;
            let den = i64::from(den as i32);
            let q = num.wrapping_div(den);
            let r = num.wrapping_rem(den);
            (q as u64, r as u64, q != i64::from(q as i32))
        } else {
            let den = u64::from(den);
            (num / den, num % den, num / den > u64::from(u32::MAX))
        };
        if overflow {
            x.core.cc.set_ccr(ccr | CCR_V);
            return Ok(Flow::Next);
        }
        x.set_dreg_full(dq, quot as u32);
        if dr != dq {
            x.set_dreg_full(dr, rem as u32);
        }
        ccr &= !(CCR_V | CCR_Z | CCR_N);
        if quot as u32 == 0 {
            ccr |= CCR_Z;
        }
        if (quot as u32 as i32) < 0 {
            ccr |= CCR_N;
        }
        x.core.cc.set_ccr(ccr);
        return Ok(Flow::Next);
    }

    // 32/32. On ColdFire this pattern is also REM: quotient goes to Dq
    // only when Dr and Dq name the same register.
    let num = x.dreg(dq);
    let (quot, rem) = if signed {
        let q = (num as i32).wrapping_div(den as i32);
        let r = (num as i32).wrapping_rem(den as i32);
        (q as u32, r as u32)
    } else {
        (num / den, num % den)
    };
    // MIN / -1 overflows; the 68020+ sets V and leaves the registers.
    let overflow = signed && num == 0x8000_0000 && den == 0xFFFF_FFFF;
    let mut ccr = x.core.cc.flush() & !(CCR_C | CCR_Z);
    if overflow {
        x.core.cc.set_ccr(ccr | CCR_V);
        return Ok(Flow::Next);
    }
    if x.core.features.is_coldfire() {
        if dr == dq {
            x.set_dreg_full(dq, quot);
        } else {
            x.set_dreg_full(dr, rem);
        }
    } else {
        x.set_dreg_full(dq, quot);
        if dr != dq {
            x.set_dreg_full(dr, rem);
        }
    }
    ccr &= !(CCR_V | CCR_Z | CCR_N);
    if quot == 0 {
        ccr |= CCR_Z;
    }
    if (quot as i32) < 0 {
        ccr |= CCR_N;
    }
    x.core.cc.set_ccr(ccr);
    Ok(Flow::Next)
}

// === bounds checks ===

/// CHK: flags observed on a real MC68040, then the trap.
fn do_chk(cc: &mut CcState, val: i32, ub: i32) -> Result<(), Exception> {
    let mut ccr = cc.flush() & !(CCR_N | CCR_C);
    if val < 0 {
        ccr |= CCR_N;
    }
    let c = if 0 <= ub {
        val < 0 || val > ub
    } else {
        val > ub && val < 0
    };
    if c {
        ccr |= CCR_C;
    }
    cc.set_ccr(ccr);
    if val < 0 || val > ub {
        return Err(Exception::Chk);
    }
    Ok(())
}

pub(crate) fn chk<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let size = match (code >> 7) & 3 {
        3 => Size::Word,
        2 => Size::Long,
        _ => return Err(Exception::Illegal),
    };
    let reg = usize::from(code >> 9) & 7;
    let (mode, ea_reg) = ea_fields(code);
    let src_op = x.resolve(mode, ea_reg, size)?;
    let ub = size.ext_signed(x.operand_read(src_op, size)?);
    let val = size.ext_signed(x.dreg(reg));
    do_chk(&mut x.core.cc, val, ub)?;
    Ok(Flow::Next)
}

/// CHK2/CMP2: bounds pair in memory, register against both.
pub(crate) fn chk2<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let size = Size::from_bits(((code >> 9) & 3) as u8).ok_or(Exception::Illegal)?;
    let ext = x.fetch_word()?;
    let is_chk = ext & 0x800 != 0;
    let (mode, ea_reg) = ea_fields(code);
    let addr = x.lea(mode, ea_reg)?;
    let lb = size.ext_signed(x.load(size, addr)?) as u32;
    let ub = size.ext_signed(x.load(size, addr.wrapping_add(size.bytes()))?) as u32;
    let rn = usize::from(ext >> 12) & 0xF;
    let val = if rn < 8 {
        size.ext_signed(x.dreg(rn)) as u32
    } else {
        x.areg(rn - 8)
    };

    // The unsigned comparison trick covers signed and unsigned bounds at
    // once because both bounds went through the same extension.
    let out = if lb <= ub {
        val < lb || val > ub
    } else {
        val > ub && val < lb
    };
    let mut ccr = x.core.cc.flush() & !(CCR_Z | CCR_C);
    if val == lb || val == ub {
        ccr |= CCR_Z;
    }
    if out {
        ccr |= CCR_C;
    }
    x.core.cc.set_ccr(ccr);
    if is_chk && out {
        return Err(Exception::Chk);
    }
    Ok(Flow::Next)
}

// === compare and swap ===

pub(crate) fn cas<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let size = match (code >> 9) & 3 {
        1 => Size::Byte,
        2 => Size::Word,
        3 => Size::Long,
        _ => return Err(Exception::Illegal),
    };
    let ext = x.fetch_word()?;
    let du = usize::from(ext >> 6) & 7;
    let dc = usize::from(ext) & 7;
    let (mode, ea_reg) = ea_fields(code);
    let addr = match x.resolve(mode, ea_reg, size)? {
        Operand::Mem(addr) => addr,
        _ => return Err(Exception::Illegal),
    };
    let current = x.load(size, addr)?;
    let expect = size.ext_unsigned(x.dreg(dc));
    x.core.cc.set_cmp(size, current, expect);
    if current == expect {
        x.store(size, addr, x.dreg(du))?;
    } else {
        x.set_dreg(size, dc, current);
    }
    Ok(Flow::Next)
}

fn cas2_regs(ext: u16) -> (usize, usize, usize) {
    let rn = usize::from(ext >> 12) & 0xF;
    let du = usize::from(ext >> 6) & 7;
    let dc = usize::from(ext) & 7;
    (rn, du, dc)
}

fn cas2_addr<B: Bus>(x: &Exec<'_, B>, rn: usize) -> u32 {
    if rn < 8 {
        x.dreg(rn)
    } else {
        x.areg(rn - 8)
    }
}

///// CAS2.W: both words compare-and-swap as one transaction. Adjacent
/// aligned words combine into a single long access; otherwise a parallel
/// context must serialize.
pub(crate) fn cas2w<B: Bus>(x: &mut Exec<'_, B>, _code: u16) -> Result<Flow, Exception> {
    let ext1 = x.fetch_word()?;
    let ext2 = x.fetch_word()?;
    let (rn1, du1, dc1) = cas2_regs(ext1);
    let (rn2, du2, dc2) = cas2_regs(ext2);
    let a1 = cas2_addr(x, rn1);
    let a2 = cas2_addr(x, rn2);

    let (l1, l2);
    let combinable = a2 == a1.wrapping_add(2) && a1 & 3 == 0;
    if combinable {
        let pair = x.load(Size::Long, a1)?;
        l1 = pair >> 16;
        l2 = pair & 0xFFFF;
        let c1 = x.dreg(dc1) & 0xFFFF;
        let c2 = x.dreg(dc2) & 0xFFFF;
        if l1 == c1 && l2 == c2 {
            let update = (x.dreg(du1) << 16) | (x.dreg(du2) & 0xFFFF);
            x.store(Size::Long, a1, update)?;
        }
    } else {
        if x.parallel {
            return Err(Exception::RetrySerialized);
        }
        l1 = x.load(Size::Word, a1)?;
        l2 = x.load(Size::Word, a2)?;
        let c1 = x.dreg(dc1) & 0xFFFF;
        let c2 = x.dreg(dc2) & 0xFFFF;
        if l1 == c1 && l2 == c2 {
            x.store(Size::Word, a1, x.dreg(du1))?;
            x.store(Size::Word, a2, x.dreg(du2))?;
        }
    }

    cas2_finish(x, Size::Word, l1, l2, dc1, dc2);
    Ok(Flow::Next)
}

/// CAS2.L, same structure at long width (adjacent pair combines into one
/// 64-bit access).
pub(crate) fn cas2l<B: Bus>(x: &mut Exec<'_, B>, _code: u16) -> Result<Flow, Exception> {
    let ext1 = x.fetch_word()?;
    let ext2 = x.fetch_word()?;
    let (rn1, du1, dc1) = cas2_regs(ext1);
    let (rn2, du2, dc2) = cas2_regs(ext2);
    let a1 = cas2_addr(x, rn1);
    let a2 = cas2_addr(x, rn2);

    let (l1, l2);
    let combinable = a2 == a1.wrapping_add(4) && a1 & 7 == 0;
    if combinable {
        let pair = x.load_quad(a1)?;
        l1 = (pair >> 32) as u32;
        l2 = pair as u32;
        if l1 == x.dreg(dc1) && l2 == x.dreg(dc2) {
            let update = (u64::from(x.dreg(du1)) << 32) | u64::from(x.dreg(du2));
            x.store_quad(a1, update)?;
        }
    } else {
        if x.parallel {
            return Err(Exception::RetrySerialized);
        }
        l1 = x.load(Size::Long, a1)?;
        l2 = x.load(Size::Long, a2)?;
        if l1 == x.dreg(dc1) && l2 == x.dreg(dc2) {
            x.store(Size::Long, a1, x.dreg(du1))?;
            x.store(Size::Long, a2, x.dreg(du2))?;
        }
    }

    cas2_finish(x, Size::Long, l1, l2, dc1, dc2);
    Ok(Flow::Next)
}

/// Flags come from the first failing compare; on failure both compare
/// registers receive the memory operands.
fn cas2_finish<B: Bus>(x: &mut Exec<'_, B>, size: Size, l1: u32, l2: u32, dc1: usize, dc2: usize) {
    let c1 = size.ext_unsigned(x.dreg(dc1));
    let c2 = size.ext_unsigned(x.dreg(dc2));
    if l1 == c1 {
        x.core.cc.set_cmp(size, l2, c2);
    } else {
        x.core.cc.set_cmp(size, l1, c1);
    }
    if l1 != c1 || l2 != c2 {
        x.set_dreg(size, dc1, l1);
        x.set_dreg(size, dc2, l2);
    }
}

// === binary-coded decimal ===

/// One BCD digit-wise add with carry-in, the carry staying in bit 8.
fn bcd_add(dest: u32, src: u32, x_in: bool) -> u32 {
    let t0 = src.wrapping_add(0x066);
    let t1 = t0.wrapping_add(dest).wrapping_add(u32::from(x_in));
    // Digit carries show up where t1 differs from the carryless xor.
    let carries = (t0 ^ dest) ^ t1;
    let fix = !(carries >> 3) & 0x22;
    t1.wrapping_sub(fix.wrapping_mul(3))
}

/// BCD subtract expressed as a tens-complement add.
fn bcd_sub(dest: u32, src: u32, x_in: bool) -> u32 {
    let t0 = 0x1FFu32.wrapping_sub(src);
    let t1 = t0
        .wrapping_add(dest)
        .wrapping_add(1)
        .wrapping_sub(u32::from(x_in));
    let carries = (t0 ^ dest) ^ t1;
    let fix = !(carries >> 3) & 0x22;
    t1.wrapping_sub(fix.wrapping_mul(3))
}

/// BCD flags: C/X from bit 8, Z sticky, N and V untouched.
fn bcd_flags(cc: &mut CcState, val: u32) {
    let mut ccr = cc.flush();
    if val & 0xFF != 0 {
        ccr &= !CCR_Z;
    }
    if val & 0x100 != 0 {
        ccr |= CCR_C | CCR_X;
    } else {
        ccr &= !(CCR_C | CCR_X);
    }
    cc.set_ccr(ccr);
}

fn bcd_reg<B: Bus>(x: &mut Exec<'_, B>, code: u16, add: bool) -> Result<Flow, Exception> {
    let ry = usize::from(code >> 9) & 7;
    let rx = usize::from(code) & 7;
    let x_in = x.core.cc.x();
    let dest = x.dreg(ry) & 0xFF;
    let src = x.dreg(rx) & 0xFF;
    let res = if add {
        bcd_add(dest, src, x_in)
    } else {
        bcd_sub(dest, src, x_in)
    };
    bcd_flags(&mut x.core.cc, res);
    x.set_dreg(Size::Byte, ry, res);
    Ok(Flow::Next)
}

fn bcd_mem<B: Bus>(x: &mut Exec<'_, B>, code: u16, add: bool) -> Result<Flow, Exception> {
    let ry = usize::from(code >> 9) & 7;
    let rx = usize::from(code) & 7;
    let x_in = x.core.cc.x();
    let src_op = x.resolve(4, rx, Size::Byte)?;
    let src = x.operand_read(src_op, Size::Byte)?;
    let dst_op = x.resolve(4, ry, Size::Byte)?;
    let dest = x.operand_read(dst_op, Size::Byte)?;
    let res = if add {
        bcd_add(dest, src, x_in)
    } else {
        bcd_sub(dest, src, x_in)
    };
    bcd_flags(&mut x.core.cc, res);
    x.operand_write(dst_op, Size::Byte, res)?;
    Ok(Flow::Next)
}

pub(crate) fn abcd_reg<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    bcd_reg(x, code, true)
}

pub(crate) fn abcd_mem<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    bcd_mem(x, code, true)
}

pub(crate) fn sbcd_reg<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    bcd_reg(x, code, false)
}

pub(crate) fn sbcd_mem<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    bcd_mem(x, code, false)
}

/// NBCD: ten's complement of the operand, i.e. `0 - dest - X` in BCD.
pub(crate) fn nbcd<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let (mode, reg) = ea_fields(code);
    let x_in = x.core.cc.x();
    let dst = x.resolve(mode, reg, Size::Byte)?;
    let src = x.operand_read(dst, Size::Byte)?;
    let res = bcd_sub(0, src, x_in);
    bcd_flags(&mut x.core.cc, res);
    x.operand_write(dst, Size::Byte, res)?;
    Ok(Flow::Next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bcd_add_carries_between_digits() {
        assert_eq!(bcd_add(0x19, 0x05, false) & 0x1FF, 0x024);
        assert_eq!(bcd_add(0x99, 0x01, false) & 0x1FF, 0x100);
        assert_eq!(bcd_add(0x42, 0x13, true) & 0x1FF, 0x056);
    }

    #[test]
    fn bcd_sub_borrows_between_digits() {
        assert_eq!(bcd_sub(0x42, 0x13, false) & 0xFF, 0x29);
        assert_eq!(bcd_sub(0x02, 0x05, false) & 0x1FF, 0x197);
        assert_eq!(bcd_sub(0x10, 0x01, true) & 0xFF, 0x08);
    }

    #[test]
    fn chk_flag_quirks_match_silicon() {
        // In range: no exception, N and C clear.
        let mut cc = CcState::default();
        assert!(do_chk(&mut cc, 5, 10).is_ok());
        assert_eq!(cc.get_ccr() & (CCR_N | CCR_C), 0);
        // Negative value: trap with N and C set.
        let mut cc = CcState::default();
        assert_eq!(do_chk(&mut cc, -1, 10), Err(Exception::Chk));
        assert_eq!(cc.get_ccr() & (CCR_N | CCR_C), CCR_N | CCR_C);
        // Positive value above a negative bound: trap, but C stays clear.
        let mut cc = CcState::default();
        assert_eq!(do_chk(&mut cc, 5, -3), Err(Exception::Chk));
        assert_eq!(cc.get_ccr() & CCR_C, 0);
    }

    #[test]
    fn extended_ops_keep_z_sticky() {
        let mut cc = CcState::Flags(CCR_Z);
        // 0 + 0 + X(0): result zero, Z stays set.
        assert_eq!(flags_addx(&mut cc, Size::Byte, 0, 0), 0);
        assert_eq!(cc.get_ccr() & CCR_Z, CCR_Z);
        // A nonzero result clears Z and it stays cleared afterwards.
        let mut cc = CcState::Flags(CCR_Z);
        assert_eq!(flags_addx(&mut cc, Size::Byte, 1, 0), 1);
        assert_eq!(cc.get_ccr() & CCR_Z, 0);
        assert_eq!(flags_addx(&mut cc, Size::Byte, 0xFF, 1), 0);
        assert_eq!(cc.get_ccr() & CCR_Z, 0);
    }
}
