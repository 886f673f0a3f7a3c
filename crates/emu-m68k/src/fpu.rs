//! FPU instruction group: F-line arithmetic, conditionals, and state
//! save/restore.
//!
//! Register arithmetic runs on the [`crate::softfloat`] extended format.
//! Exception enables in FPCR are not delivered as traps; the accrued
//! exception byte in FPSR still fills in, which is what most software
//! polls.

use emu_core::Bus;

use crate::cc::Size;
use crate::cpu::{Exec, Flow};
use crate::ea::ea_fields;
use crate::exception::Exception;
use crate::features::Feature;
use crate::softfloat::{flag, FloatRelation, FloatX80, Precision, PrecisionGuard};

// FPSR fields.
const FPSR_N: u32 = 0x0800_0000;
const FPSR_Z: u32 = 0x0400_0000;
const FPSR_I: u32 = 0x0200_0000;
const FPSR_NAN: u32 = 0x0100_0000;
const FPSR_CC_MASK: u32 = 0x0F00_0000;
const FPSR_QUOTIENT_MASK: u32 = 0x00FF_0000;

/// Map accrued softfloat flags onto the FPSR AEXC byte.
fn aexc_bits(flags: u8) -> u32 {
    let mut aexc = 0;
    if flags & flag::INVALID != 0 {
        aexc |= 0x80;
    }
    if flags & flag::OVERFLOW != 0 {
        aexc |= 0x40;
    }
    if flags & flag::UNDERFLOW != 0 {
        aexc |= 0x20;
    }
    if flags & flag::DIVIDE_BY_ZERO != 0 {
        aexc |= 0x10;
    }
    if flags & flag::INEXACT != 0 {
        aexc |= 0x08;
    }
    aexc
}

fn set_fp_cc(fpsr: &mut u32, val: FloatX80) {
    *fpsr &= !FPSR_CC_MASK;
    if val.is_nan() {
        *fpsr |= FPSR_NAN;
        return;
    }
    if val.is_negative() {
        *fpsr |= FPSR_N;
    }
    if val.is_zero() {
        *fpsr |= FPSR_Z;
    }
    if val.is_infinity() {
        *fpsr |= FPSR_I;
    }
}

/// Evaluate an FPU conditional predicate from the FPSR condition byte.
/// Bit 4 only changes BSUN reporting, which is not delivered, so the
/// lower four bits decide.
fn fp_cond(fpsr: u32, cond: u8) -> bool {
    let n = fpsr & FPSR_N != 0;
    let z = fpsr & FPSR_Z != 0;
    let nan = fpsr & FPSR_NAN != 0;
    match cond & 0xF {
        0x0 => false,                  // F
        0x1 => z,                      // EQ
        0x2 => !(nan || z || n),       // OGT
        0x3 => z || !(nan || n),       // OGE
        0x4 => n && !(nan || z),       // OLT
        0x5 => z || (n && !nan),       // OLE
        0x6 => !(nan || z),            // OGL
        0x7 => !nan,                   // OR
        0x8 => nan,                    // UN
        0x9 => nan || z,               // UEQ
        0xA => nan || !(n || z),       // UGT
        0xB => nan || z || !n,         // UGE
        0xC => nan || (n && !z),       // ULT
        0xD => nan || z || n,          // ULE
        0xE => !z,                     // NE
        _ => true,                     // T
    }
}

// === memory operands ===

/// Resolve the address of a multi-word FP operand, handling the
/// postincrement/predecrement step for its real width.
fn fp_ea<B: Bus>(x: &mut Exec<'_, B>, code: u16, bytes: u32) -> Result<u32, Exception> {
    let (mode, reg) = ea_fields(code);
    match mode {
        3 => {
            let addr = x.areg(reg);
            x.delay_set_areg(reg, addr.wrapping_add(bytes));
            Ok(addr)
        }
        4 => {
            let addr = x.areg(reg).wrapping_sub(bytes);
            x.delay_set_areg(reg, addr);
            Ok(addr)
        }
        _ => x.lea(mode, reg),
    }
}

fn load_extended<B: Bus>(x: &mut Exec<'_, B>, addr: u32) -> Result<FloatX80, Exception> {
    let exp = x.load(Size::Word, addr)? as u16;
    let hi = x.load(Size::Long, addr.wrapping_add(4))?;
    let lo = x.load(Size::Long, addr.wrapping_add(8))?;
    Ok(FloatX80 {
        exp,
        frac: u64::from(hi) << 32 | u64::from(lo),
    })
}

fn store_extended<B: Bus>(x: &mut Exec<'_, B>, addr: u32, v: FloatX80) -> Result<(), Exception> {
    x.store(Size::Long, addr, u32::from(v.exp) << 16)?;
    x.store(Size::Long, addr.wrapping_add(4), (v.frac >> 32) as u32)?;
    x.store(Size::Long, addr.wrapping_add(8), v.frac as u32)?;
    Ok(())
}

/// Load a source operand in the format the extension word names.
fn load_source<B: Bus>(x: &mut Exec<'_, B>, code: u16, fmt: u16) -> Result<FloatX80, Exception> {
    let (mode, reg) = ea_fields(code);
    match fmt {
        0 => {
            let op = x.resolve(mode, reg, Size::Long)?;
            let v = x.operand_read(op, Size::Long)?;
            Ok(FloatX80::from_i32(v as i32))
        }
        1 => {
            let op = x.resolve(mode, reg, Size::Long)?;
            let bits = x.operand_read(op, Size::Long)?;
            Ok(FloatX80::from_f32_bits(bits))
        }
        4 => {
            let op = x.resolve(mode, reg, Size::Word)?;
            let v = x.operand_read(op, Size::Word)?;
            Ok(FloatX80::from_i32(Size::Word.ext_signed(v)))
        }
        6 => {
            let op = x.resolve(mode, reg, Size::Byte)?;
            let v = x.operand_read(op, Size::Byte)?;
            Ok(FloatX80::from_i32(Size::Byte.ext_signed(v)))
        }
        5 => {
            if mode == 7 && reg == 4 {
                let hi = x.fetch_long()?;
                let lo = x.fetch_long()?;
                return Ok(FloatX80::from_f64_bits(u64::from(hi) << 32 | u64::from(lo)));
            }
            let addr = fp_ea(x, code, 8)?;
            let hi = x.load(Size::Long, addr)?;
            let lo = x.load(Size::Long, addr.wrapping_add(4))?;
            Ok(FloatX80::from_f64_bits(u64::from(hi) << 32 | u64::from(lo)))
        }
        2 => {
            if mode == 7 && reg == 4 {
                let exp = x.fetch_word()?;
                x.fetch_word()?;
                let hi = x.fetch_long()?;
                let lo = x.fetch_long()?;
                return Ok(FloatX80 {
                    exp,
                    frac: u64::from(hi) << 32 | u64::from(lo),
                });
            }
            let addr = fp_ea(x, code, 12)?;
            load_extended(x, addr)
        }
        // Packed decimal is not implemented; it takes the unimplemented
        // F-line path like a missing coprocessor format would.
        _ => Err(Exception::LineF),
    }
}

/// Saturating integer narrowing for FMOVE-out, raising INVALID when the
/// value does not fit the destination width.
fn narrow_int<B: Bus>(x: &mut Exec<'_, B>, v: FloatX80, size: Size) -> u32 {
    let wide = v.to_i32(&mut x.core.fp_status);
    let narrowed = size.ext_signed(wide as u32);
    if narrowed != wide {
        x.core.fp_status.raise(flag::INVALID);
        let mask = size.mask() >> 1;
        return if wide < 0 { !mask } else { mask } & size.mask();
    }
    wide as u32 & size.mask()
}

// === the F-line front door ===

/// General FPU instruction: arithmetic, moves in and out, control
/// register transfers, and FMOVEM.
pub(crate) fn fpu<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let ext = x.fetch_word()?;
    let opmode = ext & 0x7F;
    match (ext >> 13) & 7 {
        0 | 2 => {}
        3 => return fmove_out(x, code, ext),
        4 | 5 => return fmove_control(x, code, ext),
        6 | 7 => return fmovem(x, code, ext),
        _ => return Err(Exception::LineF),
    }

    // FMOVECR: constant ROM source.
    if (ext >> 13) & 7 == 2 && (ext >> 10) & 7 == 7 {
        return fmovecr(x, ext);
    }

    let src = if ext & 0x4000 != 0 {
        load_source(x, code, (ext >> 10) & 7)?
    } else {
        x.core.fregs[usize::from(ext >> 10) & 7]
    };
    let dst = usize::from(ext >> 7) & 7;
    x.core.fpiar = x.insn_pc;

    let precision = match opmode {
        0x40..=0x43 | 0x58 | 0x5A | 0x60..=0x63 | 0x68 | 0x24 | 0x27 => Precision::Single,
        0x44..=0x47 | 0x5C | 0x5E | 0x64..=0x67 | 0x6C => Precision::Double,
        _ => x.core.fp_status.precision,
    };
    let mut quotient = None;
    let res = {
        let mut st = PrecisionGuard::new(&mut x.core.fp_status, precision);
        let dest = x.core.fregs[dst];
        match opmode {
            0x00 | 0x40 | 0x44 => src,
            0x01 => src.round_to_int(&mut st),
            0x03 => {
                let saved = st.rounding;
                st.rounding = crate::softfloat::RoundingMode::TowardZero;
                let r = src.round_to_int(&mut st);
                st.rounding = saved;
                r
            }
            0x02 => src.sinh(&mut st),
            0x04 | 0x41 | 0x45 => src.sqrt(&mut st),
            0x06 => src.lognp1(&mut st),
            0x08 => src.etoxm1(&mut st),
            0x09 => src.tanh(&mut st),
            0x0A => src.atan(&mut st),
            0x0C => src.asin(&mut st),
            0x0D => src.atanh(&mut st),
            0x0E => src.sin(&mut st),
            0x0F => src.tan(&mut st),
            0x10 => src.etox(&mut st),
            0x11 => src.twotox(&mut st),
            0x12 => src.tentox(&mut st),
            0x14 => src.logn(&mut st),
            0x15 => src.log10(&mut st),
            0x16 => src.log2(&mut st),
            0x18 | 0x58 | 0x5C => src.abs(),
            0x19 => src.cosh(&mut st),
            0x1A | 0x5A | 0x5E => src.neg(),
            0x1C => src.acos(&mut st),
            0x1D => src.cos(&mut st),
            0x1E => src.getexp(&mut st),
            0x1F => src.getman(&mut st),
            0x20 | 0x60 | 0x64 | 0x24 => dest.div(src, &mut st),
            0x21 => {
                let (r, q) = dest.rem_trunc(src, &mut st);
                quotient = Some(q);
                r
            }
            0x22 | 0x62 | 0x66 => dest.add(src, &mut st),
            0x23 | 0x63 | 0x67 | 0x27 => dest.mul(src, &mut st),
            0x25 => {
                let (r, q) = dest.rem_nearest(src, &mut st);
                quotient = Some(q);
                r
            }
            0x26 => {
                // FSCALE: shift the exponent by the integer part of src.
                let n = src.to_i32(&mut st);
                FloatX80::from_f64(dest.to_f64() * 2f64.powi(n.clamp(-0x4000, 0x4000)))
            }
            0x28 | 0x68 | 0x6C => dest.sub(src, &mut st),
            0x30..=0x37 => {
                // FSINCOS: the cosine lands in the register named by the
                // extension's low bits, the sine in the destination. With
                // both naming one register the sine wins.
                x.core.fregs[usize::from(ext) & 7] = src.cos(&mut st);
                src.sin(&mut st)
            }
            0x38 => {
                // FCMP sets only the condition byte.
                drop(st);
                fcmp_flags(x, dest, src);
                return Ok(Flow::Next);
            }
            0x3A => {
                drop(st);
                let fpsr = &mut x.core.fpsr;
                set_fp_cc(fpsr, src);
                return Ok(Flow::Next);
            }
            _ => return Err(Exception::LineF),
        }
    };

    x.core.fregs[dst] = res;
    set_fp_cc(&mut x.core.fpsr, res);
    if let Some(q) = quotient {
        x.core.fpsr =
            (x.core.fpsr & !FPSR_QUOTIENT_MASK) | (u32::from(q) << 16) & FPSR_QUOTIENT_MASK;
    }
    x.core.fpsr |= aexc_bits(x.core.fp_status.flags);
    x.core.fp_status.flags = 0;
    Ok(Flow::Next)
}

fn fcmp_flags<B: Bus>(x: &mut Exec<'_, B>, dest: FloatX80, src: FloatX80) {
    let fpsr = &mut x.core.fpsr;
    *fpsr &= !FPSR_CC_MASK;
    match dest.compare(src) {
        FloatRelation::Less => *fpsr |= FPSR_N,
        FloatRelation::Equal => *fpsr |= FPSR_Z,
        FloatRelation::Greater => {}
        FloatRelation::Unordered => *fpsr |= FPSR_NAN,
    }
}

fn fmovecr<B: Bus>(x: &mut Exec<'_, B>, ext: u16) -> Result<Flow, Exception> {
    use std::f64::consts;
    let val = match ext & 0x7F {
        0x00 => consts::PI,
        0x0B => consts::LOG10_2,
        0x0C => consts::E,
        0x0D => consts::LOG2_E,
        0x0E => consts::LOG10_E,
        0x0F => 0.0,
        0x30 => consts::LN_2,
        0x31 => consts::LN_10,
        0x32 => 1.0,
        0x33 => 1e1,
        0x34 => 1e2,
        0x35 => 1e4,
        0x36 => 1e8,
        0x37 => 1e16,
        _ => 0.0,
    };
    let dst = usize::from(ext >> 7) & 7;
    let res = FloatX80::from_f64(val);
    x.core.fregs[dst] = res;
    set_fp_cc(&mut x.core.fpsr, res);
    Ok(Flow::Next)
}

fn fmove_out<B: Bus>(x: &mut Exec<'_, B>, code: u16, ext: u16) -> Result<Flow, Exception> {
    let src = x.core.fregs[usize::from(ext >> 7) & 7];
    let (mode, reg) = ea_fields(code);
    match (ext >> 10) & 7 {
        0 => {
            let v = narrow_int(x, src, Size::Long);
            let dst = x.resolve(mode, reg, Size::Long)?;
            x.operand_write(dst, Size::Long, v)?;
        }
        1 => {
            let bits = src.to_f32_bits(&mut x.core.fp_status);
            let dst = x.resolve(mode, reg, Size::Long)?;
            x.operand_write(dst, Size::Long, bits)?;
        }
        4 => {
            let v = narrow_int(x, src, Size::Word);
            let dst = x.resolve(mode, reg, Size::Word)?;
            x.operand_write(dst, Size::Word, v)?;
        }
        6 => {
            let v = narrow_int(x, src, Size::Byte);
            let dst = x.resolve(mode, reg, Size::Byte)?;
            x.operand_write(dst, Size::Byte, v)?;
        }
        5 => {
            let bits = src.to_f64_bits(&mut x.core.fp_status);
            let addr = fp_ea(x, code, 8)?;
            x.store(Size::Long, addr, (bits >> 32) as u32)?;
            x.store(Size::Long, addr.wrapping_add(4), bits as u32)?;
        }
        2 => {
            let addr = fp_ea(x, code, 12)?;
            store_extended(x, addr, src)?;
        }
        _ => return Err(Exception::LineF),
    }
    x.core.fpsr |= aexc_bits(x.core.fp_status.flags);
    x.core.fp_status.flags = 0;
    Ok(Flow::Next)
}

/// FMOVE to/from FPCR, FPSR and FPIAR. A multi-register list transfers
/// consecutive longs in that order.
fn fmove_control<B: Bus>(x: &mut Exec<'_, B>, code: u16, ext: u16) -> Result<Flow, Exception> {
    let to_fpu = (ext >> 13) & 7 == 4;
    let list = (ext >> 10) & 7;
    if list == 0 {
        return Err(Exception::LineF);
    }
    let (mode, reg) = ea_fields(code);
    let regs: Vec<u16> = [4u16, 2, 1].into_iter().filter(|bit| list & bit != 0).collect();
    if mode < 2 && regs.len() != 1 {
        // A plain register can only carry one control register.
        return Err(Exception::Illegal);
    }

    if regs.len() == 1 && mode < 2 {
        let op = x.resolve(mode, reg, Size::Long)?;
        if to_fpu {
            let v = x.operand_read(op, Size::Long)?;
            write_control(x, regs[0], v);
        } else {
            let v = read_control(x, regs[0]);
            x.operand_write(op, Size::Long, v)?;
        }
        return Ok(Flow::Next);
    }

    if mode == 7 && reg == 4 && to_fpu {
        for &bit in &regs {
            let v = x.fetch_long()?;
            write_control(x, bit, v);
        }
        return Ok(Flow::Next);
    }

    let bytes = 4 * regs.len() as u32;
    let mut addr = fp_ea(x, code, bytes)?;
    for &bit in &regs {
        if to_fpu {
            let v = x.load(Size::Long, addr)?;
            write_control(x, bit, v);
        } else {
            let v = read_control(x, bit);
            x.store(Size::Long, addr, v)?;
        }
        addr = addr.wrapping_add(4);
    }
    Ok(Flow::Next)
}

fn read_control<B: Bus>(x: &Exec<'_, B>, bit: u16) -> u32 {
    match bit {
        4 => x.core.fpcr,
        2 => x.core.fpsr,
        _ => x.core.fpiar,
    }
}

fn write_control<B: Bus>(x: &mut Exec<'_, B>, bit: u16, v: u32) {
    match bit {
        4 => x.core.set_fpcr(v),
        2 => x.core.fpsr = v,
        _ => x.core.fpiar = v,
    }
}

/// FMOVEM for the data registers. Classic cores move 12-byte extended
/// images; the ColdFire FPU moves doubles.
fn fmovem<B: Bus>(x: &mut Exec<'_, B>, code: u16, ext: u16) -> Result<Flow, Exception> {
    let store = (ext >> 13) & 7 == 7;
    let fmode = (ext >> 11) & 3;
    let mask = if fmode & 1 != 0 {
        // Dynamic list in a data register.
        x.dreg(usize::from(ext >> 4) & 7) & 0xFF
    } else {
        u32::from(ext) & 0xFF
    };
    if mask == 0 {
        return Err(Exception::LineF);
    }
    let double = !x.core.features.has(Feature::Fpu);
    let step = if double { 8 } else { 12 };
    let (mode, reg) = ea_fields(code);
    let predec = fmode & 2 == 0;

    if predec {
        if !store || mode != 4 {
            return Err(Exception::Illegal);
        }
        let mut addr = x.areg(reg);
        // FP7 first, descending; predec masks read from bit 7 down.
        for i in 0..8 {
            if mask & (0x80 >> i) == 0 {
                continue;
            }
            addr = addr.wrapping_sub(step);
            store_freg(x, addr, 7 - i, double)?;
        }
        x.delay_set_areg(reg, addr);
        return Ok(Flow::Next);
    }

    if mode == 4 || (mode == 3 && store) {
        return Err(Exception::Illegal);
    }
    let mut addr = if mode == 3 {
        let a = x.areg(reg);
        x.delay_set_areg(reg, a.wrapping_add(step * mask.count_ones()));
        a
    } else {
        x.lea(mode, reg)?
    };
    for i in 0..8 {
        if mask & (0x80 >> i) == 0 {
            continue;
        }
        if store {
            store_freg(x, addr, i, double)?;
        } else {
            load_freg(x, addr, i, double)?;
        }
        addr = addr.wrapping_add(step);
    }
    Ok(Flow::Next)
}

fn store_freg<B: Bus>(
    x: &mut Exec<'_, B>,
    addr: u32,
    i: usize,
    double: bool,
) -> Result<(), Exception> {
    let v = x.core.fregs[i];
    if double {
        let bits = v.to_f64_bits(&mut x.core.fp_status);
        x.store(Size::Long, addr, (bits >> 32) as u32)?;
        x.store(Size::Long, addr.wrapping_add(4), bits as u32)?;
        Ok(())
    } else {
        store_extended(x, addr, v)
    }
}

fn load_freg<B: Bus>(
    x: &mut Exec<'_, B>,
    addr: u32,
    i: usize,
    double: bool,
) -> Result<(), Exception> {
    let v = if double {
        let hi = x.load(Size::Long, addr)?;
        let lo = x.load(Size::Long, addr.wrapping_add(4))?;
        FloatX80::from_f64_bits(u64::from(hi) << 32 | u64::from(lo))
    } else {
        load_extended(x, addr)?
    };
    x.core.fregs[i] = v;
    Ok(())
}

// === conditionals ===

pub(crate) fn fscc<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let ext = x.fetch_word()?;
    let taken = fp_cond(x.core.fpsr, ext as u8);
    let (mode, reg) = ea_fields(code);
    let dst = x.resolve(mode, reg, Size::Byte)?;
    x.operand_write(dst, Size::Byte, if taken { 0xFF } else { 0 })?;
    Ok(Flow::Next)
}

pub(crate) fn ftrapcc<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let ext = x.fetch_word()?;
    match code & 7 {
        2 => {
            x.fetch_word()?;
        }
        3 => {
            x.fetch_long()?;
        }
        _ => {}
    }
    if fp_cond(x.core.fpsr, ext as u8) {
        return Err(Exception::TrapCc);
    }
    Ok(Flow::Next)
}

/// FBcc. The condition is in the opcode; bit 6 selects a long
/// displacement.
pub(crate) fn fbcc<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let base = x.insn_pc.wrapping_add(2);
    let disp = if code & 0x40 != 0 {
        x.fetch_long()?
    } else {
        i32::from(x.fetch_word()? as i16) as u32
    };
    if fp_cond(x.core.fpsr, code as u8) {
        x.core.pc = base.wrapping_add(disp);
        return Ok(Flow::Jump);
    }
    Ok(Flow::Next)
}

// === state frames ===

/// FSAVE writes a null frame: no mid-instruction FPU state can ever be
/// pending in this model.
pub(crate) fn fsave<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    x.require_supervisor()?;
    let addr = fp_ea(x, code, 4)?;
    x.store(Size::Long, addr, 0)?;
    Ok(Flow::Next)
}

/// FRESTORE. A null frame resets the FPU; any other frame is accepted
/// and its state words skipped by the frame's own size byte.
pub(crate) fn frestore<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    x.require_supervisor()?;
    let (mode, reg) = ea_fields(code);
    let addr = match mode {
        3 => x.areg(reg),
        _ => x.lea(mode, reg)?,
    };
    let word = x.load(Size::Long, addr)?;
    let size = if word >> 24 == 0 {
        x.core.fregs = [FloatX80::DEFAULT_NAN; 8];
        x.core.set_fpcr(0);
        x.core.fpsr = 0;
        x.core.fpiar = 0;
        4
    } else {
        4 + ((word >> 16) & 0xFF)
    };
    if mode == 3 {
        x.delay_set_areg(reg, addr.wrapping_add(size));
    }
    Ok(Flow::Next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fp_conditions_follow_the_relation() {
        // Greater: all condition bits clear.
        assert!(fp_cond(0, 0x2)); // OGT
        assert!(!fp_cond(0, 0x1)); // EQ
        // Equal.
        assert!(fp_cond(FPSR_Z, 0x1));
        assert!(fp_cond(FPSR_Z, 0x3)); // OGE
        assert!(!fp_cond(FPSR_Z, 0xE)); // NE
        // Less.
        assert!(fp_cond(FPSR_N, 0x4)); // OLT
        assert!(!fp_cond(FPSR_N, 0x2));
        // Unordered.
        assert!(fp_cond(FPSR_NAN, 0x8)); // UN
        assert!(!fp_cond(FPSR_NAN, 0x7)); // OR
        assert!(fp_cond(FPSR_NAN, 0xD)); // ULE
    }

    #[test]
    fn condition_byte_classifies_results() {
        let mut fpsr = 0;
        set_fp_cc(&mut fpsr, FloatX80::from_f64(-2.0));
        assert_eq!(fpsr & FPSR_CC_MASK, FPSR_N);
        set_fp_cc(&mut fpsr, FloatX80::zero(false));
        assert_eq!(fpsr & FPSR_CC_MASK, FPSR_Z);
        set_fp_cc(&mut fpsr, FloatX80::infinity(true));
        assert_eq!(fpsr & FPSR_CC_MASK, FPSR_N | FPSR_I);
        set_fp_cc(&mut fpsr, FloatX80::DEFAULT_NAN);
        assert_eq!(fpsr & FPSR_CC_MASK, FPSR_NAN);
    }

    #[test]
    fn aexc_mapping_covers_each_flag() {
        assert_eq!(aexc_bits(flag::INVALID), 0x80);
        assert_eq!(aexc_bits(flag::OVERFLOW), 0x40);
        assert_eq!(aexc_bits(flag::UNDERFLOW), 0x20);
        assert_eq!(aexc_bits(flag::DIVIDE_BY_ZERO), 0x10);
        assert_eq!(aexc_bits(flag::INEXACT), 0x08);
    }
}
