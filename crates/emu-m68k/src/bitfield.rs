//! Bitfield operations (68020+).
//!
//! Register operands are circular: the field wraps around the 32-bit
//! register, so everything is done on a rotated copy. Memory operands are
//! a byte stream: the signed offset picks a byte and a bit within it, and
//! a field can span up to five bytes.

use emu_core::Bus;

use crate::cc::Size;
use crate::cpu::{Exec, Flow};
use crate::ea::ea_fields;
use crate::exception::Exception;
use crate::flags::{CCR_N, CCR_X, CCR_Z};

/// Decode the extension word into (offset, width). The offset is signed
/// only when it comes from a register; the width folds into 1..=32.
fn field_spec<B: Bus>(x: &Exec<'_, B>, ext: u16) -> (i32, u32) {
    let offset = if ext & 0x800 != 0 {
        x.dreg(usize::from(ext >> 6) & 7) as i32
    } else {
        i32::from(ext >> 6) & 0x1F
    };
    let raw = if ext & 0x20 != 0 {
        x.dreg(usize::from(ext) & 7)
    } else {
        u32::from(ext) & 0x1F
    };
    (offset, (raw.wrapping_sub(1) & 31) + 1)
}

/// N from the field's top bit, Z from the field, V and C clear, X kept.
fn set_bf_flags<B: Bus>(x: &mut Exec<'_, B>, negative: bool, zero: bool) {
    let mut ccr = x.core.cc.flush() & CCR_X;
    if negative {
        ccr |= CCR_N;
    }
    if zero {
        ccr |= CCR_Z;
    }
    x.core.cc.set_ccr(ccr);
}

/// Mask occupying the top `width` bits.
fn top_mask(width: u32) -> u32 {
    if width == 32 {
        u32::MAX
    } else {
        u32::MAX << (32 - width)
    }
}

// === register operands ===

struct RegField {
    /// Register contents rotated so the field occupies the top bits.
    rotated: u32,
    mask: u32,
    rot: u32,
}

fn reg_field<B: Bus>(x: &Exec<'_, B>, reg: usize, offset: i32, width: u32) -> RegField {
    let rot = (offset as u32) & 31;
    RegField {
        rotated: x.dreg(reg).rotate_left(rot),
        mask: top_mask(width),
        rot,
    }
}

pub(crate) fn bfext_reg<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let ext = x.fetch_word()?;
    let (offset, width) = field_spec(x, ext);
    let reg = usize::from(code) & 7;
    let dst = usize::from(ext >> 12) & 7;
    let f = reg_field(x, reg, offset, width);
    let field = f.rotated & f.mask;
    set_bf_flags(x, field >> 31 != 0, field == 0);
    let val = if code & 0x200 != 0 {
        // BFEXTS
        ((field as i32) >> (32 - width)) as u32
    } else {
        if width == 32 { field } else { field >> (32 - width) }
    };
    x.set_dreg_full(dst, val);
    Ok(Flow::Next)
}

pub(crate) fn bfins_reg<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let ext = x.fetch_word()?;
    let (offset, width) = field_spec(x, ext);
    let reg = usize::from(code) & 7;
    let src = usize::from(ext >> 12) & 7;
    let f = reg_field(x, reg, offset, width);
    let insert = x.dreg(src) << (32 - width) % 32;
    set_bf_flags(x, insert >> 31 != 0, insert & f.mask == 0);
    let merged = (f.rotated & !f.mask) | (insert & f.mask);
    x.set_dreg_full(reg, merged.rotate_right(f.rot));
    Ok(Flow::Next)
}

/// BFTST/BFCHG/BFCLR/BFSET/BFFFO on a register, selected by the opcode's
/// op field.
pub(crate) fn bfop_reg<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let op = (code >> 8) & 7;
    let ext = x.fetch_word()?;
    let (offset, width) = field_spec(x, ext);
    let reg = usize::from(code) & 7;
    let f = reg_field(x, reg, offset, width);
    let field = f.rotated & f.mask;
    set_bf_flags(x, field >> 31 != 0, field == 0);
    match op {
        0 => {}
        2 => x.set_dreg_full(reg, (f.rotated ^ f.mask).rotate_right(f.rot)),
        4 => x.set_dreg_full(reg, (f.rotated & !f.mask).rotate_right(f.rot)),
        6 => x.set_dreg_full(reg, (f.rotated | f.mask).rotate_right(f.rot)),
        5 => {
            // BFFFO counts from the raw offset, not the wrapped one.
            let n = field.leading_zeros().min(width);
            let dst = usize::from(ext >> 12) & 7;
            x.set_dreg_full(dst, (offset as u32).wrapping_add(n));
        }
        _ => return Err(Exception::Illegal),
    }
    Ok(Flow::Next)
}

// === memory operands ===

struct MemField {
    addr: u32,
    /// Bytes covering the field, most significant first.
    bytes: u64,
    nbytes: u32,
    /// Right-shift that aligns the field to bit 0 of `bytes`.
    shift: u32,
    fmask: u64,
}

fn load_field<B: Bus>(
    x: &mut Exec<'_, B>,
    base: u32,
    offset: i32,
    width: u32,
) -> Result<MemField, Exception> {
    let addr = base.wrapping_add((offset >> 3) as u32);
    let bofs = (offset & 7) as u32;
    let nbytes = (bofs + width).div_ceil(8);
    let mut bytes = 0u64;
    for i in 0..nbytes {
        bytes = bytes << 8 | u64::from(x.load(Size::Byte, addr.wrapping_add(i))?);
    }
    let shift = nbytes * 8 - bofs - width;
    let fmask = if width == 32 { 0xFFFF_FFFF } else { (1u64 << width) - 1 };
    Ok(MemField {
        addr,
        bytes,
        nbytes,
        shift,
        fmask,
    })
}

fn store_field<B: Bus>(x: &mut Exec<'_, B>, f: &MemField, bytes: u64) -> Result<(), Exception> {
    for i in 0..f.nbytes {
        let b = (bytes >> ((f.nbytes - 1 - i) * 8)) as u32;
        x.store(Size::Byte, f.addr.wrapping_add(i), b)?;
    }
    Ok(())
}

fn bf_ea<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<u32, Exception> {
    let (mode, reg) = ea_fields(code);
    x.lea(mode, reg)
}

pub(crate) fn bfext_mem<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let ext = x.fetch_word()?;
    let (offset, width) = field_spec(x, ext);
    let base = bf_ea(x, code)?;
    let dst = usize::from(ext >> 12) & 7;
    let f = load_field(x, base, offset, width)?;
    let field = ((f.bytes >> f.shift) & f.fmask) as u32;
    set_bf_flags(x, field >> (width - 1) != 0, field == 0);
    let val = if code & 0x200 != 0 {
        let pad = (32 - width) % 32;
        (((field << pad) as i32) >> pad) as u32
    } else {
        field
    };
    x.set_dreg_full(dst, val);
    Ok(Flow::Next)
}

pub(crate) fn bfins_mem<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let ext = x.fetch_word()?;
    let (offset, width) = field_spec(x, ext);
    let base = bf_ea(x, code)?;
    let src = usize::from(ext >> 12) & 7;
    let f = load_field(x, base, offset, width)?;
    let insert = u64::from(x.dreg(src)) & f.fmask;
    set_bf_flags(x, insert >> (width - 1) != 0, insert == 0);
    let merged = (f.bytes & !(f.fmask << f.shift)) | (insert << f.shift);
    store_field(x, &f, merged)?;
    Ok(Flow::Next)
}

pub(crate) fn bfop_mem<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let op = (code >> 8) & 7;
    let ext = x.fetch_word()?;
    let (offset, width) = field_spec(x, ext);
    let base = bf_ea(x, code)?;
    let f = load_field(x, base, offset, width)?;
    let field = (f.bytes >> f.shift) & f.fmask;
    set_bf_flags(x, field >> (width - 1) != 0, field == 0);
    match op {
        0 => {}
        2 => store_field(x, &f, f.bytes ^ (f.fmask << f.shift))?,
        4 => store_field(x, &f, f.bytes & !(f.fmask << f.shift))?,
        6 => store_field(x, &f, f.bytes | (f.fmask << f.shift))?,
        5 => {
            let n = if field == 0 {
                width
            } else {
                (field as u32).leading_zeros() - (32 - width)
            };
            let dst = usize::from(ext >> 12) & 7;
            x.set_dreg_full(dst, (offset as u32).wrapping_add(n));
        }
        _ => return Err(Exception::Illegal),
    }
    Ok(Flow::Next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_mask_covers_the_field() {
        assert_eq!(top_mask(1), 0x8000_0000);
        assert_eq!(top_mask(8), 0xFF00_0000);
        assert_eq!(top_mask(32), u32::MAX);
    }

    #[test]
    fn width_spec_wraps_zero_to_32() {
        // Width field 0 encodes 32 for both immediate and register widths.
        assert_eq!((0u32.wrapping_sub(1) & 31) + 1, 32);
        assert_eq!((1u32.wrapping_sub(1) & 31) + 1, 1);
        assert_eq!((31u32.wrapping_sub(1) & 31) + 1, 31);
        // Register widths reduce modulo 32.
        assert_eq!((33u32.wrapping_sub(1) & 31) + 1, 1);
    }
}
