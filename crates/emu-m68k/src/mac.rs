//! ColdFire MAC/EMAC unit.
//!
//! The four accumulators are 48-bit quantities kept in `u64` slots, but
//! their layout depends on the MACSR operating mode: integer modes keep
//! the value in bits 0..47, fractional mode keeps an 8-bit extension in
//! bits 0..7 with the 32-bit value above it. Writing MACSR repacks every
//! accumulator losslessly between the two layouts, so mode changes never
//! corrupt state.

use emu_core::Bus;

use crate::cc::Size;
use crate::cpu::{Exec, Flow};
use crate::ea::ea_fields;
use crate::exception::Exception;
use crate::features::Feature;
use crate::registers::CpuCore;

pub const MACSR_PAV0: u32 = 0x100;
pub const MACSR_OMC: u32 = 0x080;
pub const MACSR_SU: u32 = 0x040;
pub const MACSR_FI: u32 = 0x020;
pub const MACSR_RT: u32 = 0x010;
pub const MACSR_N: u32 = 0x008;
pub const MACSR_Z: u32 = 0x004;
pub const MACSR_V: u32 = 0x002;
pub const MACSR_EV: u32 = 0x001;

const ACC_MASK: u64 = (1 << 48) - 1;

fn clear_mac_flags(core: &mut CpuCore) {
    core.macsr &= !(MACSR_V | MACSR_Z | MACSR_N | MACSR_EV);
}

/// Derive N/Z/V/EV for one accumulator after an operation.
fn set_mac_flags(core: &mut CpuCore, acc: usize) {
    let val = core.macc[acc];
    if val == 0 {
        core.macsr |= MACSR_Z;
    } else if val & (1 << 47) != 0 {
        core.macsr |= MACSR_N;
    }
    if core.macsr & (MACSR_PAV0 << acc) != 0 {
        core.macsr |= MACSR_V;
    }
    // Extension overflow: the bits above the product width are neither a
    // sign fill nor zero.
    if core.macsr & MACSR_FI != 0 {
        let ext = (val as i64) >> 40;
        if ext != 0 && ext != -1 {
            core.macsr |= MACSR_EV;
        }
    } else if core.macsr & MACSR_SU != 0 {
        let ext = (val as i64) >> 32;
        if ext != 0 && ext != -1 {
            core.macsr |= MACSR_EV;
        }
    } else if val >> 32 != 0 {
        core.macsr |= MACSR_EV;
    }
}

// === multiply and saturate primitives ===

fn macmul_signed(core: &mut CpuCore, op1: u32, op2: u32) -> u64 {
    let product = i64::from(op1 as i32) * i64::from(op2 as i32);
    // Products live in 40 bits.
    let res = (product << 24) >> 24;
    if res != product {
        core.macsr |= MACSR_V;
        if core.macsr & MACSR_OMC != 0 {
            // Push the accumulate far enough to overflow too.
            return if product < 0 {
                !(1i64 << 50) as u64
            } else {
                1u64 << 50
            };
        }
    }
    res as u64
}

fn macmul_unsigned(core: &mut CpuCore, op1: u32, op2: u32) -> u64 {
    let mut product = u64::from(op1) * u64::from(op2);
    if product & (0xFF_FFFF << 40) != 0 {
        core.macsr |= MACSR_V;
        if core.macsr & MACSR_OMC != 0 {
            return 1 << 50;
        }
        product &= (1 << 40) - 1;
    }
    product
}

fn macmul_frac(core: &CpuCore, op1: u32, op2: u32) -> u64 {
    let product = u64::from(op1) * u64::from(op2);
    if core.macsr & MACSR_RT != 0 {
        // Round to nearest, ties to even.
        let rem = product & 0xFF_FFFF;
        let mut p = product >> 24;
        if rem > 0x80_0000 {
            p += 1;
        } else if rem == 0x80_0000 {
            p += p & 1;
        }
        p
    } else {
        product >> 24
    }
}

fn macsat_signed(core: &mut CpuCore, acc: usize) {
    let tmp = core.macc[acc] as i64;
    let mut result = (tmp << 16) >> 16;
    if result != tmp {
        core.macsr |= MACSR_V;
    }
    if core.macsr & MACSR_V != 0 {
        core.macsr |= MACSR_PAV0 << acc;
        if core.macsr & MACSR_OMC != 0 {
            // Saturation clamps at 32 bits even though the accumulator
            // overflows at 48; the hardware docs are explicit about it.
            result = (result >> 63) ^ 0x7FFF_FFFF;
        }
    }
    core.macc[acc] = result as u64;
}

fn macsat_unsigned(core: &mut CpuCore, acc: usize) {
    let mut val = core.macc[acc];
    if val & (0xFFFF << 48) != 0 {
        core.macsr |= MACSR_V;
    }
    if core.macsr & MACSR_V != 0 {
        core.macsr |= MACSR_PAV0 << acc;
        if core.macsr & MACSR_OMC != 0 {
            val = if val > 1 << 53 { 0 } else { ACC_MASK };
        } else {
            val &= ACC_MASK;
        }
    }
    core.macc[acc] = val;
}

fn macsat_frac(core: &mut CpuCore, acc: usize) {
    let sum = core.macc[acc] as i64;
    let mut result = (sum << 16) >> 16;
    if result != sum {
        core.macsr |= MACSR_V;
    }
    if core.macsr & MACSR_V != 0 {
        core.macsr |= MACSR_PAV0 << acc;
        if core.macsr & MACSR_OMC != 0 {
            result = (result >> 63) ^ 0x7FFF_FFFF_FFFF;
        }
    }
    core.macc[acc] = result as u64;
}

fn macsat(core: &mut CpuCore, acc: usize) {
    if core.macsr & MACSR_FI != 0 {
        macsat_frac(core, acc);
    } else if core.macsr & MACSR_SU != 0 {
        macsat_signed(core, acc);
    } else {
        macsat_unsigned(core, acc);
    }
}

/// Pick a 16-bit half of a MAC operand, positioned per the current mode:
/// fractional operands sit in the high half, integer ones are extended
/// into the low half.
fn extract_word(core: &CpuCore, val: u32, upper: bool) -> u32 {
    if core.macsr & MACSR_FI != 0 {
        if upper { val & 0xFFFF_0000 } else { val << 16 }
    } else if core.macsr & MACSR_SU != 0 {
        if upper {
            ((val as i32) >> 16) as u32
        } else {
            val as u16 as i16 as i32 as u32
        }
    } else if upper {
        val >> 16
    } else {
        val & 0xFFFF
    }
}

fn reg_of<B: Bus>(x: &Exec<'_, B>, areg: bool, r: usize) -> u32 {
    if areg { x.areg(r) } else { x.dreg(r) }
}

// === instructions ===

/// MAC/MSAC, including the EMAC load-and-accumulate and dual-accumulate
/// forms.
pub(crate) fn mac<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let ext = x.fetch_word()?;
    let mut acc = usize::from((code >> 7) & 1) | usize::from((ext >> 3) & 2);
    let dual = code & 0x30 != 0 && ext & 3 != 0;
    if dual && !x.core.features.has(Feature::CfEmac) {
        return Err(Exception::Illegal);
    }

    let (rx, ry, load);
    if code & 0x30 != 0 {
        // MAC with load: the operand registers move into the extension
        // word and the opcode's EA loads a long in parallel.
        let mode = ((code >> 3) & 7) as u8;
        let areg = usize::from(code) & 7;
        let addr = match mode {
            2 | 3 => x.areg(areg),
            4 => x.areg(areg).wrapping_sub(4),
            5 => {
                let d16 = i32::from(x.fetch_word()? as i16) as u32;
                x.areg(areg).wrapping_add(d16)
            }
            _ => return Err(Exception::Illegal),
        } & x.core.mac_mask;
        load = Some((mode, areg, addr, x.load(Size::Long, addr)?));
        acc ^= 1;
        rx = reg_of(x, ext & 0x8000 != 0, usize::from(ext >> 12) & 7);
        ry = reg_of(x, ext & 8 != 0, usize::from(ext) & 7);
    } else {
        load = None;
        rx = reg_of(x, code & 0x40 != 0, usize::from(code >> 9) & 7);
        ry = reg_of(x, code & 8 != 0, usize::from(code) & 7);
    }

    clear_mac_flags(x.core);

    let (rx, ry) = if ext & 0x0800 == 0 {
        (
            extract_word(x.core, rx, ext & 0x80 != 0),
            extract_word(x.core, ry, ext & 0x40 != 0),
        )
    } else {
        (rx, ry)
    };

    let product = if x.core.macsr & MACSR_FI != 0 {
        macmul_frac(x.core, rx, ry)
    } else {
        let p = if x.core.macsr & MACSR_SU != 0 {
            macmul_signed(x.core, rx, ry)
        } else {
            macmul_unsigned(x.core, rx, ry)
        };
        match (ext >> 9) & 3 {
            1 => p << 1,
            3 => p >> 1,
            _ => p,
        }
    };

    // The dual form reuses the multiplier's overflow state for the
    // second accumulate.
    let saved_macsr = x.core.macsr;

    if code & 0x100 != 0 {
        x.core.macc[acc] = x.core.macc[acc].wrapping_sub(product);
    } else {
        x.core.macc[acc] = x.core.macc[acc].wrapping_add(product);
    }
    macsat(x.core, acc);

    if dual {
        let acc2 = usize::from(ext >> 2) & 3;
        x.core.macsr = saved_macsr;
        if ext & 2 != 0 {
            x.core.macc[acc2] = x.core.macc[acc2].wrapping_sub(product);
        } else {
            x.core.macc[acc2] = x.core.macc[acc2].wrapping_add(product);
        }
        macsat(x.core, acc2);
        acc = acc2;
    }
    set_mac_flags(x.core, acc);

    if let Some((mode, areg, addr, val)) = load {
        let rw = usize::from(code >> 9) & 7;
        if code & 0x40 != 0 {
            x.set_areg(rw, val);
        } else {
            x.set_dreg_full(rw, val);
        }
        match mode {
            3 => x.set_areg(areg, addr.wrapping_add(4)),
            4 => x.set_areg(areg, addr),
            _ => {}
        }
    }
    Ok(Flow::Next)
}

/// MOVE from ACCx, applying the mode's rounding/saturation on the way out.
pub(crate) fn from_mac<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let accnum = usize::from(code >> 9) & 3;
    let val = x.core.macc[accnum];
    let out = if x.core.macsr & MACSR_FI != 0 {
        get_frac(x.core, val)
    } else if x.core.macsr & MACSR_OMC == 0 {
        val as u32
    } else if x.core.macsr & MACSR_SU != 0 {
        let tmp = val as i64;
        if tmp == i64::from(tmp as i32) {
            tmp as u32
        } else {
            ((tmp >> 63) ^ 0x7FFF_FFFF) as u32
        }
    } else if val >> 32 == 0 {
        val as u32
    } else {
        u32::MAX
    };
    let reg = usize::from(code) & 7;
    if code & 8 != 0 {
        x.set_areg(reg, out);
    } else {
        x.set_dreg_full(reg, out);
    }
    if code & 0x40 != 0 {
        x.core.macc[accnum] = 0;
        x.core.macsr &= !(MACSR_PAV0 << accnum);
    }
    Ok(Flow::Next)
}

/// Fractional accumulator read: rounded per MACSR, optionally saturated.
fn get_frac(core: &CpuCore, val: u64) -> u32 {
    let mut v = if core.macsr & MACSR_SU != 0 {
        // 16-bit result with rounding at bit 24.
        let rem = val & 0xFF_FFFF;
        let mut v = (val >> 24) & 0xFFFF;
        if rem > 0x80_0000 {
            v += 1;
        } else if rem == 0x80_0000 {
            v += v & 1;
        }
        v
    } else if core.macsr & MACSR_RT != 0 {
        let rem = val & 0xFF;
        let mut v = val >> 8;
        if rem > 0x80 {
            v += 1;
        } else if rem == 0x80 {
            v += v & 1;
        }
        v
    } else {
        val >> 8
    };
    if core.macsr & MACSR_OMC != 0 {
        if core.macsr & MACSR_SU != 0 {
            if v != u64::from(v as u16) {
                v = if val >> 63 != 0 { 0x8000 } else { 0x7FFF };
            }
        } else if v != u64::from(v as u32) {
            v = if val >> 63 != 0 { 0x8000_0000 } else { 0x7FFF_FFFF };
        }
    }
    v as u32
}

/// MOVE ACCy to ACCx, carrying the source's sticky-overflow bit along.
pub(crate) fn move_mac<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let dest = usize::from(code >> 9) & 3;
    let src = usize::from(code) & 3;
    x.core.macc[dest] = x.core.macc[src];
    if x.core.macsr & (MACSR_PAV0 << src) != 0 {
        x.core.macsr |= MACSR_PAV0 << dest;
    } else {
        x.core.macsr &= !(MACSR_PAV0 << dest);
    }
    clear_mac_flags(x.core);
    set_mac_flags(x.core, dest);
    Ok(Flow::Next)
}

pub(crate) fn from_macsr<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let reg = usize::from(code) & 7;
    let val = x.core.macsr;
    if code & 8 != 0 {
        x.set_areg(reg, val);
    } else {
        x.set_dreg_full(reg, val);
    }
    Ok(Flow::Next)
}

pub(crate) fn from_mask<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let reg = usize::from(code) & 7;
    let val = x.core.mac_mask;
    if code & 8 != 0 {
        x.set_areg(reg, val);
    } else {
        x.set_dreg_full(reg, val);
    }
    Ok(Flow::Next)
}

/// MOVE ACCext to a register. The extension bits of a pair of
/// accumulators pack into one long, with the layout following the mode.
pub(crate) fn from_mext<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let acc = if code & 0x400 != 0 { 2 } else { 0 };
    let val = if x.core.macsr & MACSR_FI != 0 {
        let mut v = (x.core.macc[acc] & 0xFF) as u32;
        v |= ((x.core.macc[acc] >> 32) & 0xFF00) as u32;
        v |= ((x.core.macc[acc + 1] << 16) & 0x00FF_0000) as u32;
        v |= ((x.core.macc[acc + 1] >> 16) & 0xFF00_0000) as u32;
        v
    } else {
        let mut v = ((x.core.macc[acc] >> 32) & 0xFFFF) as u32;
        v |= ((x.core.macc[acc + 1] >> 16) & 0xFFFF_0000) as u32;
        v
    };
    let reg = usize::from(code) & 7;
    if code & 8 != 0 {
        x.set_areg(reg, val);
    } else {
        x.set_dreg_full(reg, val);
    }
    Ok(Flow::Next)
}

/// MOVE MACSR to CCR: the low nibble maps straight onto N/Z/V/C.
pub(crate) fn macsr_to_ccr<B: Bus>(x: &mut Exec<'_, B>, _code: u16) -> Result<Flow, Exception> {
    let nibble = (x.core.macsr & 0xF) as u8;
    x.core.cc.set_ccr(nibble);
    Ok(Flow::Next)
}

pub(crate) fn to_mac<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let accnum = usize::from(code >> 9) & 3;
    let (mode, reg) = ea_fields(code);
    let src_op = x.resolve(mode, reg, Size::Long)?;
    let val = x.operand_read(src_op, Size::Long)?;
    x.core.macc[accnum] = if x.core.macsr & MACSR_FI != 0 {
        (i64::from(val as i32) << 8) as u64
    } else if x.core.macsr & MACSR_SU != 0 {
        i64::from(val as i32) as u64
    } else {
        u64::from(val)
    };
    x.core.macsr &= !(MACSR_PAV0 << accnum);
    clear_mac_flags(x.core);
    set_mac_flags(x.core, accnum);
    Ok(Flow::Next)
}

/// Write MACSR, repacking every accumulator if the operating mode moved
/// between the integer and fractional layouts.
pub(crate) fn to_macsr<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let (mode, reg) = ea_fields(code);
    let src_op = x.resolve(mode, reg, Size::Long)?;
    let val = x.operand_read(src_op, Size::Long)?;
    set_macsr(x.core, val);
    Ok(Flow::NextFlush)
}

pub(crate) fn set_macsr(core: &mut CpuCore, val: u32) {
    if (core.macsr ^ val) & (MACSR_FI | MACSR_SU) != 0 {
        for i in 0..4 {
            let regval = core.macc[i];
            // Decompose into the mode-independent (acc, extlow, exthigh)
            // triple, then rebuild in the new layout.
            let (acc, extlow) = if core.macsr & MACSR_FI != 0 {
                ((regval >> 8) as u32, regval as u8)
            } else {
                (regval as u32, (regval >> 32) as u8)
            };
            let exthigh = (regval >> 40) as i8;
            core.macc[i] = if val & MACSR_FI != 0 {
                (u64::from(acc) << 8)
                    | u64::from(extlow)
                    | ((i64::from(exthigh) << 40) as u64)
            } else {
                u64::from(acc)
                    | (u64::from(extlow) << 32)
                    | ((i64::from(exthigh) << 40) as u64)
            };
        }
    }
    core.macsr = val;
}

pub(crate) fn to_mext<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let acc = if code & 0x400 != 0 { 2 } else { 0 };
    let (mode, reg) = ea_fields(code);
    let src_op = x.resolve(mode, reg, Size::Long)?;
    let val = x.operand_read(src_op, Size::Long)?;
    if x.core.macsr & MACSR_FI != 0 {
        let mut res = x.core.macc[acc] & 0xFF_FFFF_FF00;
        res |= (i64::from((val & 0xFF00) as u16 as i16) << 32) as u64;
        res |= u64::from(val & 0xFF);
        x.core.macc[acc] = res;
        let mut res = x.core.macc[acc + 1] & 0xFF_FFFF_FF00;
        res |= (i64::from((val & 0xFF00_0000) as i32) << 16) as u64;
        res |= u64::from((val >> 16) & 0xFF);
        x.core.macc[acc + 1] = res;
    } else if x.core.macsr & MACSR_SU != 0 {
        let mut res = u64::from(x.core.macc[acc] as u32);
        res |= (i64::from(val as u16 as i16) << 32) as u64;
        x.core.macc[acc] = res;
        let mut res = u64::from(x.core.macc[acc + 1] as u32);
        res |= (i64::from((val & 0xFFFF_0000) as i32) << 16) as u64;
        x.core.macc[acc + 1] = res;
    } else {
        let mut res = u64::from(x.core.macc[acc] as u32);
        res |= u64::from(val & 0xFFFF) << 32;
        x.core.macc[acc] = res;
        let mut res = u64::from(x.core.macc[acc + 1] as u32);
        res |= u64::from(val & 0xFFFF_0000) << 16;
        x.core.macc[acc + 1] = res;
    }
    Ok(Flow::Next)
}

/// Write the MAC address mask. The top half is forced on, so masking only
/// ever narrows the low 16 bits.
pub(crate) fn to_mask<B: Bus>(x: &mut Exec<'_, B>, code: u16) -> Result<Flow, Exception> {
    let (mode, reg) = ea_fields(code);
    let src_op = x.resolve(mode, reg, Size::Long)?;
    let val = x.operand_read(src_op, Size::Long)?;
    x.core.mac_mask = val | 0xFFFF_0000;
    Ok(Flow::Next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::CpuModel;

    #[test]
    fn macsr_repack_round_trips() {
        let mut core = CpuCore::new(CpuModel::Cfv4e);
        // A 48-bit integer-layout value survives a trip through
        // fractional mode and back.
        core.macc[0] = 0x1234_5678_9ABC;
        set_macsr(&mut core, MACSR_FI);
        set_macsr(&mut core, 0);
        assert_eq!(core.macc[0] & ((1 << 48) - 1), 0x1234_5678_9ABC);
    }

    #[test]
    fn signed_multiply_flags_products_past_40_bits() {
        let mut core = CpuCore::new(CpuModel::Cfv4e);
        core.macsr = MACSR_SU;
        let p = macmul_signed(&mut core, 3, 4);
        assert_eq!(p, 12);
        assert_eq!(core.macsr & MACSR_V, 0);
        // 2^20 * 2^20 = 2^40 does not fit the 40-bit product field.
        let _ = macmul_signed(&mut core, 1 << 20, 1 << 20);
        assert_eq!(core.macsr & MACSR_V, MACSR_V);
    }

    #[test]
    fn unsigned_saturation_clamps_the_accumulator() {
        let mut core = CpuCore::new(CpuModel::Cfv4e);
        core.macsr = MACSR_OMC | MACSR_V;
        core.macc[1] = 1 << 52;
        macsat_unsigned(&mut core, 1);
        assert_eq!(core.macc[1], (1 << 48) - 1);
        assert_eq!(core.macsr & (MACSR_PAV0 << 1), MACSR_PAV0 << 1);
    }

    #[test]
    fn accumulator_flags_track_sign_and_zero() {
        let mut core = CpuCore::new(CpuModel::Cfv4e);
        core.macc[0] = 0;
        set_mac_flags(&mut core, 0);
        assert_eq!(core.macsr & MACSR_Z, MACSR_Z);
        let mut core = CpuCore::new(CpuModel::Cfv4e);
        core.macc[0] = 1 << 47;
        set_mac_flags(&mut core, 0);
        assert_eq!(core.macsr & MACSR_N, MACSR_N);
    }
}
