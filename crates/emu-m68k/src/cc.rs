//! Deferred condition-code engine.
//!
//! Flag-affecting instructions do not compute the five CCR bits. They store
//! a tag plus the operand snapshots the bits can later be derived from, and
//! the packed CCR materializes only when something actually reads it (a
//! conditional, MOVE from SR, an exception frame). Each tag is a variant of
//! [`CcState`] carrying exactly the fields that are meaningful for it, so
//! switching tags structurally discards dead fields. X and N are live under
//! every tag.
//!
//! Operand snapshots for the sized tags are sign-extended to 32 bits, which
//! keeps both the signed and unsigned orderings of the original width intact
//! and makes the sign bit of the width coincide with bit 31.

use crate::flags::{self, CCR_C, CCR_MASK, CCR_N, CCR_V, CCR_X, CCR_Z};

/// Operation width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Size {
    Byte,
    Word,
    Long,
}

impl Size {
    /// Width in bytes.
    #[must_use]
    pub const fn bytes(self) -> u32 {
        match self {
            Self::Byte => 1,
            Self::Word => 2,
            Self::Long => 4,
        }
    }

    /// Sign-extend the low `self` bits of `v` to 32 bits.
    #[must_use]
    pub const fn ext_signed(self, v: u32) -> i32 {
        match self {
            Self::Byte => v as u8 as i8 as i32,
            Self::Word => v as u16 as i16 as i32,
            Self::Long => v as i32,
        }
    }

    /// Zero-extend the low `self` bits of `v`.
    #[must_use]
    pub const fn ext_unsigned(self, v: u32) -> u32 {
        match self {
            Self::Byte => v & 0xFF,
            Self::Word => v & 0xFFFF,
            Self::Long => v,
        }
    }

    /// Mask covering the width.
    #[must_use]
    pub const fn mask(self) -> u32 {
        match self {
            Self::Byte => 0xFF,
            Self::Word => 0xFFFF,
            Self::Long => 0xFFFF_FFFF,
        }
    }

    /// Decode the standard 2-bit size field (00/01/10).
    #[must_use]
    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(Self::Byte),
            1 => Some(Self::Word),
            2 => Some(Self::Long),
            _ => None,
        }
    }

    /// Decode the MOVE size field (01=byte, 11=word, 10=long).
    #[must_use]
    pub const fn from_move_bits(bits: u8) -> Option<Self> {
        match bits {
            1 => Some(Self::Byte),
            3 => Some(Self::Word),
            2 => Some(Self::Long),
            _ => None,
        }
    }
}

/// The lazy condition-code state.
///
/// Field meaning per tag:
/// - `Add`/`Sub`: `res` is the sign-extended result, `src` the sign-extended
///   second operand, `x` the carry/borrow out of the width.
/// - `Cmp`: `dst`/`src` are the sign-extended comparands; X is untouched by
///   compares, so the inherited value rides along.
/// - `Logic`: `res` is the sign-extended result; C and V are zero.
/// - `Flags`: the literal packed CCR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CcState {
    Flags(u8),
    Add { size: Size, res: i32, src: i32, x: bool },
    Sub { size: Size, res: i32, src: i32, x: bool },
    Cmp { size: Size, dst: i32, src: i32, x: bool },
    Logic { res: i32, x: bool },
}

impl Default for CcState {
    fn default() -> Self {
        Self::Flags(0)
    }
}

impl CcState {
    /// The X flag, live under every tag.
    #[must_use]
    pub fn x(&self) -> bool {
        match *self {
            Self::Flags(ccr) => ccr & CCR_X != 0,
            Self::Add { x, .. }
            | Self::Sub { x, .. }
            | Self::Cmp { x, .. }
            | Self::Logic { x, .. } => x,
        }
    }

    /// Reconstruct the packed 5-bit CCR without changing the tag.
    #[must_use]
    pub fn get_ccr(&self) -> u8 {
        match *self {
            Self::Flags(ccr) => ccr & CCR_MASK,
            Self::Add { size, res, src, x } => {
                // First operand recovered as res - src; the overflow
                // identity is (res ^ s1) & ~(s1 ^ src) on the sign bit.
                let s1 = size.ext_signed(res.wrapping_sub(src) as u32);
                let v = ((res ^ src) & !(s1 ^ src)) < 0;
                pack(x, res < 0, res == 0, v, x)
            }
            Self::Sub { size, res, src, x } => {
                // First operand recovered as res + src; overflow iff the
                // result sign differs from the minuend while the operands'
                // signs differ.
                let s1 = size.ext_signed(res.wrapping_add(src) as u32);
                let v = ((src ^ s1) & (res ^ s1)) < 0;
                pack(x, res < 0, res == 0, v, x)
            }
            Self::Cmp { size, dst, src, x } => {
                let res = size.ext_signed(dst.wrapping_sub(src) as u32);
                let c = (dst as u32) < (src as u32);
                let v = ((res ^ dst) & (src ^ dst)) < 0;
                pack(x, res < 0, res == 0, v, c)
            }
            Self::Logic { res, x } => pack(x, res < 0, res == 0, false, false),
        }
    }

    /// Force the state to the literal `Flags` tag and return the packed CCR.
    pub fn flush(&mut self) -> u8 {
        let ccr = self.get_ccr();
        *self = Self::Flags(ccr);
        ccr
    }

    /// Replace the whole CCR (MOVE to CCR, RTE, exception return).
    pub fn set_ccr(&mut self, ccr: u8) {
        *self = Self::Flags(ccr & CCR_MASK);
    }

    /// Set X alone, preserving the rest of the state's tag.
    pub fn set_x(&mut self, new_x: bool) {
        match self {
            Self::Flags(ccr) => {
                if new_x {
                    *ccr |= CCR_X;
                } else {
                    *ccr &= !CCR_X;
                }
            }
            Self::Add { x, .. }
            | Self::Sub { x, .. }
            | Self::Cmp { x, .. }
            | Self::Logic { x, .. } => *x = new_x,
        }
    }

    /// Record an addition: `res = s1 + src` at `size`, `x` = carry out.
    pub fn set_add(&mut self, size: Size, res: u32, src: u32, x: bool) {
        *self = Self::Add {
            size,
            res: size.ext_signed(res),
            src: size.ext_signed(src),
            x,
        };
    }

    /// Record a subtraction: `res = s1 - src` at `size`, `x` = borrow out.
    pub fn set_sub(&mut self, size: Size, res: u32, src: u32, x: bool) {
        *self = Self::Sub {
            size,
            res: size.ext_signed(res),
            src: size.ext_signed(src),
            x,
        };
    }

    /// Record a compare of `dst` against `src` at `size`. X unchanged.
    pub fn set_cmp(&mut self, size: Size, dst: u32, src: u32) {
        let x = self.x();
        *self = Self::Cmp {
            size,
            dst: size.ext_signed(dst),
            src: size.ext_signed(src),
            x,
        };
    }

    /// Record a logic/move result at `size`. X unchanged, C = V = 0.
    pub fn set_logic(&mut self, size: Size, res: u32) {
        let x = self.x();
        *self = Self::Logic {
            res: size.ext_signed(res),
            x,
        };
    }

    /// Evaluate condition predicate `cond` (0-15).
    ///
    /// `Cmp` and `Logic` tags answer most predicates straight from the
    /// cached operands; everything else flushes to `Flags` first.
    pub fn test(&mut self, cond: u8) -> bool {
        let cond = cond & 0x0F;
        match cond {
            0x0 => return true,
            0x1 => return false,
            _ => {}
        }
        if let Some(hit) = self.test_cheap(cond) {
            return hit;
        }
        let ccr = self.flush();
        flags::condition(ccr, cond)
    }

    /// The cheap predicate paths. Returns `None` when a flush is required.
    fn test_cheap(&self, cond: u8) -> Option<bool> {
        match *self {
            Self::Cmp { size, dst, src, .. } => {
                let (du, su) = (dst as u32, src as u32);
                Some(match cond {
                    0x2 => !(du <= su),                                       // HI
                    0x3 => du <= su,                                          // LS
                    0x4 => !(du < su),                                        // CC
                    0x5 => du < su,                                           // CS
                    0x6 => dst != src,                                        // NE
                    0x7 => dst == src,                                        // EQ
                    0xA => size.ext_signed(dst.wrapping_sub(src) as u32) >= 0, // PL
                    0xB => size.ext_signed(dst.wrapping_sub(src) as u32) < 0,  // MI
                    0xC => dst >= src,                                        // GE
                    0xD => dst < src,                                         // LT
                    0xE => dst > src,                                         // GT
                    0xF => dst <= src,                                        // LE
                    _ => return None,
                })
            }
            Self::Logic { res, .. } => Some(match cond {
                0x4 => true,       // CC: logic clears C
                0x5 => false,      // CS
                0x6 => res != 0,   // NE
                0x7 => res == 0,   // EQ
                0x8 => true,       // VC: logic clears V
                0x9 => false,      // VS
                0xA | 0xC => res >= 0, // PL / GE (V clear)
                0xB | 0xD => res < 0,  // MI / LT
                0xE => res > 0,    // GT
                0xF => res <= 0,   // LE
                _ => return None,
            }),
            Self::Add { res, x, .. } | Self::Sub { res, x, .. } => Some(match cond {
                0x4 => !x,         // CC: C folds into X
                0x5 => x,          // CS
                0x6 => res != 0,   // NE: Z folds into the result
                0x7 => res == 0,   // EQ
                0xA => res >= 0,   // PL
                0xB => res < 0,    // MI
                _ => return None,
            }),
            Self::Flags(ccr) => Some(flags::condition(ccr, cond)),
        }
    }
}

fn pack(x: bool, n: bool, z: bool, v: bool, c: bool) -> u8 {
    let mut ccr = 0;
    if x {
        ccr |= CCR_X;
    }
    if n {
        ccr |= CCR_N;
    }
    if z {
        ccr |= CCR_Z;
    }
    if v {
        ccr |= CCR_V;
    }
    if c {
        ccr |= CCR_C;
    }
    ccr
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ccr_of(state: CcState) -> u8 {
        state.get_ccr()
    }

    #[test]
    fn add_byte_carry_and_overflow() {
        // 0x7F + 0x01 = 0x80: N V set, C X clear
        let mut cc = CcState::default();
        cc.set_add(Size::Byte, 0x80, 0x01, false);
        assert_eq!(ccr_of(cc), CCR_N | CCR_V);

        // 0xFF + 0x01 = 0x00: Z C X set
        cc.set_add(Size::Byte, 0x00, 0x01, true);
        assert_eq!(ccr_of(cc), CCR_Z | CCR_C | CCR_X);
    }

    #[test]
    fn sub_word_borrow_and_overflow() {
        // 0x8000 - 0x0001 = 0x7FFF: V set (neg - pos -> pos), no borrow
        let mut cc = CcState::default();
        cc.set_sub(Size::Word, 0x7FFF, 0x0001, false);
        assert_eq!(ccr_of(cc), CCR_V);

        // 0x0000 - 0x0001 = 0xFFFF: N C X set
        cc.set_sub(Size::Word, 0xFFFF, 0x0001, true);
        assert_eq!(ccr_of(cc), CCR_N | CCR_C | CCR_X);
    }

    #[test]
    fn cmp_preserves_x_and_derives_c_unsigned() {
        let mut cc = CcState::Flags(CCR_X);
        cc.set_cmp(Size::Byte, 0x10, 0x90);
        // 0x10 < 0x90 unsigned: C set; 0x10 - 0x90 = 0x80: N set, V set
        let ccr = ccr_of(cc);
        assert_eq!(ccr, CCR_X | CCR_C | CCR_N | CCR_V);
    }

    #[test]
    fn cmp_cheap_predicates_match_flushed_ccr() {
        // Spot-check every predicate against the packed-bit evaluation.
        let pairs = [
            (0x00u32, 0x00u32),
            (0x01, 0x02),
            (0x7F, 0x80),
            (0x80, 0x7F),
            (0xFF, 0x01),
            (0x01, 0xFF),
            (0x80, 0x80),
        ];
        for &(d, s) in &pairs {
            for cond in 0..16u8 {
                let mut lazy = CcState::default();
                lazy.set_cmp(Size::Byte, d, s);
                let cheap = lazy.test(cond);
                let mut flushed = CcState::default();
                flushed.set_cmp(Size::Byte, d, s);
                let packed = flushed.flush();
                assert_eq!(
                    cheap,
                    flags::condition(packed, cond),
                    "cond {cond:#x} on cmp.b #{s:#x},#{d:#x}"
                );
            }
        }
    }

    #[test]
    fn logic_clears_c_and_v() {
        let mut cc = CcState::Flags(CCR_C | CCR_V | CCR_X);
        cc.set_logic(Size::Long, 0x8000_0000);
        assert_eq!(ccr_of(cc), CCR_X | CCR_N);
        assert!(cc.test(0xB)); // MI
        assert!(cc.test(0x4)); // CC
        assert!(!cc.test(0x9)); // VS
    }

    #[test]
    fn flush_is_idempotent_and_tag_becomes_flags() {
        let mut cc = CcState::default();
        cc.set_add(Size::Long, 5, 3, false);
        let first = cc.flush();
        assert!(matches!(cc, CcState::Flags(_)));
        assert_eq!(cc.flush(), first);
    }
}
