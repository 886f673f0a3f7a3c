//! Status register layout.
//!
//! The status register is 16 bits:
//! - Bits 0-4: condition code register (C, V, Z, N, X)
//! - Bits 8-10: interrupt mask
//! - Bit 12: master/interrupt stack select (M, 68020+)
//! - Bit 13: supervisor (S)
//! - Bit 15: trace (T)
//!
//! The CPU core stores the system byte literally but keeps the condition
//! codes in the lazy [`crate::cc`] engine; the packed CCR only materializes
//! on demand.

/// Carry flag.
pub const CCR_C: u8 = 0x01;
/// Overflow flag.
pub const CCR_V: u8 = 0x02;
/// Zero flag.
pub const CCR_Z: u8 = 0x04;
/// Negative flag.
pub const CCR_N: u8 = 0x08;
/// Extend flag.
pub const CCR_X: u8 = 0x10;

/// Mask for the valid CCR bits.
pub const CCR_MASK: u8 = 0x1F;

/// Interrupt mask field.
pub const SR_I: u16 = 0x0700;
/// Shift amount for the interrupt mask field.
pub const SR_I_SHIFT: u16 = 8;
/// Master/interrupt stack select.
pub const SR_M: u16 = 0x1000;
/// Supervisor mode.
pub const SR_S: u16 = 0x2000;
/// Trace mode.
pub const SR_T: u16 = 0x8000;

/// Evaluate one of the 16 condition predicates against a packed CCR.
///
/// This is the general path; the lazy engine answers most predicates from
/// its cached operands without packing first.
#[must_use]
pub fn condition(ccr: u8, cond: u8) -> bool {
    let c = ccr & CCR_C != 0;
    let v = ccr & CCR_V != 0;
    let z = ccr & CCR_Z != 0;
    let n = ccr & CCR_N != 0;
    match cond & 0x0F {
        0x0 => true,         // T
        0x1 => false,        // F
        0x2 => !c && !z,     // HI
        0x3 => c || z,       // LS
        0x4 => !c,           // CC
        0x5 => c,            // CS
        0x6 => !z,           // NE
        0x7 => z,            // EQ
        0x8 => !v,           // VC
        0x9 => v,            // VS
        0xA => !n,           // PL
        0xB => n,            // MI
        0xC => n == v,       // GE
        0xD => n != v,       // LT
        0xE => !z && n == v, // GT
        0xF => z || n != v,  // LE
        _ => unreachable!(),
    }
}
