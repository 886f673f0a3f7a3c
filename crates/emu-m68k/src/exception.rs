//! Exception causes and vector assignments.
//!
//! Instruction execution reports architectural exceptions through
//! [`Exception`]; the delivery machinery in [`crate::cpu`] turns one into a
//! stack frame and a vectored PC change. Conditions the architecture cannot
//! recover from (a fault while already delivering a fault) surface as
//! [`FatalError`] and halt the core instead.

use thiserror::Error;

/// Vector numbers for the fixed exception assignments.
pub mod vector {
    pub const ACCESS_FAULT: u8 = 2;
    pub const ADDRESS_ERROR: u8 = 3;
    pub const ILLEGAL: u8 = 4;
    pub const DIVIDE_BY_ZERO: u8 = 5;
    pub const CHK: u8 = 6;
    pub const TRAPCC: u8 = 7;
    pub const PRIVILEGE: u8 = 8;
    pub const TRACE: u8 = 9;
    pub const LINE_A: u8 = 10;
    pub const LINE_F: u8 = 11;
    pub const DEBUG: u8 = 12;
    pub const FORMAT_ERROR: u8 = 14;
    pub const UNINITIALIZED: u8 = 15;
    /// Spurious interrupt; autovectors are `SPURIOUS + level`.
    pub const SPURIOUS: u8 = 24;
    /// TRAP #n uses `TRAP_BASE + n`.
    pub const TRAP_BASE: u8 = 32;
    pub const FP_BSUN: u8 = 48;
    pub const FP_INEXACT: u8 = 49;
    pub const FP_DIVIDE_BY_ZERO: u8 = 50;
    pub const FP_UNDERFLOW: u8 = 51;
    pub const FP_OPERAND_ERROR: u8 = 52;
    pub const FP_OVERFLOW: u8 = 53;
    pub const FP_SNAN: u8 = 54;
    pub const FP_UNIMPLEMENTED: u8 = 55;
}

/// An architectural exception raised during instruction execution or
/// interrupt sampling.
///
/// Raising one of these aborts the current instruction without committing
/// its remaining side effects; the core then builds the matching stack
/// frame. `Access` carries the special status word describing the faulted
/// cycle so the format 7 frame can reproduce it.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Exception {
    #[error("access fault at {addr:#010x}")]
    Access { addr: u32, ssw: u32 },
    #[error("address error at {addr:#010x}")]
    AddressError { addr: u32 },
    #[error("illegal instruction")]
    Illegal,
    #[error("line 1010 emulator")]
    LineA,
    #[error("line 1111 emulator")]
    LineF,
    #[error("privilege violation")]
    Privilege,
    #[error("trace")]
    Trace,
    #[error("integer divide by zero")]
    DivideByZero,
    #[error("CHK out of bounds")]
    Chk,
    #[error("TRAPcc taken")]
    TrapCc,
    #[error("TRAP #{0}")]
    Trap(u8),
    #[error("RTE format error")]
    FormatError,
    #[error("interrupt level {level}, vector {vector}")]
    Interrupt { level: u8, vector: u8 },
    #[error("floating-point exception, vector {0}")]
    FloatingPoint(u8),
    /// CAS2 on misaligned or non-adjacent operands cannot be expressed as
    /// one bus transaction. Callers running the core inside a parallel
    /// context retry the instruction under serialization instead of
    /// delivering anything.
    #[error("instruction requires serialized execution")]
    RetrySerialized,
}

impl Exception {
    /// The exception vector number.
    #[must_use]
    pub fn vector(self) -> u8 {
        match self {
            Self::Access { .. } => vector::ACCESS_FAULT,
            Self::AddressError { .. } => vector::ADDRESS_ERROR,
            Self::Illegal | Self::RetrySerialized => vector::ILLEGAL,
            Self::LineA => vector::LINE_A,
            Self::LineF => vector::LINE_F,
            Self::Privilege => vector::PRIVILEGE,
            Self::Trace => vector::TRACE,
            Self::DivideByZero => vector::DIVIDE_BY_ZERO,
            Self::Chk => vector::CHK,
            Self::TrapCc => vector::TRAPCC,
            Self::Trap(n) => vector::TRAP_BASE + (n & 0x0F),
            Self::FormatError => vector::FORMAT_ERROR,
            Self::Interrupt { vector, .. } => vector,
            Self::FloatingPoint(v) => v,
        }
    }
}

/// A condition the core cannot deliver as an exception.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FatalError {
    /// A bus fault occurred while already stacking a fault frame.
    #[error("double fault at {addr:#010x}, core halted")]
    DoubleFault { addr: u32 },
    /// The reset vectors themselves could not be fetched.
    #[error("reset vector fetch failed at {addr:#010x}")]
    ResetFault { addr: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trap_vectors_are_offset_from_base() {
        assert_eq!(Exception::Trap(0).vector(), 32);
        assert_eq!(Exception::Trap(15).vector(), 47);
        assert_eq!(Exception::DivideByZero.vector(), 5);
    }

    #[test]
    fn autovector_numbering() {
        let level = 3;
        assert_eq!(vector::SPURIOUS + level, 27);
    }
}
