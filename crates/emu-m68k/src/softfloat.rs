//! Extended-precision float support for the FPU.
//!
//! The FPU's architectural register format is the 80-bit extended real:
//! a sign, a 15-bit biased exponent, and a 64-bit significand with an
//! explicit integer bit. [`FloatX80`] stores that format losslessly and
//! classifies it exactly; arithmetic routes through the host's f64 with
//! explicit special-case handling, which covers the dynamic range programs
//! observe while keeping the register file and memory images bit-accurate.
//!
//! [`FloatStatus`] carries the rounding mode and rounding precision from
//! FPCR plus the accrued exception flags feeding FPSR.

use std::ops::{Deref, DerefMut};

/// Exponent bias of the extended format.
const EXP_BIAS: i32 = 16383;

/// IEEE rounding modes, encoded as in FPCR bits 4-5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoundingMode {
    #[default]
    NearestEven,
    TowardZero,
    TowardNegative,
    TowardPositive,
}

impl RoundingMode {
    /// Decode FPCR bits 4-5.
    #[must_use]
    pub const fn from_fpcr(bits: u32) -> Self {
        match (bits >> 4) & 3 {
            0 => Self::NearestEven,
            1 => Self::TowardZero,
            2 => Self::TowardNegative,
            _ => Self::TowardPositive,
        }
    }
}

/// Rounding precision, encoded as in FPCR bits 6-7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precision {
    #[default]
    Extended,
    Single,
    Double,
}

impl Precision {
    /// Decode FPCR bits 6-7. The reserved encoding rounds to double.
    #[must_use]
    pub const fn from_fpcr(bits: u32) -> Self {
        match (bits >> 6) & 3 {
            0 => Self::Extended,
            1 => Self::Single,
            _ => Self::Double,
        }
    }
}

/// Accrued exception flag bits.
pub mod flag {
    pub const INVALID: u8 = 0x01;
    pub const DIVIDE_BY_ZERO: u8 = 0x02;
    pub const OVERFLOW: u8 = 0x04;
    pub const UNDERFLOW: u8 = 0x08;
    pub const INEXACT: u8 = 0x10;
}

/// Rounding control and accrued exceptions for a run of operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct FloatStatus {
    pub rounding: RoundingMode,
    pub precision: Precision,
    pub flags: u8,
}

impl FloatStatus {
    pub fn raise(&mut self, bits: u8) {
        self.flags |= bits;
    }
}

/// Scoped precision override.
///
/// Several operations are defined to round at a fixed precision no matter
/// what FPCR selects (FSADD/FDADD round single/double, FSQRT and the
/// conversions round extended). The guard swaps the precision in and
/// restores the previous one when it goes out of scope, so early returns
/// through `?` cannot leave the override behind.
pub struct PrecisionGuard<'a> {
    status: &'a mut FloatStatus,
    saved: Precision,
}

impl<'a> PrecisionGuard<'a> {
    pub fn new(status: &'a mut FloatStatus, precision: Precision) -> Self {
        let saved = status.precision;
        status.precision = precision;
        Self { status, saved }
    }
}

impl Deref for PrecisionGuard<'_> {
    type Target = FloatStatus;
    fn deref(&self) -> &FloatStatus {
        self.status
    }
}

impl DerefMut for PrecisionGuard<'_> {
    fn deref_mut(&mut self) -> &mut FloatStatus {
        self.status
    }
}

impl Drop for PrecisionGuard<'_> {
    fn drop(&mut self) {
        self.status.precision = self.saved;
    }
}

/// Ordering result of a float compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatRelation {
    Less,
    Equal,
    Greater,
    Unordered,
}

/// An 80-bit extended real, stored exactly.
///
/// `exp` holds the sign in bit 15 and the biased exponent in bits 0-14;
/// `frac` is the full 64-bit significand including the integer bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FloatX80 {
    pub exp: u16,
    pub frac: u64,
}

impl FloatX80 {
    pub const ZERO: Self = Self { exp: 0, frac: 0 };
    pub const ONE: Self = Self {
        exp: EXP_BIAS as u16,
        frac: 1 << 63,
    };
    /// The default NaN pattern the FPU generates.
    pub const DEFAULT_NAN: Self = Self {
        exp: 0xFFFF,
        frac: u64::MAX,
    };

    /// Infinity with the given sign.
    #[must_use]
    pub const fn infinity(negative: bool) -> Self {
        Self {
            exp: if negative { 0xFFFF } else { 0x7FFF },
            frac: 1 << 63,
        }
    }

    /// Signed zero.
    #[must_use]
    pub const fn zero(negative: bool) -> Self {
        Self {
            exp: if negative { 0x8000 } else { 0 },
            frac: 0,
        }
    }

    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.exp & 0x8000 != 0
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.exp & 0x7FFF == 0 && self.frac == 0
    }

    #[must_use]
    pub const fn is_infinity(self) -> bool {
        self.exp & 0x7FFF == 0x7FFF && self.frac << 1 == 0
    }

    #[must_use]
    pub const fn is_nan(self) -> bool {
        self.exp & 0x7FFF == 0x7FFF && self.frac << 1 != 0
    }

    /// Signaling NaNs carry a clear quiet bit (bit 62).
    #[must_use]
    pub const fn is_signaling_nan(self) -> bool {
        self.is_nan() && self.frac & (1 << 62) == 0
    }

    /// Quiet this NaN by setting its quiet bit.
    #[must_use]
    pub const fn quieted(self) -> Self {
        Self {
            exp: self.exp,
            frac: self.frac | (1 << 62),
        }
    }

    /// Convert a host double, exactly (every f64 fits in extended).
    #[must_use]
    pub fn from_f64(v: f64) -> Self {
        let bits = v.to_bits();
        let sign = ((bits >> 48) & 0x8000) as u16;
        let exp11 = ((bits >> 52) & 0x7FF) as i32;
        let mant = bits & 0x000F_FFFF_FFFF_FFFF;
        if exp11 == 0x7FF {
            if mant == 0 {
                return Self::infinity(sign != 0);
            }
            // Preserve the quiet bit position when widening the payload.
            return Self {
                exp: sign | 0x7FFF,
                frac: (1 << 63) | (bits << 11),
            };
        }
        if exp11 == 0 {
            if mant == 0 {
                return Self::zero(sign != 0);
            }
            // Subnormal double: normalize into the explicit integer bit.
            let shift = mant.leading_zeros() as i32 - 0;
            let frac = mant << shift;
            let exp = 1 - 1023 + EXP_BIAS - (shift - 11);
            return Self {
                exp: sign | exp as u16,
                frac,
            };
        }
        Self {
            exp: sign | ((exp11 - 1023 + EXP_BIAS) as u16),
            frac: (1 << 63) | (mant << 11),
        }
    }

    /// Convert to a host double, rounding nearest-even. Values outside the
    /// double range collapse to infinity or zero with the right sign.
    #[must_use]
    pub fn to_f64(self) -> f64 {
        let sign = if self.is_negative() { -1.0 } else { 1.0 };
        if self.is_nan() {
            return f64::NAN;
        }
        if self.is_infinity() {
            return sign * f64::INFINITY;
        }
        if self.frac == 0 {
            return sign * 0.0;
        }
        let exp = (self.exp & 0x7FFF) as i32;
        // frac is a 64-bit fixed-point significand with the binary point
        // after bit 63.
        let magnitude = (self.frac as f64) * 2f64.powi(exp - EXP_BIAS - 63);
        sign * magnitude
    }

    /// Convert a 32-bit signed integer, exactly.
    #[must_use]
    pub fn from_i32(v: i32) -> Self {
        Self::from_f64(f64::from(v))
    }

    /// Convert a single-precision memory operand.
    #[must_use]
    pub fn from_f32_bits(bits: u32) -> Self {
        Self::from_f64(f64::from(f32::from_bits(bits)))
    }

    /// Convert a double-precision memory operand.
    #[must_use]
    pub fn from_f64_bits(bits: u64) -> Self {
        Self::from_f64(f64::from_bits(bits))
    }
}

/// Round a finite f64 according to the status precision, accruing
/// overflow/underflow/inexact.
fn apply_precision(v: f64, status: &mut FloatStatus) -> f64 {
    match status.precision {
        Precision::Extended | Precision::Double => v,
        Precision::Single => {
            let narrowed = v as f32;
            let back = f64::from(narrowed);
            if back != v && !v.is_nan() {
                status.raise(flag::INEXACT);
            }
            if narrowed.is_infinite() && v.is_finite() {
                status.raise(flag::OVERFLOW | flag::INEXACT);
            }
            if narrowed == 0.0 && v != 0.0 {
                status.raise(flag::UNDERFLOW | flag::INEXACT);
            }
            back
        }
    }
}

fn propagate_nan(a: FloatX80, b: FloatX80, status: &mut FloatStatus) -> FloatX80 {
    if a.is_signaling_nan() || b.is_signaling_nan() {
        status.raise(flag::INVALID);
    }
    if a.is_nan() {
        a.quieted()
    } else if b.is_nan() {
        b.quieted()
    } else {
        FloatX80::DEFAULT_NAN
    }
}

impl FloatX80 {
    #[must_use]
    pub fn neg(self) -> Self {
        Self {
            exp: self.exp ^ 0x8000,
            frac: self.frac,
        }
    }

    #[must_use]
    pub fn abs(self) -> Self {
        Self {
            exp: self.exp & 0x7FFF,
            frac: self.frac,
        }
    }

    pub fn add(self, rhs: Self, status: &mut FloatStatus) -> Self {
        if self.is_nan() || rhs.is_nan() {
            return propagate_nan(self, rhs, status);
        }
        if self.is_infinity() && rhs.is_infinity() && self.is_negative() != rhs.is_negative() {
            status.raise(flag::INVALID);
            return Self::DEFAULT_NAN;
        }
        let r = apply_precision(self.to_f64() + rhs.to_f64(), status);
        Self::from_f64(r)
    }

    pub fn sub(self, rhs: Self, status: &mut FloatStatus) -> Self {
        self.add(rhs.neg(), status)
    }

    pub fn mul(self, rhs: Self, status: &mut FloatStatus) -> Self {
        if self.is_nan() || rhs.is_nan() {
            return propagate_nan(self, rhs, status);
        }
        if (self.is_infinity() && rhs.is_zero()) || (self.is_zero() && rhs.is_infinity()) {
            status.raise(flag::INVALID);
            return Self::DEFAULT_NAN;
        }
        let r = apply_precision(self.to_f64() * rhs.to_f64(), status);
        Self::from_f64(r)
    }

    pub fn div(self, rhs: Self, status: &mut FloatStatus) -> Self {
        if self.is_nan() || rhs.is_nan() {
            return propagate_nan(self, rhs, status);
        }
        if rhs.is_zero() {
            if self.is_zero() {
                status.raise(flag::INVALID);
                return Self::DEFAULT_NAN;
            }
            status.raise(flag::DIVIDE_BY_ZERO);
            return Self::infinity(self.is_negative() != rhs.is_negative());
        }
        if self.is_infinity() && rhs.is_infinity() {
            status.raise(flag::INVALID);
            return Self::DEFAULT_NAN;
        }
        let r = apply_precision(self.to_f64() / rhs.to_f64(), status);
        Self::from_f64(r)
    }

    pub fn sqrt(self, status: &mut FloatStatus) -> Self {
        if self.is_nan() {
            return propagate_nan(self, self, status);
        }
        if self.is_zero() {
            return self;
        }
        if self.is_negative() {
            status.raise(flag::INVALID);
            return Self::DEFAULT_NAN;
        }
        Self::from_f64(apply_precision(self.to_f64().sqrt(), status))
    }

    /// Remainder with the quotient rounded to nearest (FREM). Returns the
    /// remainder and the low seven quotient bits plus the quotient sign in
    /// bit 7, as FPSR wants them.
    pub fn rem_nearest(self, rhs: Self, status: &mut FloatStatus) -> (Self, u8) {
        self.remainder(rhs, status, true)
    }

    /// Remainder with the quotient truncated toward zero (FMOD).
    pub fn rem_trunc(self, rhs: Self, status: &mut FloatStatus) -> (Self, u8) {
        self.remainder(rhs, status, false)
    }

    fn remainder(self, rhs: Self, status: &mut FloatStatus, nearest: bool) -> (Self, u8) {
        if self.is_nan() || rhs.is_nan() {
            return (propagate_nan(self, rhs, status), 0);
        }
        if self.is_infinity() || rhs.is_zero() {
            status.raise(flag::INVALID);
            return (Self::DEFAULT_NAN, 0);
        }
        if rhs.is_infinity() || self.is_zero() {
            return (self, 0);
        }
        let a = self.to_f64();
        let b = rhs.to_f64();
        let q = if nearest {
            round_half_even(a / b)
        } else {
            (a / b).trunc()
        };
        let rem = a - q * b;
        let sign_bit = if q < 0.0 { 0x80 } else { 0 };
        let q_bits = (q.abs() as u64 & 0x7F) as u8;
        (Self::from_f64(rem), sign_bit | q_bits)
    }

    /// Round to an integral value using the status rounding mode (FINT).
    pub fn round_to_int(self, status: &mut FloatStatus) -> Self {
        if self.is_nan() || self.is_infinity() {
            return self;
        }
        let v = self.to_f64();
        let r = match status.rounding {
            RoundingMode::NearestEven => round_half_even(v),
            RoundingMode::TowardZero => v.trunc(),
            RoundingMode::TowardNegative => v.floor(),
            RoundingMode::TowardPositive => v.ceil(),
        };
        if r != v {
            status.raise(flag::INEXACT);
        }
        Self::from_f64(r)
    }

    /// Convert to i32 under the status rounding mode, saturating with
    /// INVALID on overflow or NaN.
    pub fn to_i32(self, status: &mut FloatStatus) -> i32 {
        if self.is_nan() {
            status.raise(flag::INVALID);
            return i32::MIN;
        }
        let r = self.round_to_int(status).to_f64();
        if r > f64::from(i32::MAX) {
            status.raise(flag::INVALID);
            i32::MAX
        } else if r < f64::from(i32::MIN) {
            status.raise(flag::INVALID);
            i32::MIN
        } else {
            r as i32
        }
    }

    /// Narrow to single-precision memory format.
    pub fn to_f32_bits(self, status: &mut FloatStatus) -> u32 {
        if self.is_nan() {
            return (self.quieted().to_f64() as f32).to_bits() | 0x0040_0000;
        }
        let wide = self.to_f64();
        let narrow = wide as f32;
        if f64::from(narrow) != wide {
            status.raise(flag::INEXACT);
        }
        narrow.to_bits()
    }

    /// Narrow to double-precision memory format.
    pub fn to_f64_bits(self, _status: &mut FloatStatus) -> u64 {
        self.to_f64().to_bits()
    }

    /// Shared front end for the one-argument transcendentals: propagate
    /// NaNs, run the host function, classify the outcome into flags.
    fn transcend(self, status: &mut FloatStatus, f: fn(f64) -> f64) -> Self {
        if self.is_nan() {
            return propagate_nan(self, self, status);
        }
        let x = self.to_f64();
        let r = f(x);
        if r.is_nan() {
            status.raise(flag::INVALID);
            return Self::DEFAULT_NAN;
        }
        if r.is_infinite() && x.is_finite() {
            status.raise(flag::OVERFLOW);
        } else if r.is_finite() && r.fract() != 0.0 {
            status.raise(flag::INEXACT);
        }
        Self::from_f64(apply_precision(r, status))
    }

    pub fn sin(self, status: &mut FloatStatus) -> Self {
        self.transcend(status, f64::sin)
    }

    pub fn cos(self, status: &mut FloatStatus) -> Self {
        self.transcend(status, f64::cos)
    }

    pub fn tan(self, status: &mut FloatStatus) -> Self {
        self.transcend(status, f64::tan)
    }

    pub fn asin(self, status: &mut FloatStatus) -> Self {
        self.transcend(status, f64::asin)
    }

    pub fn acos(self, status: &mut FloatStatus) -> Self {
        self.transcend(status, f64::acos)
    }

    pub fn atan(self, status: &mut FloatStatus) -> Self {
        self.transcend(status, f64::atan)
    }

    pub fn sinh(self, status: &mut FloatStatus) -> Self {
        self.transcend(status, f64::sinh)
    }

    pub fn cosh(self, status: &mut FloatStatus) -> Self {
        self.transcend(status, f64::cosh)
    }

    pub fn tanh(self, status: &mut FloatStatus) -> Self {
        self.transcend(status, f64::tanh)
    }

    /// Inverse hyperbolic tangent; the poles at one behave like a
    /// division hitting zero.
    pub fn atanh(self, status: &mut FloatStatus) -> Self {
        let x = self.to_f64();
        if x == 1.0 || x == -1.0 {
            status.raise(flag::DIVIDE_BY_ZERO);
            return Self::infinity(x < 0.0);
        }
        self.transcend(status, f64::atanh)
    }

    /// e^x (FETOX).
    pub fn etox(self, status: &mut FloatStatus) -> Self {
        self.transcend(status, f64::exp)
    }

    /// e^x - 1 (FETOXM1).
    pub fn etoxm1(self, status: &mut FloatStatus) -> Self {
        self.transcend(status, f64::exp_m1)
    }

    /// 2^x (FTWOTOX).
    pub fn twotox(self, status: &mut FloatStatus) -> Self {
        self.transcend(status, f64::exp2)
    }

    /// 10^x (FTENTOX).
    pub fn tentox(self, status: &mut FloatStatus) -> Self {
        self.transcend(status, |x| 10f64.powf(x))
    }

    /// Natural log (FLOGN); zero is a pole, negative arguments are
    /// invalid.
    pub fn logn(self, status: &mut FloatStatus) -> Self {
        if self.is_zero() {
            status.raise(flag::DIVIDE_BY_ZERO);
            return Self::infinity(true);
        }
        self.transcend(status, f64::ln)
    }

    /// ln(1 + x) (FLOGNP1).
    pub fn lognp1(self, status: &mut FloatStatus) -> Self {
        if self.to_f64() == -1.0 {
            status.raise(flag::DIVIDE_BY_ZERO);
            return Self::infinity(true);
        }
        self.transcend(status, f64::ln_1p)
    }

    pub fn log10(self, status: &mut FloatStatus) -> Self {
        if self.is_zero() {
            status.raise(flag::DIVIDE_BY_ZERO);
            return Self::infinity(true);
        }
        self.transcend(status, f64::log10)
    }

    pub fn log2(self, status: &mut FloatStatus) -> Self {
        if self.is_zero() {
            status.raise(flag::DIVIDE_BY_ZERO);
            return Self::infinity(true);
        }
        self.transcend(status, f64::log2)
    }

    /// Unbiased exponent as a float (FGETEXP).
    pub fn getexp(self, status: &mut FloatStatus) -> Self {
        if self.is_nan() {
            return propagate_nan(self, self, status);
        }
        if self.is_infinity() {
            status.raise(flag::INVALID);
            return Self::DEFAULT_NAN;
        }
        if self.is_zero() {
            return self;
        }
        Self::from_f64(f64::from(i32::from(self.exp & 0x7FFF) - EXP_BIAS))
    }

    /// Mantissa with the exponent forced to zero (FGETMAN); the result
    /// keeps the sign and lies in [1, 2).
    pub fn getman(self, status: &mut FloatStatus) -> Self {
        if self.is_nan() {
            return propagate_nan(self, self, status);
        }
        if self.is_infinity() {
            status.raise(flag::INVALID);
            return Self::DEFAULT_NAN;
        }
        if self.is_zero() {
            return self;
        }
        Self {
            exp: (self.exp & 0x8000) | EXP_BIAS as u16,
            frac: self.frac,
        }
    }

    /// IEEE compare; NaN operands are unordered.
    #[must_use]
    pub fn compare(self, rhs: Self) -> FloatRelation {
        if self.is_nan() || rhs.is_nan() {
            return FloatRelation::Unordered;
        }
        let (a, b) = (self.to_f64(), rhs.to_f64());
        if a == b {
            FloatRelation::Equal
        } else if a < b {
            FloatRelation::Less
        } else {
            FloatRelation::Greater
        }
    }
}

fn round_half_even(v: f64) -> f64 {
    let floor = v.floor();
    let diff = v - floor;
    if diff > 0.5 {
        floor + 1.0
    } else if diff < 0.5 {
        floor
    } else if floor % 2.0 == 0.0 {
        floor
    } else {
        floor + 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn f64_round_trip_is_exact() {
        for v in [0.0, 1.0, -1.0, 0.5, 1234.5678, -1e300, 1e-300, f64::MIN_POSITIVE] {
            let x = FloatX80::from_f64(v);
            assert_eq!(x.to_f64(), v, "round trip of {v}");
        }
    }

    #[test]
    fn one_has_canonical_encoding() {
        assert_eq!(FloatX80::from_f64(1.0), FloatX80::ONE);
        assert!(FloatX80::ONE.frac >> 63 == 1);
    }

    #[test]
    fn special_value_classification() {
        assert!(FloatX80::infinity(false).is_infinity());
        assert!(FloatX80::infinity(true).is_negative());
        assert!(FloatX80::DEFAULT_NAN.is_nan());
        assert!(!FloatX80::DEFAULT_NAN.is_signaling_nan());
        assert!(FloatX80::zero(true).is_zero());
    }

    #[test]
    fn divide_by_zero_raises_flag_and_returns_signed_infinity() {
        let mut st = FloatStatus::default();
        let r = FloatX80::from_f64(-3.0).div(FloatX80::ZERO, &mut st);
        assert!(r.is_infinity() && r.is_negative());
        assert_ne!(st.flags & flag::DIVIDE_BY_ZERO, 0);
    }

    #[test]
    fn precision_guard_restores_on_drop() {
        let mut st = FloatStatus {
            precision: Precision::Single,
            ..FloatStatus::default()
        };
        {
            let mut g = PrecisionGuard::new(&mut st, Precision::Extended);
            assert_eq!(g.precision, Precision::Extended);
            let r = FloatX80::from_f64(1.0).add(FloatX80::from_f64(2.0), &mut g);
            assert_eq!(r.to_f64(), 3.0);
        }
        assert_eq!(st.precision, Precision::Single);
    }

    #[test]
    fn single_precision_rounds_and_flags_inexact() {
        let mut st = FloatStatus {
            precision: Precision::Single,
            ..FloatStatus::default()
        };
        let a = FloatX80::from_f64(1.0);
        let b = FloatX80::from_f64(1e-12);
        let r = a.add(b, &mut st);
        assert_eq!(r.to_f64(), 1.0);
        assert_ne!(st.flags & flag::INEXACT, 0);
    }

    #[test]
    fn int_conversion_honors_rounding_mode() {
        let mut st = FloatStatus {
            rounding: RoundingMode::TowardNegative,
            ..FloatStatus::default()
        };
        assert_eq!(FloatX80::from_f64(-1.5).to_i32(&mut st), -2);
        st.rounding = RoundingMode::TowardZero;
        assert_eq!(FloatX80::from_f64(-1.5).to_i32(&mut st), -1);
        st.rounding = RoundingMode::NearestEven;
        assert_eq!(FloatX80::from_f64(2.5).to_i32(&mut st), 2);
    }

    #[test]
    fn transcendentals_hit_exact_anchors() {
        let mut st = FloatStatus::default();
        assert_eq!(FloatX80::ZERO.sin(&mut st).to_f64(), 0.0);
        assert_eq!(FloatX80::ZERO.etox(&mut st).to_f64(), 1.0);
        assert_eq!(FloatX80::from_f64(8.0).log2(&mut st).to_f64(), 3.0);
        assert_eq!(st.flags, 0);
        let r = FloatX80::ZERO.logn(&mut st);
        assert!(r.is_infinity() && r.is_negative());
        assert_ne!(st.flags & flag::DIVIDE_BY_ZERO, 0);
    }

    #[test]
    fn getexp_and_getman_decompose_a_value() {
        let mut st = FloatStatus::default();
        let v = FloatX80::from_f64(-12.0);
        assert_eq!(v.getexp(&mut st).to_f64(), 3.0);
        assert_eq!(v.getman(&mut st).to_f64(), -1.5);
        assert!(FloatX80::infinity(false).getexp(&mut st).is_nan());
        assert_ne!(st.flags & flag::INVALID, 0);
    }

    #[test]
    fn compare_orders_and_detects_unordered() {
        let one = FloatX80::ONE;
        let two = FloatX80::from_f64(2.0);
        assert_eq!(one.compare(two), FloatRelation::Less);
        assert_eq!(two.compare(one), FloatRelation::Greater);
        assert_eq!(one.compare(one), FloatRelation::Equal);
        assert_eq!(one.compare(FloatX80::DEFAULT_NAN), FloatRelation::Unordered);
    }
}
