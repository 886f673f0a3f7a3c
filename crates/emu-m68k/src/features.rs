//! CPU model and feature configuration.
//!
//! Each named model maps to a fixed bitmask of ISA features. The decoder
//! consults the mask when building its dispatch table, so feature-gated
//! instructions simply never appear in the table of a model that lacks them.
//! The mask is fixed at construction and never mutated afterwards.

/// Individual ISA features. Each occupies one bit in the feature mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Feature {
    /// Classic 680x0 family (as opposed to ColdFire).
    M68000,
    /// ColdFire ISA revision A.
    CfIsaA,
    /// ColdFire ISA revision B.
    CfIsaB,
    /// ColdFire ISA A+ additions (BITREV, BYTEREV, FF1, STRLDSR).
    CfIsaAplusC,
    /// 32-bit branch displacements on BRA.
    Bral,
    /// 32-bit branch displacements on all Bcc.
    Bccl,
    /// ColdFire FPU.
    CfFpu,
    /// 68881/68882-style FPU.
    Fpu,
    /// ColdFire MAC unit.
    CfMac,
    /// ColdFire EMAC unit.
    CfEmac,
    /// Separate user stack pointer.
    Usp,
    /// Dual supervisor stacks (SR master bit, 68020+).
    MasterStack,
    /// Full-format extension words (memory indirect addressing).
    ExtFull,
    /// Word-sized index registers in brief extension words.
    WordIndex,
    /// Scaled index registers.
    ScaledIndex,
    /// 32x32 -> 32 multiply / 32/32 divide (MULU.L etc).
    LongMuldiv,
    /// 32x32 -> 64 multiply / 64/32 divide.
    QuadMuldiv,
    /// Bitfield instructions.
    Bitfield,
    /// CAS/CAS2.
    Cas,
    /// BKPT instruction.
    Bkpt,
    /// RTD instruction.
    Rtd,
    /// CHK2/CMP2 instructions.
    Chk2,
    /// TRAPcc instructions.
    Trapcc,
    /// MOVEC instruction (68010+).
    Movec,
    /// Exception stack frames carry a format/vector word (68010+).
    ExcFormat,
    /// Unaligned data accesses allowed (68020+); also keeps the
    /// exception stack pointer unaligned instead of forcing even.
    UnalignedData,
    /// 68040-style paged MMU.
    Mmu040,
}

impl Feature {
    const fn bit(self) -> u64 {
        1 << self as u8
    }
}

/// Immutable feature bitmask for one CPU instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FeatureSet(u64);

impl FeatureSet {
    /// Empty set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Build a set from a feature list.
    #[must_use]
    pub fn from_features(features: &[Feature]) -> Self {
        let mut bits = 0;
        for &f in features {
            bits |= f.bit();
        }
        Self(bits)
    }

    /// Test a single feature.
    #[must_use]
    pub const fn has(self, feature: Feature) -> bool {
        self.0 & feature.bit() != 0
    }

    /// True for ColdFire cores (any CF ISA revision).
    #[must_use]
    pub const fn is_coldfire(self) -> bool {
        self.has(Feature::CfIsaA)
    }

    /// Raw bits, used as the decode-table cache key.
    #[must_use]
    pub const fn bits(self) -> u64 {
        self.0
    }
}

/// Named CPU variants, each a frozen feature selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CpuModel {
    M68000,
    M68010,
    M68020,
    M68030,
    M68040,
    M68060,
    M5206,
    M5208,
    Cfv4e,
    /// Permissive ColdFire configuration accepting most CF instructions.
    Any,
}

impl CpuModel {
    /// Look a model up by its conventional lowercase name.
    #[must_use]
    pub fn by_name(name: &str) -> Option<Self> {
        Some(match name {
            "m68000" => Self::M68000,
            "m68010" => Self::M68010,
            "m68020" => Self::M68020,
            "m68030" => Self::M68030,
            "m68040" => Self::M68040,
            "m68060" => Self::M68060,
            "m5206" => Self::M5206,
            "m5208" => Self::M5208,
            "cfv4e" => Self::Cfv4e,
            "any" => Self::Any,
            _ => return None,
        })
    }

    /// The feature mask for this model.
    #[must_use]
    pub fn features(self) -> FeatureSet {
        use Feature::*;
        match self {
            Self::M68000 => FeatureSet::from_features(&[M68000, Usp, WordIndex]),
            Self::M68010 => FeatureSet::from_features(&[
                M68000, Usp, WordIndex, Rtd, Bkpt, Movec, ExcFormat,
            ]),
            Self::M68020 | Self::M68030 => FeatureSet::from_features(&[
                M68000,
                Usp,
                WordIndex,
                Rtd,
                Bkpt,
                Movec,
                ExcFormat,
                MasterStack,
                QuadMuldiv,
                LongMuldiv,
                Bitfield,
                Bccl,
                Bral,
                Cas,
                Chk2,
                Trapcc,
                ExtFull,
                ScaledIndex,
                UnalignedData,
            ]),
            Self::M68040 | Self::M68060 => FeatureSet::from_features(&[
                M68000,
                Usp,
                WordIndex,
                Rtd,
                Bkpt,
                Movec,
                ExcFormat,
                MasterStack,
                QuadMuldiv,
                LongMuldiv,
                Bitfield,
                Bccl,
                Bral,
                Cas,
                Chk2,
                Trapcc,
                ExtFull,
                ScaledIndex,
                UnalignedData,
                Fpu,
                Mmu040,
            ]),
            Self::M5206 => FeatureSet::from_features(&[CfIsaA, Usp, Movec, ExcFormat]),
            Self::M5208 => FeatureSet::from_features(&[
                CfIsaA,
                CfIsaAplusC,
                Bral,
                CfEmac,
                Usp,
                Movec,
                ExcFormat,
            ]),
            Self::Cfv4e => FeatureSet::from_features(&[
                CfIsaA,
                CfIsaB,
                Bral,
                CfFpu,
                CfEmac,
                Usp,
                Movec,
                ExcFormat,
            ]),
            Self::Any => FeatureSet::from_features(&[
                CfIsaA,
                CfIsaB,
                CfIsaAplusC,
                Bral,
                CfFpu,
                CfEmac,
                Usp,
                Movec,
                ExcFormat,
                ExtFull,
                WordIndex,
            ]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_lookup_by_name() {
        assert_eq!(CpuModel::by_name("m68040"), Some(CpuModel::M68040));
        assert_eq!(CpuModel::by_name("m5208"), Some(CpuModel::M5208));
        assert_eq!(CpuModel::by_name("z80"), None);
    }

    #[test]
    fn coldfire_and_classic_are_disjoint() {
        assert!(CpuModel::M5208.features().is_coldfire());
        assert!(!CpuModel::M68040.features().is_coldfire());
        assert!(CpuModel::M68040.features().has(Feature::M68000));
        assert!(!CpuModel::M5208.features().has(Feature::M68000));
    }

    #[test]
    fn feature_gating_matches_generation() {
        let m68000 = CpuModel::M68000.features();
        let m68020 = CpuModel::M68020.features();
        let m68040 = CpuModel::M68040.features();
        assert!(!m68000.has(Feature::Bitfield));
        assert!(m68020.has(Feature::Bitfield));
        assert!(!m68020.has(Feature::Mmu040));
        assert!(m68040.has(Feature::Mmu040));
        assert!(m68040.has(Feature::Fpu));
    }
}
