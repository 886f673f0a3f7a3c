//! Architectural register file.
//!
//! Holds the integer registers, the status register's system byte, the
//! banked stack pointers, the control registers reachable through MOVEC,
//! and the FPU and MAC register files. The condition codes live in the
//! deferred [`crate::cc`] engine; [`CpuCore::sr`] materializes them only
//! when the full status register is read.
//!
//! `a[7]` always aliases the active stack pointer. Changing S or M swaps
//! the inactive value into its bank and pulls the newly selected one out,
//! so the three pointers survive mode changes exactly.

use crate::cc::CcState;
use crate::exception::Exception;
use crate::features::{CpuModel, Feature, FeatureSet};
use crate::flags::{SR_I, SR_I_SHIFT, SR_M, SR_S, SR_T};
use crate::mmu::Mmu;
use crate::softfloat::{FloatStatus, FloatX80, Precision, RoundingMode};

/// CACR bit enabling the separate user stack pointer on ColdFire.
pub const CACR_EUSP: u32 = 0x10;

/// Stack pointer banks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpBank {
    /// User stack pointer.
    User = 0,
    /// Interrupt stack pointer (68020+ with the M bit clear).
    Interrupt = 1,
    /// Supervisor/master stack pointer.
    Supervisor = 2,
}

/// The complete architectural state of one core.
#[derive(Debug)]
pub struct CpuCore {
    pub model: CpuModel,
    pub features: FeatureSet,
    pub d: [u32; 8],
    pub a: [u32; 8],
    pub pc: u32,
    pub cc: CcState,
    /// T/S/M/I bits of SR; the low byte lives in `cc`.
    sr_high: u16,
    sp_bank: [u32; 3],
    current_sp: SpBank,
    pub vbr: u32,
    pub cacr: u32,
    pub sfc: u32,
    pub dfc: u32,
    pub fregs: [FloatX80; 8],
    pub fpcr: u32,
    pub fpsr: u32,
    pub fpiar: u32,
    pub fp_status: FloatStatus,
    pub macc: [u64; 4],
    pub macsr: u32,
    pub mac_mask: u32,
    pub mmu: Mmu,
    /// Set by STOP; cleared when an interrupt is delivered.
    pub stopped: bool,
}

impl CpuCore {
    /// A core in its reset state: supervisor mode, interrupts masked.
    #[must_use]
    pub fn new(model: CpuModel) -> Self {
        Self {
            model,
            features: model.features(),
            d: [0; 8],
            a: [0; 8],
            pc: 0,
            cc: CcState::default(),
            sr_high: SR_S | SR_I,
            sp_bank: [0; 3],
            current_sp: SpBank::Supervisor,
            vbr: 0,
            cacr: 0,
            sfc: 0,
            dfc: 0,
            fregs: [FloatX80::DEFAULT_NAN; 8],
            fpcr: 0,
            fpsr: 0,
            fpiar: 0,
            fp_status: FloatStatus::default(),
            macc: [0; 4],
            macsr: 0,
            mac_mask: u32::MAX,
            mmu: Mmu::new(),
            stopped: false,
        }
    }

    // === Status register ===

    /// The full 16-bit SR, materializing the condition codes.
    #[must_use]
    pub fn sr(&self) -> u16 {
        self.sr_high | u16::from(self.cc.get_ccr())
    }

    /// Replace the full SR, switching stack pointers if S or M changed.
    pub fn set_sr(&mut self, sr: u16) {
        self.cc.set_ccr(sr as u8);
        self.set_sr_system(sr);
    }

    /// Replace only the system byte, leaving the condition codes alone.
    pub fn set_sr_system(&mut self, sr: u16) {
        self.sr_high = sr & (SR_T | SR_S | SR_M | SR_I);
        self.switch_sp();
    }

    #[must_use]
    pub fn sr_system(&self) -> u16 {
        self.sr_high
    }

    #[must_use]
    pub fn is_supervisor(&self) -> bool {
        self.sr_high & SR_S != 0
    }

    #[must_use]
    pub fn trace_enabled(&self) -> bool {
        self.sr_high & SR_T != 0
    }

    /// The 3-bit interrupt priority mask.
    #[must_use]
    pub fn interrupt_mask(&self) -> u8 {
        ((self.sr_high & SR_I) >> SR_I_SHIFT) as u8
    }

    // === Stack pointer banking ===

    fn selected_bank(&self) -> SpBank {
        if self.features.has(Feature::M68000) {
            if self.sr_high & SR_S == 0 {
                SpBank::User
            } else if !self.features.has(Feature::MasterStack) || self.sr_high & SR_M != 0 {
                SpBank::Supervisor
            } else {
                SpBank::Interrupt
            }
        } else {
            // ColdFire has one hardware SP unless CACR enables the USP.
            if self.sr_high & SR_S != 0 && self.cacr & CACR_EUSP != 0 {
                SpBank::Supervisor
            } else {
                SpBank::User
            }
        }
    }

    /// Park `a7` in its bank and activate the bank the mode bits select.
    pub fn switch_sp(&mut self) {
        self.sp_bank[self.current_sp as usize] = self.a[7];
        let new = self.selected_bank();
        self.a[7] = self.sp_bank[new as usize];
        self.current_sp = new;
    }

    /// Read a specific bank, seeing through the `a7` alias.
    #[must_use]
    pub fn sp_of(&self, bank: SpBank) -> u32 {
        if bank == self.current_sp {
            self.a[7]
        } else {
            self.sp_bank[bank as usize]
        }
    }

    /// Write a specific bank, seeing through the `a7` alias.
    pub fn set_sp_of(&mut self, bank: SpBank, value: u32) {
        if bank == self.current_sp {
            self.a[7] = value;
        } else {
            self.sp_bank[bank as usize] = value;
        }
    }

    // === FPU control ===

    /// Write FPCR, decoding the rounding control into the float status.
    pub fn set_fpcr(&mut self, value: u32) {
        self.fpcr = value & 0xFFFF;
        self.fp_status.rounding = RoundingMode::from_fpcr(value);
        self.fp_status.precision = Precision::from_fpcr(value);
    }

    // === MOVEC control registers ===

    /// MOVEC to a control register.
    pub fn movec_write(&mut self, reg: u16, value: u32) -> Result<(), Exception> {
        match reg {
            0x000 => self.sfc = value & 7,
            0x001 => self.dfc = value & 7,
            0x002 => {
                self.cacr = value;
                // EUSP may have changed which SP is live.
                self.switch_sp();
            }
            0x003 if self.features.has(Feature::Mmu040) => self.mmu.tcr = value & 0xC000,
            0x004 if self.features.has(Feature::Mmu040) => self.mmu.ittr[0] = value,
            0x005 if self.features.has(Feature::Mmu040) => self.mmu.ittr[1] = value,
            0x006 if self.features.has(Feature::Mmu040) => self.mmu.dttr[0] = value,
            0x007 if self.features.has(Feature::Mmu040) => self.mmu.dttr[1] = value,
            0x800 => self.set_sp_of(SpBank::User, value),
            0x801 => self.vbr = value,
            0x802 => {
                // CAAR: accepted, no cache model behind it.
            }
            0x803 if self.features.has(Feature::MasterStack) => {
                self.set_sp_of(SpBank::Supervisor, value);
            }
            0x804 if self.features.has(Feature::MasterStack) => {
                self.set_sp_of(SpBank::Interrupt, value);
            }
            0x805 if self.features.has(Feature::Mmu040) => self.mmu.mmusr = value,
            0x806 if self.features.has(Feature::Mmu040) => self.mmu.urp = value,
            0x807 if self.features.has(Feature::Mmu040) => self.mmu.srp = value,
            _ => return Err(Exception::Illegal),
        }
        Ok(())
    }

    /// MOVEC from a control register.
    pub fn movec_read(&self, reg: u16) -> Result<u32, Exception> {
        Ok(match reg {
            0x000 => self.sfc,
            0x001 => self.dfc,
            0x002 => self.cacr,
            0x003 if self.features.has(Feature::Mmu040) => self.mmu.tcr,
            0x004 if self.features.has(Feature::Mmu040) => self.mmu.ittr[0],
            0x005 if self.features.has(Feature::Mmu040) => self.mmu.ittr[1],
            0x006 if self.features.has(Feature::Mmu040) => self.mmu.dttr[0],
            0x007 if self.features.has(Feature::Mmu040) => self.mmu.dttr[1],
            0x800 => self.sp_of(SpBank::User),
            0x801 => self.vbr,
            0x802 => 0,
            0x803 if self.features.has(Feature::MasterStack) => self.sp_of(SpBank::Supervisor),
            0x804 if self.features.has(Feature::MasterStack) => self.sp_of(SpBank::Interrupt),
            0x805 if self.features.has(Feature::Mmu040) => self.mmu.mmusr,
            0x806 if self.features.has(Feature::Mmu040) => self.mmu.urp,
            0x807 if self.features.has(Feature::Mmu040) => self.mmu.srp,
            _ => return Err(Exception::Illegal),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_change_swaps_stack_pointers() {
        let mut core = CpuCore::new(CpuModel::M68010);
        core.a[7] = 0x4000; // supervisor stack
        core.set_sp_of(SpBank::User, 0x8000);
        core.set_sr(core.sr() & !SR_S);
        assert_eq!(core.a[7], 0x8000);
        core.a[7] = 0x7FF0;
        core.set_sr(core.sr() | SR_S);
        assert_eq!(core.a[7], 0x4000);
        assert_eq!(core.sp_of(SpBank::User), 0x7FF0);
    }

    #[test]
    fn master_bit_selects_between_isp_and_msp() {
        let mut core = CpuCore::new(CpuModel::M68020);
        core.a[7] = 0x1000; // reset state selects the supervisor bank
        core.set_sp_of(SpBank::Interrupt, 0x2000);
        core.set_sr_system(SR_S); // M clear: interrupt stack
        assert_eq!(core.a[7], 0x2000);
        core.set_sr_system(SR_S | SR_M);
        assert_eq!(core.a[7], 0x1000);
    }

    #[test]
    fn movec_gates_registers_by_feature() {
        let mut core = CpuCore::new(CpuModel::M68010);
        assert!(core.movec_write(0x801, 0x100).is_ok());
        assert_eq!(core.movec_read(0x801), Ok(0x100));
        // No MMU on a 68010.
        assert_eq!(core.movec_write(0x806, 1), Err(Exception::Illegal));
        let mut core40 = CpuCore::new(CpuModel::M68040);
        assert!(core40.movec_write(0x806, 0x1000).is_ok());
        assert_eq!(core40.movec_read(0x806), Ok(0x1000));
    }

    #[test]
    fn sr_round_trips_through_the_lazy_ccr() {
        let mut core = CpuCore::new(CpuModel::M68000);
        core.set_sr(0x2715);
        assert_eq!(core.sr(), 0x2715);
        assert_eq!(core.interrupt_mask(), 7);
        assert!(core.is_supervisor());
    }
}
