//! 68040-style paged MMU.
//!
//! Translation first consults the four transparent translation registers,
//! then walks a three-level table: root (7 index bits), pointer (7 bits),
//! page (6 bits for 4K pages, 5 for 8K). The walker maintains the table's
//! U (used) bit lazily at every level and the M (modified) bit on stores,
//! honors write protection at any level, and caches successful results in a
//! software ATC. PTEST runs the same walk with all side effects suppressed
//! and reports into MMUSR.
//!
//! A failed translation records the fault address and special status word
//! here; exception delivery copies them into the format 7 frame.

use std::collections::HashMap;

use emu_core::{AccessClass, Bus};
use log::trace;

use crate::exception::Exception;

// === Access attribute flags ===

/// Attributes of the access being translated.
pub mod access {
    pub const STORE: u8 = 0x01;
    pub const CODE: u8 = 0x02;
    pub const SUPER: u8 = 0x04;
    /// PTEST walk: report into MMUSR, no U/M updates, no fault.
    pub const PTEST: u8 = 0x08;
    /// Debugger walk: no side effects at all.
    pub const DEBUG: u8 = 0x10;
}

// === Page permission bits ===

pub const PROT_READ: u8 = 1;
pub const PROT_WRITE: u8 = 2;
pub const PROT_EXEC: u8 = 4;

// === Register layouts ===

/// TCR: translation enable.
pub const TCR_ENABLED: u32 = 0x8000;
/// TCR: 8K page size (4K when clear).
pub const TCR_PAGE_8K: u32 = 0x4000;

const TTR_ADDR_BASE: u32 = 0xFF00_0000;
const TTR_ADDR_MASK: u32 = 0x00FF_0000;
const TTR_ENABLED: u32 = 0x0000_8000;
const TTR_SFIELD: u32 = 0x0000_6000;
const TTR_SFIELD_USER: u32 = 0x0000_0000;
const TTR_SFIELD_SUPER: u32 = 0x0000_2000;

// Descriptor bits shared by all table levels.
const DESC_WRITEPROT: u32 = 0x0004;
const DESC_USED: u32 = 0x0008;
const DESC_MODIFIED: u32 = 0x0010;
const DESC_SUPERONLY: u32 = 0x0080;
const DESC_GLOBAL: u32 = 0x0400;

const fn udt_valid(desc: u32) -> bool {
    desc & 2 != 0
}

const fn pdt_valid(desc: u32) -> bool {
    desc & 3 != 0
}

const fn pdt_indirect(desc: u32) -> bool {
    desc & 3 == 2
}

// MMUSR bits reported by PTEST.
pub const MMUSR_BUS_ERROR: u32 = 0x0800;
pub const MMUSR_GLOBAL: u32 = 0x0400;
pub const MMUSR_SUPERONLY: u32 = 0x0080;
pub const MMUSR_MODIFIED: u32 = 0x0010;
pub const MMUSR_WRITEPROT: u32 = 0x0004;
pub const MMUSR_TRANSPARENT: u32 = 0x0002;
pub const MMUSR_RESIDENT: u32 = 0x0001;
/// Descriptor bits PTEST copies into MMUSR verbatim.
const MMUSR_DESC_MASK: u32 = 0x0774;

// Special status word bits for the format 7 access fault frame.
pub const SSW_ATC: u32 = 0x0400;
pub const SSW_READ: u32 = 0x0100;
const SSW_SIZE_BYTE: u32 = 0x0020;
const SSW_SIZE_WORD: u32 = 0x0040;
const SSW_SIZE_LONG: u32 = 0x0000;
const SSW_TM_DATA: u32 = 0x0001;
const SSW_TM_CODE: u32 = 0x0002;
const SSW_TM_SUPER: u32 = 0x0004;

/// A cached translation.
#[derive(Debug, Clone, Copy)]
struct AtcEntry {
    phys_page: u32,
    prot: u8,
    global: bool,
    /// The walk that filled this entry set the descriptor's M bit.
    modified: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct AtcKey {
    page: u32,
    supervisor: bool,
}

/// MMU register file, fault latch, and software ATC.
#[derive(Debug, Default)]
pub struct Mmu {
    pub tcr: u32,
    pub srp: u32,
    pub urp: u32,
    pub mmusr: u32,
    pub ittr: [u32; 2],
    pub dttr: [u32; 2],
    /// Set while an access fault is being delivered; a second fault while
    /// set is a double fault.
    pub fault: bool,
    /// Faulting logical address, stacked in the format 7 frame.
    pub ar: u32,
    /// Special status word for the format 7 frame.
    pub ssw: u32,
    atc: HashMap<AtcKey, AtcEntry>,
}

/// Result of a successful table walk.
#[derive(Debug, Clone, Copy)]
struct Walk {
    phys: u32,
    prot: u8,
    global: bool,
}

impl Mmu {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True when paged translation is switched on.
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.tcr & TCR_ENABLED != 0
    }

    fn page_shift(&self) -> u32 {
        if self.tcr & TCR_PAGE_8K != 0 { 13 } else { 12 }
    }

    /// Drop every cached translation.
    pub fn flush_atc(&mut self) {
        self.atc.clear();
    }

    /// Drop cached translations that are not marked global.
    pub fn flush_atc_nonglobal(&mut self) {
        self.atc.retain(|_, e| e.global);
    }

    /// Drop the cached translation for one page.
    pub fn flush_page(&mut self, addr: u32, supervisor: bool, nonglobal_only: bool) {
        let key = AtcKey {
            page: addr >> self.page_shift(),
            supervisor,
        };
        if nonglobal_only {
            if let Some(e) = self.atc.get(&key) {
                if !e.global {
                    self.atc.remove(&key);
                }
            }
        } else {
            self.atc.remove(&key);
        }
    }

    fn check_ttr(ttr: u32, addr: u32, acc: u8) -> Option<u8> {
        if ttr & TTR_ENABLED == 0 {
            return None;
        }
        match ttr & TTR_SFIELD {
            TTR_SFIELD_USER => {
                if acc & access::SUPER != 0 {
                    return None;
                }
            }
            TTR_SFIELD_SUPER => {
                if acc & access::SUPER == 0 {
                    return None;
                }
            }
            _ => {}
        }
        let base = ttr & TTR_ADDR_BASE;
        // Set mask-field bits mark address bits as "don't care".
        let mask = ((ttr & TTR_ADDR_MASK) ^ TTR_ADDR_MASK) << 8;
        if addr & mask != base & mask {
            return None;
        }
        let mut prot = PROT_READ | PROT_EXEC;
        if ttr & DESC_WRITEPROT == 0 {
            prot |= PROT_WRITE;
        }
        Some(prot)
    }

    /// Translate a logical address, taking all architectural side effects.
    ///
    /// `size_bytes` is only used to label the special status word if the
    /// translation faults.
    pub fn translate<B: Bus>(
        &mut self,
        bus: &mut B,
        addr: u32,
        acc: u8,
        size_bytes: u32,
    ) -> Result<u32, Exception> {
        if !self.enabled() {
            return Ok(addr);
        }

        // Transparent translation windows bypass the tables entirely.
        let ttrs = if acc & access::CODE != 0 {
            &self.ittr
        } else {
            &self.dttr
        };
        for &ttr in ttrs {
            if let Some(prot) = Self::check_ttr(ttr, addr, acc) {
                if acc & access::STORE != 0 && prot & PROT_WRITE == 0 {
                    return Err(self.latch_fault(addr, acc, size_bytes));
                }
                return Ok(addr);
            }
        }

        let shift = self.page_shift();
        let store = acc & access::STORE != 0;
        let key = AtcKey {
            page: addr >> shift,
            supervisor: acc & access::SUPER != 0,
        };
        if let Some(entry) = self.atc.get(&key) {
            let needed = if store {
                PROT_WRITE
            } else if acc & access::CODE != 0 {
                PROT_EXEC
            } else {
                PROT_READ
            };
            // The first store through an entry cached by a read must rewalk
            // so the page descriptor's M bit gets set.
            if entry.prot & needed != 0 && (!store || entry.modified) {
                return Ok((entry.phys_page << shift) | (addr & ((1 << shift) - 1)));
            }
            // Insufficient rights or unset M; rewalk.
        }

        match self.walk(bus, addr, acc) {
            Ok(Some(walk)) => {
                self.atc.insert(
                    key,
                    AtcEntry {
                        phys_page: walk.phys >> shift,
                        prot: walk.prot,
                        global: walk.global,
                        modified: store,
                    },
                );
                Ok(walk.phys)
            }
            Ok(None) => Err(self.latch_fault(addr, acc, size_bytes)),
            Err(table_addr) => {
                trace!("mmu: table fetch failed at {table_addr:#010x}");
                Err(self.latch_fault(addr, acc, size_bytes))
            }
        }
    }

    /// PTEST: walk without side effects and report into MMUSR.
    pub fn ptest<B: Bus>(&mut self, bus: &mut B, addr: u32, acc: u8) {
        self.mmusr = 0;
        let acc = acc | access::PTEST;

        let ttrs = if acc & access::CODE != 0 {
            &self.ittr
        } else {
            &self.dttr
        };
        for &ttr in ttrs {
            if Self::check_ttr(ttr, addr, acc).is_some() {
                self.mmusr = MMUSR_TRANSPARENT | MMUSR_RESIDENT;
                return;
            }
        }

        match self.walk(bus, addr, acc) {
            Ok(Some(_)) => {
                // walk() filled MMUSR on the PTEST path.
            }
            Ok(None) => {
                // Invalid translation: MMUSR keeps whatever the walk set,
                // with the resident bit clear.
                self.mmusr &= !MMUSR_RESIDENT;
            }
            Err(_) => {
                self.mmusr = MMUSR_BUS_ERROR;
            }
        }
    }

    /// The three-level table walk.
    ///
    /// `Ok(Some)` is a valid translation, `Ok(None)` an invalid or protected
    /// page, `Err(addr)` a bus error while fetching a descriptor.
    fn walk<B: Bus>(&mut self, bus: &mut B, addr: u32, acc: u8) -> Result<Option<Walk>, u32> {
        let side_effects = acc & (access::PTEST | access::DEBUG) == 0;
        let ptest = acc & access::PTEST != 0;
        let store = acc & access::STORE != 0;
        let mut writable = true;

        let root = if acc & access::SUPER != 0 {
            self.srp
        } else {
            self.urp
        };

        // Root level: 7 index bits from address bits 31-25.
        let mut entry = (root & !0x1FF) | ((addr >> 23) & 0x1FC);
        let mut next = self.load_desc(bus, entry)?;
        if !udt_valid(next) {
            return Ok(None);
        }
        if side_effects && next & DESC_USED == 0 {
            self.store_desc(bus, entry, next | DESC_USED)?;
        }
        if next & DESC_WRITEPROT != 0 {
            writable = false;
            if ptest {
                self.mmusr |= MMUSR_WRITEPROT;
            }
            if store && !ptest {
                return Ok(None);
            }
        }

        // Pointer level: 7 index bits from address bits 24-18.
        entry = (next & !0x1FF) | ((addr >> 16) & 0x1FC);
        next = self.load_desc(bus, entry)?;
        if !udt_valid(next) {
            return Ok(None);
        }
        if side_effects && next & DESC_USED == 0 {
            self.store_desc(bus, entry, next | DESC_USED)?;
        }
        if next & DESC_WRITEPROT != 0 {
            writable = false;
            if ptest {
                self.mmusr |= MMUSR_WRITEPROT;
            }
            if store && !ptest {
                return Ok(None);
            }
        }

        // Page level: index width depends on the page size.
        let shift = self.page_shift();
        entry = if shift == 13 {
            (next & !0x7F) | ((addr >> 11) & 0x7C)
        } else {
            (next & !0xFF) | ((addr >> 10) & 0xFC)
        };
        next = self.load_desc(bus, entry)?;
        if !pdt_valid(next) {
            return Ok(None);
        }
        if pdt_indirect(next) {
            entry = next & !3;
            next = self.load_desc(bus, entry)?;
            if !pdt_valid(next) || pdt_indirect(next) {
                return Ok(None);
            }
        }

        if side_effects {
            if store && next & DESC_WRITEPROT == 0 {
                if next & (DESC_USED | DESC_MODIFIED) != (DESC_USED | DESC_MODIFIED) {
                    self.store_desc(bus, entry, next | DESC_USED | DESC_MODIFIED)?;
                }
            } else if next & DESC_USED == 0 {
                self.store_desc(bus, entry, next | DESC_USED)?;
            }
        }

        let page_mask = (1u32 << shift) - 1;
        let phys = (next & !page_mask) | (addr & page_mask);

        if ptest {
            self.mmusr |= next & MMUSR_DESC_MASK;
            self.mmusr |= phys & !page_mask;
            self.mmusr |= MMUSR_RESIDENT;
        }

        if next & DESC_WRITEPROT != 0 {
            writable = false;
            if ptest {
                self.mmusr |= MMUSR_WRITEPROT;
            }
            if store && !ptest {
                return Ok(None);
            }
        }
        if next & DESC_SUPERONLY != 0 && acc & access::SUPER == 0 {
            if ptest {
                self.mmusr |= MMUSR_SUPERONLY;
            }
            if !ptest {
                return Ok(None);
            }
        }

        let mut prot = PROT_READ | PROT_EXEC;
        if writable {
            prot |= PROT_WRITE;
        }
        Ok(Some(Walk {
            phys,
            prot,
            global: next & DESC_GLOBAL != 0,
        }))
    }

    fn load_desc<B: Bus>(&self, bus: &mut B, entry: u32) -> Result<u32, u32> {
        bus.read_long(entry, AccessClass::SupervisorData)
            .map_err(|e| e.addr())
    }

    fn store_desc<B: Bus>(&self, bus: &mut B, entry: u32, value: u32) -> Result<(), u32> {
        bus.write_long(entry, value, AccessClass::SupervisorData)
            .map_err(|e| e.addr())
    }

    /// A device signaled a bus error on a translated access. Same frame
    /// machinery as an ATC miss, without the ATC bit.
    pub fn latch_bus_fault(&mut self, addr: u32, acc: u8, size_bytes: u32) -> Exception {
        let e = self.latch_fault(addr, acc, size_bytes);
        self.ssw &= !SSW_ATC;
        if let Exception::Access { addr, ssw: _ } = e {
            Exception::Access {
                addr,
                ssw: self.ssw,
            }
        } else {
            e
        }
    }

    /// Record fault state and build the access fault exception.
    fn latch_fault(&mut self, addr: u32, acc: u8, size_bytes: u32) -> Exception {
        let mut ssw = SSW_ATC;
        ssw |= match size_bytes {
            1 => SSW_SIZE_BYTE,
            2 => SSW_SIZE_WORD,
            _ => SSW_SIZE_LONG,
        };
        if acc & access::STORE == 0 {
            ssw |= SSW_READ;
        }
        if acc & access::SUPER != 0 {
            ssw |= SSW_TM_SUPER;
        }
        if acc & access::CODE != 0 {
            ssw |= SSW_TM_CODE;
        } else {
            ssw |= SSW_TM_DATA;
        }
        self.mmusr = 0;
        self.ar = addr;
        self.ssw = ssw;
        Exception::Access { addr, ssw }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emu_core::LinearMemory;

    // Builds a table set mapping logical 0x0000_0000.. onto itself plus one
    // remapped page, with tables at 0x1000/0x2000/0x3000.
    fn fixture() -> (Mmu, LinearMemory) {
        let mut mem = LinearMemory::new(0x20000);
        let mut mmu = Mmu::new();
        mmu.tcr = TCR_ENABLED;
        mmu.srp = 0x1000;
        mmu.urp = 0x1000;
        // Root entry 0 -> pointer table at 0x2000, valid.
        mem.write_long(0x1000, 0x2000 | 2, AccessClass::SupervisorData)
            .unwrap();
        // Pointer entry 0 -> page table at 0x3000, valid.
        mem.write_long(0x2000, 0x3000 | 2, AccessClass::SupervisorData)
            .unwrap();
        // Page 0 -> physical 0x10000, resident.
        mem.write_long(0x3000, 0x10000 | 1, AccessClass::SupervisorData)
            .unwrap();
        // Page 1 (logical 0x1000) -> physical 0x11000, write-protected.
        mem.write_long(0x3004, 0x11000 | DESC_WRITEPROT | 1, AccessClass::SupervisorData)
            .unwrap();
        (mmu, mem)
    }

    #[test]
    fn walk_translates_and_sets_used_bits() {
        let (mut mmu, mut mem) = fixture();
        let phys = mmu
            .translate(&mut mem, 0x0123, access::SUPER, 4)
            .unwrap();
        assert_eq!(phys, 0x10123);
        // U set at every level.
        for entry in [0x1000u32, 0x2000, 0x3000] {
            let desc = mem.read_long(entry, AccessClass::SupervisorData).unwrap();
            assert_ne!(desc & DESC_USED, 0, "U bit at {entry:#x}");
        }
        // No M bit on a read.
        let desc = mem.read_long(0x3000, AccessClass::SupervisorData).unwrap();
        assert_eq!(desc & DESC_MODIFIED, 0);
    }

    #[test]
    fn store_sets_modified_bit() {
        let (mut mmu, mut mem) = fixture();
        mmu.translate(&mut mem, 0x0040, access::SUPER | access::STORE, 2)
            .unwrap();
        let desc = mem.read_long(0x3000, AccessClass::SupervisorData).unwrap();
        assert_ne!(desc & DESC_MODIFIED, 0);
    }

    #[test]
    fn store_after_cached_read_still_sets_modified() {
        let (mut mmu, mut mem) = fixture();
        mmu.translate(&mut mem, 0x0040, access::SUPER, 4).unwrap();
        let desc = mem.read_long(0x3000, AccessClass::SupervisorData).unwrap();
        assert_eq!(desc & DESC_MODIFIED, 0);
        // The store hits the read-cached entry but must still rewalk.
        mmu.translate(&mut mem, 0x0040, access::SUPER | access::STORE, 4)
            .unwrap();
        let desc = mem.read_long(0x3000, AccessClass::SupervisorData).unwrap();
        assert_ne!(desc & DESC_MODIFIED, 0);
        // Later stores are served from the cache.
        mem.write_long(0x1000, 0, AccessClass::SupervisorData).unwrap();
        assert!(mmu
            .translate(&mut mem, 0x0044, access::SUPER | access::STORE, 4)
            .is_ok());
    }

    #[test]
    fn write_protected_page_faults_on_store_only() {
        let (mut mmu, mut mem) = fixture();
        assert!(mmu.translate(&mut mem, 0x1010, access::SUPER, 4).is_ok());
        let err = mmu
            .translate(&mut mem, 0x1010, access::SUPER | access::STORE, 4)
            .unwrap_err();
        match err {
            Exception::Access { addr, ssw } => {
                assert_eq!(addr, 0x1010);
                assert_eq!(ssw & SSW_READ, 0);
                assert_ne!(ssw & SSW_ATC, 0);
            }
            other => panic!("unexpected exception {other:?}"),
        }
        assert_eq!(mmu.ar, 0x1010);
    }

    #[test]
    fn invalid_root_entry_faults_with_read_ssw() {
        let (mut mmu, mut mem) = fixture();
        // Logical addresses above bit 25 hit root entry 1, which is invalid.
        let err = mmu
            .translate(&mut mem, 0x0200_0000, access::SUPER, 1)
            .unwrap_err();
        match err {
            Exception::Access { ssw, .. } => {
                assert_ne!(ssw & SSW_READ, 0);
                assert_eq!(ssw & 0x0060, SSW_SIZE_BYTE);
            }
            other => panic!("unexpected exception {other:?}"),
        }
    }

    #[test]
    fn ptest_reports_resident_without_touching_tables() {
        let (mut mmu, mut mem) = fixture();
        mmu.ptest(&mut mem, 0x0000, access::SUPER);
        assert_ne!(mmu.mmusr & MMUSR_RESIDENT, 0);
        assert_eq!(mmu.mmusr & 0xFFFF_F000, 0x10000 & 0xFFFF_F000);
        // No U bits were written.
        let desc = mem.read_long(0x1000, AccessClass::SupervisorData).unwrap();
        assert_eq!(desc & DESC_USED, 0);
    }

    #[test]
    fn ptest_reports_write_protect() {
        let (mut mmu, mut mem) = fixture();
        mmu.ptest(&mut mem, 0x1000, access::SUPER | access::STORE);
        assert_ne!(mmu.mmusr & MMUSR_WRITEPROT, 0);
        assert_ne!(mmu.mmusr & MMUSR_RESIDENT, 0);
    }

    #[test]
    fn ptest_masks_the_physical_field_by_page_size() {
        let (mut mmu, mut mem) = fixture();
        mmu.tcr = TCR_ENABLED | TCR_PAGE_8K;
        mmu.ptest(&mut mem, 0x1000, access::SUPER);
        assert_ne!(mmu.mmusr & MMUSR_RESIDENT, 0);
        // Offset bit 12 of the 8K page must not leak into the field.
        assert_eq!(mmu.mmusr & 0xFFFF_F000, 0x10000);
    }

    #[test]
    fn atc_caches_until_flushed() {
        let (mut mmu, mut mem) = fixture();
        mmu.translate(&mut mem, 0x0000, access::SUPER, 4).unwrap();
        // Break the tables; the cached entry still answers.
        mem.write_long(0x1000, 0, AccessClass::SupervisorData).unwrap();
        assert_eq!(
            mmu.translate(&mut mem, 0x0004, access::SUPER, 4).unwrap(),
            0x10004
        );
        mmu.flush_atc();
        assert!(mmu.translate(&mut mem, 0x0004, access::SUPER, 4).is_err());
    }

    #[test]
    fn transparent_window_bypasses_tables() {
        let (mut mmu, mut mem) = fixture();
        // Map the top 16M transparently for supervisor accesses.
        mmu.dttr[0] = 0xFF00_0000 | TTR_ENABLED | TTR_SFIELD_SUPER;
        assert_eq!(
            mmu.translate(&mut mem, 0xFF12_3456, access::SUPER, 4).unwrap(),
            0xFF12_3456
        );
    }
}
