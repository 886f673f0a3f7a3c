//! Observable implementation for the 680x0 core.

use emu_core::{Observable, Value};

use crate::cpu::M68kCpu;
use crate::flags::{CCR_C, CCR_N, CCR_V, CCR_X, CCR_Z};
use crate::registers::SpBank;

/// Query paths supported by the core.
const M68K_QUERY_PATHS: &[&str] = &[
    "d0", "d1", "d2", "d3", "d4", "d5", "d6", "d7",
    "a0", "a1", "a2", "a3", "a4", "a5", "a6", "a7",
    "usp", "ssp", "isp",
    "pc",
    "sr", "ccr",
    "flags.x", "flags.n", "flags.z", "flags.v", "flags.c",
    "flags.s", "flags.t",
    "int_mask",
    "vbr", "cacr", "sfc", "dfc",
    "fpcr", "fpsr", "fpiar",
    "macsr", "mac_mask",
    "acc0", "acc1", "acc2", "acc3",
    "mmu.tcr", "mmu.urp", "mmu.srp", "mmu.mmusr",
    "stopped",
];

impl Observable for M68kCpu {
    fn query(&self, path: &str) -> Option<Value> {
        let core = &self.core;
        if let Some(rest) = path.strip_prefix('d') {
            if let Ok(r) = rest.parse::<usize>() {
                if r < 8 {
                    return Some(core.d[r].into());
                }
            }
        }
        if let Some(rest) = path.strip_prefix('a') {
            if let Ok(r) = rest.parse::<usize>() {
                if r < 8 {
                    return Some(core.a[r].into());
                }
            }
        }
        if let Some(rest) = path.strip_prefix("acc") {
            if let Ok(r) = rest.parse::<usize>() {
                if r < 4 {
                    return Some(core.macc[r].into());
                }
            }
        }
        let ccr = core.cc.get_ccr();
        match path {
            "usp" => Some(core.sp_of(SpBank::User).into()),
            "ssp" => Some(core.sp_of(SpBank::Supervisor).into()),
            "isp" => Some(core.sp_of(SpBank::Interrupt).into()),
            "pc" => Some(core.pc.into()),
            "sr" => Some(core.sr().into()),
            "ccr" => Some(ccr.into()),
            "flags.x" => Some((ccr & CCR_X != 0).into()),
            "flags.n" => Some((ccr & CCR_N != 0).into()),
            "flags.z" => Some((ccr & CCR_Z != 0).into()),
            "flags.v" => Some((ccr & CCR_V != 0).into()),
            "flags.c" => Some((ccr & CCR_C != 0).into()),
            "flags.s" => Some(core.is_supervisor().into()),
            "flags.t" => Some(core.trace_enabled().into()),
            "int_mask" => Some(core.interrupt_mask().into()),
            "vbr" => Some(core.vbr.into()),
            "cacr" => Some(core.cacr.into()),
            "sfc" => Some(core.sfc.into()),
            "dfc" => Some(core.dfc.into()),
            "fpcr" => Some(core.fpcr.into()),
            "fpsr" => Some(core.fpsr.into()),
            "fpiar" => Some(core.fpiar.into()),
            "macsr" => Some(core.macsr.into()),
            "mac_mask" => Some(core.mac_mask.into()),
            "mmu.tcr" => Some(core.mmu.tcr.into()),
            "mmu.urp" => Some(core.mmu.urp.into()),
            "mmu.srp" => Some(core.mmu.srp.into()),
            "mmu.mmusr" => Some(core.mmu.mmusr.into()),
            "stopped" => Some(core.stopped.into()),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        M68K_QUERY_PATHS
    }
}
