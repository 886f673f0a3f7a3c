//! Opcode decode tables.
//!
//! Every 16-bit opcode word maps to one [`Op`] tag naming its handler; the
//! executor dispatches on the tag and re-reads the register/mode fields from
//! the opcode word itself. The table is built once per feature set by
//! painting pattern rules into a 65,536-entry array in declaration order,
//! so a later, more specific rule overrides an earlier blanket one. Rules
//! gated on a feature the core lacks are skipped, which is how ColdFire and
//! classic encodings share the table without colliding.
//!
//! Built tables are immutable and shared; cores with the same feature set
//! get the same `Arc`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use crate::features::{Feature, FeatureSet};

/// Handler tags. One per distinct instruction family; operand fields are
/// decoded from the opcode word by the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// Unassigned encoding; raises an illegal-instruction exception
    /// (or the line A/F emulator traps for those prefixes).
    Undef,
    /// The official ILLEGAL opcode, 0x4AFC.
    Illegal,
    ArithIm,
    Chk2,
    Bitrev,
    Byterev,
    Ff1,
    BitopReg,
    BitopIm,
    Cas,
    Cas2Word,
    Cas2Long,
    Move,
    Chk,
    Strldsr,
    Negx,
    MoveFromSr,
    Lea,
    Clr,
    MoveFromCcr,
    Neg,
    Not,
    MoveToCcr,
    MoveToSr,
    Nbcd,
    LinkLong,
    Pea,
    Swap,
    Bkpt,
    Movem,
    Ext,
    Tst,
    Tas,
    Halt,
    Pulse,
    MulLong,
    DivLong,
    Sats,
    Trap,
    Link,
    Unlk,
    MoveToUsp,
    MoveFromUsp,
    Reset,
    Nop,
    Stop,
    Rte,
    Rtd,
    Rts,
    Trapv,
    Rtr,
    Movec,
    Jump,
    AddSubQ,
    Scc,
    Dbcc,
    TrapCc,
    Tpf,
    Branch,
    Moveq,
    Mvzs,
    Or,
    DivWord,
    SbcdReg,
    SbcdMem,
    AddSub,
    SubxReg,
    SubxMem,
    SubA,
    UndefMac,
    Mac,
    FromMac,
    MoveMac,
    FromMacsr,
    FromMask,
    FromMext,
    MacsrToCcr,
    ToMac,
    ToMacsr,
    ToMext,
    ToMask,
    Mov3q,
    Cmp,
    CmpA,
    CmpM,
    Eor,
    And,
    ExgDd,
    ExgAa,
    ExgDa,
    MulWord,
    AbcdReg,
    AbcdMem,
    AddxReg,
    AddxMem,
    AddA,
    ShiftIm,
    ShiftReg,
    Shift8Im,
    Shift16Im,
    Shift8Reg,
    Shift16Reg,
    ShiftMem,
    RotateIm,
    Rotate8Im,
    Rotate16Im,
    RotateReg,
    Rotate8Reg,
    Rotate16Reg,
    RotateMem,
    BfextMem,
    BfextReg,
    BfinsMem,
    BfinsReg,
    BfopMem,
    BfopReg,
    Fpu,
    FScc,
    FTrapCc,
    FBcc,
    FSave,
    FRestore,
    Intouch,
    Cinv,
    Cpush,
    Cpushl,
    Pflush,
    Ptest,
    Wddata,
    Wdebug,
}

struct Rule {
    value: u16,
    mask: u16,
    feature: Option<Feature>,
    op: Op,
}

const fn base(value: u16, mask: u16, op: Op) -> Rule {
    Rule {
        value,
        mask,
        feature: None,
        op,
    }
}

const fn insn(value: u16, mask: u16, feature: Feature, op: Op) -> Rule {
    Rule {
        value,
        mask,
        feature: Some(feature),
        op,
    }
}

/// The pattern rules, in paint order.
#[rustfmt::skip]
fn rules() -> Vec<Rule> {
    use Feature::{
        Bccl, Bitfield, Bral, CfEmac, CfFpu, CfIsaA, CfIsaAplusC, CfIsaB, LongMuldiv, M68000,
        Mmu040, Usp,
    };
    use Op::*;
    vec![
    base(0x0000, 0x0000, Undef),
    insn(0x0080, 0xFFF8, CfIsaA, ArithIm),
    insn(0x0000, 0xFF00, M68000, ArithIm),
    insn(0x00C0, 0xFFC0, M68000, Undef),
    insn(0x00C0, 0xFFF8, CfIsaAplusC, Bitrev),
    insn(0x00C0, 0xF9C0, Feature::Chk2, Op::Chk2),
    base(0x0100, 0xF1C0, BitopReg),
    base(0x0140, 0xF1C0, BitopReg),
    base(0x0180, 0xF1C0, BitopReg),
    base(0x01C0, 0xF1C0, BitopReg),
    insn(0x0280, 0xFFF8, CfIsaA, ArithIm),
    insn(0x0200, 0xFF00, M68000, ArithIm),
    insn(0x02C0, 0xFFC0, M68000, Undef),
    insn(0x02C0, 0xFFF8, CfIsaAplusC, Byterev),
    insn(0x0480, 0xFFF8, CfIsaA, ArithIm),
    insn(0x0400, 0xFF00, M68000, ArithIm),
    insn(0x04C0, 0xFFC0, M68000, Undef),
    insn(0x0600, 0xFF00, M68000, ArithIm),
    insn(0x06C0, 0xFFC0, M68000, Undef),
    insn(0x04C0, 0xFFF8, CfIsaAplusC, Ff1),
    insn(0x0680, 0xFFF8, CfIsaA, ArithIm),
    insn(0x0C00, 0xFF38, CfIsaA, ArithIm),
    insn(0x0C00, 0xFF00, M68000, ArithIm),
    base(0x0800, 0xFFC0, BitopIm),
    base(0x0840, 0xFFC0, BitopIm),
    base(0x0880, 0xFFC0, BitopIm),
    base(0x08C0, 0xFFC0, BitopIm),
    insn(0x0A80, 0xFFF8, CfIsaA, ArithIm),
    insn(0x0A00, 0xFF00, M68000, ArithIm),
    insn(0x0AC0, 0xFFC0, Feature::Cas, Op::Cas),
    insn(0x0CC0, 0xFFC0, Feature::Cas, Op::Cas),
    insn(0x0EC0, 0xFFC0, Feature::Cas, Op::Cas),
    insn(0x0CFC, 0xFFFF, Feature::Cas, Cas2Word),
    insn(0x0EFC, 0xFFFF, Feature::Cas, Cas2Long),
    base(0x1000, 0xF000, Move),
    base(0x2000, 0xF000, Move),
    base(0x3000, 0xF000, Move),
    insn(0x4000, 0xF040, M68000, Op::Chk),
    insn(0x40E7, 0xFFFF, CfIsaAplusC, Strldsr),
    insn(0x4080, 0xFFF8, CfIsaA, Negx),
    insn(0x4000, 0xFF00, M68000, Negx),
    insn(0x40C0, 0xFFC0, M68000, Undef),
    insn(0x40C0, 0xFFF8, CfIsaA, MoveFromSr),
    insn(0x40C0, 0xFFC0, M68000, MoveFromSr),
    base(0x41C0, 0xF1C0, Lea),
    base(0x4200, 0xFF00, Clr),
    base(0x42C0, 0xFFC0, Undef),
    insn(0x42C0, 0xFFF8, CfIsaA, MoveFromCcr),
    insn(0x42C0, 0xFFC0, M68000, MoveFromCcr),
    insn(0x4480, 0xFFF8, CfIsaA, Neg),
    insn(0x4400, 0xFF00, M68000, Neg),
    insn(0x44C0, 0xFFC0, M68000, Undef),
    base(0x44C0, 0xFFC0, MoveToCcr),
    insn(0x4680, 0xFFF8, CfIsaA, Not),
    insn(0x4600, 0xFF00, M68000, Not),
    insn(0x46C0, 0xFFC0, M68000, Undef),
    base(0x46C0, 0xFFC0, MoveToSr),
    insn(0x4800, 0xFFC0, M68000, Nbcd),
    insn(0x4808, 0xFFF8, M68000, LinkLong),
    base(0x4840, 0xFFC0, Pea),
    base(0x4840, 0xFFF8, Swap),
    insn(0x4848, 0xFFF8, Feature::Bkpt, Op::Bkpt),
    insn(0x48D0, 0xFBF8, CfIsaA, Movem),
    insn(0x48E8, 0xFBF8, CfIsaA, Movem),
    insn(0x4880, 0xFB80, M68000, Movem),
    base(0x4880, 0xFFF8, Ext),
    base(0x48C0, 0xFFF8, Ext),
    base(0x49C0, 0xFFF8, Ext),
    base(0x4A00, 0xFF00, Tst),
    insn(0x4AC0, 0xFFC0, CfIsaB, Tas),
    insn(0x4AC0, 0xFFC0, M68000, Tas),
    insn(0x4AC8, 0xFFFF, CfIsaA, Halt),
    insn(0x4ACC, 0xFFFF, CfIsaA, Pulse),
    base(0x4AFC, 0xFFFF, Illegal),
    insn(0x4C00, 0xFFC0, CfIsaA, MulLong),
    insn(0x4C00, 0xFFC0, LongMuldiv, MulLong),
    insn(0x4C40, 0xFFC0, CfIsaA, DivLong),
    insn(0x4C40, 0xFFC0, LongMuldiv, DivLong),
    insn(0x4C80, 0xFFF8, CfIsaB, Sats),
    base(0x4E40, 0xFFF0, Op::Trap),
    base(0x4E50, 0xFFF8, Link),
    base(0x4E58, 0xFFF8, Unlk),
    insn(0x4E60, 0xFFF8, Usp, MoveToUsp),
    insn(0x4E68, 0xFFF8, Usp, MoveFromUsp),
    insn(0x4E70, 0xFFFF, M68000, Reset),
    base(0x4E71, 0xFFFF, Nop),
    base(0x4E72, 0xFFFF, Stop),
    base(0x4E73, 0xFFFF, Rte),
    insn(0x4E74, 0xFFFF, Feature::Rtd, Op::Rtd),
    base(0x4E75, 0xFFFF, Rts),
    insn(0x4E76, 0xFFFF, M68000, Trapv),
    insn(0x4E77, 0xFFFF, M68000, Rtr),
    insn(0x4E7A, 0xFFFE, Feature::Movec, Op::Movec),
    insn(0x4E7B, 0xFFFF, CfIsaA, Op::Movec),
    base(0x4E80, 0xFFC0, Jump),
    base(0x4EC0, 0xFFC0, Jump),
    insn(0x5000, 0xF080, M68000, AddSubQ),
    base(0x5080, 0xF0C0, AddSubQ),
    insn(0x50C0, 0xF0F8, CfIsaA, Scc),
    insn(0x50C0, 0xF0C0, M68000, Scc),
    insn(0x50C8, 0xF0F8, M68000, Dbcc),
    insn(0x50FA, 0xF0FE, Feature::Trapcc, TrapCc),
    insn(0x50FC, 0xF0FF, Feature::Trapcc, TrapCc),
    insn(0x51F8, 0xFFF8, CfIsaA, Tpf),

    // Long branches are disabled as a block, then the variants each ISA
    // level supports are painted back in.
    base(0x6000, 0xF000, Branch),
    base(0x60FF, 0xF0FF, Undef),
    insn(0x60FF, 0xF0FF, CfIsaB, Branch),
    insn(0x60FF, 0xFFFF, CfIsaB, Undef),
    insn(0x60FF, 0xFFFF, Bral, Branch),
    insn(0x60FF, 0xF0FF, Bccl, Branch),

    base(0x7000, 0xF100, Moveq),
    insn(0x7100, 0xF100, CfIsaB, Mvzs),
    base(0x8000, 0xF000, Or),
    base(0x80C0, 0xF0C0, DivWord),
    insn(0x8100, 0xF1F8, M68000, SbcdReg),
    insn(0x8108, 0xF1F8, M68000, SbcdMem),
    base(0x9000, 0xF000, AddSub),
    insn(0x90C0, 0xF0C0, CfIsaA, Undef),
    insn(0x9180, 0xF1F8, CfIsaA, SubxReg),
    insn(0x9100, 0xF138, M68000, SubxReg),
    insn(0x9108, 0xF138, M68000, SubxMem),
    insn(0x91C0, 0xF1C0, CfIsaA, SubA),
    insn(0x90C0, 0xF0C0, M68000, SubA),

    base(0xA000, 0xF000, UndefMac),
    insn(0xA000, 0xF100, CfEmac, Mac),
    insn(0xA180, 0xF9B0, CfEmac, FromMac),
    insn(0xA110, 0xF9FC, CfEmac, MoveMac),
    insn(0xA980, 0xF9F0, CfEmac, FromMacsr),
    insn(0xAD80, 0xFFF0, CfEmac, FromMask),
    insn(0xAB80, 0xFBF0, CfEmac, FromMext),
    insn(0xA9C0, 0xFFFF, CfEmac, MacsrToCcr),
    insn(0xA100, 0xF9C0, CfEmac, ToMac),
    insn(0xA900, 0xFFC0, CfEmac, ToMacsr),
    insn(0xAB00, 0xFBC0, CfEmac, ToMext),
    insn(0xAD00, 0xFFC0, CfEmac, ToMask),

    insn(0xA140, 0xF1C0, CfIsaB, Mov3q),
    insn(0xB000, 0xF1C0, CfIsaB, Cmp),
    insn(0xB040, 0xF1C0, CfIsaB, Cmp),
    insn(0xB0C0, 0xF1C0, CfIsaB, CmpA),
    insn(0xB080, 0xF1C0, CfIsaA, Cmp),
    insn(0xB1C0, 0xF1C0, CfIsaA, CmpA),
    insn(0xB000, 0xF100, M68000, Cmp),
    insn(0xB100, 0xF100, M68000, Eor),
    insn(0xB108, 0xF138, M68000, CmpM),
    insn(0xB0C0, 0xF0C0, M68000, CmpA),
    insn(0xB180, 0xF1C0, CfIsaA, Eor),
    base(0xC000, 0xF000, And),
    insn(0xC140, 0xF1F8, M68000, ExgDd),
    insn(0xC148, 0xF1F8, M68000, ExgAa),
    insn(0xC188, 0xF1F8, M68000, ExgDa),
    base(0xC0C0, 0xF0C0, MulWord),
    insn(0xC100, 0xF1F8, M68000, AbcdReg),
    insn(0xC108, 0xF1F8, M68000, AbcdMem),
    base(0xD000, 0xF000, AddSub),
    insn(0xD0C0, 0xF0C0, CfIsaA, Undef),
    insn(0xD180, 0xF1F8, CfIsaA, AddxReg),
    insn(0xD100, 0xF138, M68000, AddxReg),
    insn(0xD108, 0xF138, M68000, AddxMem),
    insn(0xD1C0, 0xF1C0, CfIsaA, AddA),
    insn(0xD0C0, 0xF0C0, M68000, AddA),
    insn(0xE080, 0xF0F0, CfIsaA, ShiftIm),
    insn(0xE0A0, 0xF0F0, CfIsaA, ShiftReg),
    insn(0xE000, 0xF0F0, M68000, Shift8Im),
    insn(0xE040, 0xF0F0, M68000, Shift16Im),
    insn(0xE080, 0xF0F0, M68000, ShiftIm),
    insn(0xE020, 0xF0F0, M68000, Shift8Reg),
    insn(0xE060, 0xF0F0, M68000, Shift16Reg),
    insn(0xE0A0, 0xF0F0, M68000, ShiftReg),
    insn(0xE0C0, 0xFCC0, M68000, ShiftMem),
    insn(0xE090, 0xF0F0, M68000, RotateIm),
    insn(0xE010, 0xF0F0, M68000, Rotate8Im),
    insn(0xE050, 0xF0F0, M68000, Rotate16Im),
    insn(0xE0B0, 0xF0F0, M68000, RotateReg),
    insn(0xE030, 0xF0F0, M68000, Rotate8Reg),
    insn(0xE070, 0xF0F0, M68000, Rotate16Reg),
    insn(0xE4C0, 0xFCC0, M68000, RotateMem),
    insn(0xE9C0, 0xFDC0, Bitfield, BfextMem),
    insn(0xE9C0, 0xFDF8, Bitfield, BfextReg),
    insn(0xEFC0, 0xFFC0, Bitfield, BfinsMem),
    insn(0xEFC0, 0xFFF8, Bitfield, BfinsReg),
    insn(0xEAC0, 0xFFC0, Bitfield, BfopMem),
    insn(0xEAC0, 0xFFF8, Bitfield, BfopReg),
    insn(0xECC0, 0xFFC0, Bitfield, BfopMem),
    insn(0xECC0, 0xFFF8, Bitfield, BfopReg),
    insn(0xEDC0, 0xFFC0, Bitfield, BfopMem),
    insn(0xEDC0, 0xFFF8, Bitfield, BfopReg),
    insn(0xEEC0, 0xFFC0, Bitfield, BfopMem),
    insn(0xEEC0, 0xFFF8, Bitfield, BfopReg),
    insn(0xE8C0, 0xFFC0, Bitfield, BfopMem),
    insn(0xE8C0, 0xFFF8, Bitfield, BfopReg),
    insn(0xF000, 0xF000, CfIsaA, Undef),
    insn(0xF200, 0xFFC0, CfFpu, Fpu),
    insn(0xF280, 0xFFC0, CfFpu, FBcc),
    insn(0xF340, 0xFFC0, CfFpu, FRestore),
    insn(0xF300, 0xFFC0, CfFpu, FSave),
    insn(0xF200, 0xFFC0, Feature::Fpu, Fpu),
    insn(0xF240, 0xFFC0, Feature::Fpu, FScc),
    insn(0xF27A, 0xFFFE, Feature::Fpu, FTrapCc),
    insn(0xF27C, 0xFFFF, Feature::Fpu, FTrapCc),
    insn(0xF280, 0xFF80, Feature::Fpu, FBcc),
    insn(0xF300, 0xFFC0, Feature::Fpu, FSave),
    insn(0xF340, 0xFFC0, Feature::Fpu, FRestore),
    insn(0xF400, 0xFF20, Mmu040, Cinv),
    insn(0xF420, 0xFF20, Mmu040, Cpush),
    insn(0xF500, 0xFFE0, Mmu040, Pflush),
    insn(0xF548, 0xFFD8, Mmu040, Ptest),
    insn(0xF340, 0xFFC0, CfIsaA, Intouch),
    insn(0xF428, 0xFF38, CfIsaA, Cpushl),
    insn(0xFB00, 0xFF00, CfIsaA, Wddata),
    insn(0xFBC0, 0xFFC0, CfIsaA, Wdebug),
    ]
}

/// A fully painted dispatch table for one feature set.
pub struct DecodeTable {
    ops: Box<[Op; 0x10000]>,
}

impl DecodeTable {
    fn build(features: FeatureSet) -> Self {
        let mut ops = vec![Op::Undef; 0x10000].into_boxed_slice();
        for rule in rules() {
            if let Some(f) = rule.feature {
                if !features.has(f) {
                    continue;
                }
            }
            // Paint every opcode matching the pattern.
            let mask = rule.mask as usize;
            let value = (rule.value & rule.mask) as usize;
            for (code, slot) in ops.iter_mut().enumerate() {
                if code & mask == value {
                    *slot = rule.op;
                }
            }
        }
        let ops: Box<[Op; 0x10000]> = match ops.try_into() {
            Ok(arr) => arr,
            Err(_) => unreachable!("table is always 65536 entries"),
        };
        Self { ops }
    }

    /// Shared table for a feature set, built on first use.
    #[must_use]
    pub fn for_features(features: FeatureSet) -> Arc<Self> {
        static CACHE: OnceLock<Mutex<HashMap<u64, Arc<DecodeTable>>>> = OnceLock::new();
        let cache = CACHE.get_or_init(|| Mutex::new(HashMap::new()));
        let mut map = match cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(
            map.entry(features.bits())
                .or_insert_with(|| Arc::new(Self::build(features))),
        )
    }

    /// Look an opcode word up.
    #[must_use]
    pub fn lookup(&self, opcode: u16) -> Op {
        self.ops[opcode as usize]
    }
}
