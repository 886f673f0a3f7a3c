//! The CPU: fetch, dispatch, block caching, and exception delivery.
//!
//! Execution is interpretive but decode is cached: as instructions execute,
//! the translator records straight-line runs into blocks keyed by their
//! start address, and later visits replay the recorded dispatch tags
//! without re-fetching through the decode table. A block ends at any
//! control transfer, at a page boundary, or after a fixed instruction
//! count. The translator is an explicit three-state machine (idle,
//! recording, replaying); tracing forces it idle so every traced
//! instruction takes the uncached path.
//!
//! Each instruction runs inside an [`Exec`] context that owns the PC
//! cursor and the deferred address-register writeback slots. Handlers that
//! fail with an exception leave the writebacks uncommitted, so a faulting
//! postincrement never moves the register.

use std::collections::HashMap;
use std::sync::Arc;

use emu_core::{AccessClass, Bus, InterruptController};
use log::{debug, trace};

use crate::cc::Size;
use crate::decode::{DecodeTable, Op};
use crate::exception::{vector, Exception, FatalError};
use crate::features::{CpuModel, Feature};
use crate::flags::{SR_I, SR_I_SHIFT, SR_M, SR_S, SR_T};
use crate::mmu::access;
use crate::registers::CpuCore;
use crate::{arith, bitfield, branches, fpu, logic, mac, misc, shifts};

/// Upper bound on instructions recorded into one block.
const MAX_BLOCK_INSNS: usize = 32;

/// How an instruction finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    /// Fall through to the next sequential instruction.
    Next,
    /// The handler assigned PC itself.
    Jump,
    /// Fall through, and drop all cached blocks (cache control ops).
    NextFlush,
}

/// Result of a [`M68kCpu::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// One instruction completed (or trapped) normally.
    Executed,
    /// The core is stopped waiting for an interrupt.
    Stopped,
    /// The instruction needs the caller to serialize all cores and retry.
    /// No architectural state was changed.
    Serialize,
}

#[derive(Debug, Clone, Copy)]
struct BlockInsn {
    pc: u32,
    opcode: u16,
    op: Op,
}

#[derive(Debug)]
struct Block {
    insns: Vec<BlockInsn>,
    /// Page range covered, for invalidation.
    first_page: u32,
    last_page: u32,
}

/// Decode-cache translator state.
#[derive(Debug)]
enum Translator {
    Idle,
    Recording { start: u32, insns: Vec<BlockInsn> },
    Replaying { start: u32, index: usize },
}

/// One 680x0/ColdFire core.
pub struct M68kCpu {
    pub core: CpuCore,
    table: Arc<DecodeTable>,
    blocks: HashMap<u32, Block>,
    translator: Translator,
    /// Set when other cores may observe memory between this core's
    /// accesses; makes unsplittable read-modify-writes request
    /// serialization instead of running piecewise.
    parallel_context: bool,
}

impl M68kCpu {
    #[must_use]
    pub fn new(model: CpuModel) -> Self {
        let core = CpuCore::new(model);
        let table = DecodeTable::for_features(core.features);
        Self {
            core,
            table,
            blocks: HashMap::new(),
            translator: Translator::Idle,
            parallel_context: false,
        }
    }

    /// Declare whether other bus masters run between this core's cycles.
    pub fn set_parallel_context(&mut self, parallel: bool) {
        self.parallel_context = parallel;
    }

    /// Hardware reset: reload SSP and PC from the reset vectors.
    pub fn reset<B: Bus>(&mut self, bus: &mut B) -> Result<(), FatalError> {
        self.core.set_sr_system(SR_S | SR_I);
        self.core.stopped = false;
        self.core.vbr = 0;
        self.core.mmu.tcr = 0;
        self.core.mmu.fault = false;
        self.core.mmu.flush_atc();
        self.flush_blocks();
        let sp = bus
            .read_long(0, AccessClass::SupervisorProgram)
            .map_err(|e| FatalError::ResetFault { addr: e.addr() })?;
        let pc = bus
            .read_long(4, AccessClass::SupervisorProgram)
            .map_err(|e| FatalError::ResetFault { addr: e.addr() })?;
        self.core.a[7] = sp;
        self.core.pc = pc;
        debug!("reset: sp={sp:#010x} pc={pc:#010x}");
        Ok(())
    }

    /// Drop every cached block.
    pub fn flush_blocks(&mut self) {
        self.blocks.clear();
        self.translator = Translator::Idle;
    }

    /// Drop cached blocks touching the page containing `addr`. Call after
    /// writing code the core may already have executed.
    pub fn invalidate_page(&mut self, addr: u32) {
        let page = addr >> 12;
        self.blocks
            .retain(|_, b| page < b.first_page || page > b.last_page);
        self.translator = Translator::Idle;
    }

    /// Sample the interrupt controller; deliver if the pending level beats
    /// the mask (level 7 is non-maskable). Returns whether one was taken.
    pub fn service_interrupts<B: Bus>(
        &mut self,
        bus: &mut B,
        intc: &mut dyn InterruptController,
    ) -> Result<bool, FatalError> {
        let level = intc.pending_level();
        if level == 0 {
            return Ok(false);
        }
        if level < 7 && level <= self.core.interrupt_mask() {
            return Ok(false);
        }
        let vec = intc.acknowledge(level);
        self.core.stopped = false;
        let pc = self.core.pc;
        self.deliver(
            bus,
            Exception::Interrupt {
                level,
                vector: vec,
            },
            pc,
            pc,
        )?;
        Ok(true)
    }

    /// Execute one instruction.
    pub fn step<B: Bus>(&mut self, bus: &mut B) -> Result<StepOutcome, FatalError> {
        if self.core.stopped {
            return Ok(StepOutcome::Stopped);
        }
        let insn_pc = self.core.pc;
        let trace_pending = self.core.trace_enabled();
        if trace_pending {
            // Traced instructions never come from or go into the cache.
            self.translator = Translator::Idle;
        }

        let cached = if trace_pending { None } else { self.next_cached(insn_pc) };
        let (opcode, op, mut exec) = match cached {
            Some(insn) => {
                let exec = Exec::new(&mut self.core, bus, insn_pc, self.parallel_context);
                (insn.opcode, insn.op, exec)
            }
            None => {
                let mut exec = Exec::new(&mut self.core, bus, insn_pc, self.parallel_context);
                let opcode = match exec.fetch_word() {
                    Ok(w) => w,
                    Err(e) => {
                        drop(exec);
                        self.translator = Translator::Idle;
                        self.deliver(bus, e, insn_pc, insn_pc)?;
                        return Ok(StepOutcome::Executed);
                    }
                };
                let op = self.table.lookup(opcode);
                (opcode, op, exec)
            }
        };
        // The opcode word is already consumed whichever path ran.
        exec.pc = insn_pc.wrapping_add(2);

        trace!("exec {:#010x}: {opcode:#06x} {op:?}", insn_pc);
        let result = dispatch(&mut exec, op, opcode);
        let next_pc = exec.pc;

        match result {
            Ok(flow) => {
                exec.commit_writebacks();
                drop(exec);
                match flow {
                    Flow::Next => self.core.pc = next_pc,
                    Flow::Jump => {}
                    Flow::NextFlush => {
                        self.core.pc = next_pc;
                        self.flush_blocks();
                    }
                }
                if !trace_pending && !matches!(flow, Flow::NextFlush) {
                    self.record(insn_pc, opcode, op, flow, next_pc);
                }
                if trace_pending {
                    let pc = self.core.pc;
                    self.deliver(bus, Exception::Trace, insn_pc, pc)?;
                }
                Ok(StepOutcome::Executed)
            }
            Err(Exception::RetrySerialized) => {
                drop(exec);
                self.translator = Translator::Idle;
                Ok(StepOutcome::Serialize)
            }
            Err(e) => {
                drop(exec);
                self.translator = Translator::Idle;
                self.deliver(bus, e, insn_pc, next_pc)?;
                Ok(StepOutcome::Executed)
            }
        }
    }

    /// Run up to `limit` instructions, sampling interrupts between them.
    pub fn run<B: Bus>(
        &mut self,
        bus: &mut B,
        intc: &mut dyn InterruptController,
        limit: usize,
    ) -> Result<usize, FatalError> {
        let mut executed = 0;
        for _ in 0..limit {
            self.service_interrupts(bus, intc)?;
            match self.step(bus)? {
                StepOutcome::Executed => executed += 1,
                StepOutcome::Stopped => break,
                StepOutcome::Serialize => {
                    // Single caller owns the bus here; retry resolves it.
                    continue;
                }
            }
        }
        Ok(executed)
    }

    // === Decode cache ===

    fn next_cached(&mut self, pc: u32) -> Option<BlockInsn> {
        if let Translator::Replaying { start, index } = self.translator {
            if let Some(block) = self.blocks.get(&start) {
                if let Some(insn) = block.insns.get(index) {
                    if insn.pc == pc {
                        self.translator = Translator::Replaying {
                            start,
                            index: index + 1,
                        };
                        return Some(*insn);
                    }
                }
            }
            self.translator = Translator::Idle;
        }
        if let Some(block) = self.blocks.get(&pc) {
            let insn = block.insns[0];
            self.translator = Translator::Replaying { start: pc, index: 1 };
            return Some(insn);
        }
        None
    }

    fn record(&mut self, pc: u32, opcode: u16, op: Op, flow: Flow, next_pc: u32) {
        let terminal = flow == Flow::Jump || self.core.pc != next_pc;
        match &mut self.translator {
            Translator::Recording { start, insns } => {
                insns.push(BlockInsn { pc, opcode, op });
                let done = terminal
                    || insns.len() >= MAX_BLOCK_INSNS
                    || (next_pc >> 12) != (*start >> 12);
                if done {
                    let start = *start;
                    let insns = std::mem::take(insns);
                    let first_page = start >> 12;
                    let last_page = pc >> 12;
                    self.blocks.insert(
                        start,
                        Block {
                            insns,
                            first_page,
                            last_page,
                        },
                    );
                    self.translator = Translator::Idle;
                }
            }
            Translator::Replaying { .. } => {
                // Replay bookkeeping already advanced in next_cached().
                if terminal {
                    self.translator = Translator::Idle;
                }
            }
            Translator::Idle => {
                if !terminal && !self.blocks.contains_key(&pc) {
                    self.translator = Translator::Recording {
                        start: pc,
                        insns: vec![BlockInsn { pc, opcode, op }],
                    };
                }
            }
        }
    }

    // === Exception delivery ===

    /// Deliver an exception: stack the frame, fetch the vector, redirect PC.
    ///
    /// `insn_pc` is the address of the faulting/trapping instruction and
    /// `next_pc` the address after it; which one lands in the frame depends
    /// on the exception.
    pub(crate) fn deliver<B: Bus>(
        &mut self,
        bus: &mut B,
        exc: Exception,
        insn_pc: u32,
        next_pc: u32,
    ) -> Result<(), FatalError> {
        let mut exc = exc;
        loop {
            match self.deliver_once(bus, exc, insn_pc, next_pc) {
                Ok(()) => return Ok(()),
                Err(nested) => {
                    if matches!(exc, Exception::Access { .. }) || self.core.mmu.fault {
                        return Err(FatalError::DoubleFault {
                            addr: self.core.mmu.ar,
                        });
                    }
                    exc = nested;
                }
            }
        }
    }

    fn deliver_once<B: Bus>(
        &mut self,
        bus: &mut B,
        exc: Exception,
        insn_pc: u32,
        next_pc: u32,
    ) -> Result<(), Exception> {
        debug!(
            "exception {exc} at {insn_pc:#010x}, vector {}",
            exc.vector()
        );
        if !self.core.features.has(Feature::M68000) {
            return self.deliver_coldfire(bus, exc, insn_pc, next_pc);
        }

        let oldsr = self.core.sr();
        self.core.stopped = false;
        // Enter supervisor mode with tracing off.
        let mut sr = (oldsr | SR_S) & !SR_T;
        if let Exception::Interrupt { level, .. } = exc {
            sr = (sr & !SR_I) | (u16::from(level) << SR_I_SHIFT);
        }
        self.core.set_sr_system(sr);

        let mut sp = self.core.a[7];
        if !self.core.features.has(Feature::UnalignedData) {
            sp &= !1;
        }

        match exc {
            Exception::Access { .. } => {
                if self.core.mmu.fault {
                    // Caller promotes this to a double fault.
                    return Err(exc);
                }
                self.core.mmu.fault = true;
                let r = self.push_access_frame(bus, &mut sp, oldsr, insn_pc);
                self.core.mmu.fault = false;
                r?;
            }
            Exception::AddressError { addr } => {
                self.stack_frame(bus, &mut sp, 2, exc.vector(), oldsr, addr, insn_pc)?;
            }
            Exception::DivideByZero | Exception::Chk | Exception::TrapCc => {
                self.stack_frame(bus, &mut sp, 2, exc.vector(), oldsr, insn_pc, next_pc)?;
            }
            Exception::Trace => {
                self.stack_frame(bus, &mut sp, 2, exc.vector(), oldsr, next_pc, next_pc)?;
            }
            Exception::Trap(_) | Exception::FloatingPoint(_) => {
                self.stack_frame(bus, &mut sp, 0, exc.vector(), oldsr, 0, next_pc)?;
            }
            Exception::Interrupt { .. } => {
                self.stack_frame(bus, &mut sp, 0, exc.vector(), oldsr, 0, next_pc)?;
                if self.core.sr_system() & SR_M != 0 {
                    // Interrupts clear the master bit and stack a second,
                    // throwaway frame on the interrupt stack.
                    self.core.a[7] = sp;
                    let midsr = self.core.sr();
                    self.core.set_sr_system(self.core.sr_system() & !SR_M);
                    sp = self.core.a[7];
                    if !self.core.features.has(Feature::UnalignedData) {
                        sp &= !1;
                    }
                    self.stack_frame(bus, &mut sp, 1, exc.vector(), midsr, 0, next_pc)?;
                }
            }
            _ => {
                // Illegal, privilege, line A/F, format error: the frame
                // points back at the offending instruction.
                self.stack_frame(bus, &mut sp, 0, exc.vector(), oldsr, 0, insn_pc)?;
            }
        }
        self.core.a[7] = sp;

        let vec_addr = self.core.vbr.wrapping_add(u32::from(exc.vector()) * 4);
        self.core.pc = self.read_supervisor_long(bus, vec_addr)?;
        Ok(())
    }

    fn deliver_coldfire<B: Bus>(
        &mut self,
        bus: &mut B,
        exc: Exception,
        _insn_pc: u32,
        next_pc: u32,
    ) -> Result<(), Exception> {
        let oldsr = self.core.sr();
        self.core.stopped = false;
        let mut sr = (oldsr | SR_S) & !SR_T;
        if let Exception::Interrupt { level, .. } = exc {
            sr = (sr & !SR_I) | (u16::from(level) << SR_I_SHIFT);
        }
        self.core.set_sr_system(sr);

        let sp = self.core.a[7];
        // Frame word: marker, SP misalignment, vector, old SR.
        let fmt = 0x4000_0000
            | ((sp & 3) << 28)
            | (u32::from(exc.vector()) << 18)
            | u32::from(oldsr);
        let mut sp = sp & !3;
        sp = sp.wrapping_sub(4);
        self.write_supervisor_long(bus, sp, next_pc)?;
        sp = sp.wrapping_sub(4);
        self.write_supervisor_long(bus, sp, fmt)?;
        self.core.a[7] = sp;

        let vec_addr = self.core.vbr.wrapping_add(u32::from(exc.vector()) * 4);
        self.core.pc = self.read_supervisor_long(bus, vec_addr)?;
        Ok(())
    }

    /// Push one exception frame. With the format-word feature the frame is
    /// `[extras] format|vector retaddr sr`, bottom to top; without it, just
    /// `retaddr sr`.
    #[allow(clippy::too_many_arguments)]
    fn stack_frame<B: Bus>(
        &mut self,
        bus: &mut B,
        sp: &mut u32,
        format: u16,
        vec: u8,
        sr: u16,
        addr: u32,
        retaddr: u32,
    ) -> Result<(), Exception> {
        if self.core.features.has(Feature::ExcFormat) {
            match format {
                4 => {
                    *sp = sp.wrapping_sub(4);
                    self.write_supervisor_long(bus, *sp, self.core.pc)?;
                    *sp = sp.wrapping_sub(4);
                    self.write_supervisor_long(bus, *sp, addr)?;
                }
                2 | 3 => {
                    *sp = sp.wrapping_sub(4);
                    self.write_supervisor_long(bus, *sp, addr)?;
                }
                _ => {}
            }
            *sp = sp.wrapping_sub(2);
            self.write_supervisor_word(bus, *sp, (format << 12) | (u16::from(vec) << 2))?;
        }
        *sp = sp.wrapping_sub(4);
        self.write_supervisor_long(bus, *sp, retaddr)?;
        *sp = sp.wrapping_sub(2);
        self.write_supervisor_word(bus, *sp, sr)?;
        Ok(())
    }

    /// The format 7 access-fault frame: writeback/push state above the
    /// fixed part. Unmodelled writeback channels stack as zero.
    fn push_access_frame<B: Bus>(
        &mut self,
        bus: &mut B,
        sp: &mut u32,
        sr: u16,
        retaddr: u32,
    ) -> Result<(), Exception> {
        let ar = self.core.mmu.ar;
        let ssw = self.core.mmu.ssw;
        for _ in 0..3 {
            *sp = sp.wrapping_sub(4);
            self.write_supervisor_long(bus, *sp, 0)?; // push data 3..1
        }
        for _ in 0..5 {
            *sp = sp.wrapping_sub(4);
            self.write_supervisor_long(bus, *sp, 0)?; // wb1 d/a, wb2 d/a, wb3 d
        }
        *sp = sp.wrapping_sub(4);
        self.write_supervisor_long(bus, *sp, ar)?; // wb3 address
        *sp = sp.wrapping_sub(4);
        self.write_supervisor_long(bus, *sp, ar)?; // fault address
        for _ in 0..3 {
            *sp = sp.wrapping_sub(2);
            self.write_supervisor_word(bus, *sp, 0)?; // wb status 1..3
        }
        *sp = sp.wrapping_sub(2);
        self.write_supervisor_word(bus, *sp, ssw as u16)?;
        *sp = sp.wrapping_sub(4);
        self.write_supervisor_long(bus, *sp, ar)?; // effective address
        self.stack_frame(bus, sp, 7, vector::ACCESS_FAULT, sr, 0, retaddr)
    }

    fn read_supervisor_long<B: Bus>(&mut self, bus: &mut B, addr: u32) -> Result<u32, Exception> {
        let acc = access::SUPER;
        let phys = self.core.mmu.translate(bus, addr, acc, 4)?;
        bus.read_long(phys, AccessClass::SupervisorData)
            .map_err(|e| self.core.mmu.latch_bus_fault(e.addr(), acc, 4))
    }

    fn write_supervisor_long<B: Bus>(
        &mut self,
        bus: &mut B,
        addr: u32,
        value: u32,
    ) -> Result<(), Exception> {
        let acc = access::SUPER | access::STORE;
        let phys = self.core.mmu.translate(bus, addr, acc, 4)?;
        bus.write_long(phys, value, AccessClass::SupervisorData)
            .map_err(|e| self.core.mmu.latch_bus_fault(e.addr(), acc, 4))
    }

    fn write_supervisor_word<B: Bus>(
        &mut self,
        bus: &mut B,
        addr: u32,
        value: u16,
    ) -> Result<(), Exception> {
        let acc = access::SUPER | access::STORE;
        let phys = self.core.mmu.translate(bus, addr, acc, 2)?;
        bus.write_word(phys, value, AccessClass::SupervisorData)
            .map_err(|e| self.core.mmu.latch_bus_fault(e.addr(), acc, 2))
    }
}

/// Per-instruction execution context.
///
/// Owns the PC cursor (`pc` advances past extension words as they are
/// fetched) and the deferred address-register writeback slots for
/// postincrement/predecrement modes. Writebacks commit only when the
/// instruction completes without an exception.
pub(crate) struct Exec<'a, B: Bus> {
    pub core: &'a mut CpuCore,
    pub bus: &'a mut B,
    /// Address of the opcode word.
    pub insn_pc: u32,
    /// Cursor just past the last fetched word.
    pub pc: u32,
    /// See [`M68kCpu::set_parallel_context`].
    pub parallel: bool,
    wb_mask: u8,
    wb: [u32; 8],
}

impl<'a, B: Bus> Exec<'a, B> {
    fn new(core: &'a mut CpuCore, bus: &'a mut B, insn_pc: u32, parallel: bool) -> Self {
        Self {
            core,
            bus,
            insn_pc,
            pc: insn_pc,
            parallel,
            wb_mask: 0,
            wb: [0; 8],
        }
    }

    // === Registers ===

    pub fn dreg(&self, r: usize) -> u32 {
        self.core.d[r]
    }

    /// Write the low `size` of a data register, preserving the rest.
    pub fn set_dreg(&mut self, size: Size, r: usize, v: u32) {
        let mask = size.mask();
        self.core.d[r] = (self.core.d[r] & !mask) | (v & mask);
    }

    pub fn set_dreg_full(&mut self, r: usize, v: u32) {
        self.core.d[r] = v;
    }

    /// Address register value, seeing any deferred writeback.
    pub fn areg(&self, r: usize) -> u32 {
        if self.wb_mask & (1 << r) != 0 {
            self.wb[r]
        } else {
            self.core.a[r]
        }
    }

    /// Immediate address register write.
    pub fn set_areg(&mut self, r: usize, v: u32) {
        self.wb_mask &= !(1 << r);
        self.core.a[r] = v;
    }

    /// Deferred write: visible to later reads in this instruction, but
    /// only committed if the instruction completes.
    pub fn delay_set_areg(&mut self, r: usize, v: u32) {
        self.wb_mask |= 1 << r;
        self.wb[r] = v;
    }

    fn commit_writebacks(&mut self) {
        let mut mask = self.wb_mask;
        while mask != 0 {
            let r = mask.trailing_zeros() as usize;
            self.core.a[r] = self.wb[r];
            mask &= mask - 1;
        }
        self.wb_mask = 0;
    }

    pub fn require_supervisor(&self) -> Result<(), Exception> {
        if self.core.is_supervisor() {
            Ok(())
        } else {
            Err(Exception::Privilege)
        }
    }

    // === Memory ===

    fn data_acc(&self, store: bool) -> u8 {
        let mut acc = 0;
        if store {
            acc |= access::STORE;
        }
        if self.core.is_supervisor() {
            acc |= access::SUPER;
        }
        acc
    }

    fn data_class(&self) -> AccessClass {
        AccessClass::from_flags(self.core.is_supervisor(), false)
    }

    /// Data read at `size`, zero-extended.
    pub fn load(&mut self, size: Size, addr: u32) -> Result<u32, Exception> {
        let acc = self.data_acc(false);
        let phys = self.core.mmu.translate(self.bus, addr, acc, size.bytes())?;
        let class = self.data_class();
        let r = match size {
            Size::Byte => self.bus.read_byte(phys, class).map(u32::from),
            Size::Word => self.bus.read_word(phys, class).map(u32::from),
            Size::Long => self.bus.read_long(phys, class),
        };
        r.map_err(|e| self.core.mmu.latch_bus_fault(e.addr(), acc, size.bytes()))
    }

    /// Data write at `size`.
    pub fn store(&mut self, size: Size, addr: u32, value: u32) -> Result<(), Exception> {
        let acc = self.data_acc(true);
        let phys = self.core.mmu.translate(self.bus, addr, acc, size.bytes())?;
        let class = self.data_class();
        let r = match size {
            Size::Byte => self.bus.write_byte(phys, value as u8, class),
            Size::Word => self.bus.write_word(phys, value as u16, class),
            Size::Long => self.bus.write_long(phys, value, class),
        };
        r.map_err(|e| self.core.mmu.latch_bus_fault(e.addr(), acc, size.bytes()))
    }

    /// 64-bit read, used by the combined CAS2 transaction.
    pub fn load_quad(&mut self, addr: u32) -> Result<u64, Exception> {
        let acc = self.data_acc(false);
        let phys = self.core.mmu.translate(self.bus, addr, acc, 4)?;
        self.bus
            .read_quad(phys, self.data_class())
            .map_err(|e| self.core.mmu.latch_bus_fault(e.addr(), acc, 4))
    }

    /// 64-bit write, used by the combined CAS2 transaction.
    pub fn store_quad(&mut self, addr: u32, value: u64) -> Result<(), Exception> {
        let acc = self.data_acc(true);
        let phys = self.core.mmu.translate(self.bus, addr, acc, 4)?;
        self.bus
            .write_quad(phys, value, self.data_class())
            .map_err(|e| self.core.mmu.latch_bus_fault(e.addr(), acc, 4))
    }

    /// Fetch the next extension word at the PC cursor.
    pub fn fetch_word(&mut self) -> Result<u16, Exception> {
        let mut acc = access::CODE;
        if self.core.is_supervisor() {
            acc |= access::SUPER;
        }
        let addr = self.pc;
        let phys = self.core.mmu.translate(self.bus, addr, acc, 2)?;
        let class = AccessClass::from_flags(self.core.is_supervisor(), true);
        let w = self
            .bus
            .read_word(phys, class)
            .map_err(|e| self.core.mmu.latch_bus_fault(e.addr(), acc, 2))?;
        self.pc = self.pc.wrapping_add(2);
        Ok(w)
    }

    pub fn fetch_long(&mut self) -> Result<u32, Exception> {
        let hi = self.fetch_word()?;
        let lo = self.fetch_word()?;
        Ok(u32::from(hi) << 16 | u32::from(lo))
    }

    // === Stack ===

    pub fn push_long(&mut self, value: u32) -> Result<(), Exception> {
        let sp = self.areg(7).wrapping_sub(4);
        self.store(Size::Long, sp, value)?;
        self.set_areg(7, sp);
        Ok(())
    }

    pub fn push_word(&mut self, value: u16) -> Result<(), Exception> {
        let sp = self.areg(7).wrapping_sub(2);
        self.store(Size::Word, sp, u32::from(value))?;
        self.set_areg(7, sp);
        Ok(())
    }

    pub fn pop_long(&mut self) -> Result<u32, Exception> {
        let sp = self.areg(7);
        let v = self.load(Size::Long, sp)?;
        self.set_areg(7, sp.wrapping_add(4));
        Ok(v)
    }

    pub fn pop_word(&mut self) -> Result<u16, Exception> {
        let sp = self.areg(7);
        let v = self.load(Size::Word, sp)?;
        self.set_areg(7, sp.wrapping_add(2));
        Ok(v as u16)
    }
}

/// Route one decoded tag to its handler.
fn dispatch<B: Bus>(x: &mut Exec<'_, B>, op: Op, code: u16) -> Result<Flow, Exception> {
    match op {
        Op::Undef => misc::undef(x, code),
        Op::Illegal => Err(Exception::Illegal),
        Op::ArithIm => arith::arith_im(x, code),
        Op::Chk2 => arith::chk2(x, code),
        Op::Bitrev => logic::bitrev(x, code),
        Op::Byterev => logic::byterev(x, code),
        Op::Ff1 => logic::ff1(x, code),
        Op::BitopReg => logic::bitop_reg(x, code),
        Op::BitopIm => logic::bitop_im(x, code),
        Op::Cas => arith::cas(x, code),
        Op::Cas2Word => arith::cas2w(x, code),
        Op::Cas2Long => arith::cas2l(x, code),
        Op::Move => misc::move_insn(x, code),
        Op::Chk => arith::chk(x, code),
        Op::Strldsr => misc::strldsr(x, code),
        Op::Negx => arith::negx(x, code),
        Op::MoveFromSr => misc::move_from_sr(x, code),
        Op::Lea => misc::lea(x, code),
        Op::Clr => arith::clr(x, code),
        Op::MoveFromCcr => misc::move_from_ccr(x, code),
        Op::Neg => arith::neg(x, code),
        Op::Not => logic::not(x, code),
        Op::MoveToCcr => misc::move_to_ccr(x, code),
        Op::MoveToSr => misc::move_to_sr(x, code),
        Op::Nbcd => arith::nbcd(x, code),
        Op::LinkLong => misc::linkl(x, code),
        Op::Pea => misc::pea(x, code),
        Op::Swap => logic::swap(x, code),
        Op::Bkpt => misc::bkpt(x, code),
        Op::Movem => misc::movem(x, code),
        Op::Ext => logic::ext(x, code),
        Op::Tst => arith::tst(x, code),
        Op::Tas => logic::tas(x, code),
        Op::Halt => misc::halt(x, code),
        Op::Pulse => misc::pulse(x, code),
        Op::MulLong => arith::mull(x, code),
        Op::DivLong => arith::divl(x, code),
        Op::Sats => logic::sats(x, code),
        Op::Trap => misc::trap(x, code),
        Op::Link => misc::link(x, code),
        Op::Unlk => misc::unlk(x, code),
        Op::MoveToUsp => misc::move_to_usp(x, code),
        Op::MoveFromUsp => misc::move_from_usp(x, code),
        Op::Reset => misc::reset(x, code),
        Op::Nop => Ok(Flow::Next),
        Op::Stop => misc::stop(x, code),
        Op::Rte => misc::rte(x, code),
        Op::Rtd => misc::rtd(x, code),
        Op::Rts => misc::rts(x, code),
        Op::Trapv => branches::trapv(x, code),
        Op::Rtr => misc::rtr(x, code),
        Op::Movec => misc::movec(x, code),
        Op::Jump => branches::jump(x, code),
        Op::AddSubQ => arith::addsubq(x, code),
        Op::Scc => branches::scc(x, code),
        Op::Dbcc => branches::dbcc(x, code),
        Op::TrapCc => branches::trapcc(x, code),
        Op::Tpf => branches::tpf(x, code),
        Op::Branch => branches::branch(x, code),
        Op::Moveq => logic::moveq(x, code),
        Op::Mvzs => logic::mvzs(x, code),
        Op::Or => logic::or(x, code),
        Op::DivWord => arith::divw(x, code),
        Op::SbcdReg => arith::sbcd_reg(x, code),
        Op::SbcdMem => arith::sbcd_mem(x, code),
        Op::AddSub => arith::addsub(x, code),
        Op::SubxReg => arith::subx_reg(x, code),
        Op::SubxMem => arith::subx_mem(x, code),
        Op::SubA => arith::suba(x, code),
        Op::UndefMac => misc::undef(x, code),
        Op::Mac => mac::mac(x, code),
        Op::FromMac => mac::from_mac(x, code),
        Op::MoveMac => mac::move_mac(x, code),
        Op::FromMacsr => mac::from_macsr(x, code),
        Op::FromMask => mac::from_mask(x, code),
        Op::FromMext => mac::from_mext(x, code),
        Op::MacsrToCcr => mac::macsr_to_ccr(x, code),
        Op::ToMac => mac::to_mac(x, code),
        Op::ToMacsr => mac::to_macsr(x, code),
        Op::ToMext => mac::to_mext(x, code),
        Op::ToMask => mac::to_mask(x, code),
        Op::Mov3q => logic::mov3q(x, code),
        Op::Cmp => arith::cmp(x, code),
        Op::CmpA => arith::cmpa(x, code),
        Op::CmpM => arith::cmpm(x, code),
        Op::Eor => logic::eor(x, code),
        Op::And => logic::and(x, code),
        Op::ExgDd => logic::exg_dd(x, code),
        Op::ExgAa => logic::exg_aa(x, code),
        Op::ExgDa => logic::exg_da(x, code),
        Op::MulWord => arith::mulw(x, code),
        Op::AbcdReg => arith::abcd_reg(x, code),
        Op::AbcdMem => arith::abcd_mem(x, code),
        Op::AddxReg => arith::addx_reg(x, code),
        Op::AddxMem => arith::addx_mem(x, code),
        Op::AddA => arith::adda(x, code),
        Op::ShiftIm => shifts::shift_im(x, code),
        Op::ShiftReg => shifts::shift_reg(x, code),
        Op::Shift8Im => shifts::shift8_im(x, code),
        Op::Shift16Im => shifts::shift16_im(x, code),
        Op::Shift8Reg => shifts::shift8_reg(x, code),
        Op::Shift16Reg => shifts::shift16_reg(x, code),
        Op::ShiftMem => shifts::shift_mem(x, code),
        Op::RotateIm => shifts::rotate_im(x, code),
        Op::Rotate8Im => shifts::rotate8_im(x, code),
        Op::Rotate16Im => shifts::rotate16_im(x, code),
        Op::RotateReg => shifts::rotate_reg(x, code),
        Op::Rotate8Reg => shifts::rotate8_reg(x, code),
        Op::Rotate16Reg => shifts::rotate16_reg(x, code),
        Op::RotateMem => shifts::rotate_mem(x, code),
        Op::BfextMem => bitfield::bfext_mem(x, code),
        Op::BfextReg => bitfield::bfext_reg(x, code),
        Op::BfinsMem => bitfield::bfins_mem(x, code),
        Op::BfinsReg => bitfield::bfins_reg(x, code),
        Op::BfopMem => bitfield::bfop_mem(x, code),
        Op::BfopReg => bitfield::bfop_reg(x, code),
        Op::Fpu => fpu::fpu(x, code),
        Op::FScc => fpu::fscc(x, code),
        Op::FTrapCc => fpu::ftrapcc(x, code),
        Op::FBcc => fpu::fbcc(x, code),
        Op::FSave => fpu::fsave(x, code),
        Op::FRestore => fpu::frestore(x, code),
        Op::Intouch => misc::intouch(x, code),
        Op::Cinv => misc::cinv(x, code),
        Op::Cpush => misc::cpush(x, code),
        Op::Cpushl => misc::cpushl(x, code),
        Op::Pflush => misc::pflush(x, code),
        Op::Ptest => misc::ptest(x, code),
        Op::Wddata => misc::wddata(x, code),
        Op::Wdebug => misc::wdebug(x, code),
    }
}
