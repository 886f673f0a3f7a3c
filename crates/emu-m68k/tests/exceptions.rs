//! Exception delivery: stack frame formats, vectoring, and RTE.

use emu_core::{AccessClass, AutoVector, Bus, LinearMemory};
use emu_m68k::{CpuModel, M68kCpu, SpBank, StepOutcome};

const SSP: u32 = 0x8000;
const ORG: u32 = 0x400;
const HANDLER: u32 = 0x2000;

fn load_words(bus: &mut LinearMemory, addr: u32, words: &[u16]) {
    for (i, &w) in words.iter().enumerate() {
        bus.write_word(addr + 2 * i as u32, w, AccessClass::SupervisorData)
            .unwrap();
    }
}

fn machine(model: CpuModel, program: &[u16]) -> (M68kCpu, LinearMemory) {
    let mut bus = LinearMemory::new(0x2_0000);
    bus.write_long(0, SSP, AccessClass::SupervisorData).unwrap();
    bus.write_long(4, ORG, AccessClass::SupervisorData).unwrap();
    load_words(&mut bus, ORG, program);
    let mut cpu = M68kCpu::new(model);
    cpu.reset(&mut bus).unwrap();
    (cpu, bus)
}

fn set_vector(bus: &mut LinearMemory, vec: u32, target: u32) {
    bus.write_long(vec * 4, target, AccessClass::SupervisorData)
        .unwrap();
}

fn step(cpu: &mut M68kCpu, bus: &mut LinearMemory) {
    assert_eq!(cpu.step(bus).unwrap(), StepOutcome::Executed);
}

fn frame_word(bus: &mut LinearMemory, addr: u32) -> u16 {
    bus.read_word(addr, AccessClass::SupervisorData).unwrap()
}

fn frame_long(bus: &mut LinearMemory, addr: u32) -> u32 {
    bus.read_long(addr, AccessClass::SupervisorData).unwrap()
}

#[test]
fn trap_pushes_a_format_0_frame_and_rte_returns() {
    // TRAP #5; MOVEQ #1, D0. Handler: RTE.
    let (mut cpu, mut bus) = machine(CpuModel::M68020, &[0x4E45, 0x7001]);
    set_vector(&mut bus, 37, HANDLER);
    load_words(&mut bus, HANDLER, &[0x4E73]);
    let oldsr = cpu.core.sr();

    step(&mut cpu, &mut bus);
    assert_eq!(cpu.core.pc, HANDLER);
    let sp = cpu.core.a[7];
    assert_eq!(sp, SSP - 8);
    assert_eq!(frame_word(&mut bus, sp), oldsr);
    assert_eq!(frame_long(&mut bus, sp + 2), ORG + 2);
    // Format 0, vector offset 37*4.
    assert_eq!(frame_word(&mut bus, sp + 6), 37 << 2);

    step(&mut cpu, &mut bus);
    assert_eq!(cpu.core.pc, ORG + 2);
    assert_eq!(cpu.core.a[7], SSP);
    step(&mut cpu, &mut bus);
    assert_eq!(cpu.core.d[0], 1);
}

#[test]
fn divide_by_zero_leaves_the_destination_and_stacks_format_2() {
    // DIVU.W #0, D0
    let (mut cpu, mut bus) = machine(CpuModel::M68020, &[0x80FC, 0x0000]);
    set_vector(&mut bus, 5, HANDLER);
    cpu.core.d[0] = 0x1234;

    step(&mut cpu, &mut bus);
    assert_eq!(cpu.core.pc, HANDLER);
    assert_eq!(cpu.core.d[0], 0x1234);
    let sp = cpu.core.a[7];
    assert_eq!(sp, SSP - 12);
    // Return address is past the instruction; the extra long points at it.
    assert_eq!(frame_long(&mut bus, sp + 2), ORG + 4);
    assert_eq!(frame_word(&mut bus, sp + 6), (2 << 12) | (5 << 2));
    assert_eq!(frame_long(&mut bus, sp + 8), ORG);
}

#[test]
fn privileged_instruction_in_user_mode_traps() {
    // MOVE #$0700, SR drops to user mode; the second one traps.
    let (mut cpu, mut bus) = machine(
        CpuModel::M68020,
        &[0x46FC, 0x0700, 0x46FC, 0x2700],
    );
    set_vector(&mut bus, 8, HANDLER);
    cpu.core.set_sp_of(SpBank::User, 0x7000);

    step(&mut cpu, &mut bus);
    assert!(!cpu.core.is_supervisor());
    assert_eq!(cpu.core.a[7], 0x7000);

    step(&mut cpu, &mut bus);
    assert_eq!(cpu.core.pc, HANDLER);
    assert!(cpu.core.is_supervisor());
    let sp = cpu.core.a[7];
    assert_eq!(sp, SSP - 8);
    // Privilege frames point back at the offending instruction.
    assert_eq!(frame_long(&mut bus, sp + 2), ORG + 4);
    assert_eq!(frame_word(&mut bus, sp + 6), 8 << 2);
}

#[test]
fn wddata_in_user_mode_is_privileged() {
    // MOVE #$0700, SR drops to user; WDDATA.W (A0) then traps.
    let (mut cpu, mut bus) = machine(CpuModel::M5208, &[0x46FC, 0x0700, 0xFB50]);
    set_vector(&mut bus, 8, HANDLER);
    cpu.core.a[0] = 0x1000;

    step(&mut cpu, &mut bus);
    assert!(!cpu.core.is_supervisor());
    step(&mut cpu, &mut bus);
    assert_eq!(cpu.core.pc, HANDLER);
    assert!(cpu.core.is_supervisor());
}

#[test]
fn autovector_interrupt_raises_the_mask() {
    let (mut cpu, mut bus) = machine(CpuModel::M68020, &[0x4E71, 0x4E71]);
    set_vector(&mut bus, 27, HANDLER);
    cpu.core.set_sr(0x2000); // supervisor, mask 0
    let mut intc = AutoVector::new();
    intc.set_level(3);

    assert!(cpu.service_interrupts(&mut bus, &mut intc).unwrap());
    assert_eq!(cpu.core.pc, HANDLER);
    assert_eq!(cpu.core.interrupt_mask(), 3);
    let sp = cpu.core.a[7];
    assert_eq!(frame_word(&mut bus, sp + 6), 27 << 2);
    assert_eq!(frame_long(&mut bus, sp + 2), ORG);
    // Acknowledged: nothing further pending.
    assert!(!cpu.service_interrupts(&mut bus, &mut intc).unwrap());
}

#[test]
fn masked_interrupt_is_not_taken() {
    let (mut cpu, mut bus) = machine(CpuModel::M68020, &[0x4E71]);
    // Reset state masks at 7; level 3 must wait, level 7 never does.
    let mut intc = AutoVector::new();
    intc.set_level(3);
    assert!(!cpu.service_interrupts(&mut bus, &mut intc).unwrap());
    set_vector(&mut bus, 31, HANDLER);
    intc.set_level(7);
    assert!(cpu.service_interrupts(&mut bus, &mut intc).unwrap());
    assert_eq!(cpu.core.pc, HANDLER);
}

#[test]
fn master_mode_interrupt_stacks_a_second_frame() {
    let (mut cpu, mut bus) = machine(CpuModel::M68020, &[0x4E71]);
    set_vector(&mut bus, 26, HANDLER);
    cpu.core.set_sr(0x3000); // supervisor, master, mask 0
    cpu.core.a[7] = SSP; // master stack
    cpu.core.set_sp_of(SpBank::Interrupt, 0x6000);
    let mut intc = AutoVector::new();
    intc.set_level(2);

    assert!(cpu.service_interrupts(&mut bus, &mut intc).unwrap());
    // M cleared; now on the interrupt stack with the throwaway frame.
    assert_eq!(cpu.core.sr() & 0x1000, 0);
    assert_eq!(cpu.core.a[7], 0x6000 - 8);
    assert_eq!(cpu.core.sp_of(SpBank::Supervisor), SSP - 8);
    assert_eq!(
        frame_word(&mut bus, 0x6000 - 2),
        (1 << 12) | (26 << 2)
    );
}

#[test]
fn stop_waits_for_an_interrupt() {
    // STOP #$2000
    let (mut cpu, mut bus) = machine(CpuModel::M68020, &[0x4E72, 0x2000]);
    set_vector(&mut bus, 25, HANDLER);
    step(&mut cpu, &mut bus);
    assert!(cpu.core.stopped);
    assert_eq!(cpu.step(&mut bus).unwrap(), StepOutcome::Stopped);

    let mut intc = AutoVector::new();
    intc.set_level(1);
    assert!(cpu.service_interrupts(&mut bus, &mut intc).unwrap());
    assert!(!cpu.core.stopped);
    assert_eq!(cpu.core.pc, HANDLER);
    // The stacked return address is past the STOP.
    let sp = cpu.core.a[7];
    assert_eq!(frame_long(&mut bus, sp + 2), ORG + 4);
}

#[test]
fn trace_fires_after_every_instruction() {
    let (mut cpu, mut bus) = machine(CpuModel::M68020, &[0x4E71]);
    set_vector(&mut bus, 9, HANDLER);
    cpu.core.set_sr(0xA000); // trace + supervisor

    step(&mut cpu, &mut bus);
    assert_eq!(cpu.core.pc, HANDLER);
    // Tracing is off inside the handler.
    assert!(!cpu.core.trace_enabled());
    let sp = cpu.core.a[7];
    assert_eq!(frame_word(&mut bus, sp + 6), (2 << 12) | (9 << 2));
    assert_eq!(frame_long(&mut bus, sp + 2), ORG + 2);
    assert_eq!(frame_long(&mut bus, sp + 8), ORG + 2);
}

#[test]
fn coldfire_frame_packs_vector_and_sr_into_one_long() {
    // TRAP #0. Handler: RTE.
    let (mut cpu, mut bus) = machine(CpuModel::M5208, &[0x4E40, 0x7001]);
    set_vector(&mut bus, 32, HANDLER);
    load_words(&mut bus, HANDLER, &[0x4E73]);
    let oldsr = cpu.core.sr();

    step(&mut cpu, &mut bus);
    assert_eq!(cpu.core.pc, HANDLER);
    let sp = cpu.core.a[7];
    assert_eq!(sp, SSP - 8);
    let fmt = frame_long(&mut bus, sp);
    // Vector field occupies bits 25-18.
    assert_eq!(fmt, 0x4000_0000 | (32 << 18) | u32::from(oldsr));
    assert_eq!(frame_long(&mut bus, sp + 4), ORG + 2);

    step(&mut cpu, &mut bus);
    assert_eq!(cpu.core.pc, ORG + 2);
    assert_eq!(cpu.core.a[7], SSP);
    assert_eq!(cpu.core.sr(), oldsr);
}

#[test]
fn access_fault_stacks_the_60_byte_frame() {
    // MOVE.L $00400000, D0 faults: pointer-level entry is invalid.
    let (mut cpu, mut bus) = machine(CpuModel::M68040, &[0x2039, 0x0040, 0x0000]);
    set_vector(&mut bus, 2, 0x600);
    // Identity-map the first nine 4K pages through a full table walk.
    cpu.core.mmu.tcr = 0x8000;
    cpu.core.mmu.srp = 0x9000;
    cpu.core.mmu.urp = 0x9000;
    bus.write_long(0x9000, 0xA000 | 2, AccessClass::SupervisorData)
        .unwrap();
    bus.write_long(0xA000, 0xB000 | 2, AccessClass::SupervisorData)
        .unwrap();
    for page in 0u32..9 {
        bus.write_long(
            0xB000 + page * 4,
            (page << 12) | 1,
            AccessClass::SupervisorData,
        )
        .unwrap();
    }

    step(&mut cpu, &mut bus);
    assert_eq!(cpu.core.pc, 0x600);
    let sp = cpu.core.a[7];
    assert_eq!(sp, SSP - 60);
    assert_eq!(frame_word(&mut bus, sp + 6), (7 << 12) | (2 << 2));
    // Effective address and fault address both carry the logical address.
    assert_eq!(frame_long(&mut bus, sp + 8), 0x0040_0000);
    assert_eq!(frame_long(&mut bus, sp + 20), 0x0040_0000);
    // SSW: ATC miss on a supervisor data read.
    let ssw = frame_word(&mut bus, sp + 12);
    assert_eq!(ssw, 0x0505);
    // The faulting instruction is restartable.
    assert_eq!(frame_long(&mut bus, sp + 2), ORG);
}

#[test]
fn rte_with_unknown_format_raises_format_error() {
    let (mut cpu, mut bus) = machine(CpuModel::M68020, &[0x4E73]);
    set_vector(&mut bus, 14, HANDLER);
    // Hand-build a frame with format 5 at the top of the stack.
    cpu.core.a[7] = SSP - 8;
    bus.write_word(SSP - 8, 0x2700, AccessClass::SupervisorData)
        .unwrap();
    bus.write_long(SSP - 6, ORG, AccessClass::SupervisorData)
        .unwrap();
    bus.write_word(SSP - 2, 5 << 12, AccessClass::SupervisorData)
        .unwrap();

    step(&mut cpu, &mut bus);
    assert_eq!(cpu.core.pc, HANDLER);
}

#[test]
fn double_fault_halts_the_core() {
    // Point the SSP into unmapped space so stacking the frame faults too.
    let (mut cpu, mut bus) = machine(CpuModel::M68040, &[0x2039, 0x00F0, 0x0000]);
    // MMU off: the data read at $00F00000 misses the 128K RAM and bus
    // errors; the frame push at the bogus SSP then bus errors as well.
    cpu.core.a[7] = 0x00E0_0000;
    let err = cpu.step(&mut bus).unwrap_err();
    assert!(matches!(err, emu_m68k::FatalError::DoubleFault { .. }));
}
