//! Decode cache behavior and serialized read-modify-write handling.

use emu_core::{AccessClass, Bus, LinearMemory};
use emu_m68k::{CpuModel, M68kCpu, StepOutcome};

const SSP: u32 = 0x8000;
const ORG: u32 = 0x400;

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

fn step(cpu: &mut M68kCpu, bus: &mut LinearMemory) {
    assert_eq!(cpu.step(bus).unwrap(), StepOutcome::Executed);
}

#[test]
fn cached_blocks_replay_until_invalidated() {
    // MOVEQ #0, D0; loop: ADDQ.L #1, D0; BRA.S loop
    let (mut cpu, mut bus) = machine(CpuModel::M68000, &[0x7000, 0x5280, 0x60FC]);
    // 1 + 4 loop iterations.
    for _ in 0..9 {
        step(&mut cpu, &mut bus);
    }
    assert_eq!(cpu.core.d[0], 4);

    // Patch the increment to #2. The cached block still replays the old
    // opcode until the page is invalidated.
    load_words(&mut bus, ORG + 2, &[0x5480]);
    step(&mut cpu, &mut bus);
    step(&mut cpu, &mut bus);
    assert_eq!(cpu.core.d[0], 5);

    cpu.invalidate_page(ORG + 2);
    step(&mut cpu, &mut bus);
    step(&mut cpu, &mut bus);
    assert_eq!(cpu.core.d[0], 7);
}

#[test]
fn flush_blocks_drops_everything() {
    let (mut cpu, mut bus) = machine(CpuModel::M68000, &[0x7000, 0x5280, 0x60FC]);
    for _ in 0..9 {
        step(&mut cpu, &mut bus);
    }
    load_words(&mut bus, ORG + 2, &[0x5480]);
    cpu.flush_blocks();
    step(&mut cpu, &mut bus);
    step(&mut cpu, &mut bus);
    assert_eq!(cpu.core.d[0], 6);
}

#[test]
fn cas2_with_split_operands_requests_serialization() {
    // CAS2.W D1:D3, D2:D5, (A0):(A1)
    let program = &[0x0CFC, 0x8081, 0x9143];
    let (mut cpu, mut bus) = machine(CpuModel::M68020, program);
    cpu.core.a[0] = 0x1000;
    cpu.core.a[1] = 0x1500;
    cpu.core.d[2] = 0xAAAA;
    cpu.core.d[5] = 0xBBBB;
    cpu.set_parallel_context(true);

    // Split addresses cannot be one transaction; nothing changes.
    assert_eq!(cpu.step(&mut bus).unwrap(), StepOutcome::Serialize);
    assert_eq!(cpu.core.pc, ORG);
    assert_eq!(
        bus.read_word(0x1000, AccessClass::SupervisorData).unwrap(),
        0
    );

    // Retry once the caller has serialized the cores.
    cpu.set_parallel_context(false);
    assert_eq!(cpu.step(&mut bus).unwrap(), StepOutcome::Executed);
    assert_eq!(
        bus.read_word(0x1000, AccessClass::SupervisorData).unwrap(),
        0xAAAA
    );
    assert_eq!(
        bus.read_word(0x1500, AccessClass::SupervisorData).unwrap(),
        0xBBBB
    );
}

#[test]
fn cas2_with_adjacent_operands_runs_in_parallel_context() {
    let program = &[0x0CFC, 0x8081, 0x9143];
    let (mut cpu, mut bus) = machine(CpuModel::M68020, program);
    cpu.core.a[0] = 0x1000;
    cpu.core.a[1] = 0x1002;
    cpu.core.d[2] = 0x1111;
    cpu.core.d[5] = 0x2222;
    cpu.set_parallel_context(true);

    assert_eq!(cpu.step(&mut bus).unwrap(), StepOutcome::Executed);
    assert_eq!(
        bus.read_long(0x1000, AccessClass::SupervisorData).unwrap(),
        0x1111_2222
    );
}
