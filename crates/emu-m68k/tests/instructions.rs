//! Program-driven instruction tests.
//!
//! Each test assembles a short program by hand (opcodes noted in the
//! comments), runs it through `step`, and checks the architectural state.

use emu_core::{AccessClass, Bus, LinearMemory};
use emu_m68k::{CpuModel, M68kCpu, StepOutcome};

const SSP: u32 = 0x8000;
const ORG: u32 = 0x400;

const CCR_X: u16 = 0x10;
const CCR_N: u16 = 0x08;
const CCR_Z: u16 = 0x04;
const CCR_V: u16 = 0x02;
const CCR_C: u16 = 0x01;

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

fn ccr(cpu: &M68kCpu) -> u16 {
    cpu.core.sr() & 0x1F
}

#[test]
fn moveq_sign_extends_and_sets_flags() {
    // MOVEQ #-1, D0
    let (mut cpu, mut bus) = machine(CpuModel::M68000, &[0x70FF]);
    step(&mut cpu, &mut bus);
    assert_eq!(cpu.core.d[0], 0xFFFF_FFFF);
    assert_eq!(ccr(&cpu), CCR_N);
    assert_eq!(cpu.core.pc, ORG + 2);
}

#[test]
fn add_long_carry_and_overflow() {
    // ADD.L D1, D0
    let (mut cpu, mut bus) = machine(CpuModel::M68000, &[0xD081]);
    cpu.core.d[0] = 0x8000_0000;
    cpu.core.d[1] = 0x8000_0000;
    step(&mut cpu, &mut bus);
    assert_eq!(cpu.core.d[0], 0);
    assert_eq!(ccr(&cpu), CCR_X | CCR_Z | CCR_V | CCR_C);
}

#[test]
fn dbra_counts_the_low_word_down_to_minus_one() {
    // MOVEQ #3, D1; loop: DBRA D1, loop
    let (mut cpu, mut bus) = machine(CpuModel::M68000, &[0x7203, 0x51C9, 0xFFFE]);
    step(&mut cpu, &mut bus);
    for _ in 0..3 {
        step(&mut cpu, &mut bus);
        assert_eq!(cpu.core.pc, ORG + 2);
    }
    step(&mut cpu, &mut bus);
    assert_eq!(cpu.core.d[1] & 0xFFFF, 0xFFFF);
    assert_eq!(cpu.core.pc, ORG + 6);
}

#[test]
fn link_and_unlk_restore_the_frame() {
    // LINK A6, #-16; UNLK A6
    let (mut cpu, mut bus) = machine(CpuModel::M68000, &[0x4E56, 0xFFF0, 0x4E5E]);
    cpu.core.a[6] = 0xCAFE_0000;
    step(&mut cpu, &mut bus);
    assert_eq!(cpu.core.a[6], SSP - 4);
    assert_eq!(cpu.core.a[7], SSP - 4 - 16);
    step(&mut cpu, &mut bus);
    assert_eq!(cpu.core.a[6], 0xCAFE_0000);
    assert_eq!(cpu.core.a[7], SSP);
}

#[test]
fn movem_predec_store_postinc_load() {
    // MOVEM.L D0-D1/A0, -(A7); MOVEM.L (A7)+, D2-D3/A1
    let (mut cpu, mut bus) = machine(CpuModel::M68000, &[0x48E7, 0xC080, 0x4CDF, 0x020C]);
    cpu.core.d[0] = 0x1111_1111;
    cpu.core.d[1] = 0x2222_2222;
    cpu.core.a[0] = 0x3333_3333;
    step(&mut cpu, &mut bus);
    assert_eq!(cpu.core.a[7], SSP - 12);
    // Memory image is ascending register order.
    assert_eq!(
        bus.read_long(SSP - 12, AccessClass::SupervisorData).unwrap(),
        0x1111_1111
    );
    step(&mut cpu, &mut bus);
    assert_eq!(cpu.core.d[2], 0x1111_1111);
    assert_eq!(cpu.core.d[3], 0x2222_2222);
    assert_eq!(cpu.core.a[1], 0x3333_3333);
    assert_eq!(cpu.core.a[7], SSP);
}

#[test]
fn jsr_stacks_the_return_address_and_rts_pops_it() {
    // JSR $0800.W; target: RTS
    let (mut cpu, mut bus) = machine(CpuModel::M68000, &[0x4EB8, 0x0800]);
    load_words(&mut bus, 0x800, &[0x4E75]);
    step(&mut cpu, &mut bus);
    assert_eq!(cpu.core.pc, 0x800);
    assert_eq!(cpu.core.a[7], SSP - 4);
    assert_eq!(
        bus.read_long(SSP - 4, AccessClass::SupervisorData).unwrap(),
        ORG + 4
    );
    step(&mut cpu, &mut bus);
    assert_eq!(cpu.core.pc, ORG + 4);
    assert_eq!(cpu.core.a[7], SSP);
}

#[test]
fn scc_materializes_a_compare_result() {
    // MOVEQ #5, D0; CMPI.B #5, D0; SEQ D1
    let (mut cpu, mut bus) = machine(CpuModel::M68000, &[0x7005, 0x0C00, 0x0005, 0x57C1]);
    cpu.core.d[1] = 0x1234_5600;
    step(&mut cpu, &mut bus);
    step(&mut cpu, &mut bus);
    assert_eq!(ccr(&cpu), CCR_Z);
    step(&mut cpu, &mut bus);
    assert_eq!(cpu.core.d[1], 0x1234_56FF);
}

#[test]
fn asl_word_reports_sign_change_as_overflow() {
    // ASL.W #1, D0
    let (mut cpu, mut bus) = machine(CpuModel::M68000, &[0xE340]);
    cpu.core.d[0] = 0x4000;
    step(&mut cpu, &mut bus);
    assert_eq!(cpu.core.d[0] & 0xFFFF, 0x8000);
    assert_eq!(ccr(&cpu), CCR_N | CCR_V);
}

#[test]
fn cas_updates_memory_on_match() {
    // CAS.W D1, D2, (A0)
    let (mut cpu, mut bus) = machine(CpuModel::M68020, &[0x0CD0, 0x0081]);
    cpu.core.a[0] = 0x1000;
    cpu.core.d[1] = 5; // compare
    cpu.core.d[2] = 9; // update
    bus.write_word(0x1000, 5, AccessClass::SupervisorData).unwrap();
    step(&mut cpu, &mut bus);
    assert_eq!(
        bus.read_word(0x1000, AccessClass::SupervisorData).unwrap(),
        9
    );
    assert_eq!(ccr(&cpu) & CCR_Z, CCR_Z);
}

#[test]
fn cas_loads_the_compare_register_on_mismatch() {
    let (mut cpu, mut bus) = machine(CpuModel::M68020, &[0x0CD0, 0x0081]);
    cpu.core.a[0] = 0x1000;
    cpu.core.d[1] = 7;
    cpu.core.d[2] = 9;
    bus.write_word(0x1000, 5, AccessClass::SupervisorData).unwrap();
    step(&mut cpu, &mut bus);
    assert_eq!(
        bus.read_word(0x1000, AccessClass::SupervisorData).unwrap(),
        5
    );
    assert_eq!(cpu.core.d[1] & 0xFFFF, 5);
    assert_eq!(ccr(&cpu) & CCR_Z, 0);
}

#[test]
fn divide_overflow_clears_z_and_sets_v() {
    // MOVEQ #0, D1 leaves Z set; DIVU.W #1, D0 then overflows.
    let (mut cpu, mut bus) = machine(CpuModel::M68000, &[0x7200, 0x80FC, 0x0001]);
    cpu.core.d[0] = 0x0001_0000;
    step(&mut cpu, &mut bus);
    assert_eq!(ccr(&cpu) & CCR_Z, CCR_Z);
    step(&mut cpu, &mut bus);
    // Destination untouched, V set, C and the stale Z cleared.
    assert_eq!(cpu.core.d[0], 0x0001_0000);
    assert_eq!(ccr(&cpu) & (CCR_V | CCR_C | CCR_Z), CCR_V);
}

#[test]
fn mulu_long_gated_by_model() {
    // MULU.L D1, D0 decodes on the 68020 but not the 68000.
    let program = &[0x4C01, 0x0000];
    let (mut cpu, mut bus) = machine(CpuModel::M68020, program);
    cpu.core.d[0] = 7;
    cpu.core.d[1] = 6;
    step(&mut cpu, &mut bus);
    assert_eq!(cpu.core.d[0], 42);

    let (mut cpu, mut bus) = machine(CpuModel::M68000, program);
    step(&mut cpu, &mut bus);
    // Illegal instruction vector with an empty table lands at PC 0.
    assert_eq!(cpu.core.pc, 0);
}

/// Byte-size ALU cases as data. `ccr` is X/N/Z/V/C in the architectural
/// bit order.
#[derive(serde::Deserialize)]
struct AluCase {
    insn: String,
    d0: u32,
    d1: u32,
    result: u32,
    ccr: u16,
}

#[test]
fn byte_alu_flag_table() {
    let cases: Vec<AluCase> = serde_json::from_str(
        r#"[
        {"insn": "add.b", "d0": 127, "d1": 1,   "result": 128, "ccr": 10},
        {"insn": "add.b", "d0": 255, "d1": 1,   "result": 0,   "ccr": 21},
        {"insn": "add.b", "d0": 64,  "d1": 64,  "result": 128, "ccr": 10},
        {"insn": "sub.b", "d0": 0,   "d1": 1,   "result": 255, "ccr": 25},
        {"insn": "sub.b", "d0": 128, "d1": 1,   "result": 127, "ccr": 2},
        {"insn": "cmp.b", "d0": 5,   "d1": 5,   "result": 5,   "ccr": 4},
        {"insn": "cmp.b", "d0": 4,   "d1": 5,   "result": 4,   "ccr": 9},
        {"insn": "and.b", "d0": 240, "d1": 15,  "result": 0,   "ccr": 4},
        {"insn": "and.b", "d0": 255, "d1": 128, "result": 128, "ccr": 8}
    ]"#,
    )
    .unwrap();

    for case in cases {
        let opcode = match case.insn.as_str() {
            "add.b" => 0xD001, // ADD.B D1, D0
            "sub.b" => 0x9001, // SUB.B D1, D0
            "cmp.b" => 0xB001, // CMP.B D1, D0
            "and.b" => 0xC001, // AND.B D1, D0
            other => panic!("unknown insn {other}"),
        };
        let (mut cpu, mut bus) = machine(CpuModel::M68000, &[opcode]);
        cpu.core.d[0] = case.d0;
        cpu.core.d[1] = case.d1;
        step(&mut cpu, &mut bus);
        assert_eq!(
            cpu.core.d[0] & 0xFF,
            case.result,
            "{}: d0={} d1={}",
            case.insn,
            case.d0,
            case.d1
        );
        assert_eq!(
            ccr(&cpu),
            case.ccr,
            "{}: d0={} d1={}",
            case.insn,
            case.d0,
            case.d1
        );
    }
}

#[test]
fn bfins_and_bfext_through_memory() {
    // BFINS D1, ($1000){4:8}; BFEXTU ($1000){4:8}, D2
    let (mut cpu, mut bus) = machine(
        CpuModel::M68020,
        &[
            0xEFF8, 0x1108, 0x1000, // BFINS D1, (abs.W){offset 4, width 8}
            0xE9F8, 0x2108, 0x1000, // BFEXTU (abs.W){offset 4, width 8}, D2
        ],
    );
    cpu.core.d[1] = 0xA5;
    step(&mut cpu, &mut bus);
    // Field spans the low nibble of byte 0 and high nibble of byte 1.
    assert_eq!(bus.peek(0x1000), 0x0A);
    assert_eq!(bus.peek(0x1001), 0x50);
    step(&mut cpu, &mut bus);
    assert_eq!(cpu.core.d[2], 0xA5);
}
