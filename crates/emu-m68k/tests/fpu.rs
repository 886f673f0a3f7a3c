//! F-line coprocessor tests: moves, arithmetic, conditionals, FMOVEM.

use emu_core::{AccessClass, Bus, LinearMemory};
use emu_m68k::softfloat::FloatX80;
use emu_m68k::{CpuModel, M68kCpu, StepOutcome};

const SSP: u32 = 0x8000;
const ORG: u32 = 0x400;

fn load_words(bus: &mut LinearMemory, addr: u32, words: &[u16]) {
    for (i, &w) in words.iter().enumerate() {
        bus.write_word(addr + 2 * i as u32, w, AccessClass::SupervisorData)
            .unwrap();
    }
}

fn machine(program: &[u16]) -> (M68kCpu, LinearMemory) {
    let mut bus = LinearMemory::new(0x2_0000);
    bus.write_long(0, SSP, AccessClass::SupervisorData).unwrap();
    bus.write_long(4, ORG, AccessClass::SupervisorData).unwrap();
    load_words(&mut bus, ORG, program);
    let mut cpu = M68kCpu::new(CpuModel::M68040);
    cpu.reset(&mut bus).unwrap();
    (cpu, bus)
}

fn step(cpu: &mut M68kCpu, bus: &mut LinearMemory) {
    assert_eq!(cpu.step(bus).unwrap(), StepOutcome::Executed);
}

#[test]
fn fmove_long_immediate_converts_to_extended() {
    // FMOVE.L #5, FP0
    let (mut cpu, mut bus) = machine(&[0xF23C, 0x4000, 0x0000, 0x0005]);
    step(&mut cpu, &mut bus);
    assert_eq!(cpu.core.fregs[0].to_f64(), 5.0);
    assert_eq!(cpu.core.pc, ORG + 8);
    // A positive nonzero result clears the whole condition nibble.
    assert_eq!(cpu.core.fpsr & 0x0F00_0000, 0);
}

#[test]
fn fmul_register_to_register() {
    // FMUL FP1, FP0
    let (mut cpu, mut bus) = machine(&[0xF200, 0x0423]);
    cpu.core.fregs[0] = FloatX80::from_f64(2.0);
    cpu.core.fregs[1] = FloatX80::from_f64(3.0);
    step(&mut cpu, &mut bus);
    assert_eq!(cpu.core.fregs[0].to_f64(), 6.0);
    assert_eq!(cpu.core.fpiar, ORG);
}

#[test]
fn fdiv_by_zero_sets_the_accrued_bit() {
    // FDIV FP1, FP0
    let (mut cpu, mut bus) = machine(&[0xF200, 0x0420]);
    cpu.core.fregs[0] = FloatX80::from_f64(1.0);
    cpu.core.fregs[1] = FloatX80::ZERO;
    step(&mut cpu, &mut bus);
    assert!(cpu.core.fregs[0].is_infinity());
    // AEXC divide-by-zero bit.
    assert_ne!(cpu.core.fpsr & 0x10, 0);
    // Infinity condition bit.
    assert_ne!(cpu.core.fpsr & 0x0200_0000, 0);
}

#[test]
fn fmove_out_rounds_to_a_long() {
    // FMOVE.L FP2, D0
    let (mut cpu, mut bus) = machine(&[0xF200, 0x6100]);
    cpu.core.fregs[2] = FloatX80::from_f64(-7.25);
    step(&mut cpu, &mut bus);
    assert_eq!(cpu.core.d[0], (-7i32) as u32);
}

#[test]
fn fcmp_orders_and_fbcc_branches() {
    // FCMP FP1, FP0; FBLT taken
    let (mut cpu, mut bus) = machine(&[0xF200, 0x0438, 0xF284, 0x001A]);
    cpu.core.fregs[0] = FloatX80::from_f64(1.0);
    cpu.core.fregs[1] = FloatX80::from_f64(2.0);
    step(&mut cpu, &mut bus);
    // Less than: N set, FP0 untouched.
    assert_ne!(cpu.core.fpsr & 0x0800_0000, 0);
    assert_eq!(cpu.core.fregs[0].to_f64(), 1.0);
    step(&mut cpu, &mut bus);
    assert_eq!(cpu.core.pc, ORG + 6 + 0x1A);
}

#[test]
fn fbcc_falls_through_when_false() {
    // FBEQ after clearing FPSR
    let (mut cpu, mut bus) = machine(&[0xF281, 0x0010]);
    cpu.core.fpsr = 0;
    step(&mut cpu, &mut bus);
    assert_eq!(cpu.core.pc, ORG + 4);
}

#[test]
fn fscc_writes_the_predicate_byte() {
    // FTST FP3; FSEQ D1
    let (mut cpu, mut bus) = machine(&[0xF200, 0x0C3A, 0xF241, 0x0001]);
    cpu.core.fregs[3] = FloatX80::ZERO;
    cpu.core.d[1] = 0xAAAA_AA00;
    step(&mut cpu, &mut bus);
    step(&mut cpu, &mut bus);
    assert_eq!(cpu.core.d[1], 0xAAAA_AAFF);
}

#[test]
fn fmovem_round_trips_through_the_stack() {
    // FMOVEM FP0-FP1, -(A7); FMOVEM (A7)+, FP0-FP1
    let (mut cpu, mut bus) = machine(&[0xF227, 0xE003, 0xF21F, 0xD0C0]);
    cpu.core.fregs[0] = FloatX80::from_f64(1.5);
    cpu.core.fregs[1] = FloatX80::from_f64(-2.5);
    step(&mut cpu, &mut bus);
    assert_eq!(cpu.core.a[7], SSP - 24);
    cpu.core.fregs[0] = FloatX80::ZERO;
    cpu.core.fregs[1] = FloatX80::ZERO;
    step(&mut cpu, &mut bus);
    assert_eq!(cpu.core.a[7], SSP);
    assert_eq!(cpu.core.fregs[0].to_f64(), 1.5);
    assert_eq!(cpu.core.fregs[1].to_f64(), -2.5);
}

#[test]
fn fmove_control_registers() {
    // FMOVE.L D0, FPCR; FMOVE.L FPSR, D2
    let (mut cpu, mut bus) = machine(&[0xF200, 0x9000, 0xF202, 0xA800]);
    cpu.core.d[0] = 0x0000_0010; // round toward zero
    cpu.core.fpsr = 0x0800_0000;
    step(&mut cpu, &mut bus);
    assert_eq!(cpu.core.fpcr, 0x10);
    step(&mut cpu, &mut bus);
    assert_eq!(cpu.core.d[2], 0x0800_0000);
}

#[test]
fn transcendentals_operate_register_to_register() {
    // FSIN FP1, FP0; FLOGN FP2, FP3
    let (mut cpu, mut bus) = machine(&[0xF200, 0x040E, 0xF200, 0x0994]);
    cpu.core.fregs[1] = FloatX80::from_f64(std::f64::consts::FRAC_PI_2);
    cpu.core.fregs[2] = FloatX80::from_f64(1.0);
    step(&mut cpu, &mut bus);
    assert_eq!(cpu.core.fregs[0].to_f64(), 1.0);
    step(&mut cpu, &mut bus);
    assert!(cpu.core.fregs[3].is_zero());
    // ln(1) is zero: Z set in the condition nibble.
    assert_ne!(cpu.core.fpsr & 0x0400_0000, 0);
}

#[test]
fn flogn_of_zero_is_a_pole() {
    // FLOGN FP1, FP0
    let (mut cpu, mut bus) = machine(&[0xF200, 0x0414]);
    cpu.core.fregs[1] = FloatX80::ZERO;
    step(&mut cpu, &mut bus);
    let r = cpu.core.fregs[0];
    assert!(r.is_infinity() && r.is_negative());
    // AEXC divide-by-zero, plus N and I condition bits.
    assert_ne!(cpu.core.fpsr & 0x10, 0);
    assert_ne!(cpu.core.fpsr & 0x0A00_0000, 0);
}

#[test]
fn fsincos_fills_both_registers() {
    // FSINCOS FP2, FP1:FP0
    let (mut cpu, mut bus) = machine(&[0xF200, 0x0831]);
    cpu.core.fregs[2] = FloatX80::ZERO;
    step(&mut cpu, &mut bus);
    assert!(cpu.core.fregs[0].is_zero());
    assert_eq!(cpu.core.fregs[1].to_f64(), 1.0);
    // Condition nibble reflects the sine result.
    assert_ne!(cpu.core.fpsr & 0x0400_0000, 0);
}

#[test]
fn frestore_of_a_null_frame_resets_the_fpu() {
    // FSAVE -(A7); FRESTORE (A7)+
    let (mut cpu, mut bus) = machine(&[0xF327, 0xF35F]);
    cpu.core.fregs[0] = FloatX80::from_f64(9.0);
    cpu.core.fpcr = 0x10;
    step(&mut cpu, &mut bus);
    assert_eq!(cpu.core.a[7], SSP - 4);
    step(&mut cpu, &mut bus);
    assert_eq!(cpu.core.a[7], SSP);
    assert!(cpu.core.fregs[0].is_nan());
    assert_eq!(cpu.core.fpcr, 0);
}

#[test]
fn unknown_opmode_takes_the_line_f_vector() {
    // Opmode $2F is unassigned.
    let (mut cpu, mut bus) = machine(&[0xF200, 0x002F]);
    bus.write_long(11 * 4, 0x3000, AccessClass::SupervisorData)
        .unwrap();
    step(&mut cpu, &mut bus);
    assert_eq!(cpu.core.pc, 0x3000);
}
