//! Motorola 680x0 / ColdFire family CPU core.
//!
//! One interpreter covers the classic 68000 through 68040 and the ColdFire
//! ISA revisions, configured by a per-model feature set that the decode
//! table is built from. Condition codes are deferred: most instructions
//! record enough of their operands to reconstruct the CCR later, and the
//! flags only materialize when something reads them.
//!
//! The crate emulates the full privileged machine: exception stack frames
//! in the formats each model really pushes, the 68040 MMU table walker,
//! the 68881-style software FPU, and the ColdFire MAC/EMAC unit.
//!
//! # Usage
//!
//! ```ignore
//! use emu_core::{Bus, LinearMemory};
//! use emu_m68k::{CpuModel, M68kCpu};
//!
//! let mut bus = LinearMemory::new(0x10000);
//! // Reset vectors: initial SSP and PC.
//! bus.load(0, &[0x00, 0x00, 0x80, 0x00, 0x00, 0x00, 0x04, 0x00]);
//! let mut cpu = M68kCpu::new(CpuModel::M68020);
//! cpu.reset(&mut bus)?;
//! cpu.step(&mut bus)?;
//! # Ok::<(), emu_m68k::FatalError>(())
//! ```

#![warn(missing_docs)]

pub mod cc;
pub mod cpu;
pub mod decode;
pub mod ea;
pub mod exception;
pub mod features;
pub mod flags;
pub mod mmu;
pub mod registers;
pub mod softfloat;

mod arith;
mod bitfield;
mod branches;
mod fpu;
mod logic;
mod mac;
mod misc;
mod observable;
mod shifts;

pub use cpu::{M68kCpu, StepOutcome};
pub use exception::{Exception, FatalError};
pub use features::{CpuModel, Feature, FeatureSet};
pub use registers::{CpuCore, SpBank};
