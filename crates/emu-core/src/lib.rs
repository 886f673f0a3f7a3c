//! Core traits and types shared by CPU cores.
//!
//! A CPU core never owns memory or peripherals. It reaches them through the
//! traits defined here: the `Bus` (classified, fault-reporting memory
//! access), the `InterruptController` (prioritized interrupt requests), and
//! `Observable` (read-only state inspection for debuggers).

mod bus;
mod interrupt;
mod observable;

pub use bus::{AccessClass, Bus, BusError, LinearMemory};
pub use interrupt::{AutoVector, InterruptController};
pub use observable::{Observable, Value};
