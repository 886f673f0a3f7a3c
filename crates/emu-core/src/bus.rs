//! Classified, fault-reporting memory access.
//!
//! Every access carries an [`AccessClass`] (supervisor/user × program/data),
//! matching the function-code pins of the 68000 family. Every access can
//! fail, and failures distinguish an address-decode miss (nothing mapped
//! there) from a bus fault signaled by the device itself. The CPU core turns
//! these into the architecturally correct exception.

use std::fmt;

/// Access classification, mirroring the FC0-FC2 function code pins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessClass {
    /// User-mode data access (FC=1).
    UserData = 1,
    /// User-mode program access (FC=2).
    UserProgram = 2,
    /// Supervisor data access (FC=5).
    SupervisorData = 5,
    /// Supervisor program access (FC=6).
    SupervisorProgram = 6,
    /// Interrupt acknowledge cycle (FC=7).
    InterruptAck = 7,
}

impl AccessClass {
    /// Build an access class from supervisor and program/data flags.
    #[must_use]
    pub fn from_flags(supervisor: bool, program: bool) -> Self {
        match (supervisor, program) {
            (false, false) => Self::UserData,
            (false, true) => Self::UserProgram,
            (true, false) => Self::SupervisorData,
            (true, true) => Self::SupervisorProgram,
        }
    }

    /// The 3-bit function code value.
    #[must_use]
    pub fn bits(self) -> u8 {
        self as u8
    }

    /// True for the supervisor classes.
    #[must_use]
    pub fn is_supervisor(self) -> bool {
        matches!(
            self,
            Self::SupervisorData | Self::SupervisorProgram | Self::InterruptAck
        )
    }

    /// True for the program (instruction fetch) classes.
    #[must_use]
    pub fn is_program(self) -> bool {
        matches!(self, Self::UserProgram | Self::SupervisorProgram)
    }
}

/// A failed bus transaction.
///
/// `Decode` means no device answered the address at all; `Fault` means a
/// device answered by asserting a bus error. Both end up as an access fault
/// in the CPU, but callers that probe memory (debuggers, table walkers in
/// test mode) need to tell them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// No device is mapped at this address.
    Decode { addr: u32 },
    /// The addressed device signaled a bus error.
    Fault { addr: u32 },
}

impl BusError {
    /// The faulting address.
    #[must_use]
    pub fn addr(self) -> u32 {
        match self {
            Self::Decode { addr } | Self::Fault { addr } => addr,
        }
    }
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode { addr } => write!(f, "bus decode error at {addr:#010x}"),
            Self::Fault { addr } => write!(f, "bus fault at {addr:#010x}"),
        }
    }
}

impl std::error::Error for BusError {}

/// Memory collaborator for 32-bit CPU cores.
///
/// All multi-byte accesses are big-endian. Addresses are physical: the CPU
/// core runs its MMU (when enabled) before calling into the bus.
pub trait Bus {
    /// Read a byte.
    fn read_byte(&mut self, addr: u32, class: AccessClass) -> Result<u8, BusError>;

    /// Write a byte.
    fn write_byte(&mut self, addr: u32, value: u8, class: AccessClass) -> Result<(), BusError>;

    /// Read a big-endian 16-bit word.
    fn read_word(&mut self, addr: u32, class: AccessClass) -> Result<u16, BusError> {
        let hi = self.read_byte(addr, class)?;
        let lo = self.read_byte(addr.wrapping_add(1), class)?;
        Ok(u16::from(hi) << 8 | u16::from(lo))
    }

    /// Write a big-endian 16-bit word.
    fn write_word(&mut self, addr: u32, value: u16, class: AccessClass) -> Result<(), BusError> {
        self.write_byte(addr, (value >> 8) as u8, class)?;
        self.write_byte(addr.wrapping_add(1), value as u8, class)
    }

    /// Read a big-endian 32-bit long.
    fn read_long(&mut self, addr: u32, class: AccessClass) -> Result<u32, BusError> {
        let hi = self.read_word(addr, class)?;
        let lo = self.read_word(addr.wrapping_add(2), class)?;
        Ok(u32::from(hi) << 16 | u32::from(lo))
    }

    /// Write a big-endian 32-bit long.
    fn write_long(&mut self, addr: u32, value: u32, class: AccessClass) -> Result<(), BusError> {
        self.write_word(addr, (value >> 16) as u16, class)?;
        self.write_word(addr.wrapping_add(2), value as u16, class)
    }

    /// Read a big-endian 64-bit quad (used by combined CAS2 accesses).
    fn read_quad(&mut self, addr: u32, class: AccessClass) -> Result<u64, BusError> {
        let hi = self.read_long(addr, class)?;
        let lo = self.read_long(addr.wrapping_add(4), class)?;
        Ok(u64::from(hi) << 32 | u64::from(lo))
    }

    /// Write a big-endian 64-bit quad.
    fn write_quad(&mut self, addr: u32, value: u64, class: AccessClass) -> Result<(), BusError> {
        self.write_long(addr, (value >> 32) as u32, class)?;
        self.write_long(addr.wrapping_add(4), value as u32, class)
    }
}

/// A flat byte array bus: the whole address range maps to RAM.
///
/// Used by unit tests and fixtures. Accesses past the end report a decode
/// error rather than wrapping.
pub struct LinearMemory {
    data: Vec<u8>,
}

impl LinearMemory {
    /// Allocate `size` bytes of zeroed RAM starting at address 0.
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0; size],
        }
    }

    /// Copy `bytes` into RAM at `addr`.
    pub fn load(&mut self, addr: u32, bytes: &[u8]) {
        let start = addr as usize;
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
    }

    /// Read a byte without an access class (debugger peek).
    #[must_use]
    pub fn peek(&self, addr: u32) -> u8 {
        self.data.get(addr as usize).copied().unwrap_or(0)
    }
}

impl Bus for LinearMemory {
    fn read_byte(&mut self, addr: u32, _class: AccessClass) -> Result<u8, BusError> {
        self.data
            .get(addr as usize)
            .copied()
            .ok_or(BusError::Decode { addr })
    }

    fn write_byte(&mut self, addr: u32, value: u8, _class: AccessClass) -> Result<(), BusError> {
        match self.data.get_mut(addr as usize) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(BusError::Decode { addr }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_and_long_accesses_are_big_endian() {
        let mut mem = LinearMemory::new(0x100);
        mem.write_long(0x10, 0x1234_5678, AccessClass::SupervisorData)
            .unwrap();
        assert_eq!(mem.peek(0x10), 0x12);
        assert_eq!(mem.peek(0x13), 0x78);
        assert_eq!(
            mem.read_word(0x12, AccessClass::SupervisorData).unwrap(),
            0x5678
        );
        assert_eq!(
            mem.read_quad(0x0E, AccessClass::SupervisorData).unwrap(),
            0x0000_1234_5678_0000
        );
    }

    #[test]
    fn out_of_range_access_reports_decode_error() {
        let mut mem = LinearMemory::new(0x10);
        assert_eq!(
            mem.read_byte(0x20, AccessClass::UserData),
            Err(BusError::Decode { addr: 0x20 })
        );
    }
}
