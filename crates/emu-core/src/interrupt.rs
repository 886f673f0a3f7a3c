//! Interrupt controller collaborator.

/// A prioritized interrupt source.
///
/// The controller holds the highest pending request level (1-7); level 0
/// means nothing is pending. When the CPU accepts an interrupt it runs an
/// acknowledge cycle, and the controller answers with the vector byte for
/// that level (or an autovector).
pub trait InterruptController {
    /// Highest pending interrupt level, 0 if none.
    fn pending_level(&self) -> u8;

    /// Acknowledge an interrupt at `level`, returning the vector byte.
    fn acknowledge(&mut self, level: u8) -> u8;
}

/// Controller that always answers with the autovector for the level.
///
/// Also usable as a manually driven test source.
#[derive(Debug, Default)]
pub struct AutoVector {
    level: u8,
}

impl AutoVector {
    /// Create with no pending interrupt.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assert (or clear, with 0) the pending level.
    pub fn set_level(&mut self, level: u8) {
        self.level = level & 7;
    }
}

impl InterruptController for AutoVector {
    fn pending_level(&self) -> u8 {
        self.level
    }

    fn acknowledge(&mut self, level: u8) -> u8 {
        self.level = 0;
        24 + level
    }
}
