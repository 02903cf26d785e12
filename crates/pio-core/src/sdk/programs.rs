use super::Pio;
use crate::{PioError, Program};

impl Pio {
    /// Whether `program` fits anywhere in instruction memory.
    #[must_use]
    pub fn can_add_program(&self, program: &Program) -> bool {
        self.memory.can_place(program, None).unwrap_or(false)
    }

    /// Whether `program` fits at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`PioError::OriginMismatch`] when a fixed-origin program is
    /// asked for another offset, or [`PioError::InvalidArgument`] for an
    /// offset outside instruction memory.
    pub fn can_add_program_at_offset(
        &self,
        program: &Program,
        offset: u8,
    ) -> Result<bool, PioError> {
        self.memory.can_place(program, Some(offset))
    }

    /// Loads `program` and returns the offset it was placed at.
    ///
    /// # Errors
    ///
    /// Returns [`PioError::NoSpace`] when it does not fit, or the register
    /// error of a failed instruction write.
    pub fn add_program(&self, program: &Program) -> Result<u8, PioError> {
        self.memory
            .place(self.registers.as_ref(), self.base, program, None)
    }

    /// Loads `program` at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`PioError::NoSpace`] when the slots are taken,
    /// [`PioError::OriginMismatch`] for a fixed-origin program at another
    /// offset, or the register error of a failed instruction write.
    pub fn add_program_at_offset(&self, program: &Program, offset: u8) -> Result<(), PioError> {
        self.memory
            .place(self.registers.as_ref(), self.base, program, Some(offset))
            .map(|_| ())
    }

    /// Unloads `program` previously loaded at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`PioError::OriginMismatch`] for a fixed-origin program at
    /// another offset.
    ///
    /// # Panics
    ///
    /// Panics when `program` does not occupy its slots at `offset`.
    pub fn remove_program(&self, program: &Program, offset: u8) -> Result<(), PioError> {
        self.memory.deallocate(program, offset)
    }

    /// Unloads every program and zeroes instruction memory.
    ///
    /// # Errors
    ///
    /// Returns the register error of a failed write.
    pub fn clear_instruction_memory(&self) -> Result<(), PioError> {
        self.memory.clear(self.registers.as_ref(), self.base)
    }
}
