//! Instruction memory allocator of one PIO block.

use std::sync::{Mutex, PoisonError};

use tracing::debug;

use crate::instr::relocate;
use crate::layout::{register_address, INSTR_MEM0, MEMORY_SIZE};
use crate::registers::Registers;
use crate::{PioError, Program};

/// Outcome of an allocation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placement {
    /// Slots are (or would be) taken starting at this offset.
    At(u8),
    /// A check-only request found no room.
    NotPossible,
}

/// `mask` rotated left by `offset` slots within the 32-slot memory.
#[must_use]
pub const fn rotated_mask(mask: u32, offset: u8) -> u32 {
    mask.rotate_left(offset as u32 % MEMORY_SIZE as u32)
}

/// Occupancy tracking for the 32 instruction slots.
///
/// Bit `i` of the occupancy mask is set while slot `i` belongs to a loaded
/// program. When combined with register writes the occupancy lock is always
/// taken before the register lock.
#[derive(Debug, Default)]
pub struct InstructionMemory {
    occupancy: Mutex<u32>,
}

impl InstructionMemory {
    /// Creates an empty instruction memory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently occupied slots.
    #[must_use]
    pub fn occupancy(&self) -> u32 {
        *self.occupancy.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reserves the slots of `mask`.
    ///
    /// With `origin` set, `mask` is already rotated into place and is accepted
    /// only when none of its slots are taken. Without it, the first offset
    /// whose rotation of `mask` is free wins. With `check_only`, occupancy is
    /// left untouched and a failed search yields [`Placement::NotPossible`].
    ///
    /// # Errors
    ///
    /// Returns [`PioError::NoSpace`] when no placement exists and `check_only`
    /// is not set.
    pub fn allocate(
        &self,
        mask: u32,
        origin: Option<u8>,
        check_only: bool,
    ) -> Result<Placement, PioError> {
        let mut occupancy = self.lock();
        allocate_in(&mut occupancy, mask, origin, check_only)
    }

    /// Whether `program` fits, optionally at a caller-chosen `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`PioError::OriginMismatch`] when `offset` contradicts the
    /// program's fixed origin.
    pub fn can_place(&self, program: &Program, offset: Option<u8>) -> Result<bool, PioError> {
        let (mask, origin) = placement_request(program, offset)?;
        Ok(self.allocate(mask, origin, true)? != Placement::NotPossible)
    }

    /// Allocates slots for `program` and writes its instructions into the
    /// block at `base`, relocating jumps of relocatable programs.
    ///
    /// Returns the chosen offset. On failure occupancy is unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`PioError::NoSpace`] when the program does not fit,
    /// [`PioError::OriginMismatch`] for a contradicting `offset`, or the
    /// register error of a failed instruction write.
    pub fn place(
        &self,
        registers: &dyn Registers,
        base: u32,
        program: &Program,
        offset: Option<u8>,
    ) -> Result<u8, PioError> {
        let (mask, origin) = placement_request(program, offset)?;
        let mut occupancy = self.lock();
        let Placement::At(offset) = allocate_in(&mut occupancy, mask, origin, false)? else {
            return Err(PioError::NoSpace);
        };
        let taken = rotated_mask(Program::base_mask(program.len()), offset);
        let relocatable = program.is_relocatable();
        let written = registers.transaction(&mut |access| {
            for (slot, &instruction) in (offset..).zip(program.instructions()) {
                let word = if relocatable {
                    relocate(instruction, offset)
                } else {
                    instruction
                };
                let index = INSTR_MEM0 + u32::from(slot % MEMORY_SIZE);
                access.write(register_address(base, index), u32::from(word))?;
            }
            Ok(())
        });
        if let Err(error) = written {
            *occupancy &= !taken;
            return Err(error.into());
        }
        debug!(
            program = program.id().unwrap_or("<anonymous>"),
            offset,
            occupancy = *occupancy,
            "program loaded"
        );
        Ok(offset)
    }

    /// Releases the slots `program` occupies when loaded at `offset`.
    ///
    /// Instruction words are left in place.
    ///
    /// # Errors
    ///
    /// Returns [`PioError::OriginMismatch`] when `offset` contradicts the
    /// program's fixed origin.
    ///
    /// # Panics
    ///
    /// Panics when some of the slots are not currently occupied; the caller
    /// passed a program that was never loaded at `offset`.
    pub fn deallocate(&self, program: &Program, offset: u8) -> Result<(), PioError> {
        placement_request(program, Some(offset))?;
        let mask = rotated_mask(Program::base_mask(program.len()), offset);
        let mut occupancy = self.lock();
        let current = *occupancy;
        if current & mask != mask {
            drop(occupancy);
            panic!(
                "deallocating slots {mask:#010x} at offset {offset}, \
                 but only {:#010x} of them are occupied (occupancy {current:#010x})",
                current & mask
            );
        }
        *occupancy = current & !mask;
        debug!(
            program = program.id().unwrap_or("<anonymous>"),
            offset,
            occupancy = *occupancy,
            "program removed"
        );
        Ok(())
    }

    /// Frees every slot and zeroes the instruction memory of the block at
    /// `base`.
    ///
    /// # Errors
    ///
    /// Returns the register error of a failed write; occupancy is then kept.
    pub fn clear(&self, registers: &dyn Registers, base: u32) -> Result<(), PioError> {
        let mut occupancy = self.lock();
        registers.transaction(&mut |access| {
            for slot in 0..u32::from(MEMORY_SIZE) {
                access.write(register_address(base, INSTR_MEM0 + slot), 0)?;
            }
            Ok(())
        })?;
        *occupancy = 0;
        debug!(base, "instruction memory cleared");
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, u32> {
        self.occupancy.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn allocate_in(
    occupancy: &mut u32,
    mask: u32,
    origin: Option<u8>,
    check_only: bool,
) -> Result<Placement, PioError> {
    let found = match origin {
        Some(origin) => (*occupancy & mask == 0).then_some((origin, mask)),
        None => (0..MEMORY_SIZE)
            .map(|offset| (offset, rotated_mask(mask, offset)))
            .find(|&(_, rotated)| *occupancy & rotated == 0),
    };
    match found {
        Some((offset, rotated)) => {
            if !check_only {
                *occupancy |= rotated;
            }
            Ok(Placement::At(offset))
        }
        None if check_only => Ok(Placement::NotPossible),
        None => Err(PioError::NoSpace),
    }
}

/// Maps a program and an optional caller offset onto an allocation request.
fn placement_request(program: &Program, offset: Option<u8>) -> Result<(u32, Option<u8>), PioError> {
    match (program.origin(), offset) {
        (Some(origin), Some(offset)) if origin != offset => {
            Err(PioError::OriginMismatch { origin, offset })
        }
        (Some(origin), _) => Ok((program.allocation_mask(), Some(origin))),
        (None, Some(offset)) if offset >= MEMORY_SIZE => Err(PioError::invalid_argument(format!(
            "offset {offset} outside instruction memory"
        ))),
        (None, Some(offset)) => Ok((
            rotated_mask(Program::base_mask(program.len()), offset),
            Some(offset),
        )),
        (None, None) => Ok((Program::base_mask(program.len()), None)),
    }
}
