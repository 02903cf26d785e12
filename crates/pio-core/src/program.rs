//! Immutable PIO program description.

use crate::layout::MEMORY_SIZE;
use crate::ProgramError;

/// Side-set geometry declared by a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SideSet {
    /// Number of side-set data bits, excluding the enable bit.
    pub count: u8,
    /// Whether side-set is optional (costs one extra enable bit).
    pub optional: bool,
    /// Whether side-set drives pin directions instead of values.
    pub pindirs: bool,
}

impl SideSet {
    /// Bits of the delay/side-set field taken by side-set, enable included.
    #[must_use]
    pub const fn total_bits(self) -> u8 {
        self.count + self.optional as u8
    }
}

/// A validated program: 1..=32 instructions plus placement and wrap data.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Program {
    id: Option<String>,
    origin: Option<u8>,
    wrap: u8,
    wrap_target: u8,
    side_set: SideSet,
    instructions: Vec<u16>,
    allocation_mask: u32,
}

impl Program {
    /// Starts building a program.
    #[must_use]
    pub fn builder() -> ProgramBuilder {
        ProgramBuilder::default()
    }

    /// Identifier from `.program`, if any.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Fixed load offset; `None` means the program is relocatable.
    #[must_use]
    pub const fn origin(&self) -> Option<u8> {
        self.origin
    }

    /// Whether the program may be loaded at any offset.
    #[must_use]
    pub const fn is_relocatable(&self) -> bool {
        self.origin.is_none()
    }

    /// Wrap source address.
    #[must_use]
    pub const fn wrap(&self) -> u8 {
        self.wrap
    }

    /// Wrap destination address.
    #[must_use]
    pub const fn wrap_target(&self) -> u8 {
        self.wrap_target
    }

    /// Side-set geometry.
    #[must_use]
    pub const fn side_set(&self) -> SideSet {
        self.side_set
    }

    /// Instruction words in program order.
    #[must_use]
    pub fn instructions(&self) -> &[u16] {
        &self.instructions
    }

    /// Instruction `index`, if present.
    #[must_use]
    pub fn instruction(&self, index: usize) -> Option<u16> {
        self.instructions.get(index).copied()
    }

    /// Number of instructions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Always `false`; a built program has at least one instruction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Instruction memory slots taken by the program.
    ///
    /// Rotated to the origin for fixed programs; based at slot 0 for
    /// relocatable ones.
    #[must_use]
    pub const fn allocation_mask(&self) -> u32 {
        self.allocation_mask
    }

    /// Mask of `len` consecutive slots starting at slot 0.
    #[must_use]
    pub const fn base_mask(len: usize) -> u32 {
        if len >= 32 {
            u32::MAX
        } else {
            (1 << len) - 1
        }
    }
}

/// Accumulates program fields and validates them in [`Self::build`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramBuilder {
    id: Option<String>,
    origin: Option<u8>,
    wrap: Option<u8>,
    wrap_target: Option<u8>,
    side_set: SideSet,
    instructions: Vec<u16>,
}

impl ProgramBuilder {
    /// Sets the program identifier.
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Pins the program to `origin`; `None` keeps it relocatable.
    #[must_use]
    pub const fn origin(mut self, origin: Option<u8>) -> Self {
        self.origin = origin;
        self
    }

    /// Sets the wrap source address.
    #[must_use]
    pub const fn wrap(mut self, wrap: u8) -> Self {
        self.wrap = Some(wrap);
        self
    }

    /// Sets the wrap destination address.
    #[must_use]
    pub const fn wrap_target(mut self, wrap_target: u8) -> Self {
        self.wrap_target = Some(wrap_target);
        self
    }

    /// Sets the side-set geometry.
    #[must_use]
    pub const fn side_set(mut self, count: u8, optional: bool, pindirs: bool) -> Self {
        self.side_set = SideSet {
            count,
            optional,
            pindirs,
        };
        self
    }

    /// Appends one instruction word.
    #[must_use]
    pub fn instruction(mut self, instruction: u16) -> Self {
        self.instructions.push(instruction);
        self
    }

    /// Appends instruction words.
    #[must_use]
    pub fn instructions(mut self, instructions: impl IntoIterator<Item = u16>) -> Self {
        self.instructions.extend(instructions);
        self
    }

    /// Validates the accumulated fields and derives defaults.
    ///
    /// Without explicit values, `wrap_target` defaults to the origin (or 0)
    /// and `wrap` to the last instruction's slot.
    ///
    /// # Errors
    ///
    /// Returns [`ProgramError`] when any field is out of range or the
    /// instruction count is not within `1..=32`.
    pub fn build(self) -> Result<Program, ProgramError> {
        if self.id.as_deref() == Some("") {
            return Err(ProgramError::EmptyId);
        }
        if let Some(origin) = self.origin {
            if origin >= MEMORY_SIZE {
                return Err(ProgramError::OriginOutOfRange(origin));
            }
        }
        if let Some(wrap) = self.wrap.filter(|&wrap| wrap >= MEMORY_SIZE) {
            return Err(ProgramError::WrapOutOfRange(wrap));
        }
        if let Some(target) = self.wrap_target.filter(|&target| target >= MEMORY_SIZE) {
            return Err(ProgramError::WrapTargetOutOfRange(target));
        }
        let max_count = if self.side_set.optional { 4 } else { 5 };
        if self.side_set.count > max_count {
            return Err(ProgramError::SideSetCountOutOfRange {
                count: self.side_set.count,
                max: max_count,
            });
        }
        let len = self.instructions.len();
        if len == 0 {
            return Err(ProgramError::Empty);
        }
        if len > usize::from(MEMORY_SIZE) {
            return Err(ProgramError::TooLong(len));
        }

        let start = self.origin.unwrap_or(0);
        let last = u8::try_from(len - 1).map_err(|_| ProgramError::TooLong(len))?;
        let wrap_target = self.wrap_target.unwrap_or(start);
        let wrap = self.wrap.unwrap_or((start + last) % MEMORY_SIZE);
        let allocation_mask = Program::base_mask(len).rotate_left(u32::from(start));

        Ok(Program {
            id: self.id,
            origin: self.origin,
            wrap,
            wrap_target,
            side_set: self.side_set,
            instructions: self.instructions,
            allocation_mask,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::Program;
    use crate::ProgramError;
    use rstest::rstest;

    #[test]
    fn relocatable_defaults_start_at_zero() {
        let program = Program::builder()
            .instructions([0xe081, 0x6001, 0x0001])
            .build()
            .unwrap();
        assert!(program.is_relocatable());
        assert_eq!(program.wrap_target(), 0);
        assert_eq!(program.wrap(), 2);
        assert_eq!(program.allocation_mask(), 0b111);
        assert_eq!(program.id(), None);
    }

    #[test]
    fn fixed_origin_wraps_around_memory() {
        let program = Program::builder()
            .origin(Some(30))
            .instructions([1, 2, 3, 4])
            .build()
            .unwrap();
        assert_eq!(program.wrap_target(), 30);
        assert_eq!(program.wrap(), 1);
        assert_eq!(program.allocation_mask(), 0b11 | (0b11 << 30));
    }

    #[test]
    fn full_memory_program_takes_every_slot() {
        let program = Program::builder()
            .origin(Some(3))
            .instructions(0..32)
            .build()
            .unwrap();
        assert_eq!(program.allocation_mask(), u32::MAX);
        assert_eq!(program.wrap(), 2);
    }

    #[test]
    fn explicit_values_override_defaults() {
        let program = Program::builder()
            .id("blink")
            .wrap(1)
            .wrap_target(0)
            .side_set(2, true, false)
            .instruction(0xa042)
            .instruction(0x0000)
            .instruction(0x0000)
            .build()
            .unwrap();
        assert_eq!(program.id(), Some("blink"));
        assert_eq!(program.wrap(), 1);
        assert_eq!(program.side_set().total_bits(), 3);
        assert_eq!(program.instruction(0), Some(0xa042));
        assert_eq!(program.instruction(3), None);
    }

    #[rstest]
    #[case(Program::builder().build(), ProgramError::Empty)]
    #[case(Program::builder().id("").instruction(0).build(), ProgramError::EmptyId)]
    #[case(Program::builder().origin(Some(32)).instruction(0).build(), ProgramError::OriginOutOfRange(32))]
    #[case(Program::builder().wrap(32).instruction(0).build(), ProgramError::WrapOutOfRange(32))]
    #[case(Program::builder().wrap_target(40).instruction(0).build(), ProgramError::WrapTargetOutOfRange(40))]
    #[case(Program::builder().side_set(6, false, false).instruction(0).build(), ProgramError::SideSetCountOutOfRange { count: 6, max: 5 })]
    #[case(Program::builder().side_set(5, true, false).instruction(0).build(), ProgramError::SideSetCountOutOfRange { count: 5, max: 4 })]
    #[case(Program::builder().instructions(0..33).build(), ProgramError::TooLong(33))]
    fn invalid_programs_are_rejected(
        #[case] result: Result<Program, ProgramError>,
        #[case] expected: ProgramError,
    ) {
        assert_eq!(result, Err(expected));
    }
}
