//! Encodings of the few instructions the SDK synthesizes itself.

const OPCODE_MASK: u16 = 0xe000;
const JMP_OPCODE: u16 = 0x0000;
const OUT_OPCODE: u16 = 0x6000;
const PULL_OPCODE: u16 = 0x8080;
const SET_OPCODE: u16 = 0xe000;
const ADDRESS_MASK: u16 = 0x001f;

/// Destination of a `SET` instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum SetDestination {
    /// Pin output values.
    Pins = 0,
    /// Scratch register X.
    X = 1,
    /// Scratch register Y.
    Y = 2,
    /// Pin output enables.
    PinDirs = 4,
}

/// Destination of an `OUT` instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum OutDestination {
    /// Pin output values.
    Pins = 0,
    /// Scratch register X.
    X = 1,
    /// Scratch register Y.
    Y = 2,
    /// Discard the data.
    Null = 3,
    /// Pin output enables.
    PinDirs = 4,
    /// Program counter.
    Pc = 5,
    /// Input shift register.
    Isr = 6,
    /// Execute the data as an instruction.
    Exec = 7,
}

/// Unconditional `JMP` to `address` (modulo 32).
#[must_use]
pub const fn jmp(address: u8) -> u16 {
    JMP_OPCODE | (address as u16 & ADDRESS_MASK)
}

/// `SET dest, data` with a 5-bit immediate.
#[must_use]
pub const fn set(destination: SetDestination, data: u8) -> u16 {
    SET_OPCODE | ((destination as u16) << 5) | (data as u16 & 0x1f)
}

/// `OUT dest, count`; a count of 32 is encoded as 0.
#[must_use]
pub const fn out(destination: OutDestination, count: u8) -> u16 {
    OUT_OPCODE | ((destination as u16) << 5) | (count as u16 & 0x1f)
}

/// `PULL` with the given `IfEmpty` and `Block` flags.
#[must_use]
pub const fn pull(if_empty: bool, block: bool) -> u16 {
    PULL_OPCODE | ((if_empty as u16) << 6) | ((block as u16) << 5)
}

/// Whether `instruction` is a `JMP`.
#[must_use]
pub const fn is_jmp(instruction: u16) -> bool {
    instruction & OPCODE_MASK == JMP_OPCODE
}

/// Rebases the target of a `JMP` by `offset` slots; other instructions pass
/// through unchanged.
#[must_use]
pub const fn relocate(instruction: u16, offset: u8) -> u16 {
    if !is_jmp(instruction) {
        return instruction;
    }
    let target = (instruction & ADDRESS_MASK) + offset as u16;
    (instruction & !ADDRESS_MASK) | (target & ADDRESS_MASK)
}

#[cfg(test)]
mod tests {
    use super::{jmp, out, pull, relocate, set, OutDestination, SetDestination};
    use rstest::rstest;

    #[rstest]
    #[case(jmp(7), 0x0007)]
    #[case(jmp(33), 0x0001)]
    #[case(set(SetDestination::Pins, 0x15), 0xe015)]
    #[case(set(SetDestination::PinDirs, 0x1f), 0xe09f)]
    #[case(out(OutDestination::Null, 32), 0x6060)]
    #[case(pull(false, false), 0x8080)]
    #[case(pull(false, true), 0x80a0)]
    fn encodings_match_the_instruction_set(#[case] encoded: u16, #[case] expected: u16) {
        assert_eq!(encoded, expected);
    }

    #[test]
    fn relocation_only_touches_jumps() {
        assert_eq!(relocate(0x0045, 5), 0x004a);
        assert_eq!(relocate(jmp(30), 5), jmp(3));
        assert_eq!(relocate(0x6060, 5), 0x6060);
        assert_eq!(relocate(0xe015, 31), 0xe015);
    }
}
