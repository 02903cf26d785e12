use thiserror::Error;

/// Failure of a single register access through the address space.
///
/// Every variant carries the raw address that was accessed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum RegisterError {
    /// Address is not a multiple of four.
    #[error("unaligned register address {address:#010x}")]
    Unaligned {
        /// Accessed address.
        address: u32,
    },
    /// No register block covers the address.
    #[error("no register mapped at {address:#010x}")]
    Unmapped {
        /// Accessed address.
        address: u32,
    },
    /// The owning block failed to perform the access.
    #[error("register access at {address:#010x} failed: {message}")]
    Io {
        /// Accessed address.
        address: u32,
        /// Description reported by the block.
        message: String,
    },
}

impl RegisterError {
    /// Address whose access failed.
    #[must_use]
    pub const fn address(&self) -> u32 {
        match self {
            Self::Unaligned { address } | Self::Unmapped { address } | Self::Io { address, .. } => {
                *address
            }
        }
    }
}

/// Failure reported by a register block implementation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
#[error("{0}")]
pub struct BlockFault(pub String);

/// Rejected program shape while building a [`crate::Program`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum ProgramError {
    /// Program identifier was present but empty.
    #[error("program id must not be empty")]
    EmptyId,
    /// Origin outside `0..=31`.
    #[error("origin {0} out of range 0..=31")]
    OriginOutOfRange(u8),
    /// Wrap address outside `0..=31`.
    #[error("wrap {0} out of range 0..=31")]
    WrapOutOfRange(u8),
    /// Wrap target address outside `0..=31`.
    #[error("wrap target {0} out of range 0..=31")]
    WrapTargetOutOfRange(u8),
    /// Side-set count outside `0..=5`, or above 4 when optional.
    #[error("side-set count {count} out of range 0..={max}")]
    SideSetCountOutOfRange {
        /// Requested count.
        count: u8,
        /// Largest accepted count for the requested options.
        max: u8,
    },
    /// Program contains no instructions.
    #[error("empty program")]
    Empty,
    /// Program exceeds the 32-slot instruction memory.
    #[error("program has {0} instructions; at most 32 fit into instruction memory")]
    TooLong(usize),
}

/// Rejected state-machine configuration field value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
#[error("{field} value {value} out of range {range}")]
pub struct ConfigError {
    /// Name of the configuration field.
    pub field: &'static str,
    /// Rejected value.
    pub value: i64,
    /// Human readable accepted range.
    pub range: &'static str,
}

impl ConfigError {
    pub(crate) fn new(field: &'static str, value: impl Into<i64>, range: &'static str) -> Self {
        Self {
            field,
            value: value.into(),
            range,
        }
    }
}

/// Error surfaced by PIO SDK operations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum PioError {
    /// An argument was outside its documented range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Underlying register access failed.
    #[error(transparent)]
    Register(#[from] RegisterError),
    /// Program description was rejected.
    #[error(transparent)]
    Program(#[from] ProgramError),
    /// Configuration value was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Instruction memory has no room for the requested placement.
    #[error("no program space")]
    NoSpace,
    /// Some requested state machines were already claimed.
    #[error("state machines {indices:?} already claimed")]
    ClaimConflict {
        /// Indices of the conflicting state machines, ascending.
        indices: Vec<u8>,
    },
    /// Every state machine was claimed and one was required.
    #[error("no unused state machine")]
    NoUnusedStateMachine,
    /// A fixed-origin program was loaded at a different offset.
    #[error("program origin {origin} does not match offset {offset}")]
    OriginMismatch {
        /// Origin fixed by the program.
        origin: u8,
        /// Offset requested by the caller.
        offset: u8,
    },
}

impl PioError {
    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}
