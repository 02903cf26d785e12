//! Register-level model and SDK of the RP2040 PIO blocks.
//!
//! The crate exposes PIO control/status registers as a word-addressed space
//! ([`Registers`]), an allocator for the 32-slot instruction memory, program
//! and state machine configuration models, and the state machine control
//! protocol ([`Pio`]) that drives an emulated block purely through register
//! accesses.

#[cfg(test)]
use rstest as _;

/// Bit-field primitives and the masked write rule.
pub mod bits;
pub use bits::{masked_write_value, BitField};

/// Address map, register indices and field positions.
pub mod layout;

/// Error types shared across the crate.
pub mod error;
pub use error::{BlockFault, ConfigError, PioError, ProgramError, RegisterError};

/// Register provider interface, blocks and dispatch.
pub mod registers;
pub use registers::{
    decode_alias_write, RegisterAccess, RegisterBlock, RegisterDispatch, RegisterInfo,
    RegisterKind, Registers, SharedBlock, StorageBlock, Transaction,
};

/// Master clock abstraction for register waits.
pub mod clock;
pub use clock::{timed_out, MasterClock, SteppedClock};

/// Encodings of SDK-synthesized instructions.
pub mod instr;

/// Instruction memory allocator.
pub mod memory;
pub use memory::{rotated_mask, InstructionMemory, Placement};

/// Program model.
pub mod program;
pub use program::{Program, ProgramBuilder, SideSet};

/// State machine configuration model.
pub mod sm_config;
pub use sm_config::{FifoJoin, MovStatus, SmConfig};

/// Runtime configuration.
pub mod config;
pub use config::{SdkConfig, SystemConfig, DEFAULT_POLL_SLEEP};

/// State machine control protocol.
pub mod sdk;
pub use sdk::{Pio, ALL_SM_MASK};

/// Emulated system assembly.
pub mod system;
pub use system::PioSystem;
