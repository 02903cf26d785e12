//! Register provider interface and the block abstraction behind it.

mod dispatch;
mod storage;

pub use dispatch::{RegisterDispatch, SharedBlock};
pub use storage::StorageBlock;

use crate::layout::{ALIAS_BITS, ALIAS_RW, ALIAS_SET, ALIAS_XOR};
use crate::{BlockFault, RegisterError};

/// Access class of a register inside a [`StorageBlock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterKind {
    /// Stores every written bit.
    ReadWrite,
    /// Ignores bus writes; only the owner updates it.
    ReadOnly,
    /// Written 1-bits clear the corresponding stored bits.
    WriteOneToClear,
    /// Stores written bits; reading has no hardware meaning.
    WriteOnly,
}

/// Static description of one register of a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterInfo {
    /// Hardware label such as `PIO0_SM1_PINCTRL`.
    pub label: String,
    /// Access class.
    pub kind: RegisterKind,
    /// Value after reset.
    pub reset: u32,
    /// Short description.
    pub description: &'static str,
}

/// A contiguous run of word-sized registers at a fixed base address.
///
/// Registers are addressed by word index `0..size()`. Implementations are
/// shared as `Arc<Mutex<dyn RegisterBlock>>` and only ever accessed while the
/// owning [`RegisterDispatch`] holds its composite lock.
pub trait RegisterBlock: Send {
    /// Byte address of register 0.
    fn base_address(&self) -> u32;

    /// Number of registers in the block.
    fn size(&self) -> u32;

    /// Metadata of register `index`, if it exists.
    fn register_info(&self, index: u32) -> Option<RegisterInfo>;

    /// Reads register `index`.
    ///
    /// # Errors
    ///
    /// Returns [`BlockFault`] when the block cannot serve the read.
    fn read_register(&mut self, index: u32) -> Result<u32, BlockFault>;

    /// Writes the bits of register `index` selected by `mask`.
    ///
    /// With `xor` set the selected bits are toggled where `bits` is 1.
    ///
    /// # Errors
    ///
    /// Returns [`BlockFault`] when the block cannot serve the write.
    fn write_register_masked(
        &mut self,
        index: u32,
        bits: u32,
        mask: u32,
        xor: bool,
    ) -> Result<(), BlockFault>;

    /// Writes a full word to register `index`.
    ///
    /// # Errors
    ///
    /// Returns [`BlockFault`] when the block cannot serve the write.
    fn write_register(&mut self, index: u32, value: u32) -> Result<(), BlockFault> {
        self.write_register_masked(index, value, u32::MAX, false)
    }

    /// Label of register `index`, falling back to its offset.
    fn register_label(&self, index: u32) -> String {
        self.register_info(index).map_or_else(
            || format!("{:#010x}+{:#05x}", self.base_address(), index * 4),
            |info| info.label,
        )
    }
}

/// Register operations available inside [`Registers::transaction`].
pub trait RegisterAccess {
    /// Reads the register at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError`] for unaligned, unmapped or failing accesses.
    fn read(&mut self, address: u32) -> Result<u32, RegisterError>;

    /// Masked write of the register at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError`] for unaligned, unmapped or failing accesses.
    fn write_masked(
        &mut self,
        address: u32,
        bits: u32,
        mask: u32,
        xor: bool,
    ) -> Result<(), RegisterError>;

    /// Full-word write, honouring the atomic alias bits of `address`.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError`] for unaligned, unmapped or failing accesses.
    fn write(&mut self, address: u32, value: u32) -> Result<(), RegisterError> {
        let (bits, mask, xor) = decode_alias_write(address, value);
        self.write_masked(address, bits, mask, xor)
    }
}

/// Body of a [`Registers::transaction`].
pub type Transaction<'a> =
    dyn FnMut(&mut dyn RegisterAccess) -> Result<(), RegisterError> + 'a;

/// Word-addressed register provider shared between threads.
///
/// Every operation resolves the byte address afresh; no value is cached.
pub trait Registers: Send + Sync {
    /// Whether some register answers at `address`.
    fn provides_address(&self, address: u32) -> bool;

    /// Human readable label of the register at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError`] for unaligned or unmapped addresses.
    fn address_label(&self, address: u32) -> Result<String, RegisterError>;

    /// Reads the register at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError`] for unaligned, unmapped or failing accesses.
    fn read_address(&self, address: u32) -> Result<u32, RegisterError>;

    /// Updates the bits selected by `mask`; see [`crate::masked_write_value`].
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError`] for unaligned, unmapped or failing accesses.
    fn write_address_masked(
        &self,
        address: u32,
        bits: u32,
        mask: u32,
        xor: bool,
    ) -> Result<(), RegisterError>;

    /// Full-word write, honouring the atomic alias bits of `address`.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError`] for unaligned, unmapped or failing accesses.
    fn write_address(&self, address: u32, value: u32) -> Result<(), RegisterError> {
        let (bits, mask, xor) = decode_alias_write(address, value);
        self.write_address_masked(address, bits, mask, xor)
    }

    /// Blocks until `(read(address) & mask) == expected` or a timeout expires.
    ///
    /// `cycles_timeout` counts master clock cycles (0 polls exactly once);
    /// `millis_timeout` bounds wall-clock time (0 disables that bound).
    /// Returns the last observed masked value, matching or not.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError`] when a poll read fails.
    fn wait_address(
        &self,
        address: u32,
        expected: u32,
        mask: u32,
        cycles_timeout: u64,
        millis_timeout: u64,
    ) -> Result<u32, RegisterError>;

    /// Runs `body` with exclusive access to the whole address space.
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by `body`.
    fn transaction(&self, body: &mut Transaction<'_>) -> Result<(), RegisterError>;
}

/// Decodes a full-word write to `address` into `(bits, mask, xor)`.
#[must_use]
pub const fn decode_alias_write(address: u32, value: u32) -> (u32, u32, bool) {
    match address & ALIAS_BITS {
        ALIAS_RW => (value, u32::MAX, false),
        ALIAS_XOR => (value, u32::MAX, true),
        ALIAS_SET => (value, value, false),
        // ALIAS_CLR
        _ => (0, value, false),
    }
}
