use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::{error, trace};

use super::{RegisterAccess, RegisterBlock, Registers, Transaction};
use crate::clock::{timed_out, MasterClock};
use crate::layout::ALIAS_BITS;
use crate::RegisterError;

/// Shared handle to a register block.
pub type SharedBlock = Arc<Mutex<dyn RegisterBlock>>;

/// Routes byte addresses to an ordered list of register blocks.
///
/// The first block whose range contains an address serves it. A single
/// composite lock serialises every access, so a transaction observes no
/// interleaved access from other threads.
pub struct RegisterDispatch {
    blocks: Vec<SharedBlock>,
    bounds: Vec<(u32, u32)>,
    lock: Mutex<()>,
    clock: Arc<dyn MasterClock>,
}

impl std::fmt::Debug for RegisterDispatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterDispatch")
            .field("bounds", &self.bounds)
            .finish_non_exhaustive()
    }
}

impl RegisterDispatch {
    /// Creates a dispatch over `blocks`, tried in order, timed by `clock`.
    #[must_use]
    pub fn new(blocks: Vec<SharedBlock>, clock: Arc<dyn MasterClock>) -> Self {
        let bounds = blocks
            .iter()
            .map(|block| {
                let block = block.lock().unwrap_or_else(PoisonError::into_inner);
                (block.base_address(), block.size())
            })
            .collect();
        Self {
            blocks,
            bounds,
            lock: Mutex::new(()),
            clock,
        }
    }

    /// Clock bounding [`Registers::wait_address`].
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn MasterClock> {
        &self.clock
    }

    fn resolve(&self, address: u32) -> Result<(&SharedBlock, u32), RegisterError> {
        if address & 3 != 0 {
            return Err(RegisterError::Unaligned { address });
        }
        self.blocks
            .iter()
            .zip(&self.bounds)
            .find_map(|(block, &(base, size))| {
                let index = (address.wrapping_sub(base) & !ALIAS_BITS) >> 2;
                (index < size).then_some((block, index))
            })
            .ok_or(RegisterError::Unmapped { address })
    }

    fn enter(&self) -> std::sync::MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_locked(&self, address: u32) -> Result<u32, RegisterError> {
        let (block, index) = self.resolve(address)?;
        let result = block
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .read_register(index);
        result.map_err(|fault| {
            error!(address, %fault, "register read failed");
            RegisterError::Io {
                address,
                message: fault.0,
            }
        })
    }

    fn write_masked_locked(
        &self,
        address: u32,
        bits: u32,
        mask: u32,
        xor: bool,
    ) -> Result<(), RegisterError> {
        let (block, index) = self.resolve(address)?;
        let result = block
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .write_register_masked(index, bits, mask, xor);
        result.map_err(|fault| {
            error!(address, %fault, "register write failed");
            RegisterError::Io {
                address,
                message: fault.0,
            }
        })
    }
}

impl Registers for RegisterDispatch {
    fn provides_address(&self, address: u32) -> bool {
        self.resolve(address).is_ok()
    }

    fn address_label(&self, address: u32) -> Result<String, RegisterError> {
        let (block, index) = self.resolve(address)?;
        let label = block
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .register_label(index);
        Ok(label)
    }

    fn read_address(&self, address: u32) -> Result<u32, RegisterError> {
        let _guard = self.enter();
        self.read_locked(address)
    }

    fn write_address_masked(
        &self,
        address: u32,
        bits: u32,
        mask: u32,
        xor: bool,
    ) -> Result<(), RegisterError> {
        let _guard = self.enter();
        self.write_masked_locked(address, bits, mask, xor)
    }

    fn wait_address(
        &self,
        address: u32,
        expected: u32,
        mask: u32,
        cycles_timeout: u64,
        millis_timeout: u64,
    ) -> Result<u32, RegisterError> {
        let start = self.clock.cycle();
        let stop = start.wrapping_add(cycles_timeout);
        let deadline =
            (millis_timeout > 0).then(|| Instant::now() + Duration::from_millis(millis_timeout));
        loop {
            let seen = self.clock.cycle();
            let value = self.read_address(address)? & mask;
            if value == expected || cycles_timeout == 0 || timed_out(start, stop, seen) {
                return Ok(value);
            }
            let remaining = match deadline {
                Some(deadline) => match deadline.checked_duration_since(Instant::now()) {
                    Some(remaining) if !remaining.is_zero() => Some(remaining),
                    _ => return Ok(value),
                },
                None => None,
            };
            trace!(
                address,
                value,
                expected,
                cycle = seen,
                "waiting for register"
            );
            self.clock.await_phase_change(seen, remaining);
        }
    }

    fn transaction(&self, body: &mut Transaction<'_>) -> Result<(), RegisterError> {
        let _guard = self.enter();
        body(&mut LockedAccess { dispatch: self })
    }
}

struct LockedAccess<'a> {
    dispatch: &'a RegisterDispatch,
}

impl RegisterAccess for LockedAccess<'_> {
    fn read(&mut self, address: u32) -> Result<u32, RegisterError> {
        self.dispatch.read_locked(address)
    }

    fn write_masked(
        &mut self,
        address: u32,
        bits: u32,
        mask: u32,
        xor: bool,
    ) -> Result<(), RegisterError> {
        self.dispatch.write_masked_locked(address, bits, mask, xor)
    }
}
