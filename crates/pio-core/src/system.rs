//! Assembly of an emulated system: clock, register blocks, dispatch and one
//! [`Pio`] per block.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::clock::SteppedClock;
use crate::layout::PIO_COUNT;
use crate::registers::{RegisterDispatch, Registers, SharedBlock, StorageBlock};
use crate::{Pio, PioError, SystemConfig};

/// Owns every piece of an emulated PIO system.
///
/// Allocation and claim state lives in the [`Pio`] values and is dropped
/// with the system.
#[derive(Debug)]
pub struct PioSystem {
    config: SystemConfig,
    clock: Arc<SteppedClock>,
    blocks: Vec<Arc<Mutex<StorageBlock>>>,
    registers: Arc<RegisterDispatch>,
    pios: Vec<Pio>,
}

impl PioSystem {
    /// Builds a system with `config.pio_count` PIO blocks at their hardware
    /// addresses, all at reset.
    ///
    /// # Errors
    ///
    /// Returns [`PioError::InvalidArgument`] when `pio_count` is not 1 or 2.
    pub fn new(config: SystemConfig) -> Result<Self, PioError> {
        if config.pio_count == 0 || config.pio_count > PIO_COUNT {
            return Err(PioError::invalid_argument(format!(
                "pio count {} out of range 1..={PIO_COUNT}",
                config.pio_count
            )));
        }
        let clock = Arc::new(SteppedClock::new());
        let blocks = (0..config.pio_count)
            .map(|index| {
                StorageBlock::pio(index)
                    .map(|block| Arc::new(Mutex::new(block)))
                    .ok_or_else(|| PioError::invalid_argument(format!("no PIO block {index}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let shared = blocks
            .iter()
            .map(|block| Arc::clone(block) as SharedBlock)
            .collect();
        let registers = Arc::new(RegisterDispatch::new(shared, clock.clone()));
        let pios = (0..config.pio_count)
            .map(|index| Pio::new(index, registers.clone(), config.sdk))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(pio_count = config.pio_count, "PIO system assembled");
        Ok(Self {
            config,
            clock,
            blocks,
            registers,
            pios,
        })
    }

    /// Configuration the system was built with.
    #[must_use]
    pub const fn config(&self) -> &SystemConfig {
        &self.config
    }

    /// Master clock shared by every block.
    #[must_use]
    pub const fn clock(&self) -> &Arc<SteppedClock> {
        &self.clock
    }

    /// Register provider covering every block.
    #[must_use]
    pub fn registers(&self) -> Arc<dyn Registers> {
        self.registers.clone()
    }

    /// PIO handle `index`.
    #[must_use]
    pub fn pio(&self, index: u8) -> Option<&Pio> {
        self.pios.get(usize::from(index))
    }

    /// Every PIO handle in index order.
    #[must_use]
    pub fn pios(&self) -> &[Pio] {
        &self.pios
    }

    /// Runs `f` on the register file of block `index`, as the execution
    /// engine would, bypassing bus write rules.
    pub fn with_block<R>(&self, index: u8, f: impl FnOnce(&mut StorageBlock) -> R) -> Option<R> {
        let block = self.blocks.get(usize::from(index))?;
        let mut block = block.lock().unwrap_or_else(PoisonError::into_inner);
        Some(f(&mut block))
    }

    /// Stored value of register `register` in block `index`.
    #[must_use]
    pub fn peek(&self, index: u8, register: u32) -> Option<u32> {
        self.with_block(index, |block| block.register(register))
            .flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::PioSystem;
    use crate::layout::{PIO0_BASE, PIO1_BASE};
    use crate::{PioError, SdkConfig, SystemConfig};

    #[test]
    fn default_system_maps_both_blocks() {
        let system = PioSystem::new(SystemConfig::default()).unwrap();
        let registers = system.registers();
        assert!(registers.provides_address(PIO0_BASE));
        assert!(registers.provides_address(PIO1_BASE + 0x140));
        assert_eq!(system.pios().len(), 2);
        assert_eq!(system.pio(1).unwrap().base(), PIO1_BASE);
        assert!(system.pio(2).is_none());
    }

    #[test]
    fn single_block_system_leaves_pio1_unmapped() {
        let system = PioSystem::new(SystemConfig {
            pio_count: 1,
            sdk: SdkConfig::default(),
        })
        .unwrap();
        assert!(!system.registers().provides_address(PIO1_BASE));
        assert!(system.peek(1, 0).is_none());
    }

    #[test]
    fn rejects_unsupported_block_counts() {
        for pio_count in [0, 3] {
            let result = PioSystem::new(SystemConfig {
                pio_count,
                sdk: SdkConfig::default(),
            });
            assert!(matches!(result, Err(PioError::InvalidArgument(_))));
        }
    }
}
