//! State machine control protocol of one PIO block.
//!
//! Every operation is a sequence of reads and writes through a
//! [`Registers`] provider; the only state kept here is instruction memory
//! occupancy and the state machine claim mask.

mod claims;
mod fifo;
mod pins;
mod programs;

use std::sync::{Arc, Mutex};
use std::thread;

use crossbeam::utils::Backoff;
use tracing::debug;

use crate::instr::jmp;
use crate::layout::{
    self, ctrl, execctrl, fdebug, register_address, sm_register, SmRegister, ALIAS_CLR, ALIAS_SET,
    ALIAS_XOR, CTRL, FDEBUG, MEMORY_SIZE, SM_COUNT,
};
use crate::memory::InstructionMemory;
use crate::registers::Registers;
use crate::{PioError, SdkConfig, SmConfig};

/// Mask covering every state machine of a block.
pub const ALL_SM_MASK: u8 = (1 << SM_COUNT) - 1;

/// Handle on one PIO block: its registers, instruction memory and claims.
pub struct Pio {
    index: u8,
    base: u32,
    registers: Arc<dyn Registers>,
    memory: InstructionMemory,
    claimed: Mutex<u8>,
    config: SdkConfig,
}

impl std::fmt::Debug for Pio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pio")
            .field("index", &self.index)
            .field("base", &format_args!("{:#010x}", self.base))
            .field("memory", &self.memory)
            .field("claimed", &self.claimed)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Pio {
    /// Creates the handle of PIO `index` at its hardware base address.
    ///
    /// # Errors
    ///
    /// Returns [`PioError::InvalidArgument`] when no such block exists.
    pub fn new(
        index: u8,
        registers: Arc<dyn Registers>,
        config: SdkConfig,
    ) -> Result<Self, PioError> {
        let base = layout::pio_base(index)
            .ok_or_else(|| PioError::invalid_argument(format!("no PIO block {index}")))?;
        Ok(Self::with_base(index, base, registers, config))
    }

    /// Creates a handle for a block mapped at `base`.
    #[must_use]
    pub fn with_base(
        index: u8,
        base: u32,
        registers: Arc<dyn Registers>,
        config: SdkConfig,
    ) -> Self {
        Self {
            index,
            base,
            registers,
            memory: InstructionMemory::new(),
            claimed: Mutex::new(0),
            config,
        }
    }

    /// Block index.
    #[must_use]
    pub const fn index(&self) -> u8 {
        self.index
    }

    /// Base address of the block's registers.
    #[must_use]
    pub const fn base(&self) -> u32 {
        self.base
    }

    /// Register provider the block is driven through.
    #[must_use]
    pub fn registers(&self) -> &Arc<dyn Registers> {
        &self.registers
    }

    /// Instruction memory allocator of the block.
    #[must_use]
    pub const fn memory(&self) -> &InstructionMemory {
        &self.memory
    }

    /// Writes `config` to the four configuration registers of `sm`.
    ///
    /// # Errors
    ///
    /// Returns [`PioError`] for an invalid `sm` or a failed register write.
    pub fn sm_set_config(&self, sm: u8, config: &SmConfig) -> Result<(), PioError> {
        check_sm(sm)?;
        let words = [
            (SmRegister::ClkDiv, config.clkdiv_register()),
            (SmRegister::ExecCtrl, config.execctrl_register()),
            (SmRegister::ShiftCtrl, config.shiftctrl_register()),
            (SmRegister::PinCtrl, config.pinctrl_register()),
        ];
        self.registers.transaction(&mut |access| {
            for (register, value) in words {
                access.write(self.sm_address(sm, register), value)?;
            }
            Ok(())
        })?;
        Ok(())
    }

    /// Resets `sm` to a known state and points it at `initial_pc`.
    ///
    /// The state machine is left disabled, configured with `config` (or the
    /// reset configuration), with empty FIFOs, cleared debug flags, restarted
    /// internal state and clock divider.
    ///
    /// # Errors
    ///
    /// Returns [`PioError`] for an invalid `sm` or `initial_pc`, or a failed
    /// register access.
    pub fn sm_init(
        &self,
        sm: u8,
        initial_pc: u8,
        config: Option<&SmConfig>,
    ) -> Result<(), PioError> {
        check_sm(sm)?;
        if initial_pc >= MEMORY_SIZE {
            return Err(PioError::invalid_argument(format!(
                "initial pc {initial_pc} outside instruction memory"
            )));
        }
        self.sm_set_enabled(sm, false)?;
        let reset = SmConfig::default();
        self.sm_set_config(sm, config.unwrap_or(&reset))?;
        self.sm_clear_fifos(sm)?;

        let debug_flags = fdebug::TXSTALL.place(1 << sm)
            | fdebug::TXOVER.place(1 << sm)
            | fdebug::RXUNDER.place(1 << sm)
            | fdebug::RXSTALL.place(1 << sm);
        self.write(FDEBUG, debug_flags)?;

        self.sm_restart(sm)?;
        self.sm_clkdiv_restart(sm)?;
        self.sm_exec(sm, jmp(initial_pc))?;
        debug!(pio = self.index, sm, initial_pc, "state machine initialised");
        Ok(())
    }

    /// Enables or disables `sm`.
    ///
    /// # Errors
    ///
    /// Returns [`PioError`] for an invalid `sm` or a failed register write.
    pub fn sm_set_enabled(&self, sm: u8, enabled: bool) -> Result<(), PioError> {
        check_sm(sm)?;
        self.set_sm_mask_enabled(1 << sm, enabled)
    }

    /// Enables or disables every state machine in `mask`, leaving the others
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns [`PioError`] for an invalid `mask` or a failed register write.
    pub fn set_sm_mask_enabled(&self, mask: u8, enabled: bool) -> Result<(), PioError> {
        check_sm_mask(mask)?;
        let bits = ctrl::SM_ENABLE.place(u32::from(mask));
        if enabled {
            self.set_bits(CTRL, bits)
        } else {
            self.clear_bits(CTRL, bits)
        }
    }

    /// Strobes the internal restart of every state machine in `mask`.
    ///
    /// # Errors
    ///
    /// Returns [`PioError`] for an invalid `mask` or a failed register write.
    pub fn restart_sm_mask(&self, mask: u8) -> Result<(), PioError> {
        check_sm_mask(mask)?;
        self.set_bits(CTRL, ctrl::SM_RESTART.place(u32::from(mask)))
    }

    /// Restarts the clock divider of every state machine in `mask`.
    ///
    /// # Errors
    ///
    /// Returns [`PioError`] for an invalid `mask` or a failed register write.
    pub fn clkdiv_restart_sm_mask(&self, mask: u8) -> Result<(), PioError> {
        check_sm_mask(mask)?;
        self.set_bits(CTRL, ctrl::CLKDIV_RESTART.place(u32::from(mask)))
    }

    /// Enables the state machines in `mask` and restarts their clock
    /// dividers in the same write, so they run in lockstep.
    ///
    /// # Errors
    ///
    /// Returns [`PioError`] for an invalid `mask` or a failed register write.
    pub fn enable_sm_mask_in_sync(&self, mask: u8) -> Result<(), PioError> {
        check_sm_mask(mask)?;
        let mask = u32::from(mask);
        self.set_bits(
            CTRL,
            ctrl::CLKDIV_RESTART.place(mask) | ctrl::SM_ENABLE.place(mask),
        )
    }

    /// Strobes the internal restart of `sm`.
    ///
    /// # Errors
    ///
    /// Returns [`PioError`] for an invalid `sm` or a failed register write.
    pub fn sm_restart(&self, sm: u8) -> Result<(), PioError> {
        check_sm(sm)?;
        self.restart_sm_mask(1 << sm)
    }

    /// Restarts the clock divider of `sm`.
    ///
    /// # Errors
    ///
    /// Returns [`PioError`] for an invalid `sm` or a failed register write.
    pub fn sm_clkdiv_restart(&self, sm: u8) -> Result<(), PioError> {
        check_sm(sm)?;
        self.clkdiv_restart_sm_mask(1 << sm)
    }

    /// Makes `sm` execute `instruction` immediately.
    ///
    /// # Errors
    ///
    /// Returns [`PioError`] for an invalid `sm` or a failed register write.
    pub fn sm_exec(&self, sm: u8, instruction: u16) -> Result<(), PioError> {
        check_sm(sm)?;
        self.write(
            sm_register(sm, SmRegister::Instr),
            u32::from(instruction),
        )
    }

    /// Whether the last instruction written with [`Self::sm_exec`] is still
    /// stalled.
    ///
    /// # Errors
    ///
    /// Returns [`PioError`] for an invalid `sm` or a failed register read.
    pub fn sm_is_exec_stalled(&self, sm: u8) -> Result<bool, PioError> {
        check_sm(sm)?;
        let execctrl = self.read(sm_register(sm, SmRegister::ExecCtrl))?;
        Ok(execctrl::EXEC_STALLED.extract(execctrl) != 0)
    }

    /// Executes `instruction` and blocks until it is no longer stalled.
    ///
    /// # Errors
    ///
    /// Returns [`PioError`] for an invalid `sm` or a failed register access.
    pub fn sm_exec_wait_blocking(&self, sm: u8, instruction: u16) -> Result<(), PioError> {
        self.sm_exec(sm, instruction)?;
        self.poll_until(|| Ok(!self.sm_is_exec_stalled(sm)?))
    }

    /// Current program counter of `sm`.
    ///
    /// # Errors
    ///
    /// Returns [`PioError`] for an invalid `sm` or a failed register read.
    #[allow(clippy::cast_possible_truncation)]
    pub fn sm_get_pc(&self, sm: u8) -> Result<u8, PioError> {
        check_sm(sm)?;
        let addr = self.read(sm_register(sm, SmRegister::Addr))?;
        Ok(layout::ADDR.extract(addr) as u8)
    }

    fn address(&self, index: u32) -> u32 {
        register_address(self.base, index)
    }

    fn sm_address(&self, sm: u8, register: SmRegister) -> u32 {
        self.address(sm_register(sm, register))
    }

    fn read(&self, index: u32) -> Result<u32, PioError> {
        Ok(self.registers.read_address(self.address(index))?)
    }

    fn write(&self, index: u32, value: u32) -> Result<(), PioError> {
        Ok(self.registers.write_address(self.address(index), value)?)
    }

    fn write_masked(&self, index: u32, bits: u32, mask: u32) -> Result<(), PioError> {
        Ok(self
            .registers
            .write_address_masked(self.address(index), bits, mask, false)?)
    }

    fn set_bits(&self, index: u32, bits: u32) -> Result<(), PioError> {
        Ok(self
            .registers
            .write_address(self.address(index) | ALIAS_SET, bits)?)
    }

    fn clear_bits(&self, index: u32, bits: u32) -> Result<(), PioError> {
        Ok(self
            .registers
            .write_address(self.address(index) | ALIAS_CLR, bits)?)
    }

    fn xor_bits(&self, index: u32, bits: u32) -> Result<(), PioError> {
        Ok(self
            .registers
            .write_address(self.address(index) | ALIAS_XOR, bits)?)
    }

    /// Polls `condition` until it holds: spin, then yield, then sleep for
    /// [`SdkConfig::poll_sleep`] between polls. Never times out.
    fn poll_until(
        &self,
        mut condition: impl FnMut() -> Result<bool, PioError>,
    ) -> Result<(), PioError> {
        let backoff = Backoff::new();
        loop {
            if condition()? {
                return Ok(());
            }
            if backoff.is_completed() {
                thread::sleep(self.config.poll_sleep);
            } else {
                backoff.snooze();
            }
        }
    }
}

fn check_sm(sm: u8) -> Result<(), PioError> {
    if sm >= SM_COUNT {
        return Err(PioError::invalid_argument(format!(
            "state machine {sm} out of range 0..=3"
        )));
    }
    Ok(())
}

fn check_sm_mask(mask: u8) -> Result<(), PioError> {
    if mask & !ALL_SM_MASK != 0 {
        return Err(PioError::invalid_argument(format!(
            "state machine mask {mask:#04x} out of range 0x0..=0xf"
        )));
    }
    Ok(())
}

fn check_pin(pin: u8) -> Result<(), PioError> {
    if pin >= 32 {
        return Err(PioError::invalid_argument(format!(
            "pin {pin} out of range 0..=31"
        )));
    }
    Ok(())
}
