use super::{RegisterBlock, RegisterInfo, RegisterKind};
use crate::layout::{
    self, SmRegister, CTRL, DBG_CFGINFO, DBG_CFGINFO_VALUE, DBG_PADOE, DBG_PADOUT, FDEBUG,
    FLEVEL, FSTAT, FSTAT_RESET, INPUT_SYNC_BYPASS, INSTR_MEM0, INTR, IRQ, IRQ0_INTE, IRQ0_INTF,
    IRQ0_INTS, IRQ1_INTE, IRQ1_INTF, IRQ1_INTS, IRQ_FORCE, PIO_REGISTER_COUNT, RXF0, SM0_BASE,
    SM_STRIDE, TXF0,
};
use crate::{masked_write_value, BlockFault};

/// Plain register file: stores values and applies per-register write rules.
///
/// Reads always return the stored word. The owner of the block (an execution
/// engine or a test) updates status registers through [`Self::set_register`],
/// which bypasses the bus write rules.
#[derive(Debug, Clone)]
pub struct StorageBlock {
    base: u32,
    info: Vec<RegisterInfo>,
    values: Vec<u32>,
}

impl StorageBlock {
    /// Creates a block at `base` with one register per `info` entry, each
    /// holding its reset value.
    #[must_use]
    pub fn new(base: u32, info: Vec<RegisterInfo>) -> Self {
        let values = info.iter().map(|register| register.reset).collect();
        Self { base, info, values }
    }

    /// Builds the control/status block of PIO `index` with hardware labels
    /// and reset values.
    #[must_use]
    pub fn pio(index: u8) -> Option<Self> {
        let base = layout::pio_base(index)?;
        let info = (0..PIO_REGISTER_COUNT)
            .map(|register| {
                let (kind, reset, description) = pio_register_traits(register);
                let name = layout::pio_register_name(register).unwrap_or_default();
                RegisterInfo {
                    label: format!("PIO{index}_{name}"),
                    kind,
                    reset,
                    description,
                }
            })
            .collect();
        Some(Self::new(base, info))
    }

    /// Stored value of register `index`.
    #[must_use]
    pub fn register(&self, index: u32) -> Option<u32> {
        self.values.get(index as usize).copied()
    }

    /// Overwrites register `index` regardless of its access class.
    ///
    /// # Errors
    ///
    /// Returns [`BlockFault`] when `index` is outside the block.
    pub fn set_register(&mut self, index: u32, value: u32) -> Result<(), BlockFault> {
        let slot = self.slot_mut(index)?;
        *slot = value;
        Ok(())
    }

    /// Restores every register to its reset value.
    pub fn reset(&mut self) {
        for (value, info) in self.values.iter_mut().zip(&self.info) {
            *value = info.reset;
        }
    }

    fn slot_mut(&mut self, index: u32) -> Result<&mut u32, BlockFault> {
        let base = self.base;
        self.values
            .get_mut(index as usize)
            .ok_or_else(|| BlockFault(format!("register {index} outside block at {base:#010x}")))
    }
}

impl RegisterBlock for StorageBlock {
    fn base_address(&self) -> u32 {
        self.base
    }

    fn size(&self) -> u32 {
        u32::try_from(self.values.len()).unwrap_or(u32::MAX)
    }

    fn register_info(&self, index: u32) -> Option<RegisterInfo> {
        self.info.get(index as usize).cloned()
    }

    fn read_register(&mut self, index: u32) -> Result<u32, BlockFault> {
        self.slot_mut(index).map(|slot| *slot)
    }

    fn write_register_masked(
        &mut self,
        index: u32,
        bits: u32,
        mask: u32,
        xor: bool,
    ) -> Result<(), BlockFault> {
        let kind = self
            .info
            .get(index as usize)
            .map_or(RegisterKind::ReadWrite, |info| info.kind);
        let slot = self.slot_mut(index)?;
        match kind {
            RegisterKind::ReadWrite | RegisterKind::WriteOnly => {
                *slot = masked_write_value(*slot, bits, mask, xor);
            }
            RegisterKind::ReadOnly => {}
            RegisterKind::WriteOneToClear => {
                let written = masked_write_value(0, bits, mask, xor);
                *slot &= !written;
            }
        }
        Ok(())
    }
}

fn pio_register_traits(index: u32) -> (RegisterKind, u32, &'static str) {
    use RegisterKind::{ReadOnly, ReadWrite, WriteOneToClear, WriteOnly};

    match index {
        CTRL => (ReadWrite, 0, "state machine enables and restart strobes"),
        FSTAT => (ReadOnly, FSTAT_RESET, "FIFO full/empty status"),
        FDEBUG => (WriteOneToClear, 0, "sticky FIFO stall and overflow flags"),
        FLEVEL => (ReadOnly, 0, "FIFO levels"),
        TXF0..RXF0 => (WriteOnly, 0, "TX FIFO write port"),
        RXF0..IRQ => (ReadOnly, 0, "RX FIFO read port"),
        IRQ => (WriteOneToClear, 0, "state machine IRQ flags"),
        IRQ_FORCE => (WriteOnly, 0, "IRQ flag force"),
        INPUT_SYNC_BYPASS => (ReadWrite, 0, "input synchronizer bypass"),
        DBG_PADOUT => (ReadOnly, 0, "pad output values"),
        DBG_PADOE => (ReadOnly, 0, "pad output enables"),
        DBG_CFGINFO => (ReadOnly, DBG_CFGINFO_VALUE, "hardware configuration"),
        INSTR_MEM0..SM0_BASE => (WriteOnly, 0, "instruction memory slot"),
        SM0_BASE..INTR => {
            let register = SmRegister::ALL[((index - SM0_BASE) % SM_STRIDE) as usize];
            let kind = match register {
                SmRegister::Addr => ReadOnly,
                _ => ReadWrite,
            };
            let description = match register {
                SmRegister::ClkDiv => "clock divider",
                SmRegister::ExecCtrl => "execution control",
                SmRegister::ShiftCtrl => "shift control",
                SmRegister::Addr => "program counter",
                SmRegister::Instr => "instruction override",
                SmRegister::PinCtrl => "pin control",
            };
            (kind, register.reset_value(), description)
        }
        INTR | IRQ0_INTS | IRQ1_INTS => (ReadOnly, 0, "interrupt status"),
        IRQ0_INTE | IRQ1_INTE => (ReadWrite, 0, "interrupt enable"),
        IRQ0_INTF | IRQ1_INTF => (ReadWrite, 0, "interrupt force"),
        _ => (ReadWrite, 0, "reserved"),
    }
}
