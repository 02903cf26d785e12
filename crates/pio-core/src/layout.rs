//! Fixed address map and register layout of the emulated PIO blocks.
//!
//! Register indices are word indices relative to a block base; byte addresses
//! are `base + 4 * index`. Field positions follow the RP2040 datasheet.

use crate::BitField;

/// Address bits selecting the atomic access alias of a register.
pub const ALIAS_BITS: u32 = 0x3000;
/// Normal read/write alias.
pub const ALIAS_RW: u32 = 0x0000;
/// Atomic XOR-on-write alias.
pub const ALIAS_XOR: u32 = 0x1000;
/// Atomic bitmask-set-on-write alias.
pub const ALIAS_SET: u32 = 0x2000;
/// Atomic bitmask-clear-on-write alias.
pub const ALIAS_CLR: u32 = 0x3000;

/// Base address of PIO0's control/status registers.
pub const PIO0_BASE: u32 = 0x5020_0000;
/// Base address of PIO1's control/status registers.
pub const PIO1_BASE: u32 = 0x5030_0000;

/// Number of PIO blocks in the emulated system.
pub const PIO_COUNT: u8 = 2;
/// Number of state machines per PIO block.
pub const SM_COUNT: u8 = 4;
/// Number of instruction memory slots per PIO block.
pub const MEMORY_SIZE: u8 = 32;
/// Depth of each unjoined FIFO, in words.
pub const FIFO_DEPTH: u32 = 4;
/// Maximum number of pins a single SET instruction can drive.
pub const SET_PIN_WINDOW: u32 = 5;

/// PIO control register.
pub const CTRL: u32 = 0;
/// FIFO status register.
pub const FSTAT: u32 = 1;
/// FIFO debug register (write 1 to clear).
pub const FDEBUG: u32 = 2;
/// FIFO levels register.
pub const FLEVEL: u32 = 3;
/// TX FIFO of state machine 0; SM1..3 follow consecutively.
pub const TXF0: u32 = 4;
/// RX FIFO of state machine 0; SM1..3 follow consecutively.
pub const RXF0: u32 = 8;
/// State machine IRQ flags (write 1 to clear).
pub const IRQ: u32 = 12;
/// IRQ force register.
pub const IRQ_FORCE: u32 = 13;
/// GPIO input synchronizer bypass.
pub const INPUT_SYNC_BYPASS: u32 = 14;
/// Pad output values currently driven by PIO.
pub const DBG_PADOUT: u32 = 15;
/// Pad output enables currently driven by PIO.
pub const DBG_PADOE: u32 = 16;
/// Hardware configuration info.
pub const DBG_CFGINFO: u32 = 17;
/// First instruction memory slot; slots 1..31 follow consecutively.
pub const INSTR_MEM0: u32 = 18;
/// First state machine register (SM0 `CLKDIV`).
pub const SM0_BASE: u32 = INSTR_MEM0 + MEMORY_SIZE as u32;
/// Number of registers per state machine.
pub const SM_STRIDE: u32 = 6;
/// Raw interrupts.
pub const INTR: u32 = SM0_BASE + SM_COUNT as u32 * SM_STRIDE;
/// Interrupt enable for `irq0`.
pub const IRQ0_INTE: u32 = INTR + 1;
/// Interrupt force for `irq0`.
pub const IRQ0_INTF: u32 = INTR + 2;
/// Interrupt status for `irq0`.
pub const IRQ0_INTS: u32 = INTR + 3;
/// Interrupt enable for `irq1`.
pub const IRQ1_INTE: u32 = INTR + 4;
/// Interrupt force for `irq1`.
pub const IRQ1_INTF: u32 = INTR + 5;
/// Interrupt status for `irq1`.
pub const IRQ1_INTS: u32 = INTR + 6;
/// Total number of registers in one PIO block.
pub const PIO_REGISTER_COUNT: u32 = IRQ1_INTS + 1;

/// Per-state-machine register selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SmRegister {
    /// Clock divider.
    ClkDiv = 0,
    /// Execution control.
    ExecCtrl = 1,
    /// Shift control.
    ShiftCtrl = 2,
    /// Current program counter (read only).
    Addr = 3,
    /// Instruction override; writes execute immediately.
    Instr = 4,
    /// Pin control.
    PinCtrl = 5,
}

impl SmRegister {
    /// All per-state-machine registers in address order.
    pub const ALL: [Self; SM_STRIDE as usize] = [
        Self::ClkDiv,
        Self::ExecCtrl,
        Self::ShiftCtrl,
        Self::Addr,
        Self::Instr,
        Self::PinCtrl,
    ];

    /// Hardware register name without the `SMx_` prefix.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ClkDiv => "CLKDIV",
            Self::ExecCtrl => "EXECCTRL",
            Self::ShiftCtrl => "SHIFTCTRL",
            Self::Addr => "ADDR",
            Self::Instr => "INSTR",
            Self::PinCtrl => "PINCTRL",
        }
    }

    /// Hardware reset value.
    #[must_use]
    pub const fn reset_value(self) -> u32 {
        match self {
            Self::ClkDiv => CLKDIV_RESET,
            Self::ExecCtrl => EXECCTRL_RESET,
            Self::ShiftCtrl => SHIFTCTRL_RESET,
            Self::PinCtrl => PINCTRL_RESET,
            Self::Addr | Self::Instr => 0,
        }
    }
}

/// Register index of `reg` for state machine `sm`.
#[must_use]
pub const fn sm_register(sm: u8, reg: SmRegister) -> u32 {
    SM0_BASE + sm as u32 * SM_STRIDE + reg as u32
}

/// Byte address of register `index` in the block at `base`.
#[must_use]
pub const fn register_address(base: u32, index: u32) -> u32 {
    base + index * 4
}

/// Base address of PIO block `pio`, if it exists.
#[must_use]
pub const fn pio_base(pio: u8) -> Option<u32> {
    match pio {
        0 => Some(PIO0_BASE),
        1 => Some(PIO1_BASE),
        _ => None,
    }
}

/// Hardware reset value of `SMx_CLKDIV` (divide by 1).
pub const CLKDIV_RESET: u32 = 0x0001_0000;
/// Hardware reset value of `SMx_EXECCTRL` (`WRAP_TOP = 31`).
pub const EXECCTRL_RESET: u32 = 0x0001_f000;
/// Hardware reset value of `SMx_SHIFTCTRL` (shift right, thresholds 32).
pub const SHIFTCTRL_RESET: u32 = 0x000c_0000;
/// Hardware reset value of `SMx_PINCTRL` (`SET_COUNT = 5`).
pub const PINCTRL_RESET: u32 = 0x1400_0000;
/// Reset value of `FSTAT`: every FIFO empty.
pub const FSTAT_RESET: u32 = 0x0f00_0f00;
/// Value of `DBG_CFGINFO`: 32 instructions, 4 state machines, FIFO depth 4.
pub const DBG_CFGINFO_VALUE: u32 =
    ((MEMORY_SIZE as u32) << 16) | ((SM_COUNT as u32) << 8) | FIFO_DEPTH;

/// `CTRL` fields.
pub mod ctrl {
    use crate::BitField;

    /// Clock divider restart strobes, one bit per state machine.
    pub const CLKDIV_RESTART: BitField = BitField::new(8, 4);
    /// State machine restart strobes, one bit per state machine.
    pub const SM_RESTART: BitField = BitField::new(4, 4);
    /// State machine enables, one bit per state machine.
    pub const SM_ENABLE: BitField = BitField::new(0, 4);
}

/// `FSTAT` fields, one bit per state machine.
pub mod fstat {
    use crate::BitField;

    /// TX FIFO empty.
    pub const TXEMPTY: BitField = BitField::new(24, 4);
    /// TX FIFO full.
    pub const TXFULL: BitField = BitField::new(16, 4);
    /// RX FIFO empty.
    pub const RXEMPTY: BitField = BitField::new(8, 4);
    /// RX FIFO full.
    pub const RXFULL: BitField = BitField::new(0, 4);
}

/// `FDEBUG` sticky flags, one bit per state machine.
pub mod fdebug {
    use crate::BitField;

    /// Stalled on empty TX FIFO.
    pub const TXSTALL: BitField = BitField::new(24, 4);
    /// TX FIFO overflow by the system.
    pub const TXOVER: BitField = BitField::new(16, 4);
    /// RX FIFO underflow by the system.
    pub const RXUNDER: BitField = BitField::new(8, 4);
    /// Stalled on full RX FIFO.
    pub const RXSTALL: BitField = BitField::new(0, 4);
}

/// `FLEVEL` nibbles.
pub mod flevel {
    use crate::BitField;

    /// TX FIFO level of state machine `sm`.
    #[must_use]
    pub const fn tx(sm: u8) -> BitField {
        BitField::new(sm as u32 * 8, 4)
    }

    /// RX FIFO level of state machine `sm`.
    #[must_use]
    pub const fn rx(sm: u8) -> BitField {
        BitField::new(sm as u32 * 8 + 4, 4)
    }
}

/// `SMx_CLKDIV` fields.
pub mod clkdiv {
    use crate::BitField;

    /// Integer divisor; 0 means 65536.
    pub const INT: BitField = BitField::new(16, 16);
    /// Fractional divisor in 1/256ths.
    pub const FRAC: BitField = BitField::new(8, 8);
}

/// `SMx_EXECCTRL` fields.
pub mod execctrl {
    use crate::BitField;

    /// Instruction written to `SMx_INSTR` is stalled.
    pub const EXEC_STALLED: BitField = BitField::new(31, 1);
    /// MSB of the delay/side-set field is a side-set enable.
    pub const SIDE_EN: BitField = BitField::new(30, 1);
    /// Side-set drives pin directions rather than values.
    pub const SIDE_PINDIR: BitField = BitField::new(29, 1);
    /// GPIO used by `JMP PIN`.
    pub const JMP_PIN: BitField = BitField::new(24, 5);
    /// Data bit used for inline OUT enable.
    pub const OUT_EN_SEL: BitField = BitField::new(19, 5);
    /// Use an OUT data bit as auxiliary write enable.
    pub const INLINE_OUT_EN: BitField = BitField::new(18, 1);
    /// Continuously assert the most recent OUT/SET.
    pub const OUT_STICKY: BitField = BitField::new(17, 1);
    /// Wrap source address.
    pub const WRAP_TOP: BitField = BitField::new(12, 5);
    /// Wrap destination address.
    pub const WRAP_BOTTOM: BitField = BitField::new(7, 5);
    /// `MOV x, STATUS` source select.
    pub const STATUS_SEL: BitField = BitField::new(4, 1);
    /// `MOV x, STATUS` comparison level.
    pub const STATUS_N: BitField = BitField::new(0, 4);
}

/// `SMx_SHIFTCTRL` fields.
pub mod shiftctrl {
    use crate::BitField;

    /// RX FIFO steals TX storage.
    pub const FJOIN_RX: BitField = BitField::new(31, 1);
    /// TX FIFO steals RX storage.
    pub const FJOIN_TX: BitField = BitField::new(30, 1);
    /// Autopull threshold; 0 means 32.
    pub const PULL_THRESH: BitField = BitField::new(25, 5);
    /// Autopush threshold; 0 means 32.
    pub const PUSH_THRESH: BitField = BitField::new(20, 5);
    /// OSR shifts right when set.
    pub const OUT_SHIFTDIR: BitField = BitField::new(19, 1);
    /// ISR shifts right when set.
    pub const IN_SHIFTDIR: BitField = BitField::new(18, 1);
    /// Autopull enable.
    pub const AUTOPULL: BitField = BitField::new(17, 1);
    /// Autopush enable.
    pub const AUTOPUSH: BitField = BitField::new(16, 1);
}

/// `SMx_PINCTRL` fields.
pub mod pinctrl {
    use crate::BitField;

    /// Side-set bit count, inclusive of the enable bit.
    pub const SIDESET_COUNT: BitField = BitField::new(29, 3);
    /// Pins asserted by SET (0..=5).
    pub const SET_COUNT: BitField = BitField::new(26, 3);
    /// Pins asserted by OUT (0..=32).
    pub const OUT_COUNT: BitField = BitField::new(20, 6);
    /// First IN pin.
    pub const IN_BASE: BitField = BitField::new(15, 5);
    /// First side-set pin.
    pub const SIDESET_BASE: BitField = BitField::new(10, 5);
    /// First SET pin.
    pub const SET_BASE: BitField = BitField::new(5, 5);
    /// First OUT pin.
    pub const OUT_BASE: BitField = BitField::new(0, 5);
}

/// `SMx_ADDR` field.
pub const ADDR: BitField = BitField::new(0, 5);

/// Hardware name of PIO register `index`, without the block prefix.
#[must_use]
pub fn pio_register_name(index: u32) -> Option<String> {
    let name = match index {
        CTRL => "CTRL".to_string(),
        FSTAT => "FSTAT".to_string(),
        FDEBUG => "FDEBUG".to_string(),
        FLEVEL => "FLEVEL".to_string(),
        TXF0..RXF0 => format!("TXF{}", index - TXF0),
        RXF0..IRQ => format!("RXF{}", index - RXF0),
        IRQ => "IRQ".to_string(),
        IRQ_FORCE => "IRQ_FORCE".to_string(),
        INPUT_SYNC_BYPASS => "INPUT_SYNC_BYPASS".to_string(),
        DBG_PADOUT => "DBG_PADOUT".to_string(),
        DBG_PADOE => "DBG_PADOE".to_string(),
        DBG_CFGINFO => "DBG_CFGINFO".to_string(),
        INSTR_MEM0..SM0_BASE => format!("INSTR_MEM{}", index - INSTR_MEM0),
        SM0_BASE..INTR => {
            let offset = index - SM0_BASE;
            let reg = SmRegister::ALL[(offset % SM_STRIDE) as usize];
            format!("SM{}_{}", offset / SM_STRIDE, reg.name())
        }
        INTR => "INTR".to_string(),
        IRQ0_INTE => "IRQ0_INTE".to_string(),
        IRQ0_INTF => "IRQ0_INTF".to_string(),
        IRQ0_INTS => "IRQ0_INTS".to_string(),
        IRQ1_INTE => "IRQ1_INTE".to_string(),
        IRQ1_INTF => "IRQ1_INTF".to_string(),
        IRQ1_INTS => "IRQ1_INTS".to_string(),
        _ => return None,
    };
    Some(name)
}

const _: () = assert_register_layout();

const fn assert_register_layout() {
    assert!(
        register_address(0, SM0_BASE) == 0x0c8,
        "state machine registers must start at 0x0c8"
    );
    assert!(register_address(0, INTR) == 0x128, "INTR must sit at 0x128");
    assert!(
        register_address(0, PIO_REGISTER_COUNT) == 0x144,
        "PIO block must end at 0x144"
    );
    assert!(
        register_address(0, PIO_REGISTER_COUNT) <= ALIAS_XOR,
        "registers must not reach into the alias bits"
    );
}

#[cfg(test)]
mod tests {
    use super::{
        pio_register_name, register_address, sm_register, SmRegister, DBG_CFGINFO_VALUE,
        INSTR_MEM0, PIO_REGISTER_COUNT, RXF0, TXF0,
    };

    #[test]
    fn register_offsets_match_datasheet() {
        assert_eq!(register_address(0, TXF0), 0x010);
        assert_eq!(register_address(0, RXF0), 0x020);
        assert_eq!(register_address(0, INSTR_MEM0), 0x048);
        assert_eq!(register_address(0, sm_register(0, SmRegister::ClkDiv)), 0x0c8);
        assert_eq!(register_address(0, sm_register(1, SmRegister::ClkDiv)), 0x0e0);
        assert_eq!(register_address(0, sm_register(3, SmRegister::PinCtrl)), 0x124);
    }

    #[test]
    fn register_names_cover_the_whole_block() {
        for index in 0..PIO_REGISTER_COUNT {
            assert!(pio_register_name(index).is_some(), "missing name for {index}");
        }
        assert_eq!(pio_register_name(PIO_REGISTER_COUNT), None);
        assert_eq!(pio_register_name(TXF0 + 2).as_deref(), Some("TXF2"));
        assert_eq!(pio_register_name(INSTR_MEM0 + 31).as_deref(), Some("INSTR_MEM31"));
        assert_eq!(
            pio_register_name(sm_register(2, SmRegister::ShiftCtrl)).as_deref(),
            Some("SM2_SHIFTCTRL")
        );
    }

    #[test]
    fn cfginfo_reports_geometry() {
        assert_eq!(DBG_CFGINFO_VALUE, 0x0020_0404);
    }
}
