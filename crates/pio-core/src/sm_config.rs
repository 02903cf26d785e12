//! State machine configuration packed as the four hardware register words.

use crate::layout::{
    clkdiv, execctrl, pinctrl, shiftctrl, CLKDIV_RESET, EXECCTRL_RESET, MEMORY_SIZE,
    PINCTRL_RESET, SHIFTCTRL_RESET,
};
use crate::{BitField, ConfigError, Program};

/// FIFO joining mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum FifoJoin {
    /// Separate 4-deep TX and RX FIFOs.
    #[default]
    None,
    /// 8-deep TX FIFO, no RX FIFO.
    Tx,
    /// 8-deep RX FIFO, no TX FIFO.
    Rx,
}

/// Source of `MOV x, STATUS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum MovStatus {
    /// All ones while the TX FIFO level is below N.
    #[default]
    TxLessThan,
    /// All ones while the RX FIFO level is below N.
    RxLessThan,
}

/// Configuration of one state machine, as written to `CLKDIV`, `EXECCTRL`,
/// `SHIFTCTRL` and `PINCTRL`.
///
/// Setters validate their arguments and replace exactly their own bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SmConfig {
    clkdiv: u32,
    execctrl: u32,
    shiftctrl: u32,
    pinctrl: u32,
}

impl Default for SmConfig {
    fn default() -> Self {
        Self::from_registers(CLKDIV_RESET, EXECCTRL_RESET, SHIFTCTRL_RESET, PINCTRL_RESET)
    }
}

fn check(field: &'static str, value: u32, max: u32, range: &'static str) -> Result<(), ConfigError> {
    if value > max {
        return Err(ConfigError::new(field, value, range));
    }
    Ok(())
}

fn check_pin(field: &'static str, pin: u8) -> Result<(), ConfigError> {
    check(field, u32::from(pin), 31, "0..=31")
}

fn check_threshold(field: &'static str, threshold: u8) -> Result<(), ConfigError> {
    if threshold == 0 || threshold > 32 {
        return Err(ConfigError::new(field, threshold, "1..=32"));
    }
    Ok(())
}

const fn flag(word: u32, field: BitField) -> bool {
    field.extract(word) != 0
}

#[allow(clippy::cast_possible_truncation)]
const fn narrow(word: u32, field: BitField) -> u8 {
    field.extract(word) as u8
}

impl SmConfig {
    /// Hardware reset configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps raw register words.
    #[must_use]
    pub const fn from_registers(clkdiv: u32, execctrl: u32, shiftctrl: u32, pinctrl: u32) -> Self {
        Self {
            clkdiv,
            execctrl,
            shiftctrl,
            pinctrl,
        }
    }

    /// Default configuration with wrap and side-set taken from `program`
    /// loaded at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when `offset` is outside instruction memory.
    pub fn for_program(program: &Program, offset: u8) -> Result<Self, ConfigError> {
        check("offset", u32::from(offset), 31, "0..=31")?;
        let mut config = Self::default();
        let (target, wrap) = if program.is_relocatable() {
            (
                (program.wrap_target() + offset) % MEMORY_SIZE,
                (program.wrap() + offset) % MEMORY_SIZE,
            )
        } else {
            (program.wrap_target(), program.wrap())
        };
        config.set_wrap(target, wrap)?;
        let side_set = program.side_set();
        config.set_sideset(side_set.total_bits(), side_set.optional, side_set.pindirs)?;
        Ok(config)
    }

    /// `SMx_CLKDIV` word.
    #[must_use]
    pub const fn clkdiv_register(&self) -> u32 {
        self.clkdiv
    }

    /// `SMx_EXECCTRL` word.
    #[must_use]
    pub const fn execctrl_register(&self) -> u32 {
        self.execctrl
    }

    /// `SMx_SHIFTCTRL` word.
    #[must_use]
    pub const fn shiftctrl_register(&self) -> u32 {
        self.shiftctrl
    }

    /// `SMx_PINCTRL` word.
    #[must_use]
    pub const fn pinctrl_register(&self) -> u32 {
        self.pinctrl
    }

    /// Sets the clock divider to `int + frac / 256`; `int == 0` means 65536.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when `int` is 0 and `frac` is not.
    pub fn set_clkdiv_int_frac(&mut self, int: u16, frac: u8) -> Result<(), ConfigError> {
        if int == 0 && frac != 0 {
            return Err(ConfigError::new("clkdiv_frac", frac, "0 when clkdiv_int is 0"));
        }
        self.clkdiv = clkdiv::INT.insert(self.clkdiv, u32::from(int));
        self.clkdiv = clkdiv::FRAC.insert(self.clkdiv, u32::from(frac));
        Ok(())
    }

    /// Sets the clock divider from a real divisor in `1.0..=65536.0`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for divisors outside the range.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn set_clkdiv(&mut self, divisor: f32) -> Result<(), ConfigError> {
        if !(1.0..=65536.0).contains(&divisor) {
            return Err(ConfigError::new(
                "clkdiv",
                divisor as i64,
                "1.0..=65536.0",
            ));
        }
        if divisor >= 65536.0 {
            return self.set_clkdiv_int_frac(0, 0);
        }
        let int = divisor as u16;
        let frac = ((divisor - f32::from(int)) * 256.0) as u8;
        self.set_clkdiv_int_frac(int, frac)
    }

    /// Integer and fractional divider parts.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn clkdiv_int_frac(&self) -> (u16, u8) {
        (
            clkdiv::INT.extract(self.clkdiv) as u16,
            narrow(self.clkdiv, clkdiv::FRAC),
        )
    }

    /// Effective divisor.
    #[must_use]
    pub fn clock_divisor(&self) -> f32 {
        let (int, frac) = self.clkdiv_int_frac();
        let int = if int == 0 { 65536.0 } else { f32::from(int) };
        int + f32::from(frac) / 256.0
    }

    /// Sets wrap target (bottom) and wrap source (top).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for addresses above 31.
    pub fn set_wrap(&mut self, target: u8, wrap: u8) -> Result<(), ConfigError> {
        check("wrap_target", u32::from(target), 31, "0..=31")?;
        check("wrap", u32::from(wrap), 31, "0..=31")?;
        self.execctrl = execctrl::WRAP_BOTTOM.insert(self.execctrl, u32::from(target));
        self.execctrl = execctrl::WRAP_TOP.insert(self.execctrl, u32::from(wrap));
        Ok(())
    }

    /// Wrap target and wrap source.
    #[must_use]
    pub const fn wrap(&self) -> (u8, u8) {
        (
            narrow(self.execctrl, execctrl::WRAP_BOTTOM),
            narrow(self.execctrl, execctrl::WRAP_TOP),
        )
    }

    /// Sets the GPIO tested by `JMP PIN`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for pins above 31.
    pub fn set_jmp_pin(&mut self, pin: u8) -> Result<(), ConfigError> {
        check_pin("jmp_pin", pin)?;
        self.execctrl = execctrl::JMP_PIN.insert(self.execctrl, u32::from(pin));
        Ok(())
    }

    /// GPIO tested by `JMP PIN`.
    #[must_use]
    pub const fn jmp_pin(&self) -> u8 {
        narrow(self.execctrl, execctrl::JMP_PIN)
    }

    /// Sets the `MOV x, STATUS` source and level.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for levels above 15.
    pub fn set_mov_status(&mut self, source: MovStatus, level: u8) -> Result<(), ConfigError> {
        check("status_n", u32::from(level), 15, "0..=15")?;
        let sel = u32::from(source == MovStatus::RxLessThan);
        self.execctrl = execctrl::STATUS_SEL.insert(self.execctrl, sel);
        self.execctrl = execctrl::STATUS_N.insert(self.execctrl, u32::from(level));
        Ok(())
    }

    /// `MOV x, STATUS` source and level.
    #[must_use]
    pub const fn mov_status(&self) -> (MovStatus, u8) {
        let source = if flag(self.execctrl, execctrl::STATUS_SEL) {
            MovStatus::RxLessThan
        } else {
            MovStatus::TxLessThan
        };
        (source, narrow(self.execctrl, execctrl::STATUS_N))
    }

    /// Sets the side-set geometry; `bit_count` includes the enable bit when
    /// `optional`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when `bit_count` exceeds 5, or is 0 while
    /// `optional`.
    pub fn set_sideset(
        &mut self,
        bit_count: u8,
        optional: bool,
        pindirs: bool,
    ) -> Result<(), ConfigError> {
        check("sideset_count", u32::from(bit_count), 5, "0..=5")?;
        if optional && bit_count == 0 {
            return Err(ConfigError::new(
                "sideset_count",
                bit_count,
                "1..=5 when optional",
            ));
        }
        self.pinctrl = pinctrl::SIDESET_COUNT.insert(self.pinctrl, u32::from(bit_count));
        self.execctrl = execctrl::SIDE_EN.insert(self.execctrl, u32::from(optional));
        self.execctrl = execctrl::SIDE_PINDIR.insert(self.execctrl, u32::from(pindirs));
        Ok(())
    }

    /// Side-set bit count, optional flag and pindirs flag.
    #[must_use]
    pub const fn sideset(&self) -> (u8, bool, bool) {
        (
            narrow(self.pinctrl, pinctrl::SIDESET_COUNT),
            flag(self.execctrl, execctrl::SIDE_EN),
            flag(self.execctrl, execctrl::SIDE_PINDIR),
        )
    }

    /// Sets sticky output and the inline OUT enable bit.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when `enable_pin_index` exceeds 31.
    pub fn set_out_special(
        &mut self,
        sticky: bool,
        has_enable_pin: bool,
        enable_pin_index: u8,
    ) -> Result<(), ConfigError> {
        check_pin("out_en_sel", enable_pin_index)?;
        self.execctrl = execctrl::OUT_STICKY.insert(self.execctrl, u32::from(sticky));
        self.execctrl = execctrl::INLINE_OUT_EN.insert(self.execctrl, u32::from(has_enable_pin));
        self.execctrl = execctrl::OUT_EN_SEL.insert(self.execctrl, u32::from(enable_pin_index));
        Ok(())
    }

    /// Sticky flag, inline enable flag and enable bit index.
    #[must_use]
    pub const fn out_special(&self) -> (bool, bool, u8) {
        (
            flag(self.execctrl, execctrl::OUT_STICKY),
            flag(self.execctrl, execctrl::INLINE_OUT_EN),
            narrow(self.execctrl, execctrl::OUT_EN_SEL),
        )
    }

    /// Sets ISR shift direction, autopush and push threshold (`1..=32`).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for thresholds outside `1..=32`.
    pub fn set_in_shift(
        &mut self,
        shift_right: bool,
        autopush: bool,
        threshold: u8,
    ) -> Result<(), ConfigError> {
        check_threshold("push_threshold", threshold)?;
        self.shiftctrl = shiftctrl::IN_SHIFTDIR.insert(self.shiftctrl, u32::from(shift_right));
        self.shiftctrl = shiftctrl::AUTOPUSH.insert(self.shiftctrl, u32::from(autopush));
        self.shiftctrl = shiftctrl::PUSH_THRESH.insert(self.shiftctrl, u32::from(threshold));
        Ok(())
    }

    /// ISR shift direction, autopush flag and push threshold.
    #[must_use]
    pub const fn in_shift(&self) -> (bool, bool, u8) {
        (
            flag(self.shiftctrl, shiftctrl::IN_SHIFTDIR),
            flag(self.shiftctrl, shiftctrl::AUTOPUSH),
            threshold(narrow(self.shiftctrl, shiftctrl::PUSH_THRESH)),
        )
    }

    /// Sets OSR shift direction, autopull and pull threshold (`1..=32`).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for thresholds outside `1..=32`.
    pub fn set_out_shift(
        &mut self,
        shift_right: bool,
        autopull: bool,
        threshold: u8,
    ) -> Result<(), ConfigError> {
        check_threshold("pull_threshold", threshold)?;
        self.shiftctrl = shiftctrl::OUT_SHIFTDIR.insert(self.shiftctrl, u32::from(shift_right));
        self.shiftctrl = shiftctrl::AUTOPULL.insert(self.shiftctrl, u32::from(autopull));
        self.shiftctrl = shiftctrl::PULL_THRESH.insert(self.shiftctrl, u32::from(threshold));
        Ok(())
    }

    /// OSR shift direction, autopull flag and pull threshold.
    #[must_use]
    pub const fn out_shift(&self) -> (bool, bool, u8) {
        (
            flag(self.shiftctrl, shiftctrl::OUT_SHIFTDIR),
            flag(self.shiftctrl, shiftctrl::AUTOPULL),
            threshold(narrow(self.shiftctrl, shiftctrl::PULL_THRESH)),
        )
    }

    /// Sets FIFO joining.
    pub fn set_fifo_join(&mut self, join: FifoJoin) {
        let (tx, rx) = match join {
            FifoJoin::None => (0, 0),
            FifoJoin::Tx => (1, 0),
            FifoJoin::Rx => (0, 1),
        };
        self.shiftctrl = shiftctrl::FJOIN_TX.insert(self.shiftctrl, tx);
        self.shiftctrl = shiftctrl::FJOIN_RX.insert(self.shiftctrl, rx);
    }

    /// FIFO joining mode.
    #[must_use]
    pub const fn fifo_join(&self) -> FifoJoin {
        if flag(self.shiftctrl, shiftctrl::FJOIN_TX) {
            FifoJoin::Tx
        } else if flag(self.shiftctrl, shiftctrl::FJOIN_RX) {
            FifoJoin::Rx
        } else {
            FifoJoin::None
        }
    }

    /// Sets the OUT pin window.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for a base above 31 or a count above 32.
    pub fn set_out_pins(&mut self, base: u8, count: u8) -> Result<(), ConfigError> {
        check_pin("out_base", base)?;
        check("out_count", u32::from(count), 32, "0..=32")?;
        self.pinctrl = pinctrl::OUT_BASE.insert(self.pinctrl, u32::from(base));
        self.pinctrl = pinctrl::OUT_COUNT.insert(self.pinctrl, u32::from(count));
        Ok(())
    }

    /// OUT pin base and count.
    #[must_use]
    pub const fn out_pins(&self) -> (u8, u8) {
        (
            narrow(self.pinctrl, pinctrl::OUT_BASE),
            narrow(self.pinctrl, pinctrl::OUT_COUNT),
        )
    }

    /// Sets the SET pin window.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for a base above 31 or a count above 5.
    pub fn set_set_pins(&mut self, base: u8, count: u8) -> Result<(), ConfigError> {
        check_pin("set_base", base)?;
        check("set_count", u32::from(count), 5, "0..=5")?;
        self.pinctrl = pinctrl::SET_BASE.insert(self.pinctrl, u32::from(base));
        self.pinctrl = pinctrl::SET_COUNT.insert(self.pinctrl, u32::from(count));
        Ok(())
    }

    /// SET pin base and count.
    #[must_use]
    pub const fn set_pins(&self) -> (u8, u8) {
        (
            narrow(self.pinctrl, pinctrl::SET_BASE),
            narrow(self.pinctrl, pinctrl::SET_COUNT),
        )
    }

    /// Sets the first IN pin.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for pins above 31.
    pub fn set_in_pins(&mut self, base: u8) -> Result<(), ConfigError> {
        check_pin("in_base", base)?;
        self.pinctrl = pinctrl::IN_BASE.insert(self.pinctrl, u32::from(base));
        Ok(())
    }

    /// First IN pin.
    #[must_use]
    pub const fn in_pins(&self) -> u8 {
        narrow(self.pinctrl, pinctrl::IN_BASE)
    }

    /// Sets the first side-set pin.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for pins above 31.
    pub fn set_sideset_pins(&mut self, base: u8) -> Result<(), ConfigError> {
        check_pin("sideset_base", base)?;
        self.pinctrl = pinctrl::SIDESET_BASE.insert(self.pinctrl, u32::from(base));
        Ok(())
    }

    /// First side-set pin.
    #[must_use]
    pub const fn sideset_pins(&self) -> u8 {
        narrow(self.pinctrl, pinctrl::SIDESET_BASE)
    }
}

const fn threshold(encoded: u8) -> u8 {
    if encoded == 0 {
        32
    } else {
        encoded
    }
}

#[cfg(test)]
mod tests {
    use super::{FifoJoin, MovStatus, SmConfig};
    use crate::layout::pinctrl;
    use crate::Program;
    use proptest::prelude::*;

    #[test]
    fn default_matches_hardware_reset() {
        let config = SmConfig::default();
        assert_eq!(config.clkdiv_register(), 0x0001_0000);
        assert_eq!(config.execctrl_register(), 0x0001_f000);
        assert_eq!(config.shiftctrl_register(), 0x000c_0000);
        assert_eq!(config.pinctrl_register(), 0x1400_0000);
        assert_eq!(config.wrap(), (0, 31));
        assert_eq!(config.set_pins(), (0, 5));
        assert_eq!(config.in_shift(), (true, false, 32));
        assert_eq!(config.out_shift(), (true, false, 32));
        assert!((config.clock_divisor() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn thresholds_encode_32_as_zero() {
        let mut config = SmConfig::default();
        config.set_out_shift(false, true, 32).unwrap();
        assert_eq!(config.shiftctrl_register() & (0x1f << 25), 0);
        assert_eq!(config.out_shift(), (false, true, 32));
        config.set_in_shift(false, true, 8).unwrap();
        assert_eq!(config.in_shift(), (false, true, 8));
        assert!(config.set_in_shift(false, true, 0).is_err());
        assert!(config.set_out_shift(false, true, 33).is_err());
    }

    #[test]
    fn out_pins_only_touch_their_fields() {
        let mut config = SmConfig::default();
        config.set_out_pins(5, 3).unwrap();
        assert_eq!(config.pinctrl_register(), 0x1400_0000 | (3 << 20) | 5);
        assert_eq!(config.out_pins(), (5, 3));
        assert!(config.set_out_pins(32, 1).is_err());
        assert!(config.set_out_pins(0, 33).is_err());
        assert_eq!(config.out_pins(), (5, 3));
    }

    #[test]
    fn clkdiv_accepts_fractions() {
        let mut config = SmConfig::default();
        config.set_clkdiv(2.5).unwrap();
        assert_eq!(config.clkdiv_int_frac(), (2, 128));
        config.set_clkdiv(65536.0).unwrap();
        assert_eq!(config.clkdiv_int_frac(), (0, 0));
        assert!((config.clock_divisor() - 65536.0).abs() < f32::EPSILON);
        assert!(config.set_clkdiv(0.5).is_err());
        assert!(config.set_clkdiv_int_frac(0, 1).is_err());
    }

    #[test]
    fn enumerated_fields_round_trip() {
        let mut config = SmConfig::default();
        config.set_fifo_join(FifoJoin::Rx);
        assert_eq!(config.fifo_join(), FifoJoin::Rx);
        config.set_fifo_join(FifoJoin::Tx);
        assert_eq!(config.fifo_join(), FifoJoin::Tx);
        assert_eq!(config.shiftctrl_register() >> 30, 0b01);
        config.set_mov_status(MovStatus::RxLessThan, 9).unwrap();
        assert_eq!(config.mov_status(), (MovStatus::RxLessThan, 9));
        assert!(config.set_mov_status(MovStatus::TxLessThan, 16).is_err());
    }

    #[test]
    fn sideset_requires_a_bit_for_the_enable() {
        let mut config = SmConfig::default();
        assert!(config.set_sideset(0, true, false).is_err());
        assert!(config.set_sideset(6, false, false).is_err());
        config.set_sideset(3, true, true).unwrap();
        assert_eq!(config.sideset(), (3, true, true));
        assert_eq!(config.execctrl_register() >> 29, 0b11);
    }

    #[test]
    fn for_program_rebases_relocatable_wrap() {
        let program = Program::builder()
            .wrap_target(1)
            .wrap(3)
            .side_set(1, true, false)
            .instructions([0; 4])
            .build()
            .unwrap();
        let config = SmConfig::for_program(&program, 30).unwrap();
        assert_eq!(config.wrap(), (31, 1));
        assert_eq!(config.sideset(), (2, true, false));

        let fixed = Program::builder()
            .origin(Some(4))
            .instructions([0; 2])
            .build()
            .unwrap();
        assert_eq!(SmConfig::for_program(&fixed, 4).unwrap().wrap(), (4, 5));
    }

    proptest! {
        #[test]
        fn pin_setters_preserve_unrelated_bits(
            pinctrl_word in any::<u32>(),
            base in 0_u8..32,
            count in 0_u8..=32,
        ) {
            let mut config = SmConfig::from_registers(0, 0, 0, pinctrl_word);
            config.set_out_pins(base, count).unwrap();
            let field_mask = pinctrl::OUT_BASE.mask() | pinctrl::OUT_COUNT.mask();
            prop_assert_eq!(config.pinctrl_register() & !field_mask, pinctrl_word & !field_mask);
            prop_assert_eq!(config.out_pins(), (base, count));
        }

        #[test]
        fn wrap_setter_preserves_unrelated_bits(execctrl_word in any::<u32>(), target in 0_u8..32, wrap in 0_u8..32) {
            let mut config = SmConfig::from_registers(0, execctrl_word, 0, 0);
            config.set_wrap(target, wrap).unwrap();
            prop_assert_eq!(config.execctrl_register() & !0x1_ff80, execctrl_word & !0x1_ff80);
            prop_assert_eq!(config.wrap(), (target, wrap));
        }
    }
}
