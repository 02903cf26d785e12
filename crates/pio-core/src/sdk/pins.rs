use super::{check_pin, check_sm, Pio};
use crate::bits::set_bit_indices;
use crate::instr::{set, SetDestination};
use crate::layout::{
    clkdiv, execctrl, pinctrl, register_address, sm_register, SmRegister, SET_PIN_WINDOW,
};
use crate::registers::RegisterAccess;
use crate::{PioError, RegisterError, SmConfig};

impl Pio {
    /// Drives all 32 pin output values of `sm` to `values`.
    ///
    /// # Errors
    ///
    /// Returns [`PioError`] for an invalid `sm` or a failed register access.
    pub fn sm_set_pins(&self, sm: u8, values: u32) -> Result<(), PioError> {
        check_sm(sm)?;
        self.with_set_window(sm, |window| {
            let mut base = 0;
            while base < 32 {
                let count = SET_PIN_WINDOW.min(32 - base);
                window.set(base, count, SetDestination::Pins, values >> base)?;
                base += count;
            }
            Ok(())
        })
    }

    /// Drives the pin output values selected by `mask` to `values`.
    ///
    /// # Errors
    ///
    /// Returns [`PioError`] for an invalid `sm` or a failed register access.
    pub fn sm_set_pins_with_mask(&self, sm: u8, values: u32, mask: u32) -> Result<(), PioError> {
        check_sm(sm)?;
        self.with_set_window(sm, |window| {
            for pin in set_bit_indices(mask) {
                window.set(pin, 1, SetDestination::Pins, (values >> pin) & 1)?;
            }
            Ok(())
        })
    }

    /// Sets the pin directions selected by `mask` (1 = output).
    ///
    /// # Errors
    ///
    /// Returns [`PioError`] for an invalid `sm` or a failed register access.
    pub fn sm_set_pindirs_with_mask(
        &self,
        sm: u8,
        directions: u32,
        mask: u32,
    ) -> Result<(), PioError> {
        check_sm(sm)?;
        self.with_set_window(sm, |window| {
            for pin in set_bit_indices(mask) {
                window.set(pin, 1, SetDestination::PinDirs, (directions >> pin) & 1)?;
            }
            Ok(())
        })
    }

    /// Sets `count` consecutive pin directions starting at `base`, wrapping
    /// past pin 31.
    ///
    /// # Errors
    ///
    /// Returns [`PioError`] for an invalid `sm`, `base` or `count`, or a
    /// failed register access.
    pub fn sm_set_consecutive_pindirs(
        &self,
        sm: u8,
        base: u8,
        count: u8,
        is_out: bool,
    ) -> Result<(), PioError> {
        check_sm(sm)?;
        check_pin(base)?;
        if count > 32 {
            return Err(PioError::invalid_argument(format!(
                "pin count {count} out of range 0..=32"
            )));
        }
        let value = if is_out { 0x1f } else { 0 };
        self.with_set_window(sm, |window| {
            let mut pin = u32::from(base);
            let mut remaining = u32::from(count);
            while remaining > SET_PIN_WINDOW {
                window.set(pin, SET_PIN_WINDOW, SetDestination::PinDirs, value)?;
                remaining -= SET_PIN_WINDOW;
                pin = (pin + SET_PIN_WINDOW) & 0x1f;
            }
            window.set(pin, remaining, SetDestination::PinDirs, value)
        })
    }

    /// Updates the wrap addresses of `sm` in place.
    ///
    /// # Errors
    ///
    /// Returns [`PioError`] for an invalid `sm` or address, or a failed
    /// register write.
    pub fn sm_set_wrap(&self, sm: u8, target: u8, wrap: u8) -> Result<(), PioError> {
        check_sm(sm)?;
        let mut scratch = SmConfig::default();
        scratch.set_wrap(target, wrap)?;
        self.write_masked(
            sm_register(sm, SmRegister::ExecCtrl),
            scratch.execctrl_register(),
            execctrl::WRAP_TOP.mask() | execctrl::WRAP_BOTTOM.mask(),
        )
    }

    /// Updates the OUT pin window of `sm` in place.
    ///
    /// # Errors
    ///
    /// Returns [`PioError`] for an invalid `sm`, `base` or `count`, or a
    /// failed register write.
    pub fn sm_set_out_pins(&self, sm: u8, base: u8, count: u8) -> Result<(), PioError> {
        check_sm(sm)?;
        let mut scratch = SmConfig::default();
        scratch.set_out_pins(base, count)?;
        self.write_pinctrl_fields(
            sm,
            scratch.pinctrl_register(),
            pinctrl::OUT_BASE.mask() | pinctrl::OUT_COUNT.mask(),
        )
    }

    /// Updates the SET pin window of `sm` in place.
    ///
    /// # Errors
    ///
    /// Returns [`PioError`] for an invalid `sm`, `base` or `count`, or a
    /// failed register write.
    pub fn sm_set_set_pins(&self, sm: u8, base: u8, count: u8) -> Result<(), PioError> {
        check_sm(sm)?;
        let mut scratch = SmConfig::default();
        scratch.set_set_pins(base, count)?;
        self.write_pinctrl_fields(
            sm,
            scratch.pinctrl_register(),
            pinctrl::SET_BASE.mask() | pinctrl::SET_COUNT.mask(),
        )
    }

    /// Updates the first IN pin of `sm` in place.
    ///
    /// # Errors
    ///
    /// Returns [`PioError`] for an invalid `sm` or `base`, or a failed
    /// register write.
    pub fn sm_set_in_pins(&self, sm: u8, base: u8) -> Result<(), PioError> {
        check_sm(sm)?;
        check_pin(base)?;
        self.write_pinctrl_fields(
            sm,
            pinctrl::IN_BASE.place(u32::from(base)),
            pinctrl::IN_BASE.mask(),
        )
    }

    /// Updates the first side-set pin of `sm` in place.
    ///
    /// # Errors
    ///
    /// Returns [`PioError`] for an invalid `sm` or `base`, or a failed
    /// register write.
    pub fn sm_set_sideset_pins(&self, sm: u8, base: u8) -> Result<(), PioError> {
        check_sm(sm)?;
        check_pin(base)?;
        self.write_pinctrl_fields(
            sm,
            pinctrl::SIDESET_BASE.place(u32::from(base)),
            pinctrl::SIDESET_BASE.mask(),
        )
    }

    /// Updates the clock divider of `sm` in place.
    ///
    /// # Errors
    ///
    /// Returns [`PioError`] for an invalid `sm` or divider, or a failed
    /// register write.
    pub fn sm_set_clkdiv_int_frac(&self, sm: u8, int: u16, frac: u8) -> Result<(), PioError> {
        check_sm(sm)?;
        let mut scratch = SmConfig::default();
        scratch.set_clkdiv_int_frac(int, frac)?;
        self.write_masked(
            sm_register(sm, SmRegister::ClkDiv),
            scratch.clkdiv_register(),
            clkdiv::INT.mask() | clkdiv::FRAC.mask(),
        )
    }

    fn write_pinctrl_fields(&self, sm: u8, bits: u32, mask: u32) -> Result<(), PioError> {
        self.write_masked(sm_register(sm, SmRegister::PinCtrl), bits, mask)
    }

    /// Runs `body` inside one register transaction with `PINCTRL` of `sm`
    /// saved beforehand and restored afterwards, even when `body` fails.
    fn with_set_window(
        &self,
        sm: u8,
        mut body: impl FnMut(&mut SetWindow<'_>) -> Result<(), RegisterError>,
    ) -> Result<(), PioError> {
        let pinctrl_address = register_address(self.base, sm_register(sm, SmRegister::PinCtrl));
        let instr_address = register_address(self.base, sm_register(sm, SmRegister::Instr));
        self.registers.transaction(&mut |access| {
            let saved = access.read(pinctrl_address)?;
            let result = body(&mut SetWindow {
                access: &mut *access,
                pinctrl_address,
                instr_address,
            });
            let restored = access.write(pinctrl_address, saved);
            result.and(restored)
        })?;
        Ok(())
    }
}

/// Register access for one pin helper sequence.
struct SetWindow<'a> {
    access: &'a mut dyn RegisterAccess,
    pinctrl_address: u32,
    instr_address: u32,
}

impl SetWindow<'_> {
    /// Points `SET` at `count` pins from `base` and executes `SET dest, data`.
    #[allow(clippy::cast_possible_truncation)]
    fn set(
        &mut self,
        base: u32,
        count: u32,
        destination: SetDestination,
        data: u32,
    ) -> Result<(), RegisterError> {
        let window = pinctrl::SET_COUNT.place(count) | pinctrl::SET_BASE.place(base);
        self.access.write(self.pinctrl_address, window)?;
        let instruction = set(destination, (data & 0x1f) as u8);
        self.access
            .write(self.instr_address, u32::from(instruction))
    }
}

#[cfg(test)]
mod tests {
    use crate::layout::{pinctrl, sm_register, SmRegister};
    use crate::{PioError, PioSystem, SystemConfig};

    #[test]
    fn pin_helpers_restore_pinctrl() {
        let system = PioSystem::new(SystemConfig::default()).unwrap();
        let pio = system.pio(0).unwrap();
        pio.sm_set_out_pins(2, 7, 4).unwrap();
        let pinctrl_index = sm_register(2, SmRegister::PinCtrl);
        let before = system.peek(0, pinctrl_index).unwrap();

        pio.sm_set_pins(2, 0xdead_beef).unwrap();
        pio.sm_set_pins_with_mask(2, 0xffff_ffff, 0x8000_0101).unwrap();
        pio.sm_set_pindirs_with_mask(2, 0, 0x0f).unwrap();
        pio.sm_set_consecutive_pindirs(2, 30, 12, true).unwrap();

        assert_eq!(system.peek(0, pinctrl_index), Some(before));
    }

    #[test]
    fn consecutive_pindirs_ends_with_the_remainder() {
        let system = PioSystem::new(SystemConfig::default()).unwrap();
        let pio = system.pio(0).unwrap();
        pio.sm_set_consecutive_pindirs(1, 30, 7, true).unwrap();
        // The last instruction written is the 2-pin remainder starting at pin 3.
        let instr = system.peek(0, sm_register(1, SmRegister::Instr)).unwrap();
        assert_eq!(instr, 0xe09f);
    }

    #[test]
    fn masked_pin_helpers_set_one_bit_per_pin() {
        let system = PioSystem::new(SystemConfig::default()).unwrap();
        let pio = system.pio(0).unwrap();
        let instr_index = sm_register(0, SmRegister::Instr);

        pio.sm_set_pins_with_mask(0, u32::MAX, 1 << 3).unwrap();
        assert_eq!(system.peek(0, instr_index), Some(0xe001));

        pio.sm_set_pins_with_mask(0, 0xffff_fff7, 1 << 3).unwrap();
        assert_eq!(system.peek(0, instr_index), Some(0xe000));

        pio.sm_set_pindirs_with_mask(0, u32::MAX, 1 << 31).unwrap();
        assert_eq!(system.peek(0, instr_index), Some(0xe081));
    }

    #[test]
    fn in_place_field_updates_keep_neighbours() {
        let system = PioSystem::new(SystemConfig::default()).unwrap();
        let pio = system.pio(0).unwrap();
        pio.sm_set_out_pins(0, 5, 3).unwrap();
        pio.sm_set_in_pins(0, 9).unwrap();
        pio.sm_set_sideset_pins(0, 11).unwrap();
        let word = system.peek(0, sm_register(0, SmRegister::PinCtrl)).unwrap();
        assert_eq!(
            word,
            0x1400_0000
                | pinctrl::OUT_COUNT.place(3)
                | pinctrl::OUT_BASE.place(5)
                | pinctrl::IN_BASE.place(9)
                | pinctrl::SIDESET_BASE.place(11)
        );
        assert!(matches!(
            pio.sm_set_set_pins(0, 0, 6),
            Err(PioError::Config(_))
        ));
        assert!(matches!(
            pio.sm_set_in_pins(0, 32),
            Err(PioError::InvalidArgument(_))
        ));
    }

    #[test]
    fn wrap_and_clkdiv_update_in_place() {
        let system = PioSystem::new(SystemConfig::default()).unwrap();
        let pio = system.pio(1).unwrap();
        pio.sm_set_wrap(3, 4, 9).unwrap();
        pio.sm_set_clkdiv_int_frac(3, 3, 64).unwrap();
        assert_eq!(
            system.peek(1, sm_register(3, SmRegister::ExecCtrl)),
            Some((9 << 12) | (4 << 7))
        );
        assert_eq!(
            system.peek(1, sm_register(3, SmRegister::ClkDiv)),
            Some((3 << 16) | (64 << 8))
        );
    }
}
