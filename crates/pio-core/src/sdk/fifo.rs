use super::{check_sm, Pio};
use crate::instr::{out, pull, OutDestination};
use crate::layout::{
    flevel, fstat, shiftctrl, sm_register, SmRegister, FLEVEL, FSTAT, RXF0, TXF0,
};
use crate::PioError;

impl Pio {
    /// Writes `data` to the TX FIFO of `sm` without checking for room.
    ///
    /// # Errors
    ///
    /// Returns [`PioError`] for an invalid `sm` or a failed register write.
    pub fn sm_put(&self, sm: u8, data: u32) -> Result<(), PioError> {
        check_sm(sm)?;
        self.write(TXF0 + u32::from(sm), data)
    }

    /// Reads the RX FIFO of `sm` without checking for data.
    ///
    /// # Errors
    ///
    /// Returns [`PioError`] for an invalid `sm` or a failed register read.
    pub fn sm_get(&self, sm: u8) -> Result<u32, PioError> {
        check_sm(sm)?;
        self.read(RXF0 + u32::from(sm))
    }

    /// Whether the TX FIFO of `sm` is full.
    ///
    /// # Errors
    ///
    /// Returns [`PioError`] for an invalid `sm` or a failed register read.
    pub fn sm_is_tx_fifo_full(&self, sm: u8) -> Result<bool, PioError> {
        self.fifo_status(sm, fstat::TXFULL.lsb())
    }

    /// Whether the TX FIFO of `sm` is empty.
    ///
    /// # Errors
    ///
    /// Returns [`PioError`] for an invalid `sm` or a failed register read.
    pub fn sm_is_tx_fifo_empty(&self, sm: u8) -> Result<bool, PioError> {
        self.fifo_status(sm, fstat::TXEMPTY.lsb())
    }

    /// Whether the RX FIFO of `sm` is full.
    ///
    /// # Errors
    ///
    /// Returns [`PioError`] for an invalid `sm` or a failed register read.
    pub fn sm_is_rx_fifo_full(&self, sm: u8) -> Result<bool, PioError> {
        self.fifo_status(sm, fstat::RXFULL.lsb())
    }

    /// Whether the RX FIFO of `sm` is empty.
    ///
    /// # Errors
    ///
    /// Returns [`PioError`] for an invalid `sm` or a failed register read.
    pub fn sm_is_rx_fifo_empty(&self, sm: u8) -> Result<bool, PioError> {
        self.fifo_status(sm, fstat::RXEMPTY.lsb())
    }

    /// Number of words in the TX FIFO of `sm`.
    ///
    /// # Errors
    ///
    /// Returns [`PioError`] for an invalid `sm` or a failed register read.
    pub fn sm_get_tx_fifo_level(&self, sm: u8) -> Result<u32, PioError> {
        check_sm(sm)?;
        Ok(flevel::tx(sm).extract(self.read(FLEVEL)?))
    }

    /// Number of words in the RX FIFO of `sm`.
    ///
    /// # Errors
    ///
    /// Returns [`PioError`] for an invalid `sm` or a failed register read.
    pub fn sm_get_rx_fifo_level(&self, sm: u8) -> Result<u32, PioError> {
        check_sm(sm)?;
        Ok(flevel::rx(sm).extract(self.read(FLEVEL)?))
    }

    /// Waits for room in the TX FIFO of `sm`, then writes `data`.
    ///
    /// # Errors
    ///
    /// Returns [`PioError`] for an invalid `sm` or a failed register access.
    pub fn sm_put_blocking(&self, sm: u8, data: u32) -> Result<(), PioError> {
        check_sm(sm)?;
        self.poll_until(|| Ok(!self.sm_is_tx_fifo_full(sm)?))?;
        self.sm_put(sm, data)
    }

    /// Waits for data in the RX FIFO of `sm`, then reads it.
    ///
    /// # Errors
    ///
    /// Returns [`PioError`] for an invalid `sm` or a failed register access.
    pub fn sm_get_blocking(&self, sm: u8) -> Result<u32, PioError> {
        check_sm(sm)?;
        self.poll_until(|| Ok(!self.sm_is_rx_fifo_empty(sm)?))?;
        self.sm_get(sm)
    }

    /// Empties the TX FIFO of `sm` by executing pulls until it reports empty.
    ///
    /// With autopull enabled, `out null, 32` is used so the OSR refills from
    /// the FIFO; otherwise a non-blocking `pull`.
    ///
    /// # Errors
    ///
    /// Returns [`PioError`] for an invalid `sm` or a failed register access.
    pub fn sm_drain_tx_fifo(&self, sm: u8) -> Result<(), PioError> {
        check_sm(sm)?;
        let shift = self.read(sm_register(sm, SmRegister::ShiftCtrl))?;
        let instruction = if shiftctrl::AUTOPULL.extract(shift) != 0 {
            out(OutDestination::Null, 32)
        } else {
            pull(false, false)
        };
        self.poll_until(|| {
            if self.sm_is_tx_fifo_empty(sm)? {
                return Ok(true);
            }
            self.sm_exec(sm, instruction)?;
            Ok(false)
        })
    }

    /// Discards the contents of both FIFOs of `sm`.
    ///
    /// Toggles `SHIFTCTRL.FJOIN_RX` twice, leaving the join setting as it
    /// was. With `FJOIN_TX` set the intermediate state joins both ways.
    ///
    /// # Errors
    ///
    /// Returns [`PioError`] for an invalid `sm` or a failed register write.
    pub fn sm_clear_fifos(&self, sm: u8) -> Result<(), PioError> {
        check_sm(sm)?;
        let index = sm_register(sm, SmRegister::ShiftCtrl);
        self.xor_bits(index, shiftctrl::FJOIN_RX.mask())?;
        self.xor_bits(index, shiftctrl::FJOIN_RX.mask())
    }

    fn fifo_status(&self, sm: u8, lsb: u32) -> Result<bool, PioError> {
        check_sm(sm)?;
        let status = self.read(FSTAT)?;
        Ok(status & (1 << (lsb + u32::from(sm))) != 0)
    }
}
