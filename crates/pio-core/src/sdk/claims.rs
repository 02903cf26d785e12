use std::sync::PoisonError;

use tracing::debug;

use super::{check_sm, check_sm_mask, Pio};
use crate::bits::set_bit_indices;
use crate::layout::SM_COUNT;
use crate::PioError;

impl Pio {
    /// Marks `sm` as in use.
    ///
    /// # Errors
    ///
    /// Returns [`PioError::ClaimConflict`] when `sm` is already claimed, or
    /// [`PioError::InvalidArgument`] for an invalid `sm`.
    pub fn sm_claim(&self, sm: u8) -> Result<(), PioError> {
        check_sm(sm)?;
        self.claim_sm_mask(1 << sm)
    }

    /// Marks every state machine in `mask` as in use, all or nothing.
    ///
    /// # Errors
    ///
    /// Returns [`PioError::ClaimConflict`] listing the already-claimed
    /// members of `mask`, or [`PioError::InvalidArgument`] for an invalid
    /// `mask`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn claim_sm_mask(&self, mask: u8) -> Result<(), PioError> {
        check_sm_mask(mask)?;
        let mut claimed = self.claimed.lock().unwrap_or_else(PoisonError::into_inner);
        let conflicts = *claimed & mask;
        if conflicts != 0 {
            return Err(PioError::ClaimConflict {
                indices: set_bit_indices(u32::from(conflicts))
                    .map(|index| index as u8)
                    .collect(),
            });
        }
        *claimed |= mask;
        debug!(pio = self.index, mask, claimed = *claimed, "state machines claimed");
        Ok(())
    }

    /// Releases `sm`; releasing an unclaimed state machine is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`PioError::InvalidArgument`] for an invalid `sm`.
    pub fn sm_unclaim(&self, sm: u8) -> Result<(), PioError> {
        check_sm(sm)?;
        let mut claimed = self.claimed.lock().unwrap_or_else(PoisonError::into_inner);
        *claimed &= !(1 << sm);
        debug!(pio = self.index, sm, claimed = *claimed, "state machine released");
        Ok(())
    }

    /// Claims the lowest-numbered free state machine.
    ///
    /// Returns `None` when every state machine is taken and `required` is
    /// not set.
    ///
    /// # Errors
    ///
    /// Returns [`PioError::NoUnusedStateMachine`] when every state machine
    /// is taken and `required` is set.
    pub fn claim_unused_sm(&self, required: bool) -> Result<Option<u8>, PioError> {
        let mut claimed = self.claimed.lock().unwrap_or_else(PoisonError::into_inner);
        match (0..SM_COUNT).find(|sm| *claimed & (1 << sm) == 0) {
            Some(sm) => {
                *claimed |= 1 << sm;
                debug!(pio = self.index, sm, "unused state machine claimed");
                Ok(Some(sm))
            }
            None if required => Err(PioError::NoUnusedStateMachine),
            None => Ok(None),
        }
    }

    /// Whether `sm` is currently claimed.
    ///
    /// # Errors
    ///
    /// Returns [`PioError::InvalidArgument`] for an invalid `sm`.
    pub fn sm_is_claimed(&self, sm: u8) -> Result<bool, PioError> {
        check_sm(sm)?;
        let claimed = self.claimed.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(*claimed & (1 << sm) != 0)
    }
}
