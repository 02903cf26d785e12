//! Runtime configuration for the SDK and the assembled system.

use std::time::Duration;

use crate::layout::PIO_COUNT;

/// Default sleep between polls once spinning and yielding gave up.
pub const DEFAULT_POLL_SLEEP: Duration = Duration::from_micros(50);

/// Tuning of the blocking SDK operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SdkConfig {
    /// Sleep per poll after the spin/yield backoff completes. Never bounds
    /// the total wait.
    pub poll_sleep: Duration,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            poll_sleep: DEFAULT_POLL_SLEEP,
        }
    }
}

/// Shape of an emulated [`crate::PioSystem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SystemConfig {
    /// Number of PIO blocks, 1 or 2.
    pub pio_count: u8,
    /// Settings shared by every PIO instance.
    pub sdk: SdkConfig,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            pio_count: PIO_COUNT,
            sdk: SdkConfig::default(),
        }
    }
}
