use crate::error::{ReservationError, Result};
use std::time::Duration as StdDuration;

/// Runtime knobs of the reservation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// How long a fresh hold stays valid before the sweeper may reclaim it.
    pub hold_duration: chrono::Duration,
    /// Period of the background expiry sweep.
    pub sweep_interval: StdDuration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            hold_duration: chrono::Duration::minutes(15),
            sweep_interval: StdDuration::from_secs(30),
        }
    }
}

impl EngineConfig {
    pub fn from_secs(hold_secs: i64, sweep_secs: u64) -> Result<Self> {
        let hold_duration = chrono::Duration::try_seconds(hold_secs).ok_or_else(|| {
            ReservationError::InvalidRequest(format!(
                "hold duration of {hold_secs}s is out of range"
            ))
        })?;
        let config = Self {
            hold_duration,
            sweep_interval: StdDuration::from_secs(sweep_secs),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.hold_duration <= chrono::Duration::zero() {
            return Err(ReservationError::InvalidRequest(
                "hold duration must be positive".to_string(),
            ));
        }
        if self.sweep_interval.is_zero() {
            return Err(ReservationError::InvalidRequest(
                "sweep interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
