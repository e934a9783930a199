//! Movement configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::PositionError;

/// Default walking speed, in map units per second.
pub const DEFAULT_SPEED: f64 = 50.0;

/// Default cadence at which consumers are sent a fresh snapshot.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Default inset from the map edge for random placement.
pub const DEFAULT_MARGIN: f64 = 20.0;

/// Default ticks per second while anything is moving.
pub const DEFAULT_FRAME_RATE: f64 = 60.0;

/// Tunables for movement, sampling and placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementConfig {
    /// Walking speed in map units per second.
    pub speed: f64,
    /// Sampling cadence of the snapshot bridge, in milliseconds.
    pub poll_interval_ms: u64,
    /// Inset from every map edge used by random placement.
    pub default_margin: f64,
    /// Target ticks per second while the scheduler is active.
    pub frame_rate: f64,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            speed: DEFAULT_SPEED,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            default_margin: DEFAULT_MARGIN,
            frame_rate: DEFAULT_FRAME_RATE,
        }
    }
}

impl MovementConfig {
    /// Override the walking speed.
    #[must_use]
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    /// Override the sampling cadence.
    #[must_use]
    pub fn with_poll_interval_ms(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Override the placement margin.
    #[must_use]
    pub fn with_default_margin(mut self, default_margin: f64) -> Self {
        self.default_margin = default_margin;
        self
    }

    /// Override the frame rate.
    #[must_use]
    pub fn with_frame_rate(mut self, frame_rate: f64) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    /// Check every field.
    ///
    /// # Errors
    ///
    /// Returns the first [`PositionError`] found: a non-positive or
    /// non-finite speed, a frame rate whose interval is zero or does not fit
    /// a [`Duration`], a zero poll interval, or a negative or non-finite
    /// margin.
    pub fn validate(&self) -> Result<(), PositionError> {
        if !self.speed.is_finite() || self.speed <= 0.0 {
            return Err(PositionError::InvalidSpeed(self.speed));
        }
        if self.try_frame_interval().is_none() {
            return Err(PositionError::InvalidFrameRate(self.frame_rate));
        }
        if self.poll_interval_ms == 0 {
            return Err(PositionError::InvalidPollInterval(self.poll_interval_ms));
        }
        if !self.default_margin.is_finite() || self.default_margin < 0.0 {
            return Err(npc_math::GeometryError::InvalidMargin {
                margin: self.default_margin,
            }
            .into());
        }
        Ok(())
    }

    /// The sampling cadence as a [`Duration`].
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Time between scheduler ticks.
    ///
    /// Falls back to the default frame rate if `frame_rate` does not pass
    /// [`MovementConfig::validate`].
    #[must_use]
    pub fn frame_interval(&self) -> Duration {
        self.try_frame_interval()
            .unwrap_or_else(|| Duration::from_secs_f64(1.0 / DEFAULT_FRAME_RATE))
    }

    fn try_frame_interval(&self) -> Option<Duration> {
        if !self.frame_rate.is_finite() || self.frame_rate <= 0.0 {
            return None;
        }
        Duration::try_from_secs_f64(1.0 / self.frame_rate)
            .ok()
            .filter(|interval| !interval.is_zero())
    }
}
