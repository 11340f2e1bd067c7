//! Randomised pacing between platform calls.
//!
//! Every delay is awaited in-line on the single run task, so nothing is
//! dispatched to the platform until the preceding delay has elapsed.

use std::time::Duration;

use rand::RngExt;

use crate::error::ConfigError;

/// A closed `[min, max]` interval of seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayRange {
    min: f64,
    max: f64,
}

impl DelayRange {
    /// Rejects negative, non-finite, or inverted bounds.
    pub fn new(name: &'static str, min: f64, max: f64) -> Result<Self, ConfigError> {
        if !min.is_finite() || !max.is_finite() || min < 0.0 || min > max {
            return Err(ConfigError::InvalidDelay { name, min, max });
        }
        Ok(Self { min, max })
    }

    /// No waiting at all. Handy in tests.
    pub fn zero() -> Self {
        Self { min: 0.0, max: 0.0 }
    }

    pub fn min(&self) -> Duration {
        Duration::from_secs_f64(self.min)
    }

    pub fn max(&self) -> Duration {
        Duration::from_secs_f64(self.max)
    }

    /// Draw a duration uniformly from the interval.
    pub fn sample(&self) -> Duration {
        if self.min == self.max {
            return Duration::from_secs_f64(self.min);
        }
        let secs = rand::rng().random_range(self.min..=self.max);
        Duration::from_secs_f64(secs)
    }

    /// Sample and sleep. Returns the slept duration.
    pub async fn wait(&self, scope: &str) -> Duration {
        let delay = self.sample();
        if !delay.is_zero() {
            tracing::debug!(scope, delay_secs = delay.as_secs_f64(), "pacing");
            tokio::time::sleep(delay).await;
        }
        delay
    }
}

pub struct RateLimiter {
    actions: DelayRange,
    targets: DelayRange,
}

impl RateLimiter {
    pub fn new(actions: DelayRange, targets: DelayRange) -> Self {
        Self { actions, targets }
    }

    pub fn disabled() -> Self {
        Self::new(DelayRange::zero(), DelayRange::zero())
    }

    /// Suspend between two actions. Returns the slept duration.
    pub async fn delay_between_actions(&self) -> Duration {
        self.actions.wait("action").await
    }

    /// Suspend between two targets. Returns the slept duration.
    pub async fn delay_between_targets(&self) -> Duration {
        self.targets.wait("target").await
    }
}
