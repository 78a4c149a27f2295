use std::time::Duration;

use dog_core::DogConfigSnapshot;
use serde::{Deserialize, Serialize};

/// Readiness wait tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemuxConfig {
    /// Default maximum wait for a channel
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Delay after the first failed probe
    #[serde(with = "humantime_serde")]
    pub initial_poll: Duration,
    /// Upper bound on the delay between probes
    #[serde(with = "humantime_serde")]
    pub max_poll: Duration,
    /// Growth factor applied to the delay after each failed probe
    pub multiplier: f64,
}

impl Default for DemuxConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            initial_poll: Duration::from_millis(50),
            max_poll: Duration::from_secs(1),
            multiplier: 2.0,
        }
    }
}

impl DemuxConfig {
    /// Defaults overridden by `demux.timeout`, `demux.poll.initial`,
    /// `demux.poll.max` and `demux.poll.multiplier`.
    pub fn from_snapshot(config: &DogConfigSnapshot) -> Self {
        let defaults = Self::default();
        Self {
            timeout: config.get_duration("demux.timeout").unwrap_or(defaults.timeout),
            initial_poll: config
                .get_duration("demux.poll.initial")
                .unwrap_or(defaults.initial_poll),
            max_poll: config.get_duration("demux.poll.max").unwrap_or(defaults.max_poll),
            multiplier: config
                .get_f64("demux.poll.multiplier")
                .unwrap_or(defaults.multiplier),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.initial_poll.is_zero() {
            return Err("Initial poll interval must be positive".to_string());
        }
        if self.max_poll < self.initial_poll {
            return Err("Maximum poll interval cannot be below the initial interval".to_string());
        }
        if !(self.multiplier.is_finite() && self.multiplier >= 1.0) {
            return Err("Poll multiplier must be a finite value >= 1".to_string());
        }
        Ok(())
    }

    /// Delay to use after `current`, capped at `max_poll`.
    pub fn next_delay(&self, current: Duration) -> Duration {
        let nanos = (current.as_nanos() as f64 * self.multiplier.max(1.0)).round();
        if nanos >= self.max_poll.as_nanos() as f64 {
            return self.max_poll;
        }
        Duration::from_nanos(nanos as u64)
    }
}
