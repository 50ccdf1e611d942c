//! Background refresh schedule with jitter.

use std::time::Duration;

use rand::Rng;

use crate::config::RefreshConfig;

/// How long a worker idles before refreshing on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSchedule {
    interval: Duration,
    jitter: Duration,
}

impl RefreshSchedule {
    pub fn new(interval: Duration, jitter: Duration) -> Self {
        Self {
            interval,
            jitter: jitter.min(interval),
        }
    }

    pub fn from_config(config: &RefreshConfig) -> Self {
        Self::new(
            Duration::from_secs(config.interval_secs),
            Duration::from_secs(config.jitter_secs),
        )
    }

    /// Draw the next idle timeout uniformly from `interval ± jitter`.
    pub fn next_timeout(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.interval;
        }

        let low = self.interval.saturating_sub(self.jitter);
        let high = self.interval.saturating_add(self.jitter);
        rand::thread_rng().gen_range(low..=high)
    }
}
