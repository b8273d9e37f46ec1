//! Exponential backoff for live feed resubscription.

use std::time::Duration;

use rand::Rng;

use crate::chat::core::config::FeedConfig;

/// Exponential backoff state. Reset after every successful delivery.
#[derive(Clone, Debug)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    multiplier: u32,
    current: Duration,
}

impl Backoff {
    /// Create a backoff from feed settings.
    #[must_use]
    pub const fn new(config: &FeedConfig) -> Self {
        Self {
            initial: config.initial_backoff(),
            max: config.max_backoff(),
            multiplier: config.backoff_multiplier,
            current: config.initial_backoff(),
        }
    }

    /// Delay before the next attempt; grows the delay for the attempt after.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self
            .current
            .checked_mul(self.multiplier)
            .map_or(self.max, |grown| grown.min(self.max));
        delay
    }

    /// Return to the initial delay.
    pub const fn reset(&mut self) {
        self.current = self.initial;
    }
}

/// Spread `delay` uniformly over `[delay / 2, delay]` so clients do not retry in lockstep.
#[must_use]
pub fn with_jitter(delay: Duration) -> Duration {
    let half = delay / 2;
    let spread = u64::try_from(half.as_millis()).unwrap_or(u64::MAX);
    if spread == 0 {
        return delay;
    }
    half + Duration::from_millis(rand::thread_rng().gen_range(0..=spread))
}
