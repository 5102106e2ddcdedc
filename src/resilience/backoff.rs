//! Exponential backoff with jitter.
//!
//! The delay after the attempt numbered `attempt` (1-based) is drawn uniformly
//! from `[min_delay, min(max_delay, multiplier * exp_base^(attempt - 1))]`.
//! Full jitter spreads retries from many failed callbacks so they do not hit a
//! recovering endpoint in lockstep.

use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;

/// Backoff parameters. Every computed delay lies within `[min_delay, max_delay]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    multiplier: f64,
    exp_base: f64,
    min_delay: Duration,
    max_delay: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(2.0, 2.0, Duration::ZERO, Duration::from_secs(60))
    }
}

impl Backoff {
    /// Create backoff parameters. A `max_delay` below `min_delay` is raised to it.
    pub fn new(multiplier: f64, exp_base: f64, min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            multiplier,
            exp_base,
            min_delay,
            max_delay: max_delay.max(min_delay),
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.multiplier,
            config.exp_base,
            Duration::from_millis(config.min_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )
    }

    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Upper bound of the jitter window after `attempt`.
    pub fn ceiling(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.multiplier * self.exp_base.powi(exponent);

        let max_secs = self.max_delay.as_secs_f64();
        let capped = if secs.is_finite() {
            secs.clamp(0.0, max_secs)
        } else {
            max_secs
        };

        Duration::from_secs_f64(capped).clamp(self.min_delay, self.max_delay)
    }

    /// Jittered delay to wait after `attempt` failed.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let low = self.min_delay.as_secs_f64();
        let high = self.ceiling(attempt).as_secs_f64();
        if high <= low {
            return self.min_delay;
        }

        let secs = rand::thread_rng().gen_range(low..=high);
        Duration::from_secs_f64(secs).clamp(self.min_delay, self.max_delay)
    }
}
