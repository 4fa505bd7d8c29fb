//! Reconnect backoff policy.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use sojourn_core::ReconnectConfig;

/// Exponential backoff with a cap, optional jitter, and an attempt budget.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    initial: Duration,
    max: Duration,
    multiplier: f64,
    jitter_ms: u64,
    max_attempts: u32,
}

impl From<&ReconnectConfig> for BackoffPolicy {
    fn from(config: &ReconnectConfig) -> Self {
        Self {
            initial: Duration::from_millis(config.initial_ms),
            max: Duration::from_millis(config.max_ms),
            multiplier: config.multiplier,
            jitter_ms: config.jitter_ms,
            max_attempts: config.max_attempts,
        }
    }
}

impl BackoffPolicy {
    /// Delay before the reconnect scheduled as try number `attempt`
    /// (zero-based): `min(initial × multiplier^attempt, max)`, plus jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.initial.as_millis() as f64 * self.multiplier.powi(attempt as i32);
        let capped = (base as u64).min(self.max.as_millis() as u64);
        Duration::from_millis(jittered(capped, self.jitter_ms))
    }

    pub fn attempts_exhausted(&self, attempt: u32) -> bool {
        attempt >= self.max_attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

fn jittered(base_ms: u64, jitter_ms: u64) -> u64 {
    if jitter_ms == 0 {
        return base_ms;
    }
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_nanos(0))
        .subsec_nanos() as u64;
    base_ms.saturating_add(nanos % jitter_ms)
}
