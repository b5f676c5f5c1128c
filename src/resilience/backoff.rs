//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

/// Lower bound applied to every computed delay.
pub const MIN_DELAY_MS: u64 = 100;

/// Fraction of the delay that jitter may add or remove.
pub const JITTER_RATIO: f64 = 0.25;

/// Backoff parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub exponential_base: f64,
    pub jitter: bool,
}

impl Backoff {
    /// Delay before retry number `attempt` (1-based), without jitter.
    pub fn capped_delay_ms(&self, attempt: u32) -> u64 {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let raw = self.base_delay_ms as f64 * self.exponential_base.powi(exponent);
        if raw.is_finite() {
            raw.min(self.max_delay_ms as f64) as u64
        } else {
            self.max_delay_ms
        }
    }

    /// Delay before retry number `attempt`, with jitter and the floor applied.
    pub fn delay(&self, attempt: u32) -> Duration {
        let capped = self.capped_delay_ms(attempt);
        let delay_ms = if self.jitter {
            apply_jitter(capped)
        } else {
            capped
        };
        Duration::from_millis(delay_ms.max(MIN_DELAY_MS))
    }
}

/// Perturb `delay_ms` uniformly within ±25%.
fn apply_jitter(delay_ms: u64) -> u64 {
    let spread = delay_ms as f64 * JITTER_RATIO;
    if spread < 1.0 {
        return delay_ms;
    }
    let offset = rand::thread_rng().gen_range(-spread..=spread);
    (delay_ms as f64 + offset).round().max(0.0) as u64
}
