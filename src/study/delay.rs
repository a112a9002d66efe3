//! Pads assistant replies to a uniform perceived latency in the
//! delay-enabled cases.

use std::time::Duration;

use rand::Rng;

use crate::core::AppConfig;

#[derive(Clone, Debug, PartialEq)]
pub struct DelayPolicy {
    min_secs: u64,
    max_secs: u64,
}

impl DelayPolicy {
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            min_secs: min_secs.min(max_secs),
            max_secs: min_secs.max(max_secs),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.delay_min_secs, config.delay_max_secs)
    }

    /// Draws the total turnaround in whole seconds, inclusive on both ends.
    pub fn draw_target(&self) -> u64 {
        rand::rng().random_range(self.min_secs..=self.max_secs)
    }

    /// Blocks until the reply has taken at least a freshly drawn target
    /// duration. Returns how long it slept; zero when disabled.
    pub async fn pad(&self, enabled: bool, elapsed_secs: f64) -> Duration {
        if !enabled {
            return Duration::ZERO;
        }
        let target = self.draw_target();
        let wait = remaining(elapsed_secs, target);
        tracing::debug!(
            "Delaying reply: target={}s elapsed={:.2}s wait={:.2}s",
            target,
            elapsed_secs,
            wait.as_secs_f64()
        );
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
        wait
    }
}

impl Default for DelayPolicy {
    fn default() -> Self {
        Self::new(10, 15)
    }
}

/// `max(0, target - elapsed)`. Never shortens a slow response.
pub fn remaining(elapsed_secs: f64, target_secs: u64) -> Duration {
    let left = target_secs as f64 - elapsed_secs;
    if left.is_finite() && left > 0.0 {
        Duration::from_secs_f64(left)
    } else {
        Duration::ZERO
    }
}
