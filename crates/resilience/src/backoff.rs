//! Exponential backoff with jitter for the retry policy.

use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct BackoffConfig {
    pub base: Duration,
    pub max: Duration,
    pub jitter_ratio: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(100),
            max: Duration::from_secs(10),
            jitter_ratio: 0.25,
        }
    }
}

/// Computes the delay before the `attempt`-th retry (1-indexed), doubling
/// each time and capped at `max`, then jittered by ±`jitter_ratio`.
pub fn delay_for_attempt(config: &BackoffConfig, attempt: u32) -> Duration {
    let exp = config.base.as_millis().saturating_mul(1u128 << attempt.min(30));
    let capped = exp.min(config.max.as_millis());
    let base = Duration::from_millis(capped as u64);
    jitter(base, config.jitter_ratio)
}

fn jitter(base: Duration, ratio: f64) -> Duration {
    if ratio <= 0.0 {
        return base;
    }
    let spread = (base.as_millis() as f64 * ratio).round() as i64;
    if spread == 0 {
        return base;
    }
    let delta = rand::random::<i64>().rem_euclid(2 * spread + 1) - spread;
    let millis = (base.as_millis() as i64 + delta).max(0);
    Duration::from_millis(millis as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_until_cap() {
        let config = BackoffConfig {
            base: Duration::from_millis(100),
            max: Duration::from_secs(1),
            jitter_ratio: 0.0,
        };
        assert_eq!(delay_for_attempt(&config, 0), Duration::from_millis(100));
        assert_eq!(delay_for_attempt(&config, 1), Duration::from_millis(200));
        assert_eq!(delay_for_attempt(&config, 2), Duration::from_millis(400));
        assert_eq!(delay_for_attempt(&config, 10), Duration::from_secs(1));
    }

    #[test]
    fn jitter_stays_within_ratio() {
        let config = BackoffConfig {
            base: Duration::from_millis(1000),
            max: Duration::from_secs(10),
            jitter_ratio: 0.25,
        };
        for attempt in 0..5 {
            let d = delay_for_attempt(&config, attempt);
            let nominal = (config.base.as_millis() as u64) << attempt;
            let lower = (nominal as f64 * 0.75) as u64;
            let upper = (nominal as f64 * 1.25) as u64;
            assert!(d.as_millis() as u64 >= lower.saturating_sub(1));
            assert!(d.as_millis() as u64 <= upper + 1);
        }
    }
}
