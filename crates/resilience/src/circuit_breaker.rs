//! Per-resource circuit breaker guarding calls into flaky downstream adapters.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::clock::{Clock, MonotonicClock};
use crate::error::ResilienceError;

const STATE_CLOSED: u8 = 0;
const STATE_OPEN: u8 = 1;
const STATE_HALF_OPEN: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl From<u8> for BreakerState {
    fn from(v: u8) -> Self {
        match v {
            STATE_OPEN => BreakerState::Open,
            STATE_HALF_OPEN => BreakerState::HalfOpen,
            _ => BreakerState::Closed,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    pub failure_threshold: usize,
    pub open_duration: Duration,
    pub half_open_probes: usize,
    /// Consecutive half-open successes required before closing the breaker.
    pub success_threshold: usize,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_duration: Duration::from_secs(30),
            half_open_probes: 1,
            success_threshold: 2,
        }
    }
}

/// Lock-free breaker: all transitions go through `compare_exchange` on a
/// single `AtomicU8` state word, so concurrent callers never observe a torn
/// state. Failure/success counters are separate atomics and are allowed to
/// be slightly racy against the state transition itself; the worst case is
/// one extra probe let through, which the downstream adapter call tolerates.
pub struct CircuitBreaker {
    state: AtomicU8,
    failure_count: AtomicU64,
    half_open_inflight: AtomicU64,
    half_open_successes: AtomicU64,
    opened_at_millis: AtomicU64,
    config: BreakerConfig,
    clock: Arc<dyn Clock>,
    epoch: std::time::Instant,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self::with_clock(config, Arc::new(MonotonicClock))
    }

    pub fn with_clock(config: BreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: AtomicU8::new(STATE_CLOSED),
            failure_count: AtomicU64::new(0),
            half_open_inflight: AtomicU64::new(0),
            half_open_successes: AtomicU64::new(0),
            opened_at_millis: AtomicU64::new(0),
            config,
            epoch: clock.now(),
            clock,
        }
    }

    pub fn state(&self) -> BreakerState {
        self.maybe_transition_to_half_open();
        BreakerState::from(self.state.load(Ordering::Acquire))
    }

    fn now_millis(&self) -> u64 {
        self.clock.now().saturating_duration_since(self.epoch).as_millis() as u64
    }

    fn maybe_transition_to_half_open(&self) {
        if self.state.load(Ordering::Acquire) != STATE_OPEN {
            return;
        }
        let opened_at = self.opened_at_millis.load(Ordering::Acquire);
        let elapsed = self.now_millis().saturating_sub(opened_at);
        if elapsed >= self.config.open_duration.as_millis() as u64 {
            let _ = self.state.compare_exchange(
                STATE_OPEN,
                STATE_HALF_OPEN,
                Ordering::AcqRel,
                Ordering::Acquire,
            );
            self.half_open_inflight.store(0, Ordering::Release);
            self.half_open_successes.store(0, Ordering::Release);
        }
    }

    /// Returns `Err` without running anything if the breaker is open (or the
    /// half-open probe budget is already spent).
    pub fn check(&self) -> Result<(), ResilienceError<std::convert::Infallible>> {
        self.maybe_transition_to_half_open();
        match BreakerState::from(self.state.load(Ordering::Acquire)) {
            BreakerState::Closed => Ok(()),
            BreakerState::Open => Err(ResilienceError::CircuitOpen {
                failure_count: self.failure_count.load(Ordering::Acquire) as usize,
                open_duration: self.config.open_duration,
            }),
            BreakerState::HalfOpen => {
                let inflight = self.half_open_inflight.fetch_add(1, Ordering::AcqRel);
                if inflight < self.config.half_open_probes as u64 {
                    Ok(())
                } else {
                    self.half_open_inflight.fetch_sub(1, Ordering::AcqRel);
                    Err(ResilienceError::CircuitOpen {
                        failure_count: self.failure_count.load(Ordering::Acquire) as usize,
                        open_duration: self.config.open_duration,
                    })
                }
            }
        }
    }

    /// Closes the breaker after `success_threshold` consecutive half-open
    /// successes; a single probe succeeding is not enough on its own.
    pub fn record_success(&self) {
        match BreakerState::from(self.state.load(Ordering::Acquire)) {
            BreakerState::HalfOpen => {
                let successes = self.half_open_successes.fetch_add(1, Ordering::AcqRel) + 1;
                if successes as usize >= self.config.success_threshold.max(1)
                    && self
                        .state
                        .compare_exchange(
                            STATE_HALF_OPEN,
                            STATE_CLOSED,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                        )
                        .is_ok()
                {
                    self.failure_count.store(0, Ordering::Release);
                    self.half_open_successes.store(0, Ordering::Release);
                }
            }
            BreakerState::Closed => {
                self.failure_count.store(0, Ordering::Release);
            }
            BreakerState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        match BreakerState::from(self.state.load(Ordering::Acquire)) {
            BreakerState::HalfOpen => self.trip(),
            BreakerState::Closed => {
                let failures = self.failure_count.fetch_add(1, Ordering::AcqRel) + 1;
                if failures as usize >= self.config.failure_threshold {
                    self.trip();
                }
            }
            BreakerState::Open => {}
        }
    }

    fn trip(&self) {
        self.opened_at_millis.store(self.now_millis(), Ordering::Release);
        self.half_open_successes.store(0, Ordering::Release);
        self.state.store(STATE_OPEN, Ordering::Release);
    }

    pub fn reset(&self) {
        self.failure_count.store(0, Ordering::Release);
        self.half_open_inflight.store(0, Ordering::Release);
        self.half_open_successes.store(0, Ordering::Release);
        self.state.store(STATE_CLOSED, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn breaker_with_manual_clock(config: BreakerConfig) -> (CircuitBreaker, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let breaker = CircuitBreaker::with_clock(config, clock.clone());
        (breaker, clock)
    }

    #[test]
    fn starts_closed() {
        let breaker = CircuitBreaker::new(BreakerConfig::default());
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert!(breaker.check().is_ok());
    }

    #[test]
    fn trips_after_threshold_failures() {
        let config = BreakerConfig {
            failure_threshold: 3,
            ..Default::default()
        };
        let (breaker, _clock) = breaker_with_manual_clock(config);
        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Closed);
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(breaker.check().is_err());
    }

    #[test]
    fn transitions_to_half_open_after_cooldown() {
        let config = BreakerConfig {
            failure_threshold: 1,
            open_duration: Duration::from_secs(10),
            half_open_probes: 1,
            success_threshold: 1,
        };
        let (breaker, clock) = breaker_with_manual_clock(config);
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);

        clock.advance(Duration::from_secs(11));
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
        assert!(breaker.check().is_ok());
    }

    #[test]
    fn half_open_success_closes_breaker() {
        let config = BreakerConfig {
            failure_threshold: 1,
            open_duration: Duration::from_millis(1),
            half_open_probes: 1,
            success_threshold: 1,
        };
        let (breaker, clock) = breaker_with_manual_clock(config);
        breaker.record_failure();
        clock.advance(Duration::from_millis(5));
        assert!(breaker.check().is_ok());
        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn half_open_requires_consecutive_successes_before_closing() {
        let config = BreakerConfig {
            failure_threshold: 1,
            open_duration: Duration::from_millis(1),
            half_open_probes: 2,
            success_threshold: 2,
        };
        let (breaker, clock) = breaker_with_manual_clock(config);
        breaker.record_failure();
        clock.advance(Duration::from_millis(5));
        assert!(breaker.check().is_ok());
        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
        assert!(breaker.check().is_ok());
        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn half_open_failure_resets_success_streak_and_reopens() {
        let config = BreakerConfig {
            failure_threshold: 1,
            open_duration: Duration::from_millis(1),
            half_open_probes: 2,
            success_threshold: 2,
        };
        let (breaker, clock) = breaker_with_manual_clock(config);
        breaker.record_failure();
        clock.advance(Duration::from_millis(5));
        assert!(breaker.check().is_ok());
        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[test]
    fn half_open_failure_reopens() {
        let config = BreakerConfig {
            failure_threshold: 1,
            open_duration: Duration::from_millis(1),
            half_open_probes: 1,
            success_threshold: 1,
        };
        let (breaker, clock) = breaker_with_manual_clock(config);
        breaker.record_failure();
        clock.advance(Duration::from_millis(5));
        assert!(breaker.check().is_ok());
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[test]
    fn half_open_limits_concurrent_probes() {
        let config = BreakerConfig {
            failure_threshold: 1,
            open_duration: Duration::from_millis(1),
            half_open_probes: 1,
            success_threshold: 1,
        };
        let (breaker, clock) = breaker_with_manual_clock(config);
        breaker.record_failure();
        clock.advance(Duration::from_millis(5));
        assert!(breaker.check().is_ok());
        assert!(breaker.check().is_err());
    }
}
