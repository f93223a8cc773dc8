//! Two-step circuit breaker gating every broker-touching call.
//!
//! Modeled on `sony/gobreaker`'s `TwoStepCircuitBreaker`: a caller first
//! `acquire()`s a [`Permit`], performs the broker operation, then calls
//! [`Permit::release`] with whether the operation succeeded. Splitting
//! acquire from release lets the caller classify *which* failures count
//! (see [`crate::error::ClientError::is_connection_fault`]) instead of the
//! breaker inferring it from a generic `Result`.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::BreakerConfig;

/// Consecutive closed-state failures that trip the breaker open. The
/// original implementation never overrides `gobreaker`'s `ReadyToTrip`, so
/// it inherits that library's default of tripping once consecutive failures
/// exceed 5; this crate hardcodes the equivalent threshold rather than
/// exposing a knob the source never exposed either.
const FAILURE_THRESHOLD: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, thiserror::Error)]
#[error("circuit breaker is open")]
pub struct BreakerOpenError;

struct Inner {
    state: BreakerState,
    failures: u32,
    successes: u32,
    half_open_requests: u32,
    opened_at: Instant,
    clear_deadline: Instant,
}

/// Gates broker-touching calls, opening after repeated connection failures
/// and half-opening after a cooldown to probe recovery.
pub struct Breaker {
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

/// A token obtained from a successful `acquire()`. Must be released with the
/// outcome of the guarded operation exactly once.
#[must_use = "a breaker permit must be released with the call's outcome"]
pub struct Permit<'a> {
    breaker: &'a Breaker,
}

impl Breaker {
    pub fn new(config: BreakerConfig) -> Self {
        let now = Instant::now();
        Self {
            config,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                failures: 0,
                successes: 0,
                half_open_requests: 0,
                opened_at: now,
                clear_deadline: now + config.clear_interval,
            }),
        }
    }

    pub fn state(&self) -> BreakerState {
        let mut inner = self.inner.lock().unwrap();
        self.advance_locked(&mut inner);
        inner.state
    }

    /// Advances the state machine for elapsed time, without recording a
    /// result. Open -> half-open after `closed_timeout`; closed failure
    /// count resets after `clear_interval` with no intervening failure.
    fn advance_locked(&self, inner: &mut Inner) {
        let now = Instant::now();
        match inner.state {
            BreakerState::Open => {
                if now.duration_since(inner.opened_at) >= self.config.closed_timeout {
                    inner.state = BreakerState::HalfOpen;
                    inner.half_open_requests = 0;
                    inner.successes = 0;
                }
            }
            BreakerState::Closed => {
                if now >= inner.clear_deadline {
                    inner.failures = 0;
                    inner.clear_deadline = now + self.config.clear_interval;
                }
            }
            BreakerState::HalfOpen => {}
        }
    }

    fn open_locked(&self, inner: &mut Inner) {
        inner.state = BreakerState::Open;
        inner.opened_at = Instant::now();
        inner.failures = 0;
    }

    /// Requests permission to proceed. Fails fast when open; in half-open
    /// state only `max_requests` concurrent probes are admitted.
    pub fn acquire(&self) -> Result<Permit<'_>, BreakerOpenError> {
        let mut inner = self.inner.lock().unwrap();
        self.advance_locked(&mut inner);

        match inner.state {
            BreakerState::Open => Err(BreakerOpenError),
            BreakerState::HalfOpen => {
                if inner.half_open_requests >= self.config.max_requests {
                    Err(BreakerOpenError)
                } else {
                    inner.half_open_requests += 1;
                    Ok(Permit { breaker: self })
                }
            }
            BreakerState::Closed => Ok(Permit { breaker: self }),
        }
    }

    fn release(&self, success: bool) {
        let mut inner = self.inner.lock().unwrap();
        self.advance_locked(&mut inner);

        match inner.state {
            BreakerState::Closed => {
                if success {
                    inner.failures = 0;
                } else {
                    inner.failures += 1;
                    if inner.failures >= FAILURE_THRESHOLD {
                        self.open_locked(&mut inner);
                    }
                }
            }
            BreakerState::HalfOpen => {
                if success {
                    inner.successes += 1;
                    if inner.successes >= self.config.max_requests {
                        inner.state = BreakerState::Closed;
                        inner.failures = 0;
                        inner.clear_deadline = Instant::now() + self.config.clear_interval;
                    }
                } else {
                    self.open_locked(&mut inner);
                }
            }
            BreakerState::Open => {}
        }
    }

    /// Time remaining before an open breaker becomes eligible for half-open.
    pub fn time_until_half_open(&self) -> Duration {
        let inner = self.inner.lock().unwrap();
        if inner.state != BreakerState::Open {
            return Duration::ZERO;
        }
        let elapsed = Instant::now().duration_since(inner.opened_at);
        self.config.closed_timeout.saturating_sub(elapsed)
    }
}

impl Permit<'_> {
    /// Reports the outcome of the guarded call. Must be called exactly once.
    pub fn release(self, success: bool) {
        self.breaker.release(success);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn fast_config() -> BreakerConfig {
        BreakerConfig { max_requests: 3, clear_interval: Duration::from_millis(50), closed_timeout: Duration::from_millis(50) }
    }

    #[test]
    fn starts_closed() {
        let breaker = Breaker::new(fast_config());
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn opens_after_failure_threshold() {
        let breaker = Breaker::new(fast_config());
        for _ in 0..FAILURE_THRESHOLD {
            let permit = breaker.acquire().unwrap();
            permit.release(false);
        }
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[test]
    fn does_not_trip_before_threshold_exceeded() {
        let breaker = Breaker::new(fast_config());
        for _ in 0..FAILURE_THRESHOLD - 1 {
            let permit = breaker.acquire().unwrap();
            permit.release(false);
        }
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn open_breaker_fails_fast() {
        let breaker = Breaker::new(fast_config());
        for _ in 0..FAILURE_THRESHOLD {
            breaker.acquire().unwrap().release(false);
        }
        assert!(breaker.acquire().is_err());
    }

    #[test]
    fn does_not_leave_open_before_closed_timeout() {
        let breaker = Breaker::new(fast_config());
        for _ in 0..FAILURE_THRESHOLD {
            breaker.acquire().unwrap().release(false);
        }
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(breaker.acquire().is_err());
    }

    #[test]
    fn half_opens_after_closed_timeout() {
        let breaker = Breaker::new(fast_config());
        for _ in 0..FAILURE_THRESHOLD {
            breaker.acquire().unwrap().release(false);
        }
        sleep(Duration::from_millis(60));
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
    }

    #[test]
    fn half_open_closes_after_success_batch() {
        let breaker = Breaker::new(fast_config());
        for _ in 0..FAILURE_THRESHOLD {
            breaker.acquire().unwrap().release(false);
        }
        sleep(Duration::from_millis(60));
        for _ in 0..3 {
            breaker.acquire().unwrap().release(true);
        }
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn half_open_reopens_on_any_failure() {
        let breaker = Breaker::new(fast_config());
        for _ in 0..FAILURE_THRESHOLD {
            breaker.acquire().unwrap().release(false);
        }
        sleep(Duration::from_millis(60));
        let permit = breaker.acquire().unwrap();
        permit.release(false);
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[test]
    fn half_open_limits_concurrent_probes() {
        let breaker = Breaker::new(fast_config());
        for _ in 0..FAILURE_THRESHOLD {
            breaker.acquire().unwrap().release(false);
        }
        sleep(Duration::from_millis(60));

        let permits: Vec<_> = (0..3).map(|_| breaker.acquire().unwrap()).collect();
        assert!(breaker.acquire().is_err());
        drop(permits);
    }

    #[test]
    fn protocol_failures_can_be_reported_as_success() {
        // Two-step breaker lets the caller say "the broker replied, it just
        // rejected the request" without tripping the breaker.
        let breaker = Breaker::new(fast_config());
        for _ in 0..10 {
            let permit = breaker.acquire().unwrap();
            permit.release(true);
        }
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn clear_interval_resets_failure_count() {
        let breaker = Breaker::new(fast_config());
        breaker.acquire().unwrap().release(false);
        breaker.acquire().unwrap().release(false);
        sleep(Duration::from_millis(60));
        // clear_interval elapsed with no third failure: still closed.
        assert_eq!(breaker.state(), BreakerState::Closed);
        breaker.acquire().unwrap().release(false);
        breaker.acquire().unwrap().release(false);
        assert_eq!(breaker.state(), BreakerState::Closed);
    }
}
