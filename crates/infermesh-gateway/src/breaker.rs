use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Circuit breaker state for a single worker.
///
/// State transitions:
///
/// - **Closed → Open**: consecutive failures reach the threshold
/// - **Open → HalfOpen**: the cooldown elapses; performed inside
///   [`CircuitBreaker::allow`], atomic with the admission grant
/// - **HalfOpen → Closed**: enough successes without an intervening failure
/// - **HalfOpen → Open**: any failure while probing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation, requests flow through
    Closed,
    /// Circuit is tripped; requests are denied without reaching the worker
    Open,
    /// Probing whether the worker has recovered
    HalfOpen,
}

impl CircuitState {
    /// Wire representation used by the gateway stats surface.
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures in Closed before tripping
    ///
    /// Default: 5
    pub failure_threshold: u32,
    /// Successes in HalfOpen before closing
    ///
    /// Default: 2
    pub success_threshold: u32,
    /// Cooldown after the last failure before a probe is admitted
    ///
    /// Default: 30 seconds
    pub timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Counter snapshot for the stats surface.
#[derive(Debug, Clone, Copy)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub failures: u32,
    pub successes: u32,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failures: u32,
    successes: u32,
    last_failure_at: Option<Instant>,
}

/// Per-worker failure accounting and admission gate.
///
/// The breaker never fails a request itself; it only answers whether an
/// attempt may proceed. All state lives behind one mutex, so every
/// transition is atomic with the event that caused it; in particular,
/// only one caller can consume the Open -> HalfOpen transition for a
/// given elapsed cooldown.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failures: 0,
                successes: 0,
                last_failure_at: None,
            }),
        }
    }

    /// Whether an attempt may proceed.
    ///
    /// Returns `true` in Closed and HalfOpen. In Open, returns `true` and
    /// transitions to HalfOpen iff the cooldown since the last failure has
    /// elapsed; otherwise the attempt is denied.
    pub fn allow(&self) -> bool {
        let mut inner = self.inner.lock().expect("breaker mutex poisoned");

        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let cooled = inner
                    .last_failure_at
                    .map(|at| at.elapsed() >= self.config.timeout)
                    .unwrap_or(true);
                if cooled {
                    inner.state = CircuitState::HalfOpen;
                    inner.failures = 0;
                    inner.successes = 0;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Records a successful attempt.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock().expect("breaker mutex poisoned");

        match inner.state {
            CircuitState::Closed => {
                inner.failures = 0;
            }
            CircuitState::HalfOpen => {
                inner.successes += 1;
                if inner.successes >= self.config.success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.failures = 0;
                    inner.successes = 0;
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Records a failed attempt.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().expect("breaker mutex poisoned");

        inner.last_failure_at = Some(Instant::now());

        match inner.state {
            CircuitState::HalfOpen => {
                // The probe failed; trip again and wait out another cooldown.
                inner.state = CircuitState::Open;
                inner.successes = 0;
            }
            CircuitState::Closed => {
                inner.failures += 1;
                if inner.failures >= self.config.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.successes = 0;
                }
            }
            CircuitState::Open => {}
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().expect("breaker mutex poisoned").state
    }

    /// One consistent read of state and both counters.
    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.inner.lock().expect("breaker mutex poisoned");
        BreakerSnapshot {
            state: inner.state,
            failures: inner.failures,
            successes: inner.successes,
        }
    }

    /// Shifts the last failure into the past, as if the cooldown had
    /// already elapsed.
    #[cfg(test)]
    pub(crate) fn backdate_last_failure(&self, by: Duration) {
        let mut inner = self.inner.lock().expect("breaker mutex poisoned");
        if let Some(at) = inner.last_failure_at {
            inner.last_failure_at = at.checked_sub(by);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = CircuitBreakerConfig::default();
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.success_threshold, 2);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_new_breaker_is_closed_and_allows() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig::default());
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.allow());
    }

    #[test]
    fn test_success_resets_failure_count_in_closed() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig::default());

        for _ in 0..4 {
            breaker.record_failure();
        }
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.snapshot().failures, 4);

        breaker.record_success();
        assert_eq!(breaker.snapshot().failures, 0);

        // The counter restarted, so four more failures still do not trip.
        for _ in 0..4 {
            breaker.record_failure();
        }
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn test_trips_open_at_failure_threshold() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig::default());

        for _ in 0..5 {
            assert!(breaker.allow());
            breaker.record_failure();
        }

        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.allow());
        assert!(!breaker.allow());
    }

    #[test]
    fn test_open_admits_probe_after_cooldown() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig::default());
        for _ in 0..5 {
            breaker.record_failure();
        }
        assert!(!breaker.allow());

        breaker.backdate_last_failure(Duration::from_secs(31));

        // The admission and the Open -> HalfOpen transition are one step.
        assert!(breaker.allow());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        let snap = breaker.snapshot();
        assert_eq!(snap.failures, 0);
        assert_eq!(snap.successes, 0);
    }

    #[test]
    fn test_full_recovery_cycle() {
        // The contract scenario: 5 failures, cooldown, then 2 successes.
        let breaker = CircuitBreaker::new(CircuitBreakerConfig::default());

        for _ in 0..5 {
            breaker.record_failure();
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        breaker.backdate_last_failure(Duration::from_secs(31));
        assert!(breaker.allow());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.allow());
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig::default());
        for _ in 0..5 {
            breaker.record_failure();
        }
        breaker.backdate_last_failure(Duration::from_secs(31));
        assert!(breaker.allow());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        // The failed probe restarted the cooldown.
        assert!(!breaker.allow());
    }

    #[test]
    fn test_cooldown_with_short_timeout_and_real_time() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 2,
            success_threshold: 1,
            timeout: Duration::from_millis(40),
        });

        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.allow());

        std::thread::sleep(Duration::from_millis(60));

        assert!(breaker.allow());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn test_state_strings() {
        assert_eq!(CircuitState::Closed.as_str(), "CLOSED");
        assert_eq!(CircuitState::Open.as_str(), "OPEN");
        assert_eq!(CircuitState::HalfOpen.as_str(), "HALF_OPEN");
    }

    #[test]
    fn test_concurrent_events_do_not_lose_the_state_machine() {
        use std::sync::Arc;
        use std::thread;

        let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig::default()));
        let mut handles = vec![];

        for i in 0..8 {
            let breaker = Arc::clone(&breaker);
            handles.push(thread::spawn(move || {
                for _ in 0..500 {
                    if breaker.allow() {
                        if i % 2 == 0 {
                            breaker.record_success();
                        } else {
                            breaker.record_failure();
                        }
                    }
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        // Whatever interleaving happened, the breaker must still be in a
        // legal state with sane counters.
        let snap = breaker.snapshot();
        assert!(matches!(
            snap.state,
            CircuitState::Closed | CircuitState::Open | CircuitState::HalfOpen
        ));
        assert!(snap.failures <= 5);
    }
}
