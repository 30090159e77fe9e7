use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::{info, warn};

/// Process-local circuit-breaker state, not persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: CircuitState,
    failure_count: u32,
    last_failure_at: Option<Instant>,
}

/// Gates queue consumption by the Worker Manager's loop. Transitions:
/// closed -> open on `max_failures` consecutive failures; open -> half-open
/// after `reset_timeout` since the last failure; half-open -> closed on
/// first success, -> open on any failure.
#[derive(Clone)]
pub struct CircuitBreaker {
    inner: Arc<RwLock<Inner>>,
    max_failures: u32,
    reset_timeout: Duration,
}

impl CircuitBreaker {
    pub fn new(max_failures: u32, reset_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure_at: None,
            })),
            max_failures,
            reset_timeout,
        }
    }

    /// Returns the externally-visible state, first promoting `Open` to
    /// `HalfOpen` if the reset timeout has elapsed since the last failure.
    pub async fn state(&self) -> CircuitState {
        let mut inner = self.inner.write().await;
        self.maybe_reset(&mut inner);
        inner.state
    }

    pub async fn is_open(&self) -> bool {
        matches!(self.state().await, CircuitState::Open)
    }

    fn maybe_reset(&self, inner: &mut Inner) {
        if inner.state == CircuitState::Open {
            if let Some(last_failure) = inner.last_failure_at {
                if last_failure.elapsed() >= self.reset_timeout {
                    inner.state = CircuitState::HalfOpen;
                    info!("circuit breaker transitioning open -> half-open");
                }
            }
        }
    }

    pub async fn record_success(&self) {
        let mut inner = self.inner.write().await;
        self.maybe_reset(&mut inner);
        match inner.state {
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Closed;
                inner.failure_count = 0;
                info!("circuit breaker transitioning half-open -> closed");
            }
            CircuitState::Closed => {
                inner.failure_count = 0;
            }
            CircuitState::Open => {}
        }
    }

    pub async fn record_failure(&self) {
        let mut inner = self.inner.write().await;
        self.maybe_reset(&mut inner);
        inner.last_failure_at = Some(Instant::now());

        match inner.state {
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                warn!("circuit breaker transitioning half-open -> open");
            }
            CircuitState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.max_failures {
                    inner.state = CircuitState::Open;
                    warn!(
                        failures = inner.failure_count,
                        "circuit breaker transitioning closed -> open"
                    );
                }
            }
            CircuitState::Open => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_after_max_failures() {
        let breaker = CircuitBreaker::new(3, Duration::from_millis(50));
        assert_eq!(breaker.state().await, CircuitState::Closed);
        breaker.record_failure().await;
        breaker.record_failure().await;
        assert_eq!(breaker.state().await, CircuitState::Closed);
        breaker.record_failure().await;
        assert_eq!(breaker.state().await, CircuitState::Open);
    }

    #[tokio::test]
    async fn full_lifecycle_closed_open_half_open_closed() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(20));
        breaker.record_failure().await;
        assert_eq!(breaker.state().await, CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(breaker.state().await, CircuitState::HalfOpen);

        breaker.record_success().await;
        assert_eq!(breaker.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn half_open_failure_reopens() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(10));
        breaker.record_failure().await;
        tokio::time::sleep(Duration::from_millis(15)).await;
        assert_eq!(breaker.state().await, CircuitState::HalfOpen);
        breaker.record_failure().await;
        assert_eq!(breaker.state().await, CircuitState::Open);
    }
}
