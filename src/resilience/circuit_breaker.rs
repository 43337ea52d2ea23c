//! Circuit breaker for upstream protection.
//!
//! # States
//! - Closed: normal operation, calls pass through, outcomes tracked
//! - Open: upstream assumed down, calls fail fast
//! - Half-Open: a single probe call tests recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open: window holds >= minimum_calls outcomes and
//!                failure rate >= error_threshold_percent
//! Open → Half-Open: reset_timeout elapsed since opened_at
//!                   (evaluated lazily on allow_request / record_outcome)
//! Half-Open → Closed: probe succeeds, window cleared
//! Half-Open → Open: probe fails, opened_at restarted
//! ```
//!
//! # Design Decisions
//! - Count-based rolling window, not time-based
//! - Single probe in Half-Open; the permit lapses after reset_timeout if its
//!   outcome never arrives
//! - Outcomes reaching an Open breaker before reset_timeout are ignored
//! - Only transient failures count against the error rate
//! - All state behind one mutex; both operations are short and non-blocking

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::config::BreakerConfig;
use crate::error::ErrorKind;
use crate::observability::metrics;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    /// Gauge value used in metrics.
    pub fn as_gauge(self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::Open => 1.0,
            CircuitState::HalfOpen => 2.0,
        }
    }
}

/// Result of one attempt or probe, consumed immediately by the breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallOutcome {
    pub success: bool,
    pub latency: Duration,
    pub error_kind: Option<ErrorKind>,
}

impl CallOutcome {
    pub fn success(latency: Duration) -> Self {
        Self {
            success: true,
            latency,
            error_kind: None,
        }
    }

    pub fn failure(kind: ErrorKind, latency: Duration) -> Self {
        Self {
            success: false,
            latency,
            error_kind: Some(kind),
        }
    }

    /// A failure with no attempt-level classification, e.g. a health
    /// endpoint answering with a non-2xx status. Always counted.
    pub fn unhealthy(latency: Duration) -> Self {
        Self {
            success: false,
            latency,
            error_kind: None,
        }
    }

    /// Whether this outcome says something bad about upstream health.
    ///
    /// A non-transient failure (4xx, business error) means the upstream
    /// answered, so it counts as healthy.
    pub fn counts_as_failure(&self) -> bool {
        !self.success && self.error_kind.map_or(true, |k| k.is_transient())
    }
}

/// Point-in-time view of a breaker.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub service: String,
    pub enabled: bool,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    /// Failure percentage over the current window (0 when empty).
    pub windowed_error_rate: f64,
    pub window_len: usize,
    /// Milliseconds since the breaker last opened, if Open or Half-Open.
    pub opened_ms_ago: Option<u64>,
}

struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    /// true = failure.
    window: VecDeque<bool>,
    opened_at: Option<Instant>,
    /// Set while the single Half-Open probe is outstanding.
    probe_started: Option<Instant>,
}

impl BreakerInner {
    fn failures(&self) -> usize {
        self.window.iter().filter(|f| **f).count()
    }

    fn error_rate(&self) -> f64 {
        if self.window.is_empty() {
            0.0
        } else {
            self.failures() as f64 * 100.0 / self.window.len() as f64
        }
    }
}

/// Per-service circuit breaker.
pub struct CircuitBreaker {
    service: String,
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("service", &self.service)
            .field("state", &self.state())
            .finish()
    }
}

impl CircuitBreaker {
    /// Create a breaker in the Closed state.
    pub fn new(service: impl Into<String>, config: BreakerConfig) -> Self {
        let service = service.into();
        metrics::record_circuit_state(&service, CircuitState::Closed);
        Self {
            service,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                window: VecDeque::with_capacity(config.window_size),
                opened_at: None,
                probe_started: None,
            }),
            config,
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state, after applying any due Open → Half-Open transition.
    pub fn state(&self) -> CircuitState {
        if !self.config.enabled {
            return CircuitState::Closed;
        }
        let mut inner = self.lock();
        self.advance(&mut inner, Instant::now());
        inner.state
    }

    /// Check whether a call may proceed. Must precede every attempt.
    ///
    /// In Half-Open exactly one caller is granted the probe; everyone else is
    /// denied until its outcome is recorded.
    pub fn allow_request(&self) -> bool {
        if !self.config.enabled {
            return true;
        }
        let now = Instant::now();
        let mut inner = self.lock();
        self.advance(&mut inner, now);

        let allowed = match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => false,
            CircuitState::HalfOpen => {
                let lapsed = inner
                    .probe_started
                    .map_or(true, |t| now.duration_since(t) >= self.config.reset_timeout());
                if lapsed {
                    inner.probe_started = Some(now);
                }
                lapsed
            }
        };

        if !allowed {
            tracing::debug!(service = %self.service, state = ?inner.state, "Circuit breaker denied call");
            metrics::record_circuit_rejection(&self.service);
        }
        allowed
    }

    /// Feed the result of an attempt or a health probe into the breaker.
    pub fn record_outcome(&self, outcome: CallOutcome) {
        if !self.config.enabled {
            return;
        }
        let now = Instant::now();
        let failed = outcome.counts_as_failure();
        let mut inner = self.lock();
        self.advance(&mut inner, now);

        if failed {
            inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        } else {
            inner.consecutive_failures = 0;
        }

        match inner.state {
            CircuitState::Closed => {
                inner.window.push_back(failed);
                while inner.window.len() > self.config.window_size {
                    inner.window.pop_front();
                }
                if failed && self.should_trip(&inner) {
                    self.transition(&mut inner, CircuitState::Open, now);
                }
            }
            CircuitState::HalfOpen => {
                if failed {
                    self.transition(&mut inner, CircuitState::Open, now);
                } else {
                    self.transition(&mut inner, CircuitState::Closed, now);
                }
            }
            // Stale result from before the breaker opened; no new information.
            CircuitState::Open => {}
        }
    }

    /// Snapshot for status reporting.
    pub fn snapshot(&self) -> BreakerSnapshot {
        let now = Instant::now();
        let mut inner = self.lock();
        if self.config.enabled {
            self.advance(&mut inner, now);
        }
        BreakerSnapshot {
            service: self.service.clone(),
            enabled: self.config.enabled,
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            windowed_error_rate: inner.error_rate(),
            window_len: inner.window.len(),
            opened_ms_ago: inner
                .opened_at
                .map(|t| now.duration_since(t).as_millis() as u64),
        }
    }

    fn should_trip(&self, inner: &BreakerInner) -> bool {
        let len = inner.window.len();
        if len < self.config.minimum_calls {
            return false;
        }
        let failures = inner.failures();
        failures > 0 && failures * 100 >= self.config.error_threshold_percent as usize * len
    }

    fn advance(&self, inner: &mut BreakerInner, now: Instant) {
        if inner.state != CircuitState::Open {
            return;
        }
        let due = inner
            .opened_at
            .map_or(true, |t| now.duration_since(t) >= self.config.reset_timeout());
        if due {
            self.transition(inner, CircuitState::HalfOpen, now);
        }
    }

    fn transition(&self, inner: &mut BreakerInner, to: CircuitState, now: Instant) {
        let from = inner.state;
        inner.state = to;
        match to {
            CircuitState::Open => {
                inner.opened_at = Some(now);
                inner.probe_started = None;
                tracing::warn!(
                    service = %self.service,
                    from = ?from,
                    error_rate = inner.error_rate(),
                    consecutive_failures = inner.consecutive_failures,
                    reset_timeout_ms = self.config.reset_timeout_ms,
                    "Circuit breaker opened"
                );
            }
            CircuitState::HalfOpen => {
                inner.probe_started = None;
                tracing::info!(service = %self.service, "Circuit breaker half-open, awaiting probe");
            }
            CircuitState::Closed => {
                inner.window.clear();
                inner.consecutive_failures = 0;
                inner.opened_at = None;
                inner.probe_started = None;
                tracing::info!(service = %self.service, from = ?from, "Circuit breaker closed");
            }
        }
        metrics::record_circuit_state(&self.service, to);
    }
}
