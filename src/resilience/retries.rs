//! Retry executor.
//!
//! # Responsibilities
//! - Run up to `max_retries + 1` attempts of one logical call
//! - Consult the circuit breaker before every attempt
//! - Bound each attempt by the service timeout and the caller's deadline
//! - Report every attempt's outcome to the breaker
//! - Back off exponentially (with jitter) between attempts
//!
//! # Design Decisions
//! - Only transient failures (timeout, connection error, 5xx/429) are retried
//! - A denied attempt fails with `CircuitOpen` and is not reported
//! - No retry is started that could not finish before the caller's deadline

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::ServiceConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;
use crate::resilience::circuit_breaker::{CallOutcome, CircuitBreaker};
use crate::resilience::timeouts::{attempt_budget, with_timeout};

/// Bounded-attempt wrapper around calls to one service.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    service: String,
    breaker: Arc<CircuitBreaker>,
    max_attempts: u32,
    timeout: Duration,
    base_delay_ms: u64,
    max_delay_ms: u64,
}

impl RetryExecutor {
    pub fn new(config: &ServiceConfig, breaker: Arc<CircuitBreaker>) -> Self {
        Self {
            service: config.name().to_string(),
            breaker,
            max_attempts: config.max_attempts(),
            timeout: config.timeout(),
            base_delay_ms: config.retry_base_delay_ms(),
            max_delay_ms: config.retry_max_delay_ms(),
        }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Execute `op` with retries. `op` receives the 1-based attempt number.
    ///
    /// Returns the first success; otherwise `CircuitOpen` when the breaker
    /// denies an attempt, or `Failed` carrying the attempt count and the last
    /// attempt's error.
    pub async fn execute<T, F, Fut>(&self, deadline: Option<Instant>, mut op: F) -> ServiceResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = ServiceResult<T>>,
    {
        let started = Instant::now();
        let mut attempts = 0u32;

        loop {
            let budget = match attempt_budget(self.timeout, deadline) {
                Some(budget) => budget,
                None => {
                    return Err(self.give_up(
                        attempts,
                        ServiceError::Timeout { timeout_ms: 0 },
                        started,
                    ))
                }
            };

            if !self.breaker.allow_request() {
                metrics::record_call(&self.service, "circuit_open", started.elapsed());
                return Err(ServiceError::CircuitOpen {
                    service: self.service.clone(),
                    attempts,
                });
            }

            attempts += 1;
            let attempt_start = Instant::now();
            let result = with_timeout(budget, op(attempts)).await;
            let latency = attempt_start.elapsed();

            let err = match result {
                Ok(value) => {
                    self.breaker.record_outcome(CallOutcome::success(latency));
                    metrics::record_call(&self.service, "success", started.elapsed());
                    return Ok(value);
                }
                Err(err) => err,
            };

            let Some(kind) = err.kind() else {
                // Not an attempt-level failure; nothing to learn about upstream health.
                return Err(err);
            };
            self.breaker.record_outcome(CallOutcome::failure(kind, latency));

            if !kind.is_transient() || attempts >= self.max_attempts {
                return Err(self.give_up(attempts, err, started));
            }

            let delay = calculate_backoff(attempts, self.base_delay_ms, self.max_delay_ms);
            if let Some(deadline) = deadline {
                if Instant::now() + delay >= deadline {
                    return Err(self.give_up(attempts, err, started));
                }
            }

            tracing::info!(
                service = %self.service,
                attempt = attempts,
                max_attempts = self.max_attempts,
                delay = ?delay,
                error = %err,
                "Retrying upstream call"
            );
            metrics::record_retry(&self.service);
            tokio::time::sleep(delay).await;
        }
    }

    fn give_up(&self, attempts: u32, last: ServiceError, started: Instant) -> ServiceError {
        tracing::warn!(
            service = %self.service,
            attempts,
            error = %last,
            "Upstream call failed"
        );
        metrics::record_call(&self.service, "failure", started.elapsed());
        ServiceError::Failed {
            service: self.service.clone(),
            attempts,
            source: Box::new(last),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{validate_service, RawServiceConfig};
    use crate::error::ErrorKind;
    use crate::resilience::circuit_breaker::CircuitState;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn executor(max_retries: i64, breaker_enabled: bool) -> RetryExecutor {
        let mut raw = RawServiceConfig::new("svc", "http://127.0.0.1:1");
        raw.timeout_ms = Some(1000);
        raw.max_retries = Some(max_retries);
        raw.retry_base_delay_ms = Some(100);
        raw.retry_max_delay_ms = Some(1000);
        raw.circuit_breaker.enabled = Some(breaker_enabled);
        raw.circuit_breaker.reset_timeout_ms = Some(5000);
        let config = validate_service(&raw).unwrap();
        let breaker = Arc::new(CircuitBreaker::new(config.name(), *config.breaker()));
        RetryExecutor::new(&config, breaker)
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_success_returned() {
        let ex = executor(2, true);
        let calls = AtomicU32::new(0);
        let result = ex
            .execute(None, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, ServiceError>("done") }
            })
            .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_then_succeeds() {
        let ex = executor(2, false);
        let result = ex
            .execute(None, |attempt| async move {
                if attempt < 3 {
                    Err(ServiceError::Upstream {
                        status: 503,
                        message: "busy".into(),
                    })
                } else {
                    Ok(attempt)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_exceeds_max_attempts() {
        let ex = executor(2, false);
        let calls = AtomicU32::new(0);
        let err = ex
            .execute(None, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(ServiceError::Transport("refused".into())) }
            })
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(err.attempts(), Some(3));
        assert_eq!(err.kind(), Some(ErrorKind::Transport));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_transient_fails_fast() {
        let ex = executor(5, true);
        let calls = AtomicU32::new(0);
        let err = ex
            .execute(None, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err::<(), _>(ServiceError::Upstream {
                        status: 400,
                        message: "bad request".into(),
                    })
                }
            })
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(err.attempts(), Some(1));
        assert_eq!(ex.breaker().state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_attempt_counts_as_timeout() {
        let ex = executor(0, false);
        let err = ex
            .execute(None, |_| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, ServiceError>(())
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::Timeout));
    }

    #[tokio::test(start_paused = true)]
    async fn test_caller_deadline_aborts_attempt() {
        let ex = executor(3, false);
        let calls = AtomicU32::new(0);
        let deadline = Instant::now() + Duration::from_millis(200);
        let err = ex
            .execute(Some(deadline), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok::<_, ServiceError>(())
                }
            })
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            err,
            ServiceError::Failed { ref source, .. }
                if matches!(**source, ServiceError::Timeout { timeout_ms: 200 })
        ));
        assert!(Instant::now() <= deadline);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_breaker_short_circuits() {
        let ex = executor(2, true);
        // Three timeouts trip the breaker (minimum_calls = 3, 100% >= 50%).
        let _ = ex
            .execute(None, |_| async {
                Err::<(), _>(ServiceError::Timeout { timeout_ms: 1000 })
            })
            .await;
        assert_eq!(ex.breaker().state(), CircuitState::Open);

        let calls = AtomicU32::new(0);
        let err = ex
            .execute(None, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, ServiceError>(()) }
            })
            .await
            .unwrap_err();
        assert!(err.is_circuit_open());
        assert_eq!(err.attempts(), Some(0));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_breaker_opening_mid_call_stops_retries() {
        let mut raw = RawServiceConfig::new("svc", "http://127.0.0.1:1");
        raw.max_retries = Some(5);
        raw.circuit_breaker.enabled = Some(true);
        raw.circuit_breaker.minimum_calls = Some(2);
        let config = validate_service(&raw).unwrap();
        let ex = RetryExecutor::new(
            &config,
            Arc::new(CircuitBreaker::new("svc", *config.breaker())),
        );

        let calls = AtomicU32::new(0);
        let err = ex
            .execute(None, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(ServiceError::Transport("reset".into())) }
            })
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(matches!(err, ServiceError::CircuitOpen { attempts: 2, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsendable_request_not_retried_or_recorded() {
        let ex = executor(2, true);
        let calls = AtomicU32::new(0);
        let err = ex
            .execute(None, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(ServiceError::Request("invalid header value".into())) }
            })
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, ServiceError::Request(_)));
        assert_eq!(ex.breaker().snapshot().window_len, 0);
    }
}
