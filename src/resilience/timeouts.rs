//! Timeout enforcement.
//!
//! Every attempt is bounded by the service timeout, further shortened by a
//! caller deadline when one is supplied.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{ServiceError, ServiceResult};

/// Time an attempt may take, or `None` if the caller's deadline has passed.
pub fn attempt_budget(timeout: Duration, deadline: Option<Instant>) -> Option<Duration> {
    match deadline {
        None => Some(timeout),
        Some(deadline) => {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                None
            } else {
                Some(remaining.min(timeout))
            }
        }
    }
}

/// Run `fut`, failing with [`ServiceError::Timeout`] if it exceeds `budget`.
pub async fn with_timeout<F, T>(budget: Duration, fut: F) -> ServiceResult<T>
where
    F: Future<Output = ServiceResult<T>>,
{
    match tokio::time::timeout(budget, fut).await {
        Ok(result) => result,
        Err(_) => Err(ServiceError::Timeout {
            timeout_ms: budget.as_millis() as u64,
        }),
    }
}
