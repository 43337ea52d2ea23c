//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to upstream service:
//!     → retries.rs (attempt loop, bounded by max_retries + 1)
//!         → circuit_breaker.rs allow_request() before each attempt
//!         → timeouts.rs (service timeout, shortened by caller deadline)
//!         → circuit_breaker.rs record_outcome() after each attempt
//!         → backoff.rs (exponential + jitter) before the next attempt
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every attempt has a deadline
//! - Retries only for transient failures (timeout, connection, 5xx, 429)
//! - Circuit breaker per service, shared by callers and the health prober

pub mod backoff;
pub mod circuit_breaker;
pub mod retries;
pub mod timeouts;

pub use circuit_breaker::{BreakerSnapshot, CallOutcome, CircuitBreaker, CircuitState};
pub use retries::RetryExecutor;
