//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Per-service timer (health_check_interval)
//!     → prober.rs probes GET base_url + health_path (own short timeout)
//!     → outcome recorded on the service's circuit breaker
//!     → Open breaker past reset_timeout + healthy probe → Closed
//! ```
//!
//! # Design Decisions
//! - One task per service; a slow probe only delays its own service
//! - Probe failures never reach callers, only breaker state
//! - Probers observe the shutdown broadcast and cancel in-flight probes

pub mod prober;

pub use prober::{probe_once, HealthProber};
