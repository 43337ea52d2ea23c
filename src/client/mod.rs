//! Upstream HTTP client subsystem.
//!
//! # Data Flow
//! ```text
//! caller
//!     → service.rs ServiceClient::request (one per registered service)
//!     → RetryExecutor (breaker check, timeout, backoff)
//!     → request.rs (URL join, request ID, bearer token)
//!     → reqwest
//!     → response.rs (status classification, envelope unwrap)
//! ```

pub mod request;
pub mod response;
pub mod service;

pub use request::X_REQUEST_ID;
pub use service::ServiceClient;
