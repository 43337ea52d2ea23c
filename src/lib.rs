//! Resilient clients for upstream HTTP services.
//!
//! # Architecture Overview
//!
//! ```text
//!     caller
//!       │  registry.get("search-service")?.post_json(..)
//!       ▼
//!   ┌──────────────┐    ┌────────────────┐    ┌─────────────────┐
//!   │   registry   │───▶│ ServiceClient  │───▶│  RetryExecutor  │──▶ upstream
//!   │ name → entry │    │ config + http  │    │ timeout, backoff│
//!   └──────────────┘    └────────────────┘    └────────┬────────┘
//!          ▲                                           │ allow / record
//!          │ reconcile                                 ▼
//!   ┌──────────────┐    ┌────────────────┐    ┌─────────────────┐
//!   │    config    │    │ health prober  │───▶│ CircuitBreaker  │
//!   │ env / toml   │    │ one per service│    │ (per service)   │
//!   └──────────────┘    └────────────────┘    └─────────────────┘
//! ```
//!
//! Every service has exactly one breaker, shared by its caller traffic and
//! its health prober. Breakers of different services never interact.

pub mod admin;
pub mod client;
pub mod config;
pub mod error;
pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod registry;
pub mod resilience;

pub use client::ServiceClient;
pub use config::{RuntimeConfig, ServiceConfig};
pub use error::{ErrorKind, ServiceError, ServiceResult};
pub use lifecycle::{Runtime, Shutdown};
pub use registry::ClientRegistry;
pub use resilience::{CircuitBreaker, CircuitState};
