//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! environment (<SERVICE>_URL, <SERVICE>_TIMEOUT, ...)    TOML file
//!     → env.rs                                            → loader.rs
//!                 ↘                                     ↙
//!                   validation.rs (defaults, range checks)
//!                   → ServiceConfig (validated, immutable)
//!                   → one registry entry per service
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads + validates
//!     → registry reconciles (atomic entry replacement)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once validated; changes replace whole entries
//! - Unset fields take per-service defaults before validation
//! - Validation reports every error, not just the first

pub mod env;
pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::ConfigError;
pub use schema::{
    AdminConfig, BreakerConfig, ObservabilityConfig, RawBreakerConfig, RawServiceConfig,
    RuntimeConfig, ServiceConfig,
};
pub use validation::validate_service;
