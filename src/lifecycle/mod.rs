//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validate config → Build registry → Spawn probers → Bind admin
//!
//! Reload (startup.rs):
//!     New config → Validate → Reconcile registry → Sync probers
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Broadcast → Probers and admin exit → Join
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{Runtime, StartupError};
