//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → store → CacheClient (ping) → RateLimiter → Services
//!
//! Shutdown (shutdown.rs):
//!     Trigger → broadcast → server drains, background sweeper exits
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → graceful shutdown
//! ```
//!
//! # Design Decisions
//! - One explicit `Services` value replaces process-wide singletons
//! - Startup never fails on an unreachable store; it degrades instead

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::shutdown_signal;
pub use startup::Services;
