//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to the external store:
//!     → circuit_breaker.rs (fail fast while the store is assumed down)
//!     → timeouts.rs (every store call has a deadline)
//!     → outcome recorded back into the breaker's rolling window
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - A timed-out or cancelled call counts as a failure
//! - No retries on the request path; callers degrade instead

pub mod circuit_breaker;
pub mod timeouts;
