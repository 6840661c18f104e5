//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → identity.rs (API key or client IP)
//!     → access_lists.rs (blacklist → 403, whitelist → pass)
//!     → rate_limit.rs (sliding window per endpoint and identifier)
//!     → abuse.rs (side-channel pattern detection)
//!     → Pass to application
//! ```
//!
//! # Design Decisions
//! - Only genuine exhaustion or blacklisting is visible to clients
//! - Fail open: a broken store never blocks traffic
//! - No trust in client input beyond choosing a counting bucket

pub mod abuse;
pub mod access_lists;
pub mod identity;
pub mod rate_limit;

pub use abuse::{AbusePattern, AbuseTracker};
pub use access_lists::{AccessListStatus, AccessLists};
pub use identity::{ClientIdentity, SubjectKind};
pub use rate_limit::{rate_limit_middleware, Admission, RateLimiter, WindowStatus};
