//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (request ID, trace, timeout, metrics)
//!     → security::rate_limit (403 / 429 / pass)
//!     → application routes (echo.rs in the bundled binary)
//!     → Send to client
//! ```

pub mod echo;
pub mod server;

pub use echo::echo_router;
pub use server::HttpServer;
