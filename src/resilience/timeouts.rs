//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap store calls with a deadline
//! - Cancel operations cleanly on timeout
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities; the inner future is dropped on expiry
//! - Timeout errors are distinct from other store errors

use std::future::Future;
use std::time::Duration;
use tokio::time;

use crate::store::{StoreError, StoreResult};

/// Run a store call, failing with [`StoreError::Timeout`] once `deadline` elapses.
pub async fn with_deadline<T, F>(deadline: Duration, call: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    match time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(deadline)),
    }
}
