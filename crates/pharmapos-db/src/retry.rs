//! # Conflict Retry
//!
//! Opt-in retry for operations that lost an optimistic-concurrency race.
//! The services never retry on their own; a caller that wants it wraps the
//! whole operation, so every attempt starts a fresh unit of work.
//!
//! ```rust,ignore
//! let ledger = db.stock_ledger();
//! let movement = retry_on_conflict(&RetryPolicy::default(), || {
//!     ledger.dispatch(MovementRequest::new(&product_id, 1))
//! })
//! .await?;
//! ```

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::DbResult;

/// How hard to retry a conflicting operation.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    /// Total attempts, including the first one.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            initial_interval: Duration::from_millis(10),
            max_interval: Duration::from_millis(500),
            max_attempts: 8,
        }
    }
}

impl RetryPolicy {
    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_interval,
            max_interval: self.max_interval,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

/// Runs `op`, re-running it while it fails with `ConcurrencyConflict`.
///
/// Any other error, or the last conflict once attempts run out, is returned
/// unchanged.
pub async fn retry_on_conflict<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> DbResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DbResult<T>>,
{
    let mut backoff = policy.create_backoff();
    let mut attempt = 1;

    loop {
        match op().await {
            Err(err) if err.is_conflict() && attempt < policy.max_attempts => {
                let Some(delay) = backoff.next_backoff() else {
                    return Err(err);
                };
                warn!(attempt, ?delay, error = %err, "Concurrency conflict, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            result => {
                if attempt > 1 {
                    debug!(attempt, ok = result.is_ok(), "Retried operation finished");
                }
                return result;
            }
        }
    }
}
