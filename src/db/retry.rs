//! Transaction execution with serialization-conflict retry.
//!
//! CockroachDB's serializable isolation aborts conflicting transactions
//! with SQLSTATE 40001 and expects the client to restart the whole unit
//! of work. `exec_in_tx` does that restart with bounded attempts and
//! jittered exponential backoff. On every other backend the same entry
//! point runs a single attempt: commit on success, roll back and
//! propagate on any failure.
//!
//! The unit of work must be idempotent or safely repeatable; a restarted
//! attempt re-runs it from scratch on a fresh transaction. Partial work
//! from an aborted attempt is never committed.

use crate::db::pool::Database;
use crate::db::Conn;
use crate::error::DbResult;
use futures_util::future::BoxFuture;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Bounds for the conflict retry loop.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Exhausting them surfaces the
    /// last conflict error.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles each retry.
    pub base_delay: Duration,
    /// Ceiling for the exponential delay, before jitter.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt `n + 1`, given `n` completed attempts.
    fn backoff(&self, completed: u32) -> Duration {
        let shift = completed.saturating_sub(1).min(20);
        let exp = self
            .base_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay);
        let jitter = rand::thread_rng().gen_range(0..=exp.as_millis().max(1) as u64 / 2);
        exp + Duration::from_millis(jitter)
    }
}

/// Drive `attempt` until it succeeds, fails with a non-conflict error, or
/// exhausts the policy. Conflict errors only restart when `retries` is
/// set; otherwise the first failure is terminal.
pub(crate) async fn run_with_retry<F, Fut>(
    policy: &RetryPolicy,
    retries: bool,
    mut attempt: F,
) -> DbResult<()>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = DbResult<()>>,
{
    let mut n = 1u32;
    loop {
        match attempt(n).await {
            Ok(()) => return Ok(()),
            Err(e) if retries && e.is_serialization_conflict() && n < policy.max_attempts => {
                let delay = policy.backoff(n);
                warn!(
                    attempt = n,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Serialization conflict, restarting transaction"
                );
                tokio::time::sleep(delay).await;
                n += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

impl Database {
    /// Run a unit of work inside a transaction.
    ///
    /// Each attempt opens a fresh transaction, runs `work` against it, and
    /// commits on success. On a CockroachDB serialization conflict the
    /// attempt is rolled back and the whole unit of work restarts per the
    /// retry policy. Non-conflict errors roll back and propagate
    /// immediately, as does any error on a backend without conflict
    /// retries.
    pub async fn exec_in_tx<F>(&self, work: F) -> DbResult<()>
    where
        F: for<'c> Fn(&'c mut Conn) -> BoxFuture<'c, DbResult<()>>,
    {
        let retries = self.backend().retries_on_conflict();
        let policy = self.retry_policy().clone();
        let work = &work;
        run_with_retry(&policy, retries, |attempt| async move {
            if attempt > 1 {
                debug!(attempt, "Transaction attempt");
            }
            let mut conn = self.conn();
            conn.begin().await?;
            match work(&mut conn).await {
                Ok(()) => conn.commit().await,
                Err(e) => {
                    // The rollback outcome is irrelevant next to the
                    // original failure; the driver cleans up regardless.
                    let _ = conn.rollback().await;
                    Err(e)
                }
            }
        })
        .await
    }
}
