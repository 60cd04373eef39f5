/*!
 * Transaction helper with bounded retry
 *
 * Every ledger mutation runs inside one database transaction. Lock conflicts
 * reported by the store (SQLite busy, Postgres serialization failure or
 * deadlock) re-run the whole unit of work a bounded number of times; every
 * other error is returned to the caller unchanged.
 */

use crate::config::AppConfig;
use crate::errors::ServiceError;
use metrics::counter;
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Type alias for boxed future used in transactions
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Sleep before attempt `n + 1` is `backoff * n`
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(25),
        }
    }
}

impl From<&AppConfig> for RetryPolicy {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            max_attempts: cfg.tx_retry_attempts.max(1),
            backoff: Duration::from_millis(cfg.tx_retry_backoff_ms),
        }
    }
}

/// Execute a function within a database transaction
///
/// Commits when `f` succeeds and rolls back when it fails. Transient lock
/// conflicts re-run `f` in a fresh transaction, so `f` must not carry state
/// between attempts.
///
/// # Example
///
/// ```rust,ignore
/// let order = with_transaction(&db, &policy, move |txn| {
///     let lines = lines.clone();
///     Box::pin(async move {
///         let order = OrderEntity::insert(header).exec(txn).await?;
///         insert_lines(txn, order.last_insert_id, lines).await?;
///         Ok(order)
///     })
/// })
/// .await?;
/// ```
pub async fn with_transaction<F, T>(
    db: &DatabaseConnection,
    policy: &RetryPolicy,
    f: F,
) -> Result<T, ServiceError>
where
    F: for<'c> Fn(&'c DatabaseTransaction) -> BoxFuture<'c, Result<T, ServiceError>>,
    T: Send,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match run_once(db, &f).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < max_attempts => {
                warn!(
                    attempt,
                    max_attempts,
                    error = %err,
                    "transaction hit a lock conflict, retrying"
                );
                counter!("pos_db.transaction_retries", 1);
                tokio::time::sleep(policy.backoff * attempt).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

async fn run_once<F, T>(db: &DatabaseConnection, f: &F) -> Result<T, ServiceError>
where
    F: for<'c> Fn(&'c DatabaseTransaction) -> BoxFuture<'c, Result<T, ServiceError>>,
{
    let txn = db.begin().await?;

    match f(&txn).await {
        Ok(value) => {
            txn.commit().await?;
            Ok(value)
        }
        Err(err) => {
            debug!(error = %err, "rolling back transaction");
            if let Err(rollback_err) = txn.rollback().await {
                error!(error = %rollback_err, "transaction rollback failed");
            }
            Err(err)
        }
    }
}
