//! Bounded retry for transient PostgreSQL write conflicts.
//!
//! The campaign ledger serializes writers on the campaign row lock, so the
//! only conflicts it can hit are serialization aborts (SQLSTATE 40001) and
//! deadlock detection (40P01). Contention windows are short, so retries are
//! immediate, capped at [`MAX_ATTEMPTS`].

use std::future::Future;

/// Maximum attempts for a conflicting ledger write before surfacing the error.
pub const MAX_ATTEMPTS: u32 = 3;

/// SQLSTATE codes that indicate a retryable conflict.
const RETRYABLE_SQLSTATES: [&str; 2] = ["40001", "40P01"];

/// Whether an error is a transient conflict worth retrying.
pub fn is_retryable_conflict(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err
            .code()
            .map(|code| RETRYABLE_SQLSTATES.contains(&code.as_ref()))
            .unwrap_or(false),
        _ => false,
    }
}

/// Run `op`, retrying immediately on serialization/deadlock aborts.
///
/// Non-conflict errors and the final failed attempt propagate unchanged.
pub async fn with_conflict_retry<T, F, Fut>(op: F) -> Result<T, sqlx::Error>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, sqlx::Error>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if is_retryable_conflict(&err) && attempt < MAX_ATTEMPTS => {
                tracing::warn!(attempt, error = %err, "Retrying conflicting ledger write");
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn non_database_errors_are_not_retryable() {
        assert!(!is_retryable_conflict(&sqlx::Error::RowNotFound));
        assert!(!is_retryable_conflict(&sqlx::Error::PoolClosed));
    }

    #[tokio::test]
    async fn succeeds_first_try_without_retry() {
        let calls = AtomicU32::new(0);
        let result = with_conflict_retry(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, sqlx::Error>(7) }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_conflict_error_propagates_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_conflict_retry(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(sqlx::Error::RowNotFound) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
