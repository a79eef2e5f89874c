//! Connection pool setup and SQLite retry helpers.

use std::{future::Future, str::FromStr as _, time::Duration};

use anyhow::Context as _;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::debug;

use crate::error::ModerationError;

/// The main database pool.
pub type Db = SqlitePool;

/// Extended SQLite result codes that indicate lock contention: `SQLITE_BUSY`,
/// `SQLITE_LOCKED`, `SQLITE_BUSY_RECOVERY`, `SQLITE_LOCKED_SHAREDCACHE`,
/// `SQLITE_BUSY_SNAPSHOT` and `SQLITE_BUSY_TIMEOUT`.
const RETRY_CODES: &[&str] = &["5", "6", "261", "262", "517", "773"];

/// Total time budget for retries, in milliseconds.
const RETRY_TIMEOUT_MS: u64 = 5000;

/// Open (creating if needed) the SQLite database at `url`.
pub async fn establish_pool(url: &str) -> anyhow::Result<Db> {
    let options = SqliteConnectOptions::from_str(url)
        .with_context(|| format!("failed to parse database url {url:?}"))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await
        .context("failed to connect to database")
}

/// Apply the embedded migrations.
pub async fn migrate(db: &Db) -> anyhow::Result<()> {
    sqlx::migrate!()
        .run(db)
        .await
        .context("failed to apply migrations")
}

/// Whether the error is SQLite lock contention rather than a real failure.
pub(crate) fn is_busy(err: &ModerationError) -> bool {
    match err {
        ModerationError::Database(sqlx::Error::Database(db_err)) => db_err
            .code()
            .is_some_and(|code| RETRY_CODES.iter().any(|c| *c == &*code)),
        _ => false,
    }
}

/// Whether the error is a unique constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

/// Run a whole unit of work, re-running it from the start while SQLite reports lock
/// contention. Domain errors are returned on the first attempt.
pub(crate) async fn retry_busy<F, Fut, T>(operation: F) -> Result<T, ModerationError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, ModerationError>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Err(err) if is_busy(&err) => match wait_ms(attempt, RETRY_TIMEOUT_MS) {
                Some(wait) => {
                    debug!(attempt, wait, "database busy, retrying");
                    tokio::time::sleep(Duration::from_millis(wait)).await;
                    attempt += 1;
                }
                None => return Err(err),
            },
            result => return result,
        }
    }
}

/// Backoff schedule mirroring SQLite's own busy handler.
fn wait_ms(attempt: usize, timeout: u64) -> Option<u64> {
    const DELAYS: [u64; 12] = [1, 2, 5, 10, 15, 20, 25, 25, 25, 50, 50, 100];
    const TOTALS: [u64; 12] = [0, 1, 3, 8, 18, 33, 53, 78, 103, 128, 178, 228];

    let (delay, prior) = if attempt >= DELAYS.len() {
        let delay = DELAYS[DELAYS.len() - 1];
        let extra = (attempt - (DELAYS.len() - 1)) as u64;
        (delay, TOTALS[TOTALS.len() - 1] + delay * extra)
    } else {
        (DELAYS[attempt], TOTALS[attempt])
    };

    (prior + delay <= timeout).then_some(delay)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_gives_up_after_timeout() {
        assert_eq!(wait_ms(0, 5000), Some(1));
        assert_eq!(wait_ms(11, 5000), Some(100));
        assert_eq!(wait_ms(40, 5000), Some(100));
        assert_eq!(wait_ms(100, 5000), None);
        assert_eq!(wait_ms(3, 5), None);
    }

    #[test]
    fn domain_errors_are_not_retried() {
        assert!(!is_busy(&ModerationError::NotFound("user")));
        assert!(!is_busy(&ModerationError::Database(sqlx::Error::RowNotFound)));
    }
}
