pub mod badge_repo;
pub mod checkpoint_repo;
pub mod market_repo;
pub mod trade_repo;
pub mod wallet_repo;

use std::future::Future;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::errors::EngineError;

pub async fn init_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    // Verify connectivity
    sqlx::query("SELECT 1").execute(&pool).await?;

    Ok(pool)
}

impl From<sqlx::Error> for EngineError {
    fn from(e: sqlx::Error) -> Self {
        EngineError::TransientStorage(e)
    }
}

const RETRY_ATTEMPTS: u32 = 3;
const RETRY_BASE_MS: u64 = 200;

/// Retry a store operation on transient failures with exponential backoff.
/// Every write behind this helper is idempotent, so a retry after an
/// ambiguous failure is safe.
pub async fn with_retry<T, F, Fut>(op_name: &str, mut op: F) -> Result<T, EngineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, EngineError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(EngineError::TransientStorage(e)) if attempt + 1 < RETRY_ATTEMPTS => {
                attempt += 1;
                let delay = Duration::from_millis(RETRY_BASE_MS * (1 << attempt));
                tracing::warn!(
                    op = op_name,
                    attempt,
                    error = %e,
                    "Transient storage error, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
