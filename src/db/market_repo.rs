use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::errors::EngineError;
use crate::models::{MarketObservation, MarketResolution};

/// Record a price/volume sample. Duplicate (market, timestamp) samples are
/// ignored.
pub async fn insert_observation(
    pool: &PgPool,
    market_id: &str,
    observed_at: DateTime<Utc>,
    prices: &serde_json::Value,
    volume: Decimal,
) -> Result<(), EngineError> {
    sqlx::query(
        r#"
        INSERT INTO market_observations (market_id, observed_at, prices, volume)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (market_id, observed_at) DO NOTHING
        "#,
    )
    .bind(market_id)
    .bind(observed_at)
    .bind(prices)
    .bind(volume)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn load_observations(pool: &PgPool) -> Result<Vec<MarketObservation>, EngineError> {
    let rows = sqlx::query_as::<_, MarketObservation>(
        "SELECT * FROM market_observations ORDER BY market_id, observed_at",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Record a resolution. A market resolves exactly once: an identical repeat
/// is a no-op (`false`), a conflicting repeat is rejected with the original
/// record kept authoritative.
pub async fn insert_resolution(
    pool: &PgPool,
    market_id: &str,
    resolved_at: DateTime<Utc>,
    winning_outcome: &str,
) -> Result<bool, EngineError> {
    let result = sqlx::query(
        r#"
        INSERT INTO market_resolutions (market_id, resolved_at, winning_outcome)
        VALUES ($1, $2, $3)
        ON CONFLICT (market_id) DO NOTHING
        "#,
    )
    .bind(market_id)
    .bind(resolved_at)
    .bind(winning_outcome)
    .execute(pool)
    .await?;

    if result.rows_affected() == 1 {
        return Ok(true);
    }

    let existing = get_resolution(pool, market_id).await?.ok_or_else(|| {
        EngineError::NotFound(format!("resolution for {market_id} vanished mid-insert"))
    })?;

    // Microsecond comparison: TIMESTAMPTZ truncates, inbound events may
    // carry nanoseconds.
    if existing.resolved_at.timestamp_micros() == resolved_at.timestamp_micros()
        && existing.winning_outcome == winning_outcome
    {
        Ok(false)
    } else {
        Err(EngineError::Consistency(format!(
            "market {market_id} already resolved at {} with outcome '{}'",
            existing.resolved_at, existing.winning_outcome
        )))
    }
}

pub async fn get_resolution(
    pool: &PgPool,
    market_id: &str,
) -> Result<Option<MarketResolution>, EngineError> {
    let row = sqlx::query_as::<_, MarketResolution>(
        "SELECT * FROM market_resolutions WHERE market_id = $1",
    )
    .bind(market_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

pub async fn load_resolutions(pool: &PgPool) -> Result<Vec<MarketResolution>, EngineError> {
    let rows = sqlx::query_as::<_, MarketResolution>(
        "SELECT * FROM market_resolutions ORDER BY resolved_at",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
