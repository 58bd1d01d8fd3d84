use sqlx::PgPool;

use crate::errors::EngineError;
use crate::models::{Trade, TradeEvent};

/// Result of folding an inbound trade event into the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeUpsert {
    Inserted,
    /// Identical replay of a trade already on file. No-op.
    Replayed,
}

/// Insert a trade by its natural key. A replay with identical immutable
/// fields is a no-op; a replay with different fields is rejected and the
/// original row stays authoritative.
pub async fn upsert_trade(pool: &PgPool, event: &TradeEvent) -> Result<TradeUpsert, EngineError> {
    let result = sqlx::query(
        r#"
        INSERT INTO trades
            (id, wallet_address, market_id, market_question, market_slug,
             market_category, outcome_name, side, price, usd_value, traded_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(&event.id)
    .bind(&event.wallet_address)
    .bind(&event.market_id)
    .bind(&event.market_question)
    .bind(&event.market_slug)
    .bind(&event.market_category)
    .bind(&event.outcome_name)
    .bind(event.side.to_string())
    .bind(event.price)
    .bind(event.usd_value)
    .bind(event.timestamp)
    .execute(pool)
    .await?;

    if result.rows_affected() == 1 {
        return Ok(TradeUpsert::Inserted);
    }

    let existing = get_trade(pool, &event.id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("trade {} vanished mid-upsert", event.id)))?;

    if existing.same_fact(event) {
        Ok(TradeUpsert::Replayed)
    } else {
        Err(EngineError::Consistency(format!(
            "trade {} replayed with different immutable fields",
            event.id
        )))
    }
}

pub async fn get_trade(pool: &PgPool, id: &str) -> Result<Option<Trade>, EngineError> {
    let trade = sqlx::query_as::<_, Trade>("SELECT * FROM trades WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(trade)
}

/// Fill `won` for every still-unresolved trade of a resolved market.
/// Only NULL rows are touched, so the tri-state transition never reverses.
pub async fn set_outcomes_for_market(
    pool: &PgPool,
    market_id: &str,
    winning_outcome: &str,
) -> Result<u64, EngineError> {
    let result = sqlx::query(
        r#"
        UPDATE trades
        SET won = (outcome_name = $2)
        WHERE market_id = $1 AND won IS NULL
        "#,
    )
    .bind(market_id)
    .bind(winning_outcome)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Full trade history in deterministic order, the input of a detection run.
pub async fn load_all(pool: &PgPool) -> Result<Vec<Trade>, EngineError> {
    let trades = sqlx::query_as::<_, Trade>("SELECT * FROM trades ORDER BY traded_at, id")
        .fetch_all(pool)
        .await?;

    Ok(trades)
}

/// The N most recent trades of a wallet, newest first.
pub async fn get_recent_for_wallet(
    pool: &PgPool,
    address: &str,
    limit: i64,
) -> Result<Vec<Trade>, EngineError> {
    let trades = sqlx::query_as::<_, Trade>(
        "SELECT * FROM trades WHERE wallet_address = $1 ORDER BY traded_at DESC, id DESC LIMIT $2",
    )
    .bind(address)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(trades)
}
