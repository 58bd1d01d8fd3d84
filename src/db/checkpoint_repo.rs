use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::errors::EngineError;

/// Watermarks of the last committed run for one shard: the newest trade
/// folded in, and the newest resolution of any market the shard's wallets
/// had traded. Both must be current for the shard to be skippable.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub last_trade_at: DateTime<Utc>,
    pub last_trade_id: String,
    pub last_resolved_at: Option<DateTime<Utc>>,
}

pub async fn load_all(pool: &PgPool) -> Result<HashMap<i32, Checkpoint>, EngineError> {
    let rows: Vec<(i32, DateTime<Utc>, String, Option<DateTime<Utc>>)> = sqlx::query_as(
        "SELECT shard, last_trade_at, last_trade_id, last_resolved_at FROM engine_checkpoints",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(shard, last_trade_at, last_trade_id, last_resolved_at)| {
            (
                shard,
                Checkpoint {
                    last_trade_at,
                    last_trade_id,
                    last_resolved_at,
                },
            )
        })
        .collect())
}

pub async fn upsert(
    pool: &PgPool,
    shard: i32,
    checkpoint: &Checkpoint,
) -> Result<(), EngineError> {
    sqlx::query(
        r#"
        INSERT INTO engine_checkpoints (shard, last_trade_at, last_trade_id, last_resolved_at)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (shard) DO UPDATE SET
            last_trade_at = EXCLUDED.last_trade_at,
            last_trade_id = EXCLUDED.last_trade_id,
            last_resolved_at = EXCLUDED.last_resolved_at,
            updated_at = NOW()
        "#,
    )
    .bind(shard)
    .bind(checkpoint.last_trade_at)
    .bind(&checkpoint.last_trade_id)
    .bind(checkpoint.last_resolved_at)
    .execute(pool)
    .await?;

    Ok(())
}
