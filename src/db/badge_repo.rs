use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::errors::EngineError;
use crate::models::{BadgeType, InsiderBadge};

/// A badge the evaluator wants to award. Insertion is idempotent on
/// (wallet_address, badge_type, trade_id).
#[derive(Debug, Clone, PartialEq)]
pub struct NewBadge {
    pub wallet_address: String,
    pub badge_type: BadgeType,
    pub reason: String,
    pub trade_id: String,
    pub earned_at: DateTime<Utc>,
}

/// Insert badges, skipping any already on file. Returns how many were
/// actually new.
pub async fn insert_badges(
    conn: &mut sqlx::PgConnection,
    badges: &[NewBadge],
) -> Result<usize, EngineError> {
    let mut inserted = 0;
    for badge in badges {
        let result = sqlx::query(
            r#"
            INSERT INTO insider_badges (wallet_address, badge_type, reason, trade_id, earned_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (wallet_address, badge_type, trade_id) DO NOTHING
            "#,
        )
        .bind(&badge.wallet_address)
        .bind(badge.badge_type.as_str())
        .bind(&badge.reason)
        .bind(&badge.trade_id)
        .bind(badge.earned_at)
        .execute(&mut *conn)
        .await?;

        inserted += result.rows_affected() as usize;
    }

    Ok(inserted)
}

/// A wallet's badges, newest first.
pub async fn get_for_wallet(
    pool: &PgPool,
    address: &str,
) -> Result<Vec<InsiderBadge>, EngineError> {
    let badges = sqlx::query_as::<_, InsiderBadge>(
        "SELECT * FROM insider_badges WHERE wallet_address = $1 ORDER BY earned_at DESC, id",
    )
    .bind(address)
    .fetch_all(pool)
    .await?;

    Ok(badges)
}
