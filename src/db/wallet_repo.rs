use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::errors::EngineError;
use crate::intelligence::WalletRollup;
use crate::models::InsiderWallet;

use super::badge_repo::{self, NewBadge};

// ---------------------------------------------------------------------------
// Upserts
// ---------------------------------------------------------------------------

/// Insert or update a wallet rollup by address.
pub async fn upsert_rollup(
    conn: &mut sqlx::PgConnection,
    rollup: &WalletRollup,
) -> Result<InsiderWallet, EngineError> {
    let wallet = sqlx::query_as::<_, InsiderWallet>(
        r#"
        INSERT INTO insider_wallets
            (address, first_trade_at, last_trade_at, total_trades,
             total_volume, resolved_trades, won_trades, win_rate)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (address) DO UPDATE SET
            first_trade_at = EXCLUDED.first_trade_at,
            last_trade_at = EXCLUDED.last_trade_at,
            total_trades = EXCLUDED.total_trades,
            total_volume = EXCLUDED.total_volume,
            resolved_trades = EXCLUDED.resolved_trades,
            won_trades = EXCLUDED.won_trades,
            win_rate = EXCLUDED.win_rate,
            updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(&rollup.address)
    .bind(rollup.first_trade_at)
    .bind(rollup.last_trade_at)
    .bind(rollup.total_trades)
    .bind(rollup.total_volume)
    .bind(rollup.resolved_trades)
    .bind(rollup.won_trades)
    .bind(rollup.win_rate)
    .fetch_one(&mut *conn)
    .await?;

    Ok(wallet)
}

/// Persist one wallet's detection output atomically: the rollup upsert and
/// any new badges commit or roll back together, so a crash mid-run never
/// leaves badges inconsistent with the rollup. Returns the number of badges
/// actually new.
pub async fn commit_wallet(
    pool: &PgPool,
    rollup: &WalletRollup,
    badges: &[NewBadge],
) -> Result<usize, EngineError> {
    let mut tx = pool.begin().await?;

    upsert_rollup(&mut tx, rollup).await?;
    let new_badges = badge_repo::insert_badges(&mut tx, badges).await?;

    tx.commit().await?;
    Ok(new_badges)
}

// ---------------------------------------------------------------------------
// Read paths
// ---------------------------------------------------------------------------

pub async fn get_by_address(
    pool: &PgPool,
    address: &str,
) -> Result<Option<InsiderWallet>, EngineError> {
    let wallet =
        sqlx::query_as::<_, InsiderWallet>("SELECT * FROM insider_wallets WHERE address = $1")
            .bind(address)
            .fetch_optional(pool)
            .await?;

    Ok(wallet)
}

pub async fn count_tracked(pool: &PgPool) -> Result<i64, EngineError> {
    let row: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM insider_wallets WHERE is_tracked = TRUE")
            .fetch_one(pool)
            .await?;

    Ok(row.0)
}

// ---------------------------------------------------------------------------
// Filtered search
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    FirstTradeAt,
    TotalVolume,
    TotalTrades,
    WinRate,
}

impl SortField {
    fn column(&self) -> &'static str {
        match self {
            SortField::FirstTradeAt => "w.first_trade_at",
            SortField::TotalVolume => "w.total_volume",
            SortField::TotalTrades => "w.total_trades",
            SortField::WinRate => "w.win_rate",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Fully-parsed, already-clamped filter set for the wallet listing.
#[derive(Debug, Clone)]
pub struct WalletFilter {
    /// Wallets whose first trade falls after this instant.
    pub first_trade_after: Option<DateTime<Utc>>,
    /// Badge type names (store form); wallet must hold at least one.
    pub badge_types: Vec<String>,
    /// Lowercased categories; wallet must have traded in at least one.
    pub categories: Vec<String>,
    pub min_volume: Option<Decimal>,
    pub max_volume: Option<Decimal>,
    pub sort: SortField,
    pub order: SortOrder,
    pub limit: i64,
    pub offset: i64,
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &WalletFilter) {
    qb.push(" WHERE w.is_tracked = TRUE");

    if let Some(after) = filter.first_trade_after {
        qb.push(" AND w.first_trade_at >= ").push_bind(after);
    }
    if !filter.badge_types.is_empty() {
        qb.push(
            " AND EXISTS (SELECT 1 FROM insider_badges b \
             WHERE b.wallet_address = w.address AND b.badge_type = ANY(",
        )
        .push_bind(filter.badge_types.clone())
        .push("))");
    }
    if !filter.categories.is_empty() {
        qb.push(
            " AND EXISTS (SELECT 1 FROM trades t \
             WHERE t.wallet_address = w.address AND LOWER(t.market_category) = ANY(",
        )
        .push_bind(filter.categories.clone())
        .push("))");
    }
    if let Some(min) = filter.min_volume {
        qb.push(" AND w.total_volume >= ").push_bind(min);
    }
    if let Some(max) = filter.max_volume {
        qb.push(" AND w.total_volume <= ").push_bind(max);
    }
}

/// One page of tracked wallets matching the filters, plus the total match
/// count independent of pagination.
pub async fn search(
    pool: &PgPool,
    filter: &WalletFilter,
) -> Result<(Vec<InsiderWallet>, i64), EngineError> {
    let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM insider_wallets w");
    push_filters(&mut count_qb, filter);
    let total: i64 = count_qb.build_query_scalar().fetch_one(pool).await?;

    let mut qb = QueryBuilder::new("SELECT w.* FROM insider_wallets w");
    push_filters(&mut qb, filter);
    qb.push(" ORDER BY ")
        .push(filter.sort.column())
        .push(" ")
        .push(filter.order.keyword())
        // Stable tie-break so pages never overlap or skip rows.
        .push(" NULLS LAST, w.id ASC");
    qb.push(" LIMIT ").push_bind(filter.limit);
    qb.push(" OFFSET ").push_bind(filter.offset);

    let wallets = qb
        .build_query_as::<InsiderWallet>()
        .fetch_all(pool)
        .await?;

    Ok((wallets, total))
}
