use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::api::query::{total_pages, AppliedFilters, WalletQueryParams};
use crate::db::{badge_repo, trade_repo, wallet_repo};
use crate::errors::AppError;
use crate::models::{InsiderBadge, InsiderWallet, Trade};
use crate::AppState;

const RECENT_TRADES_PER_WALLET: i64 = 5;

#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeView {
    #[serde(rename = "type")]
    pub badge_type: String,
    pub reason: String,
    pub earned_at: DateTime<Utc>,
    pub trade_id: String,
}

impl From<InsiderBadge> for BadgeView {
    fn from(b: InsiderBadge) -> Self {
        BadgeView {
            badge_type: b.badge_type,
            reason: b.reason,
            earned_at: b.earned_at,
            trade_id: b.trade_id,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeView {
    pub id: String,
    pub market_id: String,
    pub market_question: String,
    pub market_slug: String,
    pub market_category: String,
    pub outcome_name: String,
    pub side: String,
    pub price: Decimal,
    pub usd_value: Decimal,
    pub timestamp: DateTime<Utc>,
    pub won: Option<bool>,
}

impl From<Trade> for TradeView {
    fn from(t: Trade) -> Self {
        TradeView {
            id: t.id,
            market_id: t.market_id,
            market_question: t.market_question,
            market_slug: t.market_slug,
            market_category: t.market_category,
            outcome_name: t.outcome_name,
            side: t.side,
            price: t.price,
            usd_value: t.usd_value,
            timestamp: t.traded_at,
            won: t.won,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSummary {
    pub id: Uuid,
    pub address: String,
    pub first_trade_at: DateTime<Utc>,
    pub last_trade_at: DateTime<Utc>,
    pub total_trades: i32,
    pub total_volume: Decimal,
    pub resolved_trades: i32,
    pub won_trades: i32,
    pub win_rate: Option<Decimal>,
    pub badges: Vec<BadgeView>,
    pub recent_trades: Vec<TradeView>,
}

#[derive(Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListMeta {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
    pub filters: AppliedFilters,
}

#[derive(Serialize)]
pub struct ListResponse {
    pub success: bool,
    pub data: Vec<WalletSummary>,
    pub meta: ListMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn summarize(state: &AppState, wallet: InsiderWallet) -> Result<WalletSummary, AppError> {
    let badges = badge_repo::get_for_wallet(&state.db, &wallet.address).await?;
    let recent = trade_repo::get_recent_for_wallet(
        &state.db,
        &wallet.address,
        RECENT_TRADES_PER_WALLET,
    )
    .await?;

    Ok(WalletSummary {
        id: wallet.id,
        address: wallet.address,
        first_trade_at: wallet.first_trade_at,
        last_trade_at: wallet.last_trade_at,
        total_trades: wallet.total_trades,
        total_volume: wallet.total_volume,
        resolved_trades: wallet.resolved_trades,
        won_trades: wallet.won_trades,
        win_rate: wallet.win_rate,
        badges: badges.into_iter().map(BadgeView::from).collect(),
        recent_trades: recent.into_iter().map(TradeView::from).collect(),
    })
}

/// GET /api/wallets — filtered, sorted, paginated listing of tracked
/// wallets. No match is an empty page, not an error; an internal failure
/// is a structured error with zeroed meta, never partial data.
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<WalletQueryParams>,
) -> Json<ListResponse> {
    let parsed = params.resolve(&state.config, Utc::now());

    let result: Result<ListResponse, AppError> = async {
        let (wallets, total) = wallet_repo::search(&state.db, &parsed.filter).await?;

        let mut data = Vec::with_capacity(wallets.len());
        for wallet in wallets {
            data.push(summarize(&state, wallet).await?);
        }

        Ok(ListResponse {
            success: true,
            data,
            meta: ListMeta {
                total,
                page: parsed.page,
                limit: parsed.limit,
                total_pages: total_pages(total, parsed.limit),
                filters: parsed.applied.clone(),
            },
            error: None,
        })
    }
    .await;

    match result {
        Ok(response) => Json(response),
        Err(e) => {
            tracing::error!(error = %e, "Wallet listing failed");
            Json(ListResponse {
                success: false,
                data: Vec::new(),
                meta: ListMeta::default(),
                error: Some("wallet listing failed".into()),
            })
        }
    }
}

/// GET /api/wallets/{address} — single-wallet detail.
pub async fn detail(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<ApiResponse<WalletSummary>>, AppError> {
    let wallet = wallet_repo::get_by_address(&state.db, &address)
        .await?
        .filter(|w| w.is_tracked)
        .ok_or_else(|| AppError::NotFound(format!("wallet {address} not found")))?;

    let summary = summarize(&state, wallet).await?;

    Ok(Json(ApiResponse {
        success: true,
        data: Some(summary),
        error: None,
    }))
}
