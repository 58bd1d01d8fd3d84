use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row for the insider_wallets table: the per-address rollup.
/// `win_rate` is NULL while no trade of the wallet has resolved.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InsiderWallet {
    pub id: Uuid,
    pub address: String,
    pub first_trade_at: DateTime<Utc>,
    pub last_trade_at: DateTime<Utc>,
    pub total_trades: i32,
    pub total_volume: Decimal,
    pub resolved_trades: i32,
    pub won_trades: i32,
    pub win_rate: Option<Decimal>,
    pub is_tracked: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}
