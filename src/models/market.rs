use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Database row for the market_observations table. `prices` is a JSONB map
/// of outcome name → implied probability.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MarketObservation {
    pub market_id: String,
    pub observed_at: DateTime<Utc>,
    pub prices: serde_json::Value,
    pub volume: Decimal,
}

/// Database row for the market_resolutions table. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MarketResolution {
    pub market_id: String,
    pub resolved_at: DateTime<Utc>,
    pub winning_outcome: String,
    pub created_at: Option<DateTime<Utc>>,
}
