pub mod badge;
pub mod market;
pub mod trade;
pub mod wallet;

pub use badge::{BadgeType, InsiderBadge};
pub use market::{MarketObservation, MarketResolution};
pub use trade::Trade;
pub use wallet::InsiderWallet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Side
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn from_api_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "BUY" | "0" => Some(Side::Buy),
            "SELL" | "1" => Some(Side::Sell),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

// ---------------------------------------------------------------------------
// Inbound events (market-data collector → engine)
// ---------------------------------------------------------------------------

/// One trade as reported by the external collector. Immutable fact; the
/// engine only ever fills the resolution outcome afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeEvent {
    pub id: String,
    pub wallet_address: String,
    pub market_id: String,
    #[serde(default)]
    pub market_question: String,
    #[serde(default)]
    pub market_slug: String,
    #[serde(default)]
    pub market_category: String,
    pub outcome_name: String,
    pub side: Side,
    pub price: Decimal,
    pub usd_value: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for TradeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Trade: id={} wallet={} market={} side={} price={} usd={}",
            self.id,
            &self.wallet_address[..8.min(self.wallet_address.len())],
            &self.market_id[..8.min(self.market_id.len())],
            self.side,
            self.price,
            self.usd_value,
        )
    }
}

/// A market resolving to its winning outcome. Fired at most once per market.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionEvent {
    pub market_id: String,
    pub resolved_at: DateTime<Utc>,
    pub winning_outcome_name: String,
}

/// A point sample of a market's per-outcome prices and cumulative volume.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationEvent {
    pub market_id: String,
    pub timestamp: DateTime<Utc>,
    pub prices: HashMap<String, Decimal>,
    pub volume: Decimal,
}
