use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{Side, TradeEvent};

/// Database row for the trades table. `id` is the exchange trade id and the
/// natural key; `won` stays NULL until the market resolves.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Trade {
    pub id: String,
    pub wallet_address: String,
    pub market_id: String,
    pub market_question: String,
    pub market_slug: String,
    pub market_category: String,
    pub outcome_name: String,
    pub side: String,
    pub price: Decimal,
    pub usd_value: Decimal,
    pub traded_at: DateTime<Utc>,
    pub won: Option<bool>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Trade {
    pub fn side(&self) -> Side {
        Side::from_api_str(&self.side).unwrap_or(Side::Buy)
    }

    /// Whether two records describe the same immutable fact. `won` and
    /// `created_at` are excluded: those are filled server-side. Timestamps
    /// compare at microsecond precision, the resolution TIMESTAMPTZ stores,
    /// so a nanosecond-precision replay of a stored trade still matches.
    pub fn same_fact(&self, event: &TradeEvent) -> bool {
        self.wallet_address == event.wallet_address
            && self.market_id == event.market_id
            && self.outcome_name == event.outcome_name
            && self.side == event.side.to_string()
            && self.price == event.price
            && self.usd_value == event.usd_value
            && self.traded_at.timestamp_micros() == event.timestamp.timestamp_micros()
    }
}

impl From<&TradeEvent> for Trade {
    fn from(e: &TradeEvent) -> Self {
        Trade {
            id: e.id.clone(),
            wallet_address: e.wallet_address.clone(),
            market_id: e.market_id.clone(),
            market_question: e.market_question.clone(),
            market_slug: e.market_slug.clone(),
            market_category: e.market_category.clone(),
            outcome_name: e.outcome_name.clone(),
            side: e.side.to_string(),
            price: e.price,
            usd_value: e.usd_value,
            traded_at: e.timestamp,
            won: None,
            created_at: None,
        }
    }
}
