use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::errors::EngineError;

/// One point sample of a market's state.
#[derive(Debug, Clone)]
pub struct Observation {
    pub observed_at: DateTime<Utc>,
    pub prices: HashMap<String, Decimal>,
    pub volume: Decimal,
}

/// A trade as seen from the market's side: enough to rank it and to derive
/// median sizes and traded volume, nothing wallet-specific.
#[derive(Debug, Clone)]
struct TradeMark {
    traded_at: DateTime<Utc>,
    trade_id: String,
    usd_value: Decimal,
}

#[derive(Debug, Default)]
struct MarketHistory {
    /// Sorted by observed_at. Out-of-order arrivals are inserted into place.
    observations: Vec<Observation>,
    /// Sorted by (traded_at, trade_id) so ranks are stable.
    trades: Vec<TradeMark>,
    seen_trade_ids: HashSet<String>,
    resolution: Option<(DateTime<Utc>, String)>,
}

/// Per-market time-indexed history: price/volume observations, the market's
/// own trade log, and the resolution once known. Answers the point-in-time
/// and windowed queries the badge rules need.
#[derive(Debug, Default)]
pub struct MarketStateTracker {
    markets: HashMap<String, MarketHistory>,
}

impl MarketStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_observation(
        &mut self,
        market_id: &str,
        observed_at: DateTime<Utc>,
        prices: HashMap<String, Decimal>,
        volume: Decimal,
    ) {
        let history = self.markets.entry(market_id.to_string()).or_default();
        let obs = Observation {
            observed_at,
            prices,
            volume,
        };
        // Insert after any equal timestamps so same-instant samples keep
        // arrival order.
        let idx = history
            .observations
            .partition_point(|o| o.observed_at <= observed_at);
        history.observations.insert(idx, obs);
    }

    /// Record a trade into the market's own log. Replays of an already-seen
    /// trade id are ignored.
    pub fn record_trade(
        &mut self,
        market_id: &str,
        trade_id: &str,
        traded_at: DateTime<Utc>,
        usd_value: Decimal,
    ) {
        let history = self.markets.entry(market_id.to_string()).or_default();
        if !history.seen_trade_ids.insert(trade_id.to_string()) {
            return;
        }
        let mark = TradeMark {
            traded_at,
            trade_id: trade_id.to_string(),
            usd_value,
        };
        let idx = history
            .trades
            .partition_point(|t| (t.traded_at, t.trade_id.as_str()) <= (traded_at, trade_id));
        history.trades.insert(idx, mark);
    }

    /// A market resolves exactly once: an identical repeat is a no-op, a
    /// conflicting repeat is rejected.
    pub fn record_resolution(
        &mut self,
        market_id: &str,
        resolved_at: DateTime<Utc>,
        winning_outcome: &str,
    ) -> Result<(), EngineError> {
        let history = self.markets.entry(market_id.to_string()).or_default();
        match &history.resolution {
            None => {
                history.resolution = Some((resolved_at, winning_outcome.to_string()));
                Ok(())
            }
            Some((at, outcome)) if *at == resolved_at && outcome == winning_outcome => Ok(()),
            Some((at, outcome)) => Err(EngineError::Consistency(format!(
                "market {market_id} already resolved at {at} with outcome '{outcome}'"
            ))),
        }
    }

    pub fn resolution(&self, market_id: &str) -> Option<(DateTime<Utc>, &str)> {
        self.markets
            .get(market_id)?
            .resolution
            .as_ref()
            .map(|(at, o)| (*at, o.as_str()))
    }

    /// Price of `outcome` from the last observation at or before `at`.
    pub fn price_near(
        &self,
        market_id: &str,
        outcome: &str,
        at: DateTime<Utc>,
    ) -> Result<Decimal, EngineError> {
        let history = self
            .markets
            .get(market_id)
            .ok_or_else(|| EngineError::NotFound(format!("no history for market {market_id}")))?;

        let end = history
            .observations
            .partition_point(|o| o.observed_at <= at);

        history.observations[..end]
            .iter()
            .rev()
            .find_map(|o| o.prices.get(outcome).copied())
            .ok_or_else(|| {
                EngineError::NotFound(format!(
                    "no observation of {market_id}/{outcome} at or before {at}"
                ))
            })
    }

    /// Lazy, restartable sequence of (timestamp, price) samples for one
    /// outcome within [from, to].
    pub fn price_window<'a>(
        &'a self,
        market_id: &str,
        outcome: &'a str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> impl Iterator<Item = (DateTime<Utc>, Decimal)> + 'a {
        let slice = match self.markets.get(market_id) {
            Some(history) => {
                let start = history.observations.partition_point(|o| o.observed_at < from);
                let end = history.observations.partition_point(|o| o.observed_at <= to);
                &history.observations[start..end]
            }
            None => &[],
        };
        slice
            .iter()
            .filter_map(move |o| o.prices.get(outcome).map(|p| (o.observed_at, *p)))
    }

    /// Median usd size of the market's trades at or before `at`, excluding
    /// `exclude_id` (the trade under evaluation). None when no other trade
    /// has been observed yet.
    pub fn median_trade_size_before(
        &self,
        market_id: &str,
        at: DateTime<Utc>,
        exclude_id: &str,
    ) -> Option<Decimal> {
        let history = self.markets.get(market_id)?;
        let mut sizes: Vec<Decimal> = history
            .trades
            .iter()
            .take_while(|t| t.traded_at <= at)
            .filter(|t| t.trade_id != exclude_id)
            .map(|t| t.usd_value)
            .collect();
        if sizes.is_empty() {
            return None;
        }
        sizes.sort();
        let mid = sizes.len() / 2;
        if sizes.len() % 2 == 1 {
            Some(sizes[mid])
        } else {
            Some((sizes[mid - 1] + sizes[mid]) / Decimal::from(2))
        }
    }

    /// Zero-based position of a trade in the market's time-ordered log.
    pub fn trade_rank(&self, market_id: &str, trade_id: &str) -> Option<usize> {
        self.markets
            .get(market_id)?
            .trades
            .iter()
            .position(|t| t.trade_id == trade_id)
    }

    /// Cumulative traded usd volume at or before `at`.
    pub fn volume_traded_before(&self, market_id: &str, at: DateTime<Utc>) -> Decimal {
        match self.markets.get(market_id) {
            Some(history) => history
                .trades
                .iter()
                .take_while(|t| t.traded_at <= at)
                .map(|t| t.usd_value)
                .sum(),
            None => Decimal::ZERO,
        }
    }

    /// Cumulative traded usd volume up to the market's resolution time, or
    /// over the whole log when the market is still open.
    pub fn volume_at_resolution(&self, market_id: &str) -> Decimal {
        match self.resolution(market_id) {
            Some((at, _)) => self.volume_traded_before(market_id, at),
            None => match self.markets.get(market_id) {
                Some(history) => history.trades.iter().map(|t| t.usd_value).sum(),
                None => Decimal::ZERO,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
