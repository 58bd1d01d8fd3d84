use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::models::Trade;

/// In-memory rollup for one wallet. `win_rate` is None until at least one
/// of the wallet's trades has resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct WalletRollup {
    pub address: String,
    pub first_trade_at: DateTime<Utc>,
    pub last_trade_at: DateTime<Utc>,
    pub total_trades: i32,
    pub total_volume: Decimal,
    pub resolved_trades: i32,
    pub won_trades: i32,
    pub win_rate: Option<Decimal>,
}

#[derive(Debug, Default)]
struct WalletState {
    rollup: Option<WalletRollup>,
    applied_trades: HashSet<String>,
    applied_resolutions: HashSet<String>,
}

/// Incrementally folds trades and resolutions into per-wallet rollups.
/// Both operations are idempotent keyed by trade id, so replayed and
/// backfilled input cannot double-count.
#[derive(Debug, Default)]
pub struct WalletAggregator {
    wallets: HashMap<String, WalletState>,
}

impl WalletAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply_trade(&mut self, trade: &Trade) {
        let state = self
            .wallets
            .entry(trade.wallet_address.clone())
            .or_default();
        if !state.applied_trades.insert(trade.id.clone()) {
            return;
        }

        match &mut state.rollup {
            None => {
                state.rollup = Some(WalletRollup {
                    address: trade.wallet_address.clone(),
                    first_trade_at: trade.traded_at,
                    last_trade_at: trade.traded_at,
                    total_trades: 1,
                    total_volume: trade.usd_value,
                    resolved_trades: 0,
                    won_trades: 0,
                    win_rate: None,
                });
            }
            Some(rollup) => {
                // min/max, not latest-wins: backfill delivers out of order.
                rollup.first_trade_at = rollup.first_trade_at.min(trade.traded_at);
                rollup.last_trade_at = rollup.last_trade_at.max(trade.traded_at);
                rollup.total_trades += 1;
                rollup.total_volume += trade.usd_value;
            }
        }
    }

    /// Fold the resolution outcome of one of the wallet's trades. The trade
    /// itself must already have been applied.
    pub fn apply_resolution(&mut self, address: &str, trade_id: &str, won: bool) {
        let Some(state) = self.wallets.get_mut(address) else {
            return;
        };
        if !state.applied_trades.contains(trade_id) {
            return;
        }
        if !state.applied_resolutions.insert(trade_id.to_string()) {
            return;
        }
        if let Some(rollup) = &mut state.rollup {
            rollup.resolved_trades += 1;
            if won {
                rollup.won_trades += 1;
            }
            rollup.win_rate =
                Some(Decimal::from(rollup.won_trades) / Decimal::from(rollup.resolved_trades));
        }
    }

    pub fn rollup(&self, address: &str) -> Option<&WalletRollup> {
        self.wallets.get(address)?.rollup.as_ref()
    }

    pub fn rollups(&self) -> impl Iterator<Item = &WalletRollup> {
        self.wallets.values().filter_map(|s| s.rollup.as_ref())
    }

    pub fn len(&self) -> usize {
        self.wallets.values().filter(|s| s.rollup.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
