use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use crate::config::BadgeThresholds;
use crate::models::{BadgeType, Side, Trade};

use super::aggregator::WalletRollup;
use super::baseline::CategoryBaselines;
use super::market_state::MarketStateTracker;

/// When a rule runs relative to the trade's lifecycle.
///
/// Trade-phase rules see only the trade and market history; resolution-phase
/// rules need the resolution outcome (or resolution-time volume) and run
/// once the trade's market has resolved, on the stored trade with `won`
/// filled. Each (trade, rule) pair is evaluated exactly once per phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RulePhase {
    Trade,
    Resolution,
}

impl BadgeType {
    pub fn phase(&self) -> RulePhase {
        match self {
            BadgeType::BigBet | BadgeType::PreMove => RulePhase::Trade,
            BadgeType::HighWinRate
            | BadgeType::LongShot
            | BadgeType::LateWinner
            | BadgeType::FirstMover => RulePhase::Resolution,
        }
    }
}

pub const ALL_RULES: [BadgeType; 6] = [
    BadgeType::HighWinRate,
    BadgeType::BigBet,
    BadgeType::LongShot,
    BadgeType::PreMove,
    BadgeType::LateWinner,
    BadgeType::FirstMover,
];

/// A rule firing: the badge plus a human-readable account of the trigger.
#[derive(Debug, Clone, PartialEq)]
pub struct BadgeHit {
    pub badge_type: BadgeType,
    pub reason: String,
    pub earned_at: DateTime<Utc>,
}

/// Everything a rule may read. Rules are pure: no rule mutates market or
/// wallet state, which is what lets the evaluator run fully in parallel.
pub struct RuleContext<'a> {
    pub trade: &'a Trade,
    pub market: &'a MarketStateTracker,
    pub rollup: &'a WalletRollup,
    pub baselines: &'a CategoryBaselines,
    pub thresholds: &'a BadgeThresholds,
}

pub fn evaluate(rule: BadgeType, ctx: &RuleContext) -> Option<BadgeHit> {
    match rule {
        BadgeType::HighWinRate => high_win_rate(ctx),
        BadgeType::BigBet => big_bet(ctx),
        BadgeType::LongShot => long_shot(ctx),
        BadgeType::PreMove => pre_move(ctx),
        BadgeType::LateWinner => late_winner(ctx),
        BadgeType::FirstMover => first_mover(ctx),
    }
}

// ---------------------------------------------------------------------------
// Trade-phase rules
// ---------------------------------------------------------------------------

/// Trade is at least `big_bet_multiple` times the market's median trade
/// size observed up to the trade's timestamp.
fn big_bet(ctx: &RuleContext) -> Option<BadgeHit> {
    let trade = ctx.trade;
    let median =
        ctx.market
            .median_trade_size_before(&trade.market_id, trade.traded_at, &trade.id)?;
    if median <= Decimal::ZERO {
        return None;
    }
    let multiple = trade.usd_value / median;
    if multiple < ctx.thresholds.big_bet_multiple {
        return None;
    }
    // Fixed one-decimal scale: an exact 6 renders as "6.0", not "6".
    let mut shown = multiple.round_dp(1);
    shown.rescale(1);
    Some(BadgeHit {
        badge_type: BadgeType::BigBet,
        reason: format!(
            "${} trade is {}x the market median of ${}",
            trade.usd_value,
            shown,
            median.round_dp(2),
        ),
        earned_at: trade.traded_at,
    })
}

/// Within `pre_move_window_mins` after the trade, the traded outcome's
/// price moved at least `pre_move_delta` in the direction the trade implied
/// (up for a buy, down for a sell).
fn pre_move(ctx: &RuleContext) -> Option<BadgeHit> {
    let trade = ctx.trade;
    let window_end = trade.traded_at + Duration::minutes(ctx.thresholds.pre_move_window_mins);

    let mut best_move = Decimal::ZERO;
    for (_, price) in ctx.market.price_window(
        &trade.market_id,
        &trade.outcome_name,
        trade.traded_at,
        window_end,
    ) {
        let favorable = match trade.side() {
            Side::Buy => price - trade.price,
            Side::Sell => trade.price - price,
        };
        best_move = best_move.max(favorable);
    }

    if best_move < ctx.thresholds.pre_move_delta {
        return None;
    }
    let direction = match trade.side() {
        Side::Buy => "up",
        Side::Sell => "down",
    };
    Some(BadgeHit {
        badge_type: BadgeType::PreMove,
        reason: format!(
            "price moved {} by {} within {}m of the trade at {}",
            direction,
            best_move.round_dp(3),
            ctx.thresholds.pre_move_window_mins,
            trade.price,
        ),
        earned_at: trade.traded_at,
    })
}

// ---------------------------------------------------------------------------
// Resolution-phase rules
// ---------------------------------------------------------------------------

/// Wallet's win rate clears the category baseline by the configured edge,
/// with enough resolved trades to mean something.
fn high_win_rate(ctx: &RuleContext) -> Option<BadgeHit> {
    let rollup = ctx.rollup;
    if rollup.resolved_trades < ctx.thresholds.high_win_rate_min_resolved {
        return None;
    }
    let win_rate = rollup.win_rate?;
    let baseline = ctx.baselines.rate(&ctx.trade.market_category);
    if win_rate < baseline + ctx.thresholds.high_win_rate_edge {
        return None;
    }
    let (_, earned_at) = resolution_of(ctx)?;
    Some(BadgeHit {
        badge_type: BadgeType::HighWinRate,
        reason: format!(
            "win rate {} over {} resolved trades vs category baseline {}",
            win_rate.round_dp(3),
            rollup.resolved_trades,
            baseline.round_dp(3),
        ),
        earned_at,
    })
}

/// Bought at long-shot odds and the outcome came in.
fn long_shot(ctx: &RuleContext) -> Option<BadgeHit> {
    let trade = ctx.trade;
    if trade.won != Some(true) || trade.price > ctx.thresholds.long_shot_max_price {
        return None;
    }
    let (_, earned_at) = resolution_of(ctx)?;
    Some(BadgeHit {
        badge_type: BadgeType::LongShot,
        reason: format!(
            "won after entering at {} (at or below the {} long-shot line)",
            trade.price, ctx.thresholds.long_shot_max_price,
        ),
        earned_at,
    })
}

/// Winning trade placed shortly before the market resolved.
fn late_winner(ctx: &RuleContext) -> Option<BadgeHit> {
    let trade = ctx.trade;
    if trade.won != Some(true) {
        return None;
    }
    let (_, resolved_at) = resolution_of(ctx)?;
    let window_start = resolved_at - Duration::hours(ctx.thresholds.late_winner_window_hours);
    if trade.traded_at < window_start || trade.traded_at > resolved_at {
        return None;
    }
    let lead = resolved_at - trade.traded_at;
    Some(BadgeHit {
        badge_type: BadgeType::LateWinner,
        reason: format!(
            "won a trade placed {}m before resolution",
            lead.num_minutes(),
        ),
        earned_at: resolved_at,
    })
}

/// Among the market's earliest trades, on a market whose traded volume then
/// multiplied before resolution.
fn first_mover(ctx: &RuleContext) -> Option<BadgeHit> {
    let trade = ctx.trade;
    let rank = ctx.market.trade_rank(&trade.market_id, &trade.id)?;
    if rank >= ctx.thresholds.first_mover_rank {
        return None;
    }
    let (_, earned_at) = resolution_of(ctx)?;

    let volume_then = ctx
        .market
        .volume_traded_before(&trade.market_id, trade.traded_at);
    if volume_then <= Decimal::ZERO {
        return None;
    }
    let volume_final = ctx.market.volume_at_resolution(&trade.market_id);
    let growth = volume_final / volume_then;
    if growth < ctx.thresholds.first_mover_growth {
        return None;
    }
    Some(BadgeHit {
        badge_type: BadgeType::FirstMover,
        reason: format!(
            "trade #{} on the market; volume grew {}x (${} -> ${}) by resolution",
            rank + 1,
            growth.round_dp(0),
            volume_then.round_dp(0),
            volume_final.round_dp(0),
        ),
        earned_at,
    })
}

fn resolution_of(ctx: &RuleContext) -> Option<(String, DateTime<Utc>)> {
    ctx.market
        .resolution(&ctx.trade.market_id)
        .map(|(at, outcome)| (outcome.to_string(), at))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashMap;

    fn ts(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn make_trade(id: &str, price_cents: i64, usd: i64, minute: i64) -> Trade {
        Trade {
            id: id.into(),
            wallet_address: "0xW".into(),
            market_id: "m1".into(),
            market_question: String::new(),
            market_slug: String::new(),
            market_category: "politics".into(),
            outcome_name: "Yes".into(),
            side: "BUY".into(),
            price: Decimal::new(price_cents, 2),
            usd_value: Decimal::from(usd),
            traded_at: ts(minute),
            won: None,
            created_at: None,
        }
    }

    fn make_rollup(resolved: i32, won: i32) -> WalletRollup {
        WalletRollup {
            address: "0xW".into(),
            first_trade_at: ts(0),
            last_trade_at: ts(0),
            total_trades: resolved.max(1),
            total_volume: Decimal::from(1000),
            resolved_trades: resolved,
            won_trades: won,
            win_rate: (resolved > 0)
                .then(|| Decimal::from(won) / Decimal::from(resolved)),
        }
    }

    fn defaults() -> BadgeThresholds {
        BadgeThresholds::default()
    }

    fn empty_baselines() -> CategoryBaselines {
        CategoryBaselines::from_trades([].iter(), Decimal::new(50, 2))
    }

    fn ctx<'a>(
        trade: &'a Trade,
        market: &'a MarketStateTracker,
        rollup: &'a WalletRollup,
        baselines: &'a CategoryBaselines,
        thresholds: &'a BadgeThresholds,
    ) -> RuleContext<'a> {
        RuleContext {
            trade,
            market,
            rollup,
            baselines,
            thresholds,
        }
    }

    #[test]
    fn test_long_shot_scenario() {
        // Scenario A: one trade at 0.08, the outcome later wins.
        let mut market = MarketStateTracker::new();
        market.record_trade("m1", "t1", ts(0), Decimal::from(100));
        market.record_resolution("m1", ts(600), "Yes").unwrap();

        let mut trade = make_trade("t1", 8, 100, 0);
        trade.won = Some(true);
        let rollup = make_rollup(1, 1);
        let (baselines, thresholds) = (empty_baselines(), defaults());

        let hit = evaluate(
            BadgeType::LongShot,
            &ctx(&trade, &market, &rollup, &baselines, &thresholds),
        )
        .expect("LONG_SHOT should fire");
        assert_eq!(hit.badge_type, BadgeType::LongShot);
        assert_eq!(hit.earned_at, ts(600));

        // Same entry but the trade lost: no badge.
        trade.won = Some(false);
        assert!(evaluate(
            BadgeType::LongShot,
            &ctx(&trade, &market, &rollup, &baselines, &thresholds)
        )
        .is_none());

        // Won, but not at long-shot odds.
        let mut fair = make_trade("t1", 45, 100, 0);
        fair.won = Some(true);
        assert!(evaluate(
            BadgeType::LongShot,
            &ctx(&fair, &market, &rollup, &baselines, &thresholds)
        )
        .is_none());
    }

    #[test]
    fn test_first_mover_scenario() {
        // Scenario B: trade #3 with $500 traded so far; $30,000 by
        // resolution (60x growth).
        let mut market = MarketStateTracker::new();
        market.record_trade("m1", "t1", ts(0), Decimal::from(200));
        market.record_trade("m1", "t2", ts(1), Decimal::from(100));
        market.record_trade("m1", "t3", ts(2), Decimal::from(200));
        market.record_trade("m1", "t4", ts(100), Decimal::from(29_500));
        market.record_resolution("m1", ts(600), "Yes").unwrap();

        let trade = make_trade("t3", 50, 200, 2);
        let rollup = make_rollup(0, 0);
        let (baselines, thresholds) = (empty_baselines(), defaults());

        let hit = evaluate(
            BadgeType::FirstMover,
            &ctx(&trade, &market, &rollup, &baselines, &thresholds),
        )
        .expect("FIRST_MOVER should fire");
        assert!(hit.reason.contains("trade #3"));
        assert!(hit.reason.contains("60x"));
    }

    #[test]
    fn test_first_mover_requires_growth_and_rank() {
        let mut market = MarketStateTracker::new();
        for i in 0..20 {
            market.record_trade("m1", &format!("t{i}"), ts(i), Decimal::from(100));
        }
        market.record_resolution("m1", ts(600), "Yes").unwrap();

        let rollup = make_rollup(0, 0);
        let (baselines, thresholds) = (empty_baselines(), defaults());

        // Early trade, but the market never grew.
        let early = make_trade("t1", 50, 100, 1);
        assert!(evaluate(
            BadgeType::FirstMover,
            &ctx(&early, &market, &rollup, &baselines, &thresholds)
        )
        .is_none());

        // Rank past the cutoff.
        let late = make_trade("t15", 50, 100, 15);
        assert!(evaluate(
            BadgeType::FirstMover,
            &ctx(&late, &market, &rollup, &baselines, &thresholds)
        )
        .is_none());
    }

    #[test]
    fn test_big_bet_scenario() {
        // Scenario C: market median $200, wallet trades $1,200 (6x).
        let mut market = MarketStateTracker::new();
        market.record_trade("m1", "t1", ts(0), Decimal::from(150));
        market.record_trade("m1", "t2", ts(1), Decimal::from(200));
        market.record_trade("m1", "t3", ts(2), Decimal::from(250));
        market.record_trade("m1", "big", ts(3), Decimal::from(1200));

        let trade = make_trade("big", 50, 1200, 3);
        let rollup = make_rollup(0, 0);
        let (baselines, thresholds) = (empty_baselines(), defaults());

        let hit = evaluate(
            BadgeType::BigBet,
            &ctx(&trade, &market, &rollup, &baselines, &thresholds),
        )
        .expect("BIG_BET should fire");
        assert!(hit.reason.contains("6.0x"));
        assert_eq!(hit.earned_at, trade.traded_at);

        // 4x the median does not clear the default 5x bar.
        market.record_trade("m1", "mid", ts(4), Decimal::from(800));
        let mid = make_trade("mid", 50, 800, 4);
        assert!(evaluate(
            BadgeType::BigBet,
            &ctx(&mid, &market, &rollup, &baselines, &thresholds)
        )
        .is_none());
    }

    #[test]
    fn test_big_bet_needs_peer_trades() {
        let mut market = MarketStateTracker::new();
        market.record_trade("m1", "t1", ts(0), Decimal::from(5000));

        let trade = make_trade("t1", 50, 5000, 0);
        let rollup = make_rollup(0, 0);
        let (baselines, thresholds) = (empty_baselines(), defaults());

        // First trade on a market has no median to compare against.
        assert!(evaluate(
            BadgeType::BigBet,
            &ctx(&trade, &market, &rollup, &baselines, &thresholds)
        )
        .is_none());
    }

    #[test]
    fn test_high_win_rate_scenario() {
        // Scenario D: 6 resolved, 5 wins (~0.83) against a 0.50 baseline.
        let mut market = MarketStateTracker::new();
        market.record_resolution("m1", ts(600), "Yes").unwrap();

        let trade = make_trade("t6", 50, 100, 10);
        let rollup = make_rollup(6, 5);
        let (baselines, thresholds) = (empty_baselines(), defaults());

        let hit = evaluate(
            BadgeType::HighWinRate,
            &ctx(&trade, &market, &rollup, &baselines, &thresholds),
        )
        .expect("HIGH_WIN_RATE should fire");
        assert!(hit.reason.contains("6 resolved"));

        // Not enough resolved trades.
        let thin = make_rollup(4, 4);
        assert!(evaluate(
            BadgeType::HighWinRate,
            &ctx(&trade, &market, &thin, &baselines, &thresholds)
        )
        .is_none());

        // Enough trades but below the edge: 0.60 < 0.50 + 0.15.
        let average = make_rollup(10, 6);
        assert!(evaluate(
            BadgeType::HighWinRate,
            &ctx(&trade, &market, &average, &baselines, &thresholds)
        )
        .is_none());
    }

    #[test]
    fn test_pre_move_buy_direction() {
        let mut market = MarketStateTracker::new();
        market.record_observation(
            "m1",
            ts(30),
            HashMap::from([("Yes".to_string(), Decimal::new(70, 2))]),
            Decimal::ZERO,
        );

        let trade = make_trade("t1", 50, 100, 0);
        let rollup = make_rollup(0, 0);
        let (baselines, thresholds) = (empty_baselines(), defaults());

        // 0.50 -> 0.70 inside the hour: fires.
        let hit = evaluate(
            BadgeType::PreMove,
            &ctx(&trade, &market, &rollup, &baselines, &thresholds),
        )
        .expect("PRE_MOVE should fire");
        assert!(hit.reason.contains("up"));
    }

    #[test]
    fn test_pre_move_ignores_moves_outside_window() {
        let mut market = MarketStateTracker::new();
        // The jump happens 90 minutes later, past the 60-minute window.
        market.record_observation(
            "m1",
            ts(90),
            HashMap::from([("Yes".to_string(), Decimal::new(90, 2))]),
            Decimal::ZERO,
        );

        let trade = make_trade("t1", 50, 100, 0);
        let rollup = make_rollup(0, 0);
        let (baselines, thresholds) = (empty_baselines(), defaults());

        assert!(evaluate(
            BadgeType::PreMove,
            &ctx(&trade, &market, &rollup, &baselines, &thresholds)
        )
        .is_none());
    }

    #[test]
    fn test_pre_move_sell_wants_downward_move() {
        let mut market = MarketStateTracker::new();
        market.record_observation(
            "m1",
            ts(20),
            HashMap::from([("Yes".to_string(), Decimal::new(30, 2))]),
            Decimal::ZERO,
        );

        let mut trade = make_trade("t1", 50, 100, 0);
        trade.side = "SELL".into();
        let rollup = make_rollup(0, 0);
        let (baselines, thresholds) = (empty_baselines(), defaults());

        let hit = evaluate(
            BadgeType::PreMove,
            &ctx(&trade, &market, &rollup, &baselines, &thresholds),
        )
        .expect("PRE_MOVE should fire on a sell into a drop");
        assert!(hit.reason.contains("down"));

        // A buy into the same drop is adverse, not informed.
        trade.side = "BUY".into();
        assert!(evaluate(
            BadgeType::PreMove,
            &ctx(&trade, &market, &rollup, &baselines, &thresholds)
        )
        .is_none());
    }

    #[test]
    fn test_late_winner_window() {
        let mut market = MarketStateTracker::new();
        market.record_resolution("m1", ts(120), "Yes").unwrap();

        let rollup = make_rollup(1, 1);
        let (baselines, thresholds) = (empty_baselines(), defaults());

        // 60 minutes before resolution, won: fires.
        let mut close = make_trade("t1", 50, 100, 60);
        close.won = Some(true);
        let hit = evaluate(
            BadgeType::LateWinner,
            &ctx(&close, &market, &rollup, &baselines, &thresholds),
        )
        .expect("LATE_WINNER should fire");
        assert_eq!(hit.earned_at, ts(120));

        // Same timing but lost.
        close.won = Some(false);
        assert!(evaluate(
            BadgeType::LateWinner,
            &ctx(&close, &market, &rollup, &baselines, &thresholds)
        )
        .is_none());

        // Won, but placed 3 hours out.
        let mut early = make_trade("t2", 50, 100, -60);
        early.won = Some(true);
        assert!(evaluate(
            BadgeType::LateWinner,
            &ctx(&early, &market, &rollup, &baselines, &thresholds)
        )
        .is_none());
    }

    #[test]
    fn test_phase_partition() {
        use BadgeType::*;
        assert_eq!(BigBet.phase(), RulePhase::Trade);
        assert_eq!(PreMove.phase(), RulePhase::Trade);
        for rule in [HighWinRate, LongShot, LateWinner, FirstMover] {
            assert_eq!(rule.phase(), RulePhase::Resolution);
        }
    }
}
