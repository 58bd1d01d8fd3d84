use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use metrics::{counter, gauge, histogram};
use sqlx::PgPool;
use tokio::task::JoinSet;

use crate::config::{AppConfig, BadgeThresholds};
use crate::db::badge_repo::NewBadge;
use crate::db::checkpoint_repo::{self, Checkpoint};
use crate::db::{market_repo, trade_repo, wallet_repo, with_retry};
use crate::intelligence::rules::{evaluate, RuleContext, RulePhase, ALL_RULES};
use crate::intelligence::{CategoryBaselines, MarketStateTracker, WalletAggregator, WalletRollup};
use crate::models::Trade;

/// Outcome of one detection run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub skipped: usize,
    pub errored: usize,
    pub wallets_committed: usize,
    pub new_badges: usize,
}

/// Stable wallet → shard assignment (FNV-1a over the address), so a
/// restarted run maps every wallet to the same shard and checkpoints stay
/// meaningful.
pub fn shard_for(address: &str, shards: u32) -> u32 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in address.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    (hash % u64::from(shards.max(1))) as u32
}

/// Fold one wallet's full trade history into its rollup and badge hits.
///
/// Trades are walked in timestamp order so each rule sees the aggregate up
/// to and including its trade; resolution-phase rules only run for trades
/// whose market has resolved. Pure with respect to market state.
pub fn detect_wallet(
    address: &str,
    trades: &mut [Trade],
    market: &MarketStateTracker,
    baselines: &CategoryBaselines,
    thresholds: &BadgeThresholds,
) -> Option<(WalletRollup, Vec<NewBadge>)> {
    trades.sort_by(|a, b| (a.traded_at, &a.id).cmp(&(b.traded_at, &b.id)));

    let mut agg = WalletAggregator::new();
    let mut hits = Vec::new();

    for trade in trades.iter() {
        agg.apply_trade(trade);
        if let Some(won) = trade.won {
            agg.apply_resolution(address, &trade.id, won);
        }
        let Some(rollup) = agg.rollup(address).cloned() else {
            continue;
        };

        let ctx = RuleContext {
            trade,
            market,
            rollup: &rollup,
            baselines,
            thresholds,
        };
        let market_resolved = market.resolution(&trade.market_id).is_some();

        for rule in ALL_RULES {
            if rule.phase() == RulePhase::Resolution && !market_resolved {
                continue;
            }
            if let Some(hit) = evaluate(rule, &ctx) {
                hits.push(NewBadge {
                    wallet_address: address.to_string(),
                    badge_type: hit.badge_type,
                    reason: hit.reason,
                    trade_id: trade.id.clone(),
                    earned_at: hit.earned_at,
                });
            }
        }
    }

    agg.rollup(address).cloned().map(|rollup| (rollup, hits))
}

#[derive(Debug, Default)]
struct ShardOutcome {
    shard: i32,
    processed: usize,
    errored: usize,
    wallets_committed: usize,
    new_badges: usize,
    checkpoint: Option<Checkpoint>,
}

async fn process_shard(
    pool: PgPool,
    shard: i32,
    wallets: Vec<(String, Vec<Trade>)>,
    last_resolution: Option<DateTime<Utc>>,
    market: Arc<MarketStateTracker>,
    baselines: Arc<CategoryBaselines>,
    thresholds: Arc<BadgeThresholds>,
) -> ShardOutcome {
    let mut outcome = ShardOutcome {
        shard,
        ..Default::default()
    };
    let mut newest: Option<Checkpoint> = None;

    for (address, mut trades) in wallets {
        let trade_count = trades.len();
        let Some((rollup, hits)) =
            detect_wallet(&address, &mut trades, &market, &baselines, &thresholds)
        else {
            continue;
        };

        match with_retry("commit_wallet", || {
            wallet_repo::commit_wallet(&pool, &rollup, &hits)
        })
        .await
        {
            Ok(new_badges) => {
                outcome.processed += trade_count;
                outcome.wallets_committed += 1;
                outcome.new_badges += new_badges;

                // Only committed wallets move the watermark; a failed wallet
                // keeps the shard eligible for the next run.
                for trade in &trades {
                    let candidate = Checkpoint {
                        last_trade_at: trade.traded_at,
                        last_trade_id: trade.id.clone(),
                        last_resolved_at: last_resolution,
                    };
                    let newer = match &newest {
                        None => true,
                        Some(cp) => {
                            (candidate.last_trade_at, &candidate.last_trade_id)
                                > (cp.last_trade_at, &cp.last_trade_id)
                        }
                    };
                    if newer {
                        newest = Some(candidate);
                    }
                }
            }
            Err(e) => {
                outcome.errored += trade_count;
                tracing::error!(
                    shard,
                    wallet = %address,
                    error = %e,
                    "Failed to commit wallet, skipping"
                );
            }
        }
    }

    // A shard with any failed wallet stays behind its watermark so the
    // next run picks the whole shard up again.
    if outcome.errored == 0 {
        outcome.checkpoint = newest;
    }
    outcome
}

/// One full detection pass: reconcile resolution outcomes into trades,
/// rebuild market state and category baselines, then shard the trade set by
/// wallet and fold every shard concurrently. Market state is built before
/// any wallet work starts, so all cross-shard access happens in one fixed
/// order. Rollups are recomputed from the full trade set each run; the
/// store upserts make that idempotent.
pub async fn run_detection(pool: &PgPool, config: &AppConfig) -> anyhow::Result<RunSummary> {
    let start = Instant::now();
    let shards = config.detection_shards.max(1);

    // Fill `won` for trades of resolved markets before loading history.
    let resolutions = market_repo::load_resolutions(pool).await?;
    for resolution in &resolutions {
        trade_repo::set_outcomes_for_market(
            pool,
            &resolution.market_id,
            &resolution.winning_outcome,
        )
        .await?;
    }

    let trades = trade_repo::load_all(pool).await?;
    let observations = market_repo::load_observations(pool).await?;

    // Market state first, wallet aggregates second: the fixed global update
    // order that keeps cross-shard access deadlock-free.
    let mut tracker = MarketStateTracker::new();
    for obs in &observations {
        match serde_json::from_value(obs.prices.clone()) {
            Ok(prices) => {
                tracker.record_observation(&obs.market_id, obs.observed_at, prices, obs.volume)
            }
            Err(e) => {
                tracing::warn!(
                    market = %obs.market_id,
                    error = %e,
                    "Malformed observation prices, skipping sample"
                );
            }
        }
    }
    for trade in &trades {
        tracker.record_trade(&trade.market_id, &trade.id, trade.traded_at, trade.usd_value);
    }
    for resolution in &resolutions {
        if let Err(e) = tracker.record_resolution(
            &resolution.market_id,
            resolution.resolved_at,
            &resolution.winning_outcome,
        ) {
            tracing::error!(market = %resolution.market_id, error = %e, "Dropping resolution");
        }
    }

    let baselines = CategoryBaselines::from_trades(
        trades.iter(),
        config.thresholds.default_baseline_win_rate,
    );

    // Shard by wallet address.
    let mut by_wallet: HashMap<String, Vec<Trade>> = HashMap::new();
    for trade in trades {
        by_wallet
            .entry(trade.wallet_address.clone())
            .or_default()
            .push(trade);
    }
    let mut by_shard: HashMap<i32, Vec<(String, Vec<Trade>)>> = HashMap::new();
    for (address, wallet_trades) in by_wallet {
        let shard = shard_for(&address, shards) as i32;
        by_shard
            .entry(shard)
            .or_default()
            .push((address, wallet_trades));
    }

    let checkpoints = checkpoint_repo::load_all(pool).await?;
    let resolved_by_market: HashMap<&str, DateTime<Utc>> = resolutions
        .iter()
        .map(|r| (r.market_id.as_str(), r.resolved_at))
        .collect();

    let tracker = Arc::new(tracker);
    let baselines = Arc::new(baselines);
    let thresholds = Arc::new(config.thresholds.clone());

    let mut summary = RunSummary::default();
    let mut tasks = JoinSet::new();

    for (shard, wallets) in by_shard {
        // A shard is skippable only when both watermarks are current: no
        // trade newer than the trade watermark, and no market the shard's
        // wallets touched resolved after the resolution watermark. A late
        // resolution must reopen the shard or the deferred rules never run.
        let shard_newest = wallets
            .iter()
            .flat_map(|(_, ts)| ts.iter())
            .map(|t| (t.traded_at, t.id.as_str()))
            .max();
        let shard_last_resolution = wallets
            .iter()
            .flat_map(|(_, ts)| ts.iter())
            .filter_map(|t| resolved_by_market.get(t.market_id.as_str()))
            .max()
            .copied();
        if let (Some(cp), Some(newest)) = (checkpoints.get(&shard), shard_newest) {
            let trades_covered = (cp.last_trade_at, cp.last_trade_id.as_str()) >= newest;
            let resolutions_covered = match shard_last_resolution {
                None => true,
                Some(at) => cp.last_resolved_at.is_some_and(|seen| seen >= at),
            };
            if trades_covered && resolutions_covered {
                summary.skipped += wallets.iter().map(|(_, ts)| ts.len()).sum::<usize>();
                tracing::debug!(shard, "Shard at watermark, skipping");
                continue;
            }
        }

        tasks.spawn(process_shard(
            pool.clone(),
            shard,
            wallets,
            shard_last_resolution,
            Arc::clone(&tracker),
            Arc::clone(&baselines),
            Arc::clone(&thresholds),
        ));
    }

    while let Some(joined) = tasks.join_next().await {
        let outcome = joined?;
        summary.processed += outcome.processed;
        summary.errored += outcome.errored;
        summary.wallets_committed += outcome.wallets_committed;
        summary.new_badges += outcome.new_badges;

        if let Some(cp) = &outcome.checkpoint {
            if let Err(e) = checkpoint_repo::upsert(pool, outcome.shard, cp).await {
                tracing::error!(shard = outcome.shard, error = %e, "Failed to save checkpoint");
            }
        }
    }

    let elapsed = start.elapsed().as_secs_f64();
    counter!("detection_runs_total").increment(1);
    counter!("detection_trades_processed_total").increment(summary.processed as u64);
    counter!("detection_trades_skipped_total").increment(summary.skipped as u64);
    counter!("detection_trades_errored_total").increment(summary.errored as u64);
    counter!("badges_awarded_total").increment(summary.new_badges as u64);
    histogram!("detection_run_seconds").record(elapsed);
    if let Ok(tracked) = wallet_repo::count_tracked(pool).await {
        gauge!("tracked_wallets").set(tracked as f64);
    }

    tracing::info!(
        processed = summary.processed,
        skipped = summary.skipped,
        errored = summary.errored,
        wallets = summary.wallets_committed,
        new_badges = summary.new_badges,
        elapsed_secs = elapsed,
        "Detection run complete"
    );

    Ok(summary)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    use crate::models::BadgeType;

    fn ts(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn make_trade(
        id: &str,
        wallet: &str,
        market: &str,
        price_cents: i64,
        usd: i64,
        minute: i64,
        won: Option<bool>,
    ) -> Trade {
        Trade {
            id: id.into(),
            wallet_address: wallet.into(),
            market_id: market.into(),
            market_question: String::new(),
            market_slug: String::new(),
            market_category: "politics".into(),
            outcome_name: "Yes".into(),
            side: "BUY".into(),
            price: Decimal::new(price_cents, 2),
            usd_value: Decimal::from(usd),
            traded_at: ts(minute),
            won,
            created_at: None,
        }
    }

    fn build_market(trades: &[Trade]) -> MarketStateTracker {
        let mut tracker = MarketStateTracker::new();
        for t in trades {
            tracker.record_trade(&t.market_id, &t.id, t.traded_at, t.usd_value);
        }
        tracker
    }

    #[test]
    fn test_shard_assignment_is_stable_and_in_range() {
        for address in ["0xA", "0xB", "0xDEADBEEF", ""] {
            let shard = shard_for(address, 8);
            assert!(shard < 8);
            assert_eq!(shard, shard_for(address, 8));
        }
        assert_eq!(shard_for("0xA", 0), 0);
    }

    #[test]
    fn test_detect_wallet_long_shot_end_to_end() {
        let mut trades = vec![make_trade("t1", "0xW", "m1", 8, 100, 0, Some(true))];
        let mut market = build_market(&trades);
        market.record_resolution("m1", ts(600), "Yes").unwrap();
        let baselines = CategoryBaselines::from_trades([].iter(), Decimal::new(50, 2));
        let thresholds = BadgeThresholds::default();

        let (rollup, hits) =
            detect_wallet("0xW", &mut trades, &market, &baselines, &thresholds).unwrap();

        assert_eq!(rollup.total_trades, 1);
        assert_eq!(rollup.resolved_trades, 1);
        assert_eq!(rollup.win_rate, Some(Decimal::ONE));
        assert!(hits.iter().any(|h| h.badge_type == BadgeType::LongShot));
    }

    #[test]
    fn test_detect_wallet_is_deterministic_across_runs() {
        let make = || {
            vec![
                make_trade("t1", "0xW", "m1", 8, 100, 0, Some(true)),
                make_trade("t2", "0xW", "m1", 50, 200, 5, Some(true)),
                make_trade("t3", "0xW", "m1", 60, 150, 10, Some(false)),
            ]
        };
        let mut first = make();
        let mut second = make();
        // Reversed arrival order must not change the outcome.
        second.reverse();

        let mut market = build_market(&first);
        market.record_resolution("m1", ts(600), "Yes").unwrap();
        let baselines = CategoryBaselines::from_trades([].iter(), Decimal::new(50, 2));
        let thresholds = BadgeThresholds::default();

        let a = detect_wallet("0xW", &mut first, &market, &baselines, &thresholds).unwrap();
        let b = detect_wallet("0xW", &mut second, &market, &baselines, &thresholds).unwrap();

        assert_eq!(a.0, b.0);
        assert_eq!(a.1, b.1);
    }

    #[test]
    fn test_resolution_rules_wait_for_resolution() {
        let mut trades = vec![make_trade("t1", "0xW", "m1", 8, 100, 0, None)];
        let market = build_market(&trades);
        let baselines = CategoryBaselines::from_trades([].iter(), Decimal::new(50, 2));
        let thresholds = BadgeThresholds::default();

        let (_, hits) =
            detect_wallet("0xW", &mut trades, &market, &baselines, &thresholds).unwrap();

        // Long-shot entry, but the market is still open: nothing fires.
        assert!(hits.is_empty());
    }

    #[test]
    fn test_detect_wallet_empty_history() {
        let market = MarketStateTracker::new();
        let baselines = CategoryBaselines::from_trades([].iter(), Decimal::new(50, 2));
        let thresholds = BadgeThresholds::default();

        assert!(detect_wallet("0xW", &mut [], &market, &baselines, &thresholds).is_none());
    }
}
