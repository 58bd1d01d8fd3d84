use std::collections::HashSet;

use metrics::counter;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;

use crate::db::trade_repo::TradeUpsert;
use crate::db::{market_repo, trade_repo, with_retry};
use crate::errors::EngineError;
use crate::models::{ObservationEvent, ResolutionEvent, TradeEvent};

/// Per-batch intake outcome. Rejected events are logged and dropped, never
/// fatal to the batch.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct IngestReport {
    pub accepted: usize,
    pub rejected: usize,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

pub fn validate_trade(event: &TradeEvent) -> Result<(), EngineError> {
    if event.id.trim().is_empty() {
        return Err(EngineError::Validation("trade id is empty".into()));
    }
    if event.wallet_address.trim().is_empty() {
        return Err(EngineError::Validation("wallet address is empty".into()));
    }
    if event.market_id.trim().is_empty() || event.outcome_name.trim().is_empty() {
        return Err(EngineError::Validation("market or outcome is empty".into()));
    }
    if event.price < Decimal::ZERO || event.price > Decimal::ONE {
        return Err(EngineError::Validation(format!(
            "price {} outside [0, 1]",
            event.price
        )));
    }
    if event.usd_value < Decimal::ZERO {
        return Err(EngineError::Validation(format!(
            "usd value {} is negative",
            event.usd_value
        )));
    }
    Ok(())
}

pub fn validate_observation(event: &ObservationEvent) -> Result<(), EngineError> {
    if event.market_id.trim().is_empty() {
        return Err(EngineError::Validation("market id is empty".into()));
    }
    if event.prices.is_empty() {
        return Err(EngineError::Validation("observation has no prices".into()));
    }
    for (outcome, price) in &event.prices {
        if *price < Decimal::ZERO || *price > Decimal::ONE {
            return Err(EngineError::Validation(format!(
                "price {price} for outcome '{outcome}' outside [0, 1]"
            )));
        }
    }
    if event.volume < Decimal::ZERO {
        return Err(EngineError::Validation("volume is negative".into()));
    }
    Ok(())
}

pub fn validate_resolution(event: &ResolutionEvent) -> Result<(), EngineError> {
    if event.market_id.trim().is_empty() || event.winning_outcome_name.trim().is_empty() {
        return Err(EngineError::Validation(
            "resolution market or outcome is empty".into(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Intake
// ---------------------------------------------------------------------------

/// Persist a batch of inbound trades. Replays of known trades are accepted
/// as no-ops; replays with different fields are rejected and the stored row
/// kept authoritative. Trades on already-resolved markets get their `won`
/// field filled immediately.
pub async fn ingest_trades(pool: &PgPool, events: &[TradeEvent]) -> IngestReport {
    let mut report = IngestReport::default();
    let mut touched_markets: HashSet<String> = HashSet::new();

    for event in events {
        if let Err(e) = validate_trade(event) {
            report.rejected += 1;
            tracing::warn!(trade = %event, error = %e, "Rejecting trade event");
            continue;
        }

        match with_retry("upsert_trade", || trade_repo::upsert_trade(pool, event)).await {
            Ok(TradeUpsert::Inserted) => {
                report.accepted += 1;
                touched_markets.insert(event.market_id.clone());
                counter!("trades_ingested_total").increment(1);
            }
            Ok(TradeUpsert::Replayed) => {
                report.accepted += 1;
            }
            Err(e) => {
                report.rejected += 1;
                tracing::warn!(trade = %event, error = %e, "Rejecting trade event");
            }
        }
    }

    // Backfilled trades may arrive after their market resolved.
    for market_id in touched_markets {
        match market_repo::get_resolution(pool, &market_id).await {
            Ok(Some(resolution)) => {
                if let Err(e) = trade_repo::set_outcomes_for_market(
                    pool,
                    &market_id,
                    &resolution.winning_outcome,
                )
                .await
                {
                    tracing::error!(market = %market_id, error = %e, "Failed to fill outcomes");
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!(market = %market_id, error = %e, "Failed to look up resolution");
            }
        }
    }

    report
}

/// Persist resolution events. A market resolves exactly once; conflicting
/// repeats are rejected.
pub async fn ingest_resolutions(pool: &PgPool, events: &[ResolutionEvent]) -> IngestReport {
    let mut report = IngestReport::default();

    for event in events {
        if let Err(e) = validate_resolution(event) {
            report.rejected += 1;
            tracing::warn!(market = %event.market_id, error = %e, "Rejecting resolution event");
            continue;
        }

        let newly_resolved = with_retry("insert_resolution", || {
            market_repo::insert_resolution(
                pool,
                &event.market_id,
                event.resolved_at,
                &event.winning_outcome_name,
            )
        })
        .await;

        match newly_resolved {
            Ok(inserted) => {
                report.accepted += 1;
                if inserted {
                    counter!("resolutions_ingested_total").increment(1);
                    if let Err(e) = trade_repo::set_outcomes_for_market(
                        pool,
                        &event.market_id,
                        &event.winning_outcome_name,
                    )
                    .await
                    {
                        tracing::error!(
                            market = %event.market_id,
                            error = %e,
                            "Failed to fill outcomes after resolution"
                        );
                    }
                }
            }
            Err(e) => {
                report.rejected += 1;
                tracing::warn!(market = %event.market_id, error = %e, "Rejecting resolution event");
            }
        }
    }

    report
}

/// Persist market price/volume samples.
pub async fn ingest_observations(pool: &PgPool, events: &[ObservationEvent]) -> IngestReport {
    let mut report = IngestReport::default();

    for event in events {
        if let Err(e) = validate_observation(event) {
            report.rejected += 1;
            tracing::warn!(market = %event.market_id, error = %e, "Rejecting observation event");
            continue;
        }

        let prices = match serde_json::to_value(&event.prices) {
            Ok(v) => v,
            Err(e) => {
                report.rejected += 1;
                tracing::warn!(market = %event.market_id, error = %e, "Unserializable prices");
                continue;
            }
        };

        match with_retry("insert_observation", || {
            market_repo::insert_observation(
                pool,
                &event.market_id,
                event.timestamp,
                &prices,
                event.volume,
            )
        })
        .await
        {
            Ok(()) => report.accepted += 1,
            Err(e) => {
                report.rejected += 1;
                tracing::warn!(market = %event.market_id, error = %e, "Rejecting observation event");
            }
        }
    }

    report
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
