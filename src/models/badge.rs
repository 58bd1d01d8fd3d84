use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

/// Behavioral flags the evaluator can attach to a wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BadgeType {
    HighWinRate,
    BigBet,
    LongShot,
    PreMove,
    LateWinner,
    FirstMover,
}

impl BadgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BadgeType::HighWinRate => "HIGH_WIN_RATE",
            BadgeType::BigBet => "BIG_BET",
            BadgeType::LongShot => "LONG_SHOT",
            BadgeType::PreMove => "PRE_MOVE",
            BadgeType::LateWinner => "LATE_WINNER",
            BadgeType::FirstMover => "FIRST_MOVER",
        }
    }

    pub fn from_api_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "HIGH_WIN_RATE" => Some(BadgeType::HighWinRate),
            "BIG_BET" => Some(BadgeType::BigBet),
            "LONG_SHOT" => Some(BadgeType::LongShot),
            "PRE_MOVE" => Some(BadgeType::PreMove),
            "LATE_WINNER" => Some(BadgeType::LateWinner),
            "FIRST_MOVER" => Some(BadgeType::FirstMover),
            _ => None,
        }
    }
}

impl fmt::Display for BadgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Database row for the insider_badges table. Append-only; unique on
/// (wallet_address, badge_type, trade_id).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InsiderBadge {
    pub id: Uuid,
    pub wallet_address: String,
    pub badge_type: String,
    pub reason: String,
    pub trade_id: String,
    pub earned_at: DateTime<Utc>,
    pub created_at: Option<DateTime<Utc>>,
}
