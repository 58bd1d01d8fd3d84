use rust_decimal::Decimal;
use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,

    // Batch engine
    pub detection_interval_secs: u64,
    pub detection_shards: u32,

    // Query service
    pub default_timeframe_days: i64,
    pub default_page_limit: i64,
    pub max_page_limit: i64,

    pub thresholds: BadgeThresholds,
}

/// Tunable trigger thresholds for the badge rules. Defaults follow domain
/// convention; every value can be overridden from the environment.
#[derive(Debug, Clone)]
pub struct BadgeThresholds {
    /// HIGH_WIN_RATE: minimum resolved trades before the rule applies.
    pub high_win_rate_min_resolved: i32,
    /// HIGH_WIN_RATE: required edge over the category baseline.
    pub high_win_rate_edge: Decimal,
    /// HIGH_WIN_RATE: baseline used when a category has no history.
    pub default_baseline_win_rate: Decimal,
    /// BIG_BET: multiple of the market's median trade size.
    pub big_bet_multiple: Decimal,
    /// LONG_SHOT: maximum entry price.
    pub long_shot_max_price: Decimal,
    /// PRE_MOVE: lookahead window after the trade, in minutes.
    pub pre_move_window_mins: i64,
    /// PRE_MOVE: minimum absolute price move inside the window.
    pub pre_move_delta: Decimal,
    /// LATE_WINNER: window before resolution, in hours.
    pub late_winner_window_hours: i64,
    /// FIRST_MOVER: how many earliest trades on a market qualify.
    pub first_mover_rank: usize,
    /// FIRST_MOVER: required volume growth multiple between trade time and
    /// resolution.
    pub first_mover_growth: Decimal,
}

impl Default for BadgeThresholds {
    fn default() -> Self {
        Self {
            high_win_rate_min_resolved: 5,
            high_win_rate_edge: Decimal::new(15, 2),
            default_baseline_win_rate: Decimal::new(50, 2),
            big_bet_multiple: Decimal::from(5),
            long_shot_max_price: Decimal::new(10, 2),
            pre_move_window_mins: 60,
            pre_move_delta: Decimal::new(15, 2),
            late_winner_window_hours: 2,
            first_mover_rank: 10,
            first_mover_growth: Decimal::from(50),
        }
    }
}

impl BadgeThresholds {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            high_win_rate_min_resolved: env_or("HIGH_WIN_RATE_MIN_RESOLVED", d.high_win_rate_min_resolved),
            high_win_rate_edge: env_or("HIGH_WIN_RATE_EDGE", d.high_win_rate_edge),
            default_baseline_win_rate: env_or("DEFAULT_BASELINE_WIN_RATE", d.default_baseline_win_rate),
            big_bet_multiple: env_or("BIG_BET_MULTIPLE", d.big_bet_multiple),
            long_shot_max_price: env_or("LONG_SHOT_MAX_PRICE", d.long_shot_max_price),
            pre_move_window_mins: env_or("PRE_MOVE_WINDOW_MINS", d.pre_move_window_mins),
            pre_move_delta: env_or("PRE_MOVE_DELTA", d.pre_move_delta),
            late_winner_window_hours: env_or("LATE_WINNER_WINDOW_HOURS", d.late_winner_window_hours),
            first_mover_rank: env_or("FIRST_MOVER_RANK", d.first_mover_rank),
            first_mover_growth: env_or("FIRST_MOVER_GROWTH", d.first_mover_growth),
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()?,

            detection_interval_secs: env_or("DETECTION_INTERVAL_SECS", 300),
            detection_shards: env_or("DETECTION_SHARDS", 8),

            default_timeframe_days: 30,
            default_page_limit: 25,
            max_page_limit: 50,

            thresholds: BadgeThresholds::from_env(),
        })
    }
}
