pub mod aggregator;
pub mod baseline;
pub mod market_state;
pub mod rules;

pub use aggregator::{WalletAggregator, WalletRollup};
pub use baseline::CategoryBaselines;
pub use market_state::MarketStateTracker;
pub use rules::{evaluate, BadgeHit, RuleContext, RulePhase, ALL_RULES};
