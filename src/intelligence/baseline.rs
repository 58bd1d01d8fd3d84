use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::models::Trade;

/// Historical win rate per market category, derived from every resolved
/// trade in the data set. HIGH_WIN_RATE compares a wallet against its
/// category's baseline; categories without history fall back to the default.
#[derive(Debug, Clone)]
pub struct CategoryBaselines {
    rates: HashMap<String, Decimal>,
    default_rate: Decimal,
}

impl CategoryBaselines {
    pub fn from_trades<'a, I>(trades: I, default_rate: Decimal) -> Self
    where
        I: IntoIterator<Item = &'a Trade>,
    {
        let mut counts: HashMap<String, (i64, i64)> = HashMap::new();
        for trade in trades {
            let Some(won) = trade.won else { continue };
            let entry = counts
                .entry(trade.market_category.to_lowercase())
                .or_insert((0, 0));
            entry.0 += 1;
            if won {
                entry.1 += 1;
            }
        }

        let rates = counts
            .into_iter()
            .map(|(category, (resolved, won))| {
                (category, Decimal::from(won) / Decimal::from(resolved))
            })
            .collect();

        Self {
            rates,
            default_rate,
        }
    }

    pub fn rate(&self, category: &str) -> Decimal {
        self.rates
            .get(&category.to_lowercase())
            .copied()
            .unwrap_or(self.default_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn resolved_trade(id: &str, category: &str, won: bool) -> Trade {
        Trade {
            id: id.into(),
            wallet_address: "0xA".into(),
            market_id: "m1".into(),
            market_question: String::new(),
            market_slug: String::new(),
            market_category: category.into(),
            outcome_name: "Yes".into(),
            side: "BUY".into(),
            price: Decimal::new(50, 2),
            usd_value: Decimal::from(100),
            traded_at: Utc::now(),
            won: Some(won),
            created_at: None,
        }
    }

    #[test]
    fn test_baseline_per_category() {
        let trades = vec![
            resolved_trade("t1", "Politics", true),
            resolved_trade("t2", "Politics", false),
            resolved_trade("t3", "politics", false),
            resolved_trade("t4", "sports", true),
        ];
        let baselines =
            CategoryBaselines::from_trades(trades.iter(), Decimal::new(50, 2));

        // 1 win / 3 resolved, case-insensitive grouping
        assert_eq!(
            baselines.rate("POLITICS"),
            Decimal::ONE / Decimal::from(3)
        );
        assert_eq!(baselines.rate("sports"), Decimal::ONE);
    }

    #[test]
    fn test_unknown_category_uses_default() {
        let baselines = CategoryBaselines::from_trades([].iter(), Decimal::new(50, 2));
        assert_eq!(baselines.rate("crypto"), Decimal::new(50, 2));
    }

    #[test]
    fn test_unresolved_trades_are_ignored() {
        let mut trade = resolved_trade("t1", "crypto", true);
        trade.won = None;
        let baselines =
            CategoryBaselines::from_trades([trade].iter(), Decimal::new(50, 2));
        assert_eq!(baselines.rate("crypto"), Decimal::new(50, 2));
    }
}
