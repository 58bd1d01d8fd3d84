use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::db::wallet_repo::{SortField, SortOrder, WalletFilter};
use crate::models::BadgeType;

/// Raw query parameters as the dashboard sends them. Everything is an
/// optional string: malformed values are clamped or dropped, never a 400.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletQueryParams {
    pub timeframe: Option<String>,
    pub badges: Option<String>,
    pub categories: Option<String>,
    pub min_size: Option<String>,
    pub max_size: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
}

/// The filter set actually applied, echoed back in the response meta.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppliedFilters {
    pub timeframe: i64,
    pub badges: Vec<String>,
    pub categories: Vec<String>,
    pub min_size: Option<Decimal>,
    pub max_size: Option<Decimal>,
    pub sort: String,
    pub order: String,
}

#[derive(Debug, Clone)]
pub struct ParsedQuery {
    pub filter: WalletFilter,
    pub page: i64,
    pub limit: i64,
    pub applied: AppliedFilters,
}

impl WalletQueryParams {
    /// Resolve raw parameters into a clamped filter. Unknown badge or
    /// category tokens are silently dropped; out-of-range page/limit are
    /// clamped; unparseable numbers fall back to defaults.
    pub fn resolve(&self, config: &AppConfig, now: DateTime<Utc>) -> ParsedQuery {
        let timeframe = parse_positive_i64(self.timeframe.as_deref())
            .unwrap_or(config.default_timeframe_days);
        let page = parse_positive_i64(self.page.as_deref()).unwrap_or(1);
        let limit = parse_positive_i64(self.limit.as_deref())
            .unwrap_or(config.default_page_limit)
            .min(config.max_page_limit);

        let badges: Vec<BadgeType> = self
            .badges
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .filter_map(BadgeType::from_api_str)
            .collect();

        let categories: Vec<String> = self
            .categories
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty())
            .collect();

        let min_size = parse_volume(self.min_size.as_deref());
        let max_size = parse_volume(self.max_size.as_deref());

        let (sort, sort_name) = match self.sort.as_deref() {
            Some("totalVolume") => (SortField::TotalVolume, "totalVolume"),
            Some("totalTrades") => (SortField::TotalTrades, "totalTrades"),
            Some("winRate") => (SortField::WinRate, "winRate"),
            _ => (SortField::FirstTradeAt, "firstTradeAt"),
        };
        let (order, order_name) = match self.order.as_deref() {
            Some(o) if o.eq_ignore_ascii_case("asc") => (SortOrder::Asc, "asc"),
            _ => (SortOrder::Desc, "desc"),
        };

        let applied = AppliedFilters {
            timeframe,
            badges: badges.iter().map(|b| b.as_str().to_string()).collect(),
            categories: categories.clone(),
            min_size,
            max_size,
            sort: sort_name.to_string(),
            order: order_name.to_string(),
        };

        ParsedQuery {
            filter: WalletFilter {
                first_trade_after: Some(now - Duration::days(timeframe)),
                badge_types: applied.badges.clone(),
                categories,
                min_volume: min_size,
                max_volume: max_size,
                sort,
                order,
                limit,
                offset: (page - 1) * limit,
            },
            page,
            limit,
            applied,
        }
    }
}

fn parse_positive_i64(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|v| *v >= 1)
}

fn parse_volume(raw: Option<&str>) -> Option<Decimal> {
    raw.and_then(|v| v.trim().parse::<Decimal>().ok())
        .filter(|v| *v >= Decimal::ZERO)
}

pub fn total_pages(total: i64, limit: i64) -> i64 {
    if limit <= 0 {
        return 0;
    }
    (total + limit - 1) / limit
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
