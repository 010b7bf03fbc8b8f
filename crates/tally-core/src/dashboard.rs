//! Dashboard KPIs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::forecast::ForecastResult;
use crate::models::{CategoryTotal, MonthlyBucket};
use crate::stats::round2;

/// Months of history a dashboard is built from
pub const DASHBOARD_MONTHS: u32 = 12;

/// Months shown in the trend chart
pub const TREND_MONTHS: usize = 6;

/// Categories shown in the breakdown
pub const TOP_CATEGORIES: usize = 10;

/// Headline figures for the current month
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardKpis {
    pub monthly_revenue: f64,
    pub monthly_expenses: f64,
    pub net_profit: f64,
    /// Percent of revenue, 0 without revenue
    pub profit_margin: f64,
    /// Percent change in revenue vs the previous month, 0 without prior revenue
    pub revenue_change: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    pub kpis: DashboardKpis,
    pub monthly_trend: Vec<MonthlyBucket>,
    pub revenue_forecast: ForecastResult,
    pub category_breakdown: Vec<CategoryTotal>,
    pub generated_at: DateTime<Utc>,
}

impl DashboardKpis {
    /// KPIs from the last bucket, compared with the one before it
    pub fn from_buckets(buckets: &[MonthlyBucket]) -> Self {
        let Some(current) = buckets.last() else {
            return Self::default();
        };
        let previous_revenue = buckets
            .len()
            .checked_sub(2)
            .map(|i| buckets[i].revenue)
            .unwrap_or(0.0);

        let net_profit = current.revenue - current.expenses;
        let profit_margin = if current.revenue > 0.0 {
            round1(net_profit / current.revenue * 100.0)
        } else {
            0.0
        };
        let revenue_change = if previous_revenue > 0.0 {
            round1((current.revenue - previous_revenue) / previous_revenue * 100.0)
        } else {
            0.0
        };

        Self {
            monthly_revenue: round2(current.revenue),
            monthly_expenses: round2(current.expenses),
            net_profit: round2(net_profit),
            profit_margin,
            revenue_change,
        }
    }
}

/// Assemble a dashboard from a monthly series ending at the current month
pub fn build_dashboard(
    buckets: &[MonthlyBucket],
    breakdown: &[CategoryTotal],
    revenue_forecast: ForecastResult,
) -> Dashboard {
    let trend_start = buckets.len().saturating_sub(TREND_MONTHS);
    Dashboard {
        kpis: DashboardKpis::from_buckets(buckets),
        monthly_trend: buckets[trend_start..].to_vec(),
        revenue_forecast,
        category_breakdown: breakdown.iter().take(TOP_CATEGORIES).cloned().collect(),
        generated_at: Utc::now(),
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::YearMonth;

    fn bucket(period: &str, revenue: f64, expenses: f64) -> MonthlyBucket {
        let mut b = MonthlyBucket::empty(period.parse::<YearMonth>().unwrap());
        b.revenue = revenue;
        b.expenses = expenses;
        b.profit = revenue - expenses;
        b
    }

    #[test]
    fn test_kpis() {
        let buckets = vec![bucket("2024-05", 8000.0, 5000.0), bucket("2024-06", 9000.0, 6000.0)];
        let kpis = DashboardKpis::from_buckets(&buckets);
        assert_eq!(kpis.monthly_revenue, 9000.0);
        assert_eq!(kpis.net_profit, 3000.0);
        assert_eq!(kpis.profit_margin, 33.3);
        assert_eq!(kpis.revenue_change, 12.5);
    }

    #[test]
    fn test_kpis_without_revenue() {
        let buckets = vec![bucket("2024-05", 0.0, 100.0), bucket("2024-06", 0.0, 50.0)];
        let kpis = DashboardKpis::from_buckets(&buckets);
        assert_eq!(kpis.profit_margin, 0.0);
        assert_eq!(kpis.revenue_change, 0.0);
        assert_eq!(kpis.net_profit, -50.0);

        assert_eq!(DashboardKpis::from_buckets(&[]), DashboardKpis::default());
    }

    #[test]
    fn test_trend_and_categories_truncated() {
        let start: YearMonth = "2024-01".parse().unwrap();
        let buckets: Vec<MonthlyBucket> = (0..12)
            .map(|i| bucket(&start.plus_months(i).to_string(), 100.0, 50.0))
            .collect();
        let breakdown: Vec<CategoryTotal> = (0..15)
            .map(|i| CategoryTotal {
                category: format!("C{}", i),
                total: 100.0 - i as f64,
                count: 1,
                average: 100.0 - i as f64,
            })
            .collect();

        let dashboard = build_dashboard(&buckets, &breakdown, ForecastResult::insufficient_data());
        assert_eq!(dashboard.monthly_trend.len(), 6);
        assert_eq!(dashboard.monthly_trend[0].period.to_string(), "2024-07");
        assert_eq!(dashboard.category_breakdown.len(), 10);
    }
}
