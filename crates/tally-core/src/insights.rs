//! Narrative insights
//!
//! An `InsightComposer` turns the numbers behind the insights endpoint into
//! short human-readable lines. `TemplateComposer` is deterministic and needs
//! no external service; other composers (an LLM, say) plug in behind the
//! same trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::anomaly::{Anomaly, Severity};
use crate::error::Result;
use crate::forecast::{ForecastResult, Trend};
use crate::models::{CategoryTotal, MonthlyBucket};
use crate::stats::mean;

/// Months averaged for the "recent" figures
const RECENT_MONTHS: usize = 3;

/// Margin (percent) under which a low-margin line is added
const LOW_MARGIN_PERCENT: f64 = 20.0;

/// Everything a composer may draw on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightInput {
    /// Monthly history, oldest first
    pub monthly: Vec<MonthlyBucket>,
    /// Expense categories, largest first
    pub categories: Vec<CategoryTotal>,
    pub revenue_forecast: ForecastResult,
    pub expense_forecast: ForecastResult,
    pub anomalies: Vec<Anomaly>,
}

/// Forecasts included alongside the insight lines
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightForecasts {
    pub revenue: ForecastResult,
    pub expenses: ForecastResult,
}

/// What the insights endpoint returns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightReport {
    pub insights: Vec<String>,
    pub forecasts: InsightForecasts,
    pub anomalies: Vec<Anomaly>,
    pub generated_at: DateTime<Utc>,
}

impl InsightReport {
    pub fn new(insights: Vec<String>, input: InsightInput) -> Self {
        Self {
            insights,
            forecasts: InsightForecasts {
                revenue: input.revenue_forecast,
                expenses: input.expense_forecast,
            },
            anomalies: input.anomalies,
            generated_at: Utc::now(),
        }
    }
}

/// Turns analytics into narrative lines
#[async_trait]
pub trait InsightComposer: Send + Sync {
    /// Name for logs
    fn name(&self) -> &'static str;

    async fn compose(&self, input: &InsightInput) -> Result<Vec<String>>;
}

/// Fixed-template composer
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateComposer;

impl TemplateComposer {
    pub fn new() -> Self {
        Self
    }

    /// The synchronous core of `compose`
    pub fn render(&self, input: &InsightInput) -> Vec<String> {
        let mut lines = Vec::new();

        let recent: &[MonthlyBucket] = {
            let start = input.monthly.len().saturating_sub(RECENT_MONTHS);
            &input.monthly[start..]
        };
        if !recent.is_empty() {
            let revenue = mean(&recent.iter().map(|b| b.revenue).collect::<Vec<_>>());
            let expenses = mean(&recent.iter().map(|b| b.expenses).collect::<Vec<_>>());
            let profit = revenue - expenses;

            lines.push(format!(
                "Over the last {} months you averaged {} in revenue and {} in expenses ({} profit per month).",
                recent.len(),
                money(revenue),
                money(expenses),
                money(profit)
            ));

            if profit < 0.0 {
                lines.push("Expenses exceed revenue. Review spending or grow revenue to restore cash flow.".to_string());
            } else if revenue > 0.0 {
                let margin = profit / revenue * 100.0;
                if margin < LOW_MARGIN_PERCENT {
                    lines.push(format!(
                        "Profit margin is {:.1}%. Consider where costs can come down.",
                        margin
                    ));
                }
            }
        }

        if let (Some(revenue), Some(expenses)) =
            (input.revenue_forecast.trend, input.expense_forecast.trend)
        {
            lines.push(format!(
                "Revenue is {} and expenses are {}.",
                direction(revenue),
                direction(expenses)
            ));
        }

        if !input.categories.is_empty() {
            let top: Vec<String> = input
                .categories
                .iter()
                .take(3)
                .map(|c| format!("{} ({})", c.category, money(c.total)))
                .collect();
            lines.push(format!("Top expense categories: {}.", top.join(", ")));
        }

        match input.revenue_forecast.points.first() {
            Some(next) => lines.push(format!(
                "Projected revenue for {} {}: {} (confidence {:.0}%).",
                next.period.month_name(),
                next.period.year(),
                money(next.value),
                input.revenue_forecast.confidence * 100.0
            )),
            None => lines.push("Not enough history yet to project revenue.".to_string()),
        }

        lines.extend(
            input
                .anomalies
                .iter()
                .filter(|a| a.severity == Severity::High)
                .map(|a| format!("Alert: {}.", a.reason)),
        );

        lines
    }
}

#[async_trait]
impl InsightComposer for TemplateComposer {
    fn name(&self) -> &'static str {
        "template"
    }

    async fn compose(&self, input: &InsightInput) -> Result<Vec<String>> {
        Ok(self.render(input))
    }
}

fn direction(trend: Trend) -> &'static str {
    match trend {
        Trend::Increasing => "trending up",
        Trend::Decreasing => "trending down",
        Trend::Stable => "holding steady",
    }
}

fn money(value: f64) -> String {
    if value < 0.0 {
        format!("-${:.2}", value.abs())
    } else {
        format!("${:.2}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::AnomalyKind;
    use crate::forecast::Regressor;
    use crate::models::Metric;
    use crate::period::YearMonth;

    fn buckets(values: &[(f64, f64)]) -> Vec<MonthlyBucket> {
        let start: YearMonth = "2024-01".parse().unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, (revenue, expenses))| {
                let mut b = MonthlyBucket::empty(start.plus_months(i as i64));
                b.revenue = *revenue;
                b.expenses = *expenses;
                b.profit = revenue - expenses;
                b
            })
            .collect()
    }

    fn input(monthly: Vec<MonthlyBucket>, anomalies: Vec<Anomaly>) -> InsightInput {
        let regressor = Regressor::new();
        InsightInput {
            revenue_forecast: regressor.forecast_buckets(&monthly, 1, Metric::Revenue).unwrap(),
            expense_forecast: regressor.forecast_buckets(&monthly, 1, Metric::Expenses).unwrap(),
            categories: vec![
                CategoryTotal {
                    category: "Payroll".to_string(),
                    total: 3000.0,
                    count: 3,
                    average: 1000.0,
                },
                CategoryTotal {
                    category: "Rent".to_string(),
                    total: 1500.0,
                    count: 3,
                    average: 500.0,
                },
            ],
            monthly,
            anomalies,
        }
    }

    #[tokio::test]
    async fn test_template_lines() {
        let monthly = buckets(&[
            (9000.0, 5000.0),
            (10000.0, 5000.0),
            (11000.0, 5000.0),
            (12000.0, 5000.0),
        ]);
        let anomalies = vec![
            Anomaly::new(AnomalyKind::IncomeDrop, Severity::High, "Income dropped sharply"),
            Anomaly::new(AnomalyKind::RepeatedTransaction, Severity::Low, "Repeated transaction"),
        ];
        let lines = TemplateComposer::new()
            .compose(&input(monthly, anomalies))
            .await
            .unwrap();

        assert!(lines[0].contains("$11000.00 in revenue"));
        assert!(lines[0].contains("$5000.00 in expenses"));
        assert!(lines.iter().any(|l| l == "Revenue is trending up and expenses are holding steady."));
        assert!(lines
            .iter()
            .any(|l| l == "Top expense categories: Payroll ($3000.00), Rent ($1500.00)."));
        assert!(lines
            .iter()
            .any(|l| l.starts_with("Projected revenue for May 2024: $13000.00")));
        assert!(lines.iter().any(|l| l == "Alert: Income dropped sharply."));
        assert!(!lines.iter().any(|l| l.contains("Repeated")));
    }

    #[test]
    fn test_negative_and_low_margin() {
        let losing = TemplateComposer::new().render(&input(
            buckets(&[(1000.0, 2000.0), (1000.0, 2000.0), (1000.0, 2000.0)]),
            vec![],
        ));
        assert!(losing.iter().any(|l| l.starts_with("Expenses exceed revenue")));
        assert!(losing[0].contains("-$1000.00 profit"));

        let thin = TemplateComposer::new().render(&input(
            buckets(&[(1000.0, 900.0), (1000.0, 900.0), (1000.0, 900.0)]),
            vec![],
        ));
        assert!(thin.iter().any(|l| l.starts_with("Profit margin is 10.0%")));
    }

    #[test]
    fn test_short_history() {
        let lines = TemplateComposer::new().render(&input(buckets(&[(500.0, 100.0)]), vec![]));
        assert!(lines.iter().any(|l| l == "Not enough history yet to project revenue."));
        assert!(!lines.iter().any(|l| l.starts_with("Revenue is")));
    }

    #[test]
    fn test_report_carries_forecasts() {
        let input = input(buckets(&[(1.0, 1.0), (2.0, 1.0), (3.0, 1.0)]), vec![]);
        let lines = TemplateComposer::new().render(&input);
        let report = InsightReport::new(lines.clone(), input);
        assert_eq!(report.insights, lines);
        assert_eq!(report.forecasts.revenue.points.len(), 1);
    }
}
