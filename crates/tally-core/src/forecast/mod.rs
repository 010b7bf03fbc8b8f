//! Forecasting
//!
//! - `regression` - linear trend projection for one series
//! - `seasonality` - calendar-month deviation detection
//! - `adjust` - seasonal rescaling of projected points
//!
//! `ForecastEngine` ties them together for the forecast endpoint: revenue,
//! expenses and profit are projected from the same monthly history, and the
//! revenue projection is seasonally adjusted when revenue seasonality exists.
//!
//! ```rust,ignore
//! use tally_core::forecast::ForecastEngine;
//!
//! let engine = ForecastEngine::new();
//! let report = engine.report(&buckets, 3)?;
//! ```

pub mod adjust;
pub mod regression;
pub mod seasonality;
pub mod types;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::models::{Metric, MonthlyBucket};

pub use adjust::SeasonalAdjuster;
pub use regression::Regressor;
pub use seasonality::{SeasonalityConfig, SeasonalityDetector};
pub use types::{
    ForecastMethod, ForecastPoint, ForecastReport, ForecastResult, ForecastSet, PatternKind,
    SeasonalPattern, Trend,
};

/// Regression settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Minimum points before a regression is attempted
    pub min_history: usize,
    /// A slope smaller than this fraction of |mean| is reported as stable
    pub stable_slope_ratio: f64,
    /// Months projected when the caller does not say
    pub periods_ahead: u32,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            min_history: 3,
            stable_slope_ratio: 0.01,
            periods_ahead: 3,
        }
    }
}

/// Produces the combined forecast report
#[derive(Debug, Clone, Default)]
pub struct ForecastEngine {
    regressor: Regressor,
    seasonality: SeasonalityDetector,
}

impl ForecastEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(forecast: ForecastConfig, seasonality: SeasonalityConfig) -> Self {
        Self {
            regressor: Regressor::with_config(forecast),
            seasonality: SeasonalityDetector::with_config(seasonality),
        }
    }

    pub fn regressor(&self) -> &Regressor {
        &self.regressor
    }

    pub fn seasonality(&self) -> &SeasonalityDetector {
        &self.seasonality
    }

    /// Forecast one metric, seasonally adjusting it when that metric shows
    /// seasonality. Returns the forecast and the patterns used.
    pub fn forecast_adjusted(
        &self,
        buckets: &[MonthlyBucket],
        periods_ahead: u32,
        metric: Metric,
    ) -> Result<(ForecastResult, Option<Vec<SeasonalPattern>>)> {
        let mut result = self
            .regressor
            .forecast_buckets(buckets, periods_ahead, metric)?;
        let patterns = self.seasonality.detect(buckets, metric);

        if let (Some(found), Some(overall)) = (
            patterns.as_deref(),
            self.seasonality.overall_average(buckets, metric),
        ) {
            result.points = SeasonalAdjuster::adjust(&result.points, Some(found), overall);
        }

        Ok((result, patterns))
    }

    /// Revenue, expense and profit forecasts plus revenue seasonality
    pub fn report(&self, buckets: &[MonthlyBucket], periods_ahead: u32) -> Result<ForecastReport> {
        let (revenue, seasonality) =
            self.forecast_adjusted(buckets, periods_ahead, Metric::Revenue)?;
        let expenses = self
            .regressor
            .forecast_buckets(buckets, periods_ahead, Metric::Expenses)?;
        let profit = self
            .regressor
            .forecast_buckets(buckets, periods_ahead, Metric::Profit)?;

        info!(
            months = buckets.len(),
            periods_ahead,
            revenue_method = %revenue.method,
            seasonal_months = seasonality.as_ref().map_or(0, Vec::len),
            "Forecast report generated"
        );

        Ok(ForecastReport {
            historical: buckets.to_vec(),
            forecasts: ForecastSet {
                revenue,
                expenses,
                profit,
            },
            seasonality,
            generated_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::YearMonth;

    fn revenue_series(start: &str, values: &[f64]) -> Vec<MonthlyBucket> {
        let start: YearMonth = start.parse().unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let mut b = MonthlyBucket::empty(start.plus_months(i as i64));
                b.revenue = *v;
                b.expenses = v / 2.0;
                b.profit = b.revenue - b.expenses;
                b
            })
            .collect()
    }

    #[test]
    fn test_report_without_seasonality() {
        let buckets = revenue_series("2024-01", &[1000.0, 1100.0, 1200.0, 1300.0, 1400.0, 1500.0]);
        let report = ForecastEngine::new().report(&buckets, 3).unwrap();

        assert_eq!(report.historical.len(), 6);
        assert!(report.seasonality.is_none());
        assert_eq!(report.forecasts.revenue.points.len(), 3);
        assert_eq!(report.forecasts.revenue.points[0].value, 1600.0);
        assert_eq!(report.forecasts.expenses.points[0].value, 800.0);
        assert_eq!(report.forecasts.profit.points[0].value, 800.0);
        assert!(report.forecasts.revenue.points[0].unadjusted_value.is_none());
    }

    #[test]
    fn test_report_with_short_history() {
        let buckets = revenue_series("2024-01", &[1000.0, 1100.0]);
        let report = ForecastEngine::new().report(&buckets, 3).unwrap();
        assert_eq!(report.forecasts.revenue.method, ForecastMethod::InsufficientData);
        assert_eq!(report.forecasts.profit.method, ForecastMethod::InsufficientData);
    }

    #[test]
    fn test_report_serializes_snake_case() {
        let buckets = revenue_series("2024-01", &[1000.0, 1100.0, 1200.0]);
        let report = ForecastEngine::new().report(&buckets, 1).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["forecasts"]["revenue"]["method"], "linear_regression");
        assert_eq!(json["forecasts"]["revenue"]["trend"], "increasing");
        assert_eq!(json["forecasts"]["revenue"]["points"][0]["period"], "2024-04");
        assert_eq!(json["historical"][0]["period"], "2024-01");
        assert!(json["seasonality"].is_null());
    }
}
