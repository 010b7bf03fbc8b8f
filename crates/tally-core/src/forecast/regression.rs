//! Linear trend forecasting
//!
//! Fits an ordinary least squares line through a monthly series (x = 0..n-1)
//! and extends it forward. Confidence comes from the spread of the residuals
//! relative to the series mean.

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::{Metric, MonthlyBucket};
use crate::period::YearMonth;
use crate::stats::{linear_regression, mean, population_std_dev, round2};

use super::types::{ForecastMethod, ForecastPoint, ForecastResult, Trend};
use super::ForecastConfig;

/// Projects a single series forward
#[derive(Debug, Clone, Default)]
pub struct Regressor {
    config: ForecastConfig,
}

impl Regressor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ForecastConfig) -> Self {
        Self { config }
    }

    /// Forecast `periods_ahead` months following `last_period`.
    ///
    /// `series` must be in chronological order with its final value at
    /// `last_period`. Short series yield `insufficient_data`; non-finite
    /// values yield `error`. Neither is returned as `Err`.
    pub fn forecast(
        &self,
        series: &[f64],
        last_period: YearMonth,
        periods_ahead: u32,
        metric: Metric,
    ) -> Result<ForecastResult> {
        if periods_ahead == 0 {
            return Err(Error::InvalidData(
                "periods_ahead must be at least 1".to_string(),
            ));
        }

        if series.len() < self.config.min_history.max(2) {
            debug!(
                points = series.len(),
                metric = %metric,
                "Not enough history to forecast"
            );
            return Ok(ForecastResult::insufficient_data());
        }

        if series.iter().any(|v| !v.is_finite()) {
            warn!(metric = %metric, "Series contains non-finite values, skipping forecast");
            return Ok(ForecastResult::error());
        }

        let Some(fit) = linear_regression(series) else {
            warn!(metric = %metric, "Regression could not be fitted");
            return Ok(ForecastResult::error());
        };

        let last_index = (series.len() - 1) as f64;
        let points = (1..=periods_ahead)
            .map(|i| {
                let raw = fit.at(last_index + i as f64);
                let value = if metric.is_non_negative() {
                    raw.max(0.0)
                } else {
                    raw
                };
                ForecastPoint {
                    period_index: i,
                    period: last_period.plus_months(i as i64),
                    value: round2(value),
                    seasonal_adjustment: None,
                    unadjusted_value: None,
                }
            })
            .collect();

        let series_mean = mean(series);
        let confidence = if series_mean == 0.0 {
            0.0
        } else {
            let residuals: Vec<f64> = series
                .iter()
                .enumerate()
                .map(|(x, y)| y - fit.at(x as f64))
                .collect();
            let variation = population_std_dev(&residuals) / series_mean.abs();
            (1.0 - variation).clamp(0.0, 1.0)
        };

        let trend = self.classify_trend(fit.slope, series_mean);

        debug!(
            metric = %metric,
            slope = fit.slope,
            confidence,
            trend = %trend,
            "Forecast fitted"
        );

        Ok(ForecastResult {
            points,
            confidence: round2(confidence),
            trend: Some(trend),
            method: ForecastMethod::LinearRegression,
            slope: Some(round2(fit.slope)),
        })
    }

    /// Forecast a metric straight from a monthly series
    pub fn forecast_buckets(
        &self,
        buckets: &[MonthlyBucket],
        periods_ahead: u32,
        metric: Metric,
    ) -> Result<ForecastResult> {
        let Some(last) = buckets.last() else {
            if periods_ahead == 0 {
                return Err(Error::InvalidData(
                    "periods_ahead must be at least 1".to_string(),
                ));
            }
            return Ok(ForecastResult::insufficient_data());
        };
        self.forecast(&metric.series(buckets), last.period, periods_ahead, metric)
    }

    fn classify_trend(&self, slope: f64, series_mean: f64) -> Trend {
        if slope == 0.0 || slope.abs() < self.config.stable_slope_ratio * series_mean.abs() {
            Trend::Stable
        } else if slope > 0.0 {
            Trend::Increasing
        } else {
            Trend::Decreasing
        }
    }
}
