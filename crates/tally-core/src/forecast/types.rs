//! Result types produced by the forecaster and seasonality detector

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::MonthlyBucket;
use crate::period::YearMonth;

/// How a forecast was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastMethod {
    LinearRegression,
    /// Fewer points than the regression needs; not a failure
    InsufficientData,
    /// The series could not be fitted (non-finite values)
    Error,
}

impl ForecastMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LinearRegression => "linear_regression",
            Self::InsufficientData => "insufficient_data",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for ForecastMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Direction of the fitted trend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Increasing => "increasing",
            Self::Decreasing => "decreasing",
            Self::Stable => "stable",
        }
    }
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One projected period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    /// 1-based offset from the last historical month
    pub period_index: u32,
    pub period: YearMonth,
    pub value: f64,
    /// Deviation percent applied by the seasonal adjuster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seasonal_adjustment: Option<f64>,
    /// Projection before seasonal adjustment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unadjusted_value: Option<f64>,
}

/// Output of a single-series forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub points: Vec<ForecastPoint>,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trend: Option<Trend>,
    pub method: ForecastMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slope: Option<f64>,
}

impl ForecastResult {
    pub fn insufficient_data() -> Self {
        Self::empty(ForecastMethod::InsufficientData)
    }

    pub fn error() -> Self {
        Self::empty(ForecastMethod::Error)
    }

    fn empty(method: ForecastMethod) -> Self {
        Self {
            points: Vec::new(),
            confidence: 0.0,
            trend: None,
            method,
            slope: None,
        }
    }

    /// Projection for a given month, if it was forecast
    pub fn point_for(&self, period: YearMonth) -> Option<&ForecastPoint> {
        self.points.iter().find(|p| p.period == period)
    }
}

/// Whether a month runs above or below the overall average
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    High,
    Low,
}

/// A calendar month that consistently deviates from the overall average
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalPattern {
    /// Calendar month, 1-12
    pub month: u32,
    pub month_name: String,
    pub deviation_percent: f64,
    pub pattern: PatternKind,
    pub average_value: f64,
    /// Number of years the month was observed (at least 2)
    pub occurrences: usize,
}

/// Revenue, expense and profit projections for one tenant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSet {
    pub revenue: ForecastResult,
    pub expenses: ForecastResult,
    pub profit: ForecastResult,
}

/// Everything the forecast endpoint returns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastReport {
    pub historical: Vec<MonthlyBucket>,
    pub forecasts: ForecastSet,
    /// Revenue seasonality, absent when too little history or nothing significant
    pub seasonality: Option<Vec<SeasonalPattern>>,
    pub generated_at: DateTime<Utc>,
}
