//! Tally Core Library
//!
//! Forecasting and anomaly detection over a tenant's ledger:
//! - Monthly aggregation, category breakdowns and moving averages
//! - Linear-regression forecasts with seasonal adjustment
//! - Z-score outliers, spending spikes, income drops, repeats and odd-hour patterns
//! - Narrative insights behind a pluggable composer
//! - Pooled SQLite ledger store and a TTL result cache
//! - TOML configuration with embedded defaults

pub mod aggregate;
pub mod anomaly;
pub mod cache;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod forecast;
pub mod insights;
pub mod models;
pub mod period;
pub mod service;
pub mod stats;
pub mod store;

pub use anomaly::{
    Anomaly, AnomalyConfig, AnomalyKind, AnomalyReport, AnomalySummary, DetectOptions,
    ExpectedRange, OutlierDetector, Sensitivity, Severity,
};
pub use cache::{cache_key, CacheConfig, CacheKey, CacheKind, Cached, ResultCache};
pub use config::{default_config_path, AnalyticsConfig};
pub use dashboard::{Dashboard, DashboardKpis};
pub use error::{Error, Result};
pub use forecast::{
    ForecastConfig, ForecastEngine, ForecastMethod, ForecastPoint, ForecastReport, ForecastResult,
    SeasonalPattern, SeasonalityConfig, Trend,
};
pub use insights::{InsightComposer, InsightInput, InsightReport, TemplateComposer};
pub use models::{CategoryTotal, FlowKind, LedgerRecord, Metric, MonthlyBucket};
pub use period::{Lookback, TimeRange, YearMonth};
pub use service::{AnalyticsService, CategoryReport, MonthlyReport, SeasonalityReport, Tenant};
pub use store::{LedgerQuery, LedgerStore, MemoryLedgerStore, SqliteLedgerStore};
