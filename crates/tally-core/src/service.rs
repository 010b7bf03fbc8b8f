//! Tenant-scoped analytics
//!
//! `AnalyticsService` is what the server and CLI call. It fetches a tenant's
//! records for the right window from a `LedgerStore`, then runs the pure
//! aggregation, forecasting and detection code over them. It holds no
//! per-request state.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::aggregate::{category_breakdown, monthly_buckets, moving_average, summarize};
use crate::anomaly::{AnomalyReport, DetectOptions, OutlierDetector, Sensitivity};
use crate::config::AnalyticsConfig;
use crate::dashboard::{build_dashboard, Dashboard, DASHBOARD_MONTHS};
use crate::error::{Error, Result};
use crate::forecast::{ForecastEngine, ForecastReport, SeasonalPattern};
use crate::insights::{InsightComposer, InsightInput, InsightReport};
use crate::models::{
    CategoryTotal, LedgerRecord, Metric, MonthlyBucket, MonthlySummary, MovingAveragePoint,
};
use crate::period::{trailing_months, Lookback, TimeRange, YearMonth};
use crate::store::{LedgerQuery, LedgerStore};

/// Most months a monthly report may span
pub const MAX_REPORT_MONTHS: u32 = 60;

/// Months of history the seasonality report reads
pub const SEASONALITY_MONTHS: u32 = 24;

/// Moving-average window used in monthly reports
const MOVING_AVERAGE_WINDOW: usize = 3;

/// Months of history behind insights
const INSIGHT_MONTHS: u32 = 6;

/// Category window behind insights
const INSIGHT_CATEGORY_PERIOD: &str = "3m";

/// Whose ledger to read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

impl Tenant {
    pub fn new(user_id: &str, client_id: Option<&str>) -> Self {
        Self {
            user_id: user_id.to_string(),
            client_id: client_id
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
        }
    }

    pub fn query(&self, start: NaiveDate, end: NaiveDate) -> Result<LedgerQuery> {
        LedgerQuery::new(&self.user_id, self.client_id.as_deref(), start, end)
    }
}

/// Monthly series plus summary and smoothing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyReport {
    pub months: Vec<MonthlyBucket>,
    pub summary: MonthlySummary,
    pub moving_average: Vec<MovingAveragePoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryReport {
    pub period: String,
    pub categories: Vec<CategoryTotal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalityReport {
    pub metric: Metric,
    pub months_analyzed: usize,
    /// Empty when no month qualifies or history is too short
    pub patterns: Vec<SeasonalPattern>,
}

/// Runs analytics for one tenant at a time
#[derive(Clone)]
pub struct AnalyticsService {
    store: Arc<dyn LedgerStore>,
    config: AnalyticsConfig,
    engine: ForecastEngine,
    detector: OutlierDetector,
}

impl AnalyticsService {
    pub fn new(store: Arc<dyn LedgerStore>, config: AnalyticsConfig) -> Self {
        Self {
            engine: ForecastEngine::with_config(config.forecast.clone(), config.seasonality.clone()),
            detector: OutlierDetector::with_config(config.anomaly.clone()),
            store,
            config,
        }
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    fn fetch(&self, tenant: &Tenant, start: NaiveDate, end: NaiveDate) -> Result<Vec<LedgerRecord>> {
        self.store.fetch_records(&tenant.query(start, end)?)
    }

    /// Records and zero-filled buckets for the `months` months ending at `as_of`
    fn history(
        &self,
        tenant: &Tenant,
        months: u32,
        as_of: NaiveDate,
    ) -> Result<(Vec<LedgerRecord>, Vec<MonthlyBucket>)> {
        let (start, end) = trailing_months(as_of, months);
        let records = self.fetch(tenant, start.first_day(), as_of)?;
        let buckets = monthly_buckets(&records, start, end)?;
        Ok((records, buckets))
    }

    pub fn monthly(&self, tenant: &Tenant, months: u32, as_of: NaiveDate) -> Result<MonthlyReport> {
        if months == 0 || months > MAX_REPORT_MONTHS {
            return Err(Error::InvalidData(format!(
                "months must be between 1 and {}",
                MAX_REPORT_MONTHS
            )));
        }
        let (_, buckets) = self.history(tenant, months, as_of)?;
        Ok(MonthlyReport {
            summary: summarize(&buckets),
            moving_average: moving_average(&buckets, MOVING_AVERAGE_WINDOW)?,
            months: buckets,
        })
    }

    pub fn categories(&self, tenant: &Tenant, lookback: Lookback, as_of: NaiveDate) -> Result<CategoryReport> {
        let since = lookback.since(as_of);
        let records = self.fetch(tenant, since, as_of)?;
        Ok(CategoryReport {
            period: format!("{}d", lookback.days()),
            categories: category_breakdown(&records, since),
        })
    }

    pub fn forecast(
        &self,
        tenant: &Tenant,
        time_range: TimeRange,
        periods_ahead: Option<u32>,
        as_of: NaiveDate,
    ) -> Result<ForecastReport> {
        let periods = periods_ahead.unwrap_or(self.config.forecast.periods_ahead);
        let (_, buckets) = self.history(tenant, time_range.months(), as_of)?;
        let report = self.engine.report(&buckets, periods)?;
        info!(
            user_id = %tenant.user_id,
            time_range = time_range.as_str(),
            periods,
            "Forecast built"
        );
        Ok(report)
    }

    pub fn seasonality(&self, tenant: &Tenant, metric: Metric, as_of: NaiveDate) -> Result<SeasonalityReport> {
        let (_, buckets) = self.history(tenant, SEASONALITY_MONTHS, as_of)?;
        Ok(SeasonalityReport {
            metric,
            months_analyzed: buckets.len(),
            patterns: self.engine.seasonality().detect(&buckets, metric).unwrap_or_default(),
        })
    }

    pub fn anomalies(
        &self,
        tenant: &Tenant,
        lookback: Lookback,
        sensitivity: Sensitivity,
        as_of: NaiveDate,
    ) -> Result<AnomalyReport> {
        let window_start = lookback.since(as_of);
        let options = DetectOptions::new(sensitivity, as_of, window_start);

        // Spike baselines need the months before the current one
        let baseline_start = YearMonth::from_date(as_of)
            .plus_months(-(self.config.anomaly.spike_history_months as i64))
            .first_day();
        let records = self.fetch(tenant, window_start.min(baseline_start), as_of)?;
        let breakdown = category_breakdown(&records, window_start);

        let anomalies = self.detector.detect(&records, &breakdown, &options);
        debug!(user_id = %tenant.user_id, found = anomalies.len(), "Anomalies detected");

        Ok(AnomalyReport::new(
            &format!("{}d", lookback.days()),
            sensitivity,
            anomalies,
        ))
    }

    /// Facts an insight composer works from
    pub fn insight_input(&self, tenant: &Tenant, as_of: NaiveDate) -> Result<InsightInput> {
        let (_, monthly) = self.history(tenant, INSIGHT_MONTHS, as_of)?;
        let categories = self
            .categories(tenant, Lookback::parse(INSIGHT_CATEGORY_PERIOD), as_of)?
            .categories;

        let periods = self.config.forecast.periods_ahead;
        let (revenue_forecast, _) = self.engine.forecast_adjusted(&monthly, periods, Metric::Revenue)?;
        let expense_forecast = self
            .engine
            .regressor()
            .forecast_buckets(&monthly, periods, Metric::Expenses)?;
        let anomalies = self
            .anomalies(tenant, Lookback::default(), Sensitivity::Medium, as_of)?
            .anomalies;

        Ok(InsightInput {
            monthly,
            categories,
            revenue_forecast,
            expense_forecast,
            anomalies,
        })
    }

    pub async fn insights(
        &self,
        tenant: &Tenant,
        as_of: NaiveDate,
        composer: &dyn InsightComposer,
    ) -> Result<InsightReport> {
        let input = self.insight_input(tenant, as_of)?;
        let lines = composer.compose(&input).await?;
        info!(
            user_id = %tenant.user_id,
            composer = composer.name(),
            lines = lines.len(),
            "Insights composed"
        );
        Ok(InsightReport::new(lines, input))
    }

    pub fn dashboard(&self, tenant: &Tenant, as_of: NaiveDate) -> Result<Dashboard> {
        let (records, buckets) = self.history(tenant, DASHBOARD_MONTHS, as_of)?;
        let (current, _) = trailing_months(as_of, 1);
        let breakdown = category_breakdown(&records, current.first_day());
        let (revenue_forecast, _) = self.engine.forecast_adjusted(
            &buckets,
            self.config.forecast.periods_ahead,
            Metric::Revenue,
        )?;
        Ok(build_dashboard(&buckets, &breakdown, revenue_forecast))
    }
}

impl std::fmt::Debug for AnalyticsService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyticsService")
            .field("config", &self.config)
            .finish()
    }
}
