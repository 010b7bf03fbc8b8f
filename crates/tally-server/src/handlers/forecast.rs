//! Forecast and seasonality handlers

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::Response,
    Json,
};
use serde::Deserialize;
use tracing::debug;

use super::{cached_json, parse_as_of};
use crate::{get_tenant, AppError, AppState};
use tally_core::{cache_key, CacheKind, ForecastReport, Metric, SeasonalityReport, TimeRange};

/// Most periods a caller may request
const MAX_PERIODS: u32 = 24;

/// Query parameters for forecasts
#[derive(Debug, Deserialize)]
pub struct ForecastQuery {
    pub client_id: Option<String>,
    /// History preset: 30days, 90days, 180days, 1year, 2years
    pub time_range: Option<String>,
    /// Months to project
    pub periods: Option<u32>,
    pub as_of: Option<String>,
}

/// GET /api/forecast - Revenue, expense and profit forecasts with seasonality
///
/// Cached per tenant, client and time range.
pub async fn get_forecast(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ForecastQuery>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let tenant = get_tenant(&headers, params.client_id.as_deref())?;
    let time_range = TimeRange::parse_or_default(params.time_range.as_deref());

    if let Some(periods) = params.periods {
        if periods == 0 || periods > MAX_PERIODS {
            return Err(AppError::bad_request(&format!(
                "periods must be between 1 and {}",
                MAX_PERIODS
            )));
        }
    }

    let as_of = parse_as_of(params.as_of.as_deref())?;

    // Explicit overrides get their own cache entries
    let mut suffix = time_range.as_str().to_string();
    if let Some(periods) = params.periods {
        suffix.push_str(&format!(":p{}", periods));
    }
    if params.as_of.is_some() {
        suffix.push_str(&format!(":{}", as_of));
    }
    let key = cache_key(
        CacheKind::Forecast,
        &tenant.user_id,
        tenant.client_id.as_deref(),
        Some(&suffix),
    );

    let cached = state
        .cache
        .get_or_compute::<ForecastReport, _>(&key, || {
            state
                .analytics
                .forecast(&tenant, time_range, params.periods, as_of)
        })
        .map_err(AppError::from_core)?;

    debug!(variant = %suffix, from_cache = cached.from_cache, "Forecast served");

    Ok(cached_json(
        &cached.value,
        cached.from_cache,
        state.cache.ttl_secs(CacheKind::Forecast),
    ))
}

/// Query parameters for seasonality
#[derive(Debug, Deserialize)]
pub struct SeasonalityQuery {
    pub client_id: Option<String>,
    /// revenue (default), expenses, profit or transaction_count
    pub metric: Option<String>,
    pub as_of: Option<String>,
}

/// GET /api/seasonality - Calendar months that deviate from the norm
pub async fn get_seasonality(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SeasonalityQuery>,
    headers: HeaderMap,
) -> Result<Json<SeasonalityReport>, AppError> {
    let tenant = get_tenant(&headers, params.client_id.as_deref())?;
    let metric = match params.metric.as_deref() {
        Some(m) => m.parse::<Metric>().map_err(|e| AppError::bad_request(&e))?,
        None => Metric::Revenue,
    };
    let as_of = parse_as_of(params.as_of.as_deref())?;

    let report = state
        .analytics
        .seasonality(&tenant, metric, as_of)
        .map_err(AppError::from_core)?;

    Ok(Json(report))
}
