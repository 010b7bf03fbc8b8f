//! Insight and dashboard handlers

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::Response,
};
use serde::Deserialize;

use super::{cached_json, parse_as_of};
use crate::{get_tenant, AppError, AppState};
use tally_core::{cache_key, CacheKind, Dashboard, InsightReport};

/// Query parameters shared by insights and dashboard
#[derive(Debug, Deserialize)]
pub struct TenantQuery {
    pub client_id: Option<String>,
    pub as_of: Option<String>,
}

/// GET /api/insights - Narrative insights with forecasts and anomalies
///
/// Composition is async, so the cache is read and filled around it.
pub async fn get_insights(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TenantQuery>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let tenant = get_tenant(&headers, params.client_id.as_deref())?;
    let as_of = parse_as_of(params.as_of.as_deref())?;
    let suffix = params.as_of.as_ref().map(|_| as_of.to_string());
    let key = cache_key(
        CacheKind::Insights,
        &tenant.user_id,
        tenant.client_id.as_deref(),
        suffix.as_deref(),
    );
    let ttl = state.cache.ttl_secs(CacheKind::Insights);

    if let Some(report) = state.cache.get::<InsightReport>(&key) {
        return Ok(cached_json(&report, true, ttl));
    }

    let report = state
        .analytics
        .insights(&tenant, as_of, state.composer.as_ref())
        .await
        .map_err(AppError::from_core)?;

    state
        .cache
        .insert(&key, &report)
        .map_err(AppError::from_core)?;

    Ok(cached_json(&report, false, ttl))
}

/// GET /api/dashboard - Current-month KPIs, trend, forecast and top categories
pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TenantQuery>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let tenant = get_tenant(&headers, params.client_id.as_deref())?;
    let as_of = parse_as_of(params.as_of.as_deref())?;
    let suffix = params.as_of.as_ref().map(|_| as_of.to_string());
    let key = cache_key(
        CacheKind::Dashboard,
        &tenant.user_id,
        tenant.client_id.as_deref(),
        suffix.as_deref(),
    );

    let cached = state
        .cache
        .get_or_compute::<Dashboard, _>(&key, || {
            state.analytics.dashboard(&tenant, as_of)
        })
        .map_err(AppError::from_core)?;

    Ok(cached_json(
        &cached.value,
        cached.from_cache,
        state.cache.ttl_secs(CacheKind::Dashboard),
    ))
}
