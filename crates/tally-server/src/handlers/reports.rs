//! Report handlers

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;

use super::parse_as_of;
use crate::{get_tenant, AppError, AppState};
use tally_core::{CategoryReport, Lookback, MonthlyReport};

/// Months returned when the caller does not say
const DEFAULT_MONTHS: u32 = 12;

/// Query parameters for the monthly report
#[derive(Debug, Deserialize)]
pub struct MonthlyQuery {
    pub client_id: Option<String>,
    /// Number of months ending with the current one
    pub months: Option<u32>,
    /// Report date (YYYY-MM-DD), defaults to today
    pub as_of: Option<String>,
}

/// GET /api/monthly - Zero-filled monthly revenue, expenses and profit
pub async fn get_monthly(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MonthlyQuery>,
    headers: HeaderMap,
) -> Result<Json<MonthlyReport>, AppError> {
    let tenant = get_tenant(&headers, params.client_id.as_deref())?;
    let as_of = parse_as_of(params.as_of.as_deref())?;

    let report = state
        .analytics
        .monthly(&tenant, params.months.unwrap_or(DEFAULT_MONTHS), as_of)
        .map_err(AppError::from_core)?;

    Ok(Json(report))
}

/// Query parameters for the category breakdown
#[derive(Debug, Deserialize)]
pub struct CategoriesQuery {
    pub client_id: Option<String>,
    /// Lookback such as `30d`, `3m`, `1y`
    pub period: Option<String>,
    pub as_of: Option<String>,
}

/// GET /api/categories - Expense totals per category
pub async fn get_categories(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CategoriesQuery>,
    headers: HeaderMap,
) -> Result<Json<CategoryReport>, AppError> {
    let tenant = get_tenant(&headers, params.client_id.as_deref())?;
    let as_of = parse_as_of(params.as_of.as_deref())?;
    let lookback = params
        .period
        .as_deref()
        .map(Lookback::parse)
        .unwrap_or_default();

    let report = state
        .analytics
        .categories(&tenant, lookback, as_of)
        .map_err(AppError::from_core)?;

    Ok(Json(report))
}
