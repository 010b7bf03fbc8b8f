//! Anomaly detection handlers

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;
use tracing::info;

use super::parse_as_of;
use crate::{get_tenant, AppError, AppState};
use tally_core::{AnomalyReport, Lookback, Sensitivity};

/// Query parameters for anomaly detection
#[derive(Debug, Deserialize)]
pub struct AnomaliesQuery {
    pub client_id: Option<String>,
    /// Lookback such as `30d`, `3m`, `1y`; malformed values mean 30 days
    pub period: Option<String>,
    /// low, medium (default) or high
    pub sensitivity: Option<String>,
    pub as_of: Option<String>,
}

/// GET /api/anomalies - Outliers, spikes, income drops, repeats and odd-hour patterns
pub async fn get_anomalies(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AnomaliesQuery>,
    headers: HeaderMap,
) -> Result<Json<AnomalyReport>, AppError> {
    let tenant = get_tenant(&headers, params.client_id.as_deref())?;
    let sensitivity = match params.sensitivity.as_deref() {
        Some(s) => s
            .parse::<Sensitivity>()
            .map_err(|e| AppError::bad_request(&e))?,
        None => Sensitivity::default(),
    };
    let lookback = params
        .period
        .as_deref()
        .map(Lookback::parse)
        .unwrap_or_default();
    let as_of = parse_as_of(params.as_of.as_deref())?;

    let report = state
        .analytics
        .anomalies(&tenant, lookback, sensitivity, as_of)
        .map_err(AppError::from_core)?;

    info!(
        user_id = %tenant.user_id,
        sensitivity = %sensitivity,
        found = report.anomalies_found,
        "Anomaly scan"
    );

    Ok(Json(report))
}
