//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod detection;
pub mod forecast;
pub mod health;
pub mod insights;
pub mod reports;

// Re-export all handlers for use in router
pub use detection::*;
pub use forecast::*;
pub use health::*;
pub use insights::*;
pub use reports::*;

use axum::{
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Serialize;

use crate::AppError;

/// Parse an optional `as_of` (YYYY-MM-DD), defaulting to today (UTC)
pub(crate) fn parse_as_of(as_of: Option<&str>) -> Result<NaiveDate, AppError> {
    match as_of.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|_| AppError::bad_request("Invalid as_of date format (use YYYY-MM-DD)")),
        None => Ok(Utc::now().date_naive()),
    }
}

/// JSON response with `Cache-Control` reflecting whether it came from cache
pub(crate) fn cached_json<T: Serialize>(value: &T, from_cache: bool, ttl_secs: u64) -> Response {
    let cache_control = if from_cache {
        HeaderValue::from_str(&format!("public, max-age={}", ttl_secs))
            .unwrap_or_else(|_| HeaderValue::from_static("no-cache"))
    } else {
        HeaderValue::from_static("no-cache")
    };
    ([(header::CACHE_CONTROL, cache_control)], Json(value)).into_response()
}
