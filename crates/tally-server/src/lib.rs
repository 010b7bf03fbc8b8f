//! Tally Web Server
//!
//! Axum-based REST API exposing forecasting and anomaly detection for the
//! Tally auto-CFO.
//!
//! Security features:
//! - Tenant identity from the `x-user-id` header set by the upstream auth gateway
//! - Restrictive CORS policy
//! - Input validation (period grammar, sensitivity, month limits)
//! - Sanitized error responses

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{debug, error, info, warn};

use tally_core::{AnalyticsService, InsightComposer, ResultCache, TemplateComposer, Tenant};

mod handlers;

/// Header carrying the authenticated tenant id
pub const USER_ID_HEADER: &str = "x-user-id";

/// Server configuration
#[derive(Clone, Default)]
pub struct ServerConfig {
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
}

/// Shared application state
pub struct AppState {
    pub analytics: AnalyticsService,
    pub cache: ResultCache,
    pub composer: Arc<dyn InsightComposer>,
    pub config: ServerConfig,
}

impl AppState {
    /// State with a cache sized from the analytics config and the template composer
    pub fn new(analytics: AnalyticsService, config: ServerConfig) -> Self {
        let cache = ResultCache::with_config(analytics.config().cache.clone());
        Self {
            analytics,
            cache,
            composer: Arc::new(TemplateComposer::new()),
            config,
        }
    }

    pub fn with_composer(mut self, composer: Arc<dyn InsightComposer>) -> Self {
        self.composer = composer;
        self
    }
}

/// Read the tenant id, `None` when absent or blank
pub fn get_user_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Tenant for a request, optionally narrowed to one client
pub fn get_tenant(headers: &HeaderMap, client_id: Option<&str>) -> Result<Tenant, AppError> {
    let user_id = get_user_id(headers).ok_or_else(AppError::unauthorized)?;
    Ok(Tenant::new(&user_id, client_id))
}

/// Tenant middleware - rejects API requests without a tenant id
///
/// Authentication itself happens upstream; this layer only refuses requests
/// the gateway did not stamp with a user.
async fn tenant_middleware(request: Request, next: Next) -> Response {
    if get_user_id(request.headers()).is_none() {
        warn!(path = %request.uri().path(), "Rejected request without tenant header");
        return AppError::unauthorized().into_response();
    }
    next.run(request).await
}

/// Create the router
pub fn create_router(state: AppState) -> Router {
    let config = state.config.clone();
    let state = Arc::new(state);

    let tenant_routes = Router::new()
        .route("/monthly", get(handlers::get_monthly))
        .route("/categories", get(handlers::get_categories))
        .route("/forecast", get(handlers::get_forecast))
        .route("/seasonality", get(handlers::get_seasonality))
        .route("/anomalies", get(handlers::get_anomalies))
        .route("/insights", get(handlers::get_insights))
        .route("/dashboard", get(handlers::get_dashboard))
        .layer(middleware::from_fn(tenant_middleware));

    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        .merge(tenant_routes);

    // Build CORS layer
    let user_header = header::HeaderName::from_static(USER_ID_HEADER);
    let cors = if config.allowed_origins.is_empty() {
        // Restrictive default: only allow same-origin
        CorsLayer::new()
            .allow_methods([Method::GET, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, user_header])
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, user_header])
    };

    Router::new()
        .nest("/api", api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
}

/// Start the server
pub async fn serve(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    debug!(config = ?state.analytics.config(), "Analytics configuration");

    let app = create_router(state);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: format!("Missing {} header", USER_ID_HEADER),
            internal: None,
        }
    }

    /// Map a core error: bad input is the caller's fault, the rest is ours
    pub fn from_core(err: tally_core::Error) -> Self {
        match err {
            tally_core::Error::InvalidData(msg) => Self::bad_request(&msg),
            other => Self::from(other),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            // Return generic message to client
            message: "An internal error occurred".to_string(),
            // Keep full error for logging
            internal: Some(err),
        }
    }
}
