pub mod extract;
pub mod handlers;
pub mod middleware;

use crate::core::forecast::DEFAULT_FUTURE_YEARS;
use crate::core::service::PatentAnalytics;
use crate::utils::error::{ErrorCategory, Result, ScurveError};
use axum::{
    http::StatusCode,
    middleware as axum_mw,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Shared application state.
pub struct AppState {
    pub analytics: Arc<PatentAnalytics>,
    pub default_future_years: usize,
}

impl AppState {
    pub fn new(analytics: Arc<PatentAnalytics>) -> Self {
        Self {
            analytics,
            default_future_years: DEFAULT_FUTURE_YEARS,
        }
    }
}

impl IntoResponse for ScurveError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        match self.category() {
            ErrorCategory::MissingData | ErrorCategory::Client => {
                tracing::warn!(status = status.as_u16(), "Request rejected: {}", self)
            }
            _ => tracing::error!(status = status.as_u16(), "Request failed: {}", self),
        }

        (status, Json(serde_json::json!({ "detail": self.to_string() }))).into_response()
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/search", get(handlers::search))
        .route("/top-cpc-codes", get(handlers::top_cpc_codes))
        .route("/yearly-cumulative-data", get(handlers::yearly_cumulative_data))
        .route(
            "/yearly-data-for-top-cpc-codes",
            get(handlers::yearly_data_for_top_cpc_codes),
        )
        .route("/predict-s-curve", get(handlers::predict_s_curve))
        // CPC codes contain '/', so the title route takes the rest of the path
        .route("/cpc-title/{*cpc_code}", get(handlers::cpc_title))
        .route("/health", get(handlers::health))
        .layer(axum_mw::from_fn(middleware::cors_middleware))
        .with_state(state)
}

pub async fn serve(router: Router, bind: &str) -> Result<()> {
    let listener = TcpListener::bind(bind).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
