use crate::domain::model::{CodeCount, CumulativeSeries, Forecast, SearchHit, TopCodeSeries};
use crate::server::extract::ApiQuery;
use crate::server::AppState;
use crate::utils::error::Result;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub search_query: String,
    pub threshold: Option<f64>,
    pub batch_size: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct QueryParams {
    pub search_query: String,
}

#[derive(Debug, Deserialize)]
pub struct CodeQueryParams {
    pub cpc_code: String,
    pub search_query: String,
}

#[derive(Debug, Deserialize)]
pub struct PredictParams {
    pub cpc_code: String,
    pub search_query: String,
    pub future_years: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct YearlyCumulativeResponse {
    pub cpc_code: String,
    pub cumulative_years: CumulativeSeries,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TitleResponse {
    pub cpc_code: String,
    pub title: String,
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<SearchParams>,
) -> Result<Json<Vec<SearchHit>>> {
    let hits = state
        .analytics
        .search(&params.search_query, params.threshold, params.batch_size)
        .await?;
    Ok(Json(hits))
}

pub async fn top_cpc_codes(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<QueryParams>,
) -> Result<Json<Vec<CodeCount>>> {
    let top = state.analytics.top_codes(&params.search_query).await?;
    Ok(Json(top))
}

pub async fn yearly_cumulative_data(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<CodeQueryParams>,
) -> Result<Json<YearlyCumulativeResponse>> {
    let series = state
        .analytics
        .yearly_cumulative(&params.cpc_code, &params.search_query)
        .await?;
    Ok(Json(YearlyCumulativeResponse {
        cpc_code: params.cpc_code,
        cumulative_years: series,
    }))
}

pub async fn yearly_data_for_top_cpc_codes(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<QueryParams>,
) -> Result<Json<TopCodeSeries>> {
    let yearly = state
        .analytics
        .yearly_for_top_codes(&params.search_query)
        .await?;
    Ok(Json(yearly))
}

pub async fn predict_s_curve(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<PredictParams>,
) -> Result<Json<Forecast>> {
    let future_years = params.future_years.unwrap_or(state.default_future_years);
    tracing::info!(
        cpc_code = %params.cpc_code,
        search_query = %params.search_query,
        future_years,
        "S-curve prediction requested"
    );

    let forecast = state
        .analytics
        .predict_saturation(&params.cpc_code, &params.search_query, future_years)
        .await?;
    Ok(Json(forecast))
}

/// Never fails: lookup problems come back as a placeholder title.
pub async fn cpc_title(
    State(state): State<Arc<AppState>>,
    Path(cpc_code): Path<String>,
) -> Json<TitleResponse> {
    let title = state.analytics.classification_title(&cpc_code).await;
    Json(TitleResponse { cpc_code, title })
}

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok", "service": "patent-scurve"}))
}
