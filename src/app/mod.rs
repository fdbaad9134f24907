// Application wiring: builds the concrete collaborators named in the
// configuration and injects them into the analytics service.

use crate::adapters::{
    ElasticsearchIndex, HttpEmbedder, MemoryCache, RedisCache, UsptoTitleLookup,
};
use crate::config::{CacheBackend, ServiceConfig};
use crate::core::forecast::SCurveForecaster;
use crate::core::search::SearchService;
use crate::core::service::PatentAnalytics;
use crate::domain::ports::CacheStore;
use crate::server::{build_router, AppState};
use crate::utils::error::Result;
use axum::Router;
use std::sync::Arc;

pub async fn build_analytics(config: &ServiceConfig) -> Result<PatentAnalytics> {
    let index = Arc::new(ElasticsearchIndex::new(config.elasticsearch_settings())?);
    let embedder = Arc::new(HttpEmbedder::new(
        config.embedding.endpoint.clone(),
        config.embedding.model.clone(),
        config.embedding.timeout_seconds,
    )?);

    let cache: Arc<dyn CacheStore> = match config.cache.backend {
        CacheBackend::Redis => Arc::new(RedisCache::connect(&config.cache.redis_url).await?),
        CacheBackend::Memory => {
            tracing::warn!("Using in-process cache; entries are not shared between instances");
            Arc::new(MemoryCache::new())
        }
    };

    let titles = Arc::new(UsptoTitleLookup::new(
        config.titles.url_template.clone(),
        config.titles.timeout_seconds,
    )?);

    let search = SearchService::new(index, embedder, cache, config.search_settings());
    let forecaster = SCurveForecaster::with_max_evaluations(config.forecast.max_evaluations);

    Ok(PatentAnalytics::new(search, forecaster, titles))
}

pub async fn build_app(config: &ServiceConfig) -> Result<Router> {
    let analytics = build_analytics(config).await?;
    let state = AppState {
        analytics: Arc::new(analytics),
        default_future_years: config.forecast.default_future_years,
    };
    Ok(build_router(Arc::new(state)))
}
