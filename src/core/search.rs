use crate::domain::model::SearchHit;
use crate::domain::ports::{CacheStore, Embedder, VectorSearch};
use crate::utils::error::{Result, ScurveError};
use std::collections::HashSet;
use std::sync::Arc;

pub const DEFAULT_THRESHOLD: f64 = 0.5;
pub const DEFAULT_BATCH_SIZE: usize = 10_000;
pub const DEFAULT_NUM_CANDIDATES: usize = 10_000;
pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 600;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchSettings {
    pub default_threshold: f64,
    pub default_batch_size: usize,
    pub num_candidates: usize,
    pub cache_ttl_seconds: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            default_threshold: DEFAULT_THRESHOLD,
            default_batch_size: DEFAULT_BATCH_SIZE,
            num_candidates: DEFAULT_NUM_CANDIDATES,
            cache_ttl_seconds: DEFAULT_CACHE_TTL_SECONDS,
        }
    }
}

pub fn cache_key(query: &str) -> String {
    format!("search:{}", query)
}

/// Query → score-filtered hits, served from the cache while the entry lives.
///
/// The cache key is the raw query only: a cached entry is returned as-is for
/// any threshold or batch size until it expires.
pub struct SearchService {
    index: Arc<dyn VectorSearch>,
    embedder: Arc<dyn Embedder>,
    cache: Arc<dyn CacheStore>,
    settings: SearchSettings,
}

impl SearchService {
    pub fn new(
        index: Arc<dyn VectorSearch>,
        embedder: Arc<dyn Embedder>,
        cache: Arc<dyn CacheStore>,
        settings: SearchSettings,
    ) -> Self {
        Self {
            index,
            embedder,
            cache,
            settings,
        }
    }

    pub async fn search(
        &self,
        query: &str,
        threshold: Option<f64>,
        batch_size: Option<usize>,
    ) -> Result<Vec<SearchHit>> {
        if query.trim().is_empty() {
            return Err(ScurveError::invalid_request("search_query cannot be empty"));
        }
        let threshold = threshold.unwrap_or(self.settings.default_threshold);
        let batch_size = batch_size.unwrap_or(self.settings.default_batch_size);
        if batch_size == 0 {
            return Err(ScurveError::invalid_request("batch_size must be at least 1"));
        }

        let key = cache_key(query);
        if let Some(cached) = self.cache.get(&key).await? {
            tracing::debug!("Cache hit for {}", key);
            return Ok(serde_json::from_str(&cached)?);
        }
        tracing::debug!("Cache miss for {}", key);

        let vector = self.embedder.encode(query).await?;
        self.index.ping().await?;

        // the engine rejects k > num_candidates
        let num_candidates = self.settings.num_candidates.max(batch_size);
        let hits = self.index.knn(&vector, batch_size, num_candidates).await?;
        let received = hits.len();
        let filtered = filter_hits(hits, threshold);

        tracing::info!(
            "Search '{}' returned {} hits, {} kept at threshold {}",
            query,
            received,
            filtered.len(),
            threshold
        );

        self.cache
            .set(
                &key,
                &serde_json::to_string(&filtered)?,
                self.settings.cache_ttl_seconds,
            )
            .await?;

        Ok(filtered)
    }
}

/// Drops hits scoring below `threshold` and repeated document ids (the
/// first occurrence wins).
pub fn filter_hits(hits: Vec<SearchHit>, threshold: f64) -> Vec<SearchHit> {
    let mut seen = HashSet::new();
    hits.into_iter()
        .filter(|hit| hit.score >= threshold)
        .filter(|hit| hit.id.is_empty() || seen.insert(hit.id.clone()))
        .collect()
}
