use crate::domain::model::SearchHit;
use crate::utils::error::Result;
use async_trait::async_trait;

/// Nearest-neighbour search over the patent vector index.
#[async_trait]
pub trait VectorSearch: Send + Sync {
    /// Returns up to `k` hits drawn from `num_candidates` candidates.
    async fn knn(&self, vector: &[f32], k: usize, num_candidates: usize) -> Result<Vec<SearchHit>>;

    /// Connectivity check before a search is issued.
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn encode(&self, text: &str) -> Result<Vec<f32>>;
}

/// Key/value store with per-key expiry.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()>;
}

/// Best-effort CPC title lookup. Implementations never fail; they return a
/// placeholder string instead.
#[async_trait]
pub trait TitleLookup: Send + Sync {
    async fn title(&self, code: &str) -> String;
}
