// Adapters layer: concrete implementations of the domain ports for external
// systems (search index, embedding service, cache, title pages).

pub mod cache;
pub mod elasticsearch;
pub mod embedding;
pub mod titles;

pub use cache::{MemoryCache, RedisCache};
pub use elasticsearch::{ElasticsearchIndex, ElasticsearchSettings};
pub use embedding::HttpEmbedder;
pub use titles::UsptoTitleLookup;
