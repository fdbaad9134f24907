pub mod aggregate;
pub mod fit;
pub mod forecast;
pub mod ranker;
pub mod search;
pub mod service;

pub use crate::domain::model::{CodeCount, CumulativeSeries, Forecast, Record, SearchHit};
pub use crate::domain::ports::{CacheStore, Embedder, TitleLookup, VectorSearch};
pub use crate::utils::error::Result;
