pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod server;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use config::ServiceConfig;
pub use core::{forecast::SCurveForecaster, search::SearchService, service::PatentAnalytics};
pub use utils::error::{Result, ScurveError};
