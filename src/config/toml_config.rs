use crate::adapters::elasticsearch::ElasticsearchSettings;
use crate::adapters::titles::DEFAULT_URL_TEMPLATE;
use crate::core::fit::DEFAULT_MAX_EVALUATIONS;
use crate::core::forecast::{DEFAULT_FUTURE_YEARS, MAX_FUTURE_YEARS};
use crate::core::search::{
    SearchSettings, DEFAULT_BATCH_SIZE, DEFAULT_CACHE_TTL_SECONDS, DEFAULT_NUM_CANDIDATES,
    DEFAULT_THRESHOLD,
};
use crate::utils::error::{Result, ScurveError};
use crate::utils::logger::LogFormat;
use crate::utils::validation::{
    validate_non_empty_string, validate_positive_number, validate_range, validate_redis_url,
    validate_url, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub elasticsearch: ElasticsearchConfig,
    pub cache: CacheConfig,
    pub embedding: EmbeddingConfig,
    pub search: SearchConfig,
    pub forecast: ForecastConfig,
    pub titles: TitlesConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ElasticsearchConfig {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub index: String,
    pub vector_field: String,
    pub num_candidates: usize,
    pub verify_certs: bool,
    pub timeout_seconds: u64,
}

impl Default for ElasticsearchConfig {
    fn default() -> Self {
        let defaults = ElasticsearchSettings::default();
        Self {
            url: defaults.url,
            username: None,
            password: None,
            index: defaults.index,
            vector_field: defaults.vector_field,
            num_candidates: DEFAULT_NUM_CANDIDATES,
            verify_certs: false,
            timeout_seconds: defaults.timeout_seconds,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Redis,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    pub redis_url: String,
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Redis,
            redis_url: "redis://127.0.0.1:6379/0".to_string(),
            ttl_seconds: DEFAULT_CACHE_TTL_SECONDS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub endpoint: String,
    pub model: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080/embed".to_string(),
            model: Some("all-mpnet-base-v2".to_string()),
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub default_threshold: f64,
    pub default_batch_size: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_threshold: DEFAULT_THRESHOLD,
            default_batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub default_future_years: usize,
    pub max_evaluations: usize,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            default_future_years: DEFAULT_FUTURE_YEARS,
            max_evaluations: DEFAULT_MAX_EVALUATIONS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TitlesConfig {
    pub url_template: String,
    pub timeout_seconds: u64,
}

impl Default for TitlesConfig {
    fn default() -> Self {
        Self {
            url_template: DEFAULT_URL_TEMPLATE.to_string(),
            timeout_seconds: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: "compact".to_string(),
        }
    }
}

impl ServiceConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ScurveError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the environment value; unknown variables are
    /// left untouched.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ScurveError::ConfigError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// Builds a configuration from the environment variables used by earlier
    /// deployments of the service (`ELASTICSEARCH_URL`, `REDIS_HOST`, ...).
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(url) = env::var("ELASTICSEARCH_URL") {
            config.elasticsearch.url = url;
        }
        config.elasticsearch.username = env::var("ELASTICSEARCH_USER").ok();
        config.elasticsearch.password = env::var("ELASTICSEARCH_PASSWORD").ok();
        if let Ok(index) = env::var("ELASTICSEARCH_INDEX") {
            config.elasticsearch.index = index;
        }

        if let Ok(host) = env::var("REDIS_HOST") {
            let port = parse_env("REDIS_PORT", 6379u16)?;
            let db = parse_env("REDIS_DB", 0u32)?;
            config.cache.redis_url = format!("redis://{}:{}/{}", host, port, db);
        }

        if let Ok(endpoint) = env::var("EMBEDDING_URL") {
            config.embedding.endpoint = endpoint;
        }
        if let Ok(bind) = env::var("BIND_ADDRESS") {
            config.server.bind = bind;
        }

        Ok(config)
    }

    pub fn log_format(&self) -> LogFormat {
        LogFormat::parse(&self.logging.format).unwrap_or_default()
    }

    pub fn search_settings(&self) -> SearchSettings {
        SearchSettings {
            default_threshold: self.search.default_threshold,
            default_batch_size: self.search.default_batch_size,
            num_candidates: self.elasticsearch.num_candidates,
            cache_ttl_seconds: self.cache.ttl_seconds,
        }
    }

    pub fn elasticsearch_settings(&self) -> ElasticsearchSettings {
        ElasticsearchSettings {
            url: self.elasticsearch.url.clone(),
            username: self.elasticsearch.username.clone(),
            password: self.elasticsearch.password.clone(),
            index: self.elasticsearch.index.clone(),
            vector_field: self.elasticsearch.vector_field.clone(),
            verify_certs: self.elasticsearch.verify_certs,
            timeout_seconds: self.elasticsearch.timeout_seconds,
            ..ElasticsearchSettings::default()
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw.parse().map_err(|_| ScurveError::InvalidConfigValueError {
            field: name.to_string(),
            value: raw.clone(),
            reason: "not a valid number".to_string(),
        }),
        Err(_) => Ok(default),
    }
}

impl Validate for ServiceConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("server.bind", &self.server.bind)?;
        validate_url("elasticsearch.url", &self.elasticsearch.url)?;
        validate_non_empty_string("elasticsearch.index", &self.elasticsearch.index)?;
        validate_non_empty_string("elasticsearch.vector_field", &self.elasticsearch.vector_field)?;
        validate_positive_number("elasticsearch.num_candidates", self.elasticsearch.num_candidates, 1)?;

        if self.cache.backend == CacheBackend::Redis {
            validate_redis_url("cache.redis_url", &self.cache.redis_url)?;
        }
        validate_url("embedding.endpoint", &self.embedding.endpoint)?;

        validate_range("search.default_threshold", self.search.default_threshold, 0.0, 1.0)?;
        validate_positive_number("search.default_batch_size", self.search.default_batch_size, 1)?;

        validate_range(
            "forecast.default_future_years",
            self.forecast.default_future_years,
            1,
            MAX_FUTURE_YEARS,
        )?;
        validate_positive_number("forecast.max_evaluations", self.forecast.max_evaluations, 1)?;

        if LogFormat::parse(&self.logging.format).is_none() {
            return Err(ScurveError::InvalidConfigValueError {
                field: "logging.format".to_string(),
                value: self.logging.format.clone(),
                reason: "Valid formats: compact, json".to_string(),
            });
        }

        Ok(())
    }
}
