use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScurveError {
    #[error("Backend request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Cache backend error: {0}")]
    CacheError(#[from] redis::RedisError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Connection failure: {message}")]
    ConnectionFailure { message: String },

    #[error("{message}")]
    NotFound { message: String },

    #[error("Not enough data points for logistic curve fitting: got {points}, need at least {required}")]
    InsufficientData { points: usize, required: usize },

    #[error("Logistic fit did not converge: {message}")]
    FitDivergence { message: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid configuration value for {field} ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Backend,
    MissingData,
    Client,
    Fit,
    Configuration,
}

impl ScurveError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ScurveError::HttpError(_)
            | ScurveError::CacheError(_)
            | ScurveError::IoError(_)
            | ScurveError::SerializationError(_)
            | ScurveError::ConnectionFailure { .. } => ErrorCategory::Backend,
            ScurveError::NotFound { .. } => ErrorCategory::MissingData,
            ScurveError::InsufficientData { .. } | ScurveError::InvalidRequest { .. } => {
                ErrorCategory::Client
            }
            ScurveError::FitDivergence { .. } => ErrorCategory::Fit,
            ScurveError::ConfigError { .. } | ScurveError::InvalidConfigValueError { .. } => {
                ErrorCategory::Configuration
            }
        }
    }

    /// HTTP status the error maps to when it reaches a handler.
    pub fn status_code(&self) -> u16 {
        match self.category() {
            ErrorCategory::MissingData => 404,
            ErrorCategory::Client => 400,
            ErrorCategory::Backend | ErrorCategory::Fit | ErrorCategory::Configuration => 500,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ScurveError::NotFound {
            message: message.into(),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        ScurveError::ConnectionFailure {
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        ScurveError::InvalidRequest {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScurveError>;
