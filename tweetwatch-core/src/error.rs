use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Search API error: {0}")]
    SearchApi(#[from] SearchApiError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid search filter: {message}")]
    Validation { message: String },

    #[error("Polling is already running")]
    AlreadyRunning,

    #[error("Polling is not running")]
    NotRunning,
}

impl CoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        CoreError::Validation {
            message: message.into(),
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum SearchApiError {
    #[error("Bearer token not set: {var_name}")]
    MissingBearerToken { var_name: String },

    #[error("Invalid bearer token")]
    InvalidToken,

    #[error("Forbidden access to resource: {resource}")]
    Forbidden { resource: String },

    #[error("Rate limit exceeded. Retry after {retry_after} seconds")]
    RateLimitExceeded { retry_after: u64 },

    #[error("Request timeout")]
    RequestTimeout,

    #[error("Invalid API response: {details}")]
    InvalidResponse { details: String },

    #[error("Server error: {status_code}")]
    ServerError { status_code: u16 },

    #[error("Request failed with status {status_code}: {message}")]
    RequestFailed { status_code: u16, message: String },
}

impl SearchApiError {
    /// Authentication problems, as opposed to transport failures.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            SearchApiError::MissingBearerToken { .. }
                | SearchApiError::InvalidToken
                | SearchApiError::Forbidden { .. }
        )
    }
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Home directory could not be resolved")]
    HomeDirUnavailable,

    #[error("Failed to create cache directory {path}: {reason}")]
    DirectoryCreateFailed { path: String, reason: String },

    #[error("Failed to open cache store {path}: {reason}")]
    OpenFailed { path: String, reason: String },

    #[error("Corrupt value for key {key}")]
    CorruptValue { key: String },

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Delivery to {sink} failed: {reason}")]
    DeliveryFailed { sink: String, reason: String },

    #[error("{sink} rejected the message: {reason}")]
    Rejected { sink: String, reason: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Environment variable not set: {var_name}")]
    MissingEnvironmentVariable { var_name: String },

    #[error("Configuration validation failed: {reason}")]
    ValidationFailed { reason: String },

    #[error("Configuration parsing error: {0}")]
    Parse(#[from] toml::de::Error),
}
