use crate::error::*;
use tracing::{error, info, warn};

pub trait ErrorExt {
    fn log_error(&self) -> &Self;
    fn log_warn(&self) -> &Self;
    fn user_friendly_message(&self) -> String;
    fn error_code(&self) -> String;
}

impl ErrorExt for CoreError {
    fn log_error(&self) -> &Self {
        error!("CoreError: {}", self);
        match self {
            CoreError::SearchApi(e) => {
                error!("Search API error details: {:?}", e);
            }
            CoreError::Cache(e) => {
                error!("Cache error details: {:?}", e);
            }
            CoreError::Notify(e) => {
                error!("Notification error details: {:?}", e);
            }
            CoreError::Config(e) => {
                error!("Configuration error details: {:?}", e);
            }
            _ => {}
        }
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("CoreError (warning): {}", self);
        self
    }

    fn user_friendly_message(&self) -> String {
        match self {
            CoreError::SearchApi(e) => e.user_friendly_message(),
            CoreError::Cache(e) => e.user_friendly_message(),
            CoreError::Notify(e) => e.user_friendly_message(),
            CoreError::Config(e) => e.user_friendly_message(),
            CoreError::Network(_) => {
                "Network connection error. Please check your internet connection.".to_string()
            }
            CoreError::Validation { message } => {
                format!("Invalid search filter: {}", message)
            }
            CoreError::AlreadyRunning => {
                "A subscription is already running. Stop it before starting a new one."
                    .to_string()
            }
            CoreError::NotRunning => "There is no running subscription to stop.".to_string(),
            _ => "An unexpected error occurred. Please try again later.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            CoreError::SearchApi(e) if e.is_auth() => "AUTH".to_string(),
            CoreError::SearchApi(_) => "TRANSPORT".to_string(),
            CoreError::Cache(_) => "CACHE_IO".to_string(),
            CoreError::Notify(_) => "NOTIFY".to_string(),
            CoreError::Config(_) => "CONFIG".to_string(),
            CoreError::Io(_) => "IO".to_string(),
            CoreError::Serialization(_) => "SERIALIZATION".to_string(),
            CoreError::Network(_) => "TRANSPORT".to_string(),
            CoreError::Validation { .. } => "VALIDATION".to_string(),
            CoreError::AlreadyRunning => "ALREADY_RUNNING".to_string(),
            CoreError::NotRunning => "NOT_RUNNING".to_string(),
        }
    }
}

impl ErrorExt for SearchApiError {
    fn log_error(&self) -> &Self {
        error!("SearchApiError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("SearchApiError (warning): {}", self);
        self
    }

    fn user_friendly_message(&self) -> String {
        match self {
            SearchApiError::MissingBearerToken { var_name } => format!(
                "Unable to query the search API. {} env variable not set.",
                var_name
            ),
            SearchApiError::InvalidToken => {
                "Search API bearer token is invalid. Please check your credentials.".to_string()
            }
            SearchApiError::Forbidden { resource } => {
                format!("Access denied to {}.", resource)
            }
            SearchApiError::RateLimitExceeded { retry_after } => format!(
                "Too many requests. The search API asked to wait {} seconds.",
                retry_after
            ),
            SearchApiError::RequestTimeout => {
                "Request to the search API timed out.".to_string()
            }
            _ => "Search API error occurred. Polling will try again on the next tick.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            SearchApiError::MissingBearerToken { .. } => "SEARCH_MISSING_TOKEN".to_string(),
            SearchApiError::InvalidToken => "SEARCH_INVALID_TOKEN".to_string(),
            SearchApiError::Forbidden { .. } => "SEARCH_FORBIDDEN".to_string(),
            SearchApiError::RateLimitExceeded { .. } => "SEARCH_RATE_LIMIT".to_string(),
            SearchApiError::RequestTimeout => "SEARCH_TIMEOUT".to_string(),
            SearchApiError::InvalidResponse { .. } => "SEARCH_INVALID_RESPONSE".to_string(),
            SearchApiError::ServerError { .. } => "SEARCH_SERVER_ERROR".to_string(),
            SearchApiError::RequestFailed { .. } => "SEARCH_REQUEST_FAILED".to_string(),
        }
    }
}

impl ErrorExt for CacheError {
    fn log_error(&self) -> &Self {
        error!("CacheError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("CacheError (warning): {}", self);
        self
    }

    fn user_friendly_message(&self) -> String {
        match self {
            CacheError::HomeDirUnavailable => {
                "Could not locate the home directory for the local cache.".to_string()
            }
            CacheError::DirectoryCreateFailed { path, .. } => {
                format!("Could not create cache directory {}.", path)
            }
            CacheError::CorruptValue { key } => {
                format!("Cached value for '{}' is unreadable.", key)
            }
            _ => "Local cache error occurred. Cached state is treated as absent.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            CacheError::HomeDirUnavailable => "CACHE_NO_HOME".to_string(),
            CacheError::DirectoryCreateFailed { .. } => "CACHE_DIR_CREATE_FAILED".to_string(),
            CacheError::OpenFailed { .. } => "CACHE_OPEN_FAILED".to_string(),
            CacheError::CorruptValue { .. } => "CACHE_CORRUPT_VALUE".to_string(),
            CacheError::Sql(_) => "CACHE_SQL_ERROR".to_string(),
        }
    }
}

impl ErrorExt for NotifyError {
    fn log_error(&self) -> &Self {
        error!("NotifyError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("NotifyError (warning): {}", self);
        self
    }

    fn user_friendly_message(&self) -> String {
        match self {
            NotifyError::DeliveryFailed { sink, .. } => {
                format!("Could not reach {}. The message was dropped.", sink)
            }
            NotifyError::Rejected { sink, reason } => {
                format!("{} refused the message: {}", sink, reason)
            }
        }
    }

    fn error_code(&self) -> String {
        match self {
            NotifyError::DeliveryFailed { .. } => "NOTIFY_DELIVERY_FAILED".to_string(),
            NotifyError::Rejected { .. } => "NOTIFY_REJECTED".to_string(),
        }
    }
}

impl ErrorExt for ConfigError {
    fn log_error(&self) -> &Self {
        error!("ConfigError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("ConfigError (warning): {}", self);
        self
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ConfigError::FileNotFound { path } => {
                format!("Configuration file {} not found.", path)
            }
            ConfigError::InvalidValue { field, .. } => {
                format!("Invalid value for configuration field '{}'.", field)
            }
            ConfigError::MissingEnvironmentVariable { var_name } => format!(
                "Environment variable '{}' is required but not set.",
                var_name
            ),
            ConfigError::ValidationFailed { reason } => {
                format!("Configuration is invalid: {}", reason)
            }
            ConfigError::Parse(_) => {
                "Configuration file format is invalid. Please check the settings.".to_string()
            }
        }
    }

    fn error_code(&self) -> String {
        match self {
            ConfigError::FileNotFound { .. } => "CONFIG_FILE_NOT_FOUND".to_string(),
            ConfigError::InvalidValue { .. } => "CONFIG_INVALID_VALUE".to_string(),
            ConfigError::MissingEnvironmentVariable { .. } => "CONFIG_MISSING_ENV_VAR".to_string(),
            ConfigError::ValidationFailed { .. } => "CONFIG_VALIDATION_FAILED".to_string(),
            ConfigError::Parse(_) => "CONFIG_PARSE_ERROR".to_string(),
        }
    }
}

pub struct ErrorReporter {
    report_errors: bool,
    report_warnings: bool,
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self {
            report_errors: true,
            report_warnings: true,
        }
    }

    pub fn with_error_reporting(mut self, enabled: bool) -> Self {
        self.report_errors = enabled;
        self
    }

    pub fn with_warning_reporting(mut self, enabled: bool) -> Self {
        self.report_warnings = enabled;
        self
    }

    pub fn report_error(&self, error: &CoreError) {
        if self.report_errors {
            error.log_error();
            info!("Error code: {}", error.error_code());
            info!("User message: {}", error.user_friendly_message());
        }
    }

    pub fn report_warning(&self, error: &CoreError) {
        if self.report_warnings {
            error.log_warn();
        }
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new()
    }
}
