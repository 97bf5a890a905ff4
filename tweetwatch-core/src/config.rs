//! TOML configuration for the poller.
//!
//! Every section has defaults, so an empty file (or no file at all) yields a
//! working configuration pointed at the public search endpoint.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{ConfigError, SearchFilter};

pub const CONFIG_PATH_ENV: &str = "TWEETWATCH_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub search: SearchConfig,
    pub api: ApiConfig,
    pub cache: CacheConfig,
    pub notifier: NotifierConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub keywords: Vec<String>,
    pub users: Vec<String>,
    pub interval_secs: u64,
    pub max_results: u32,
    pub fields: Vec<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            keywords: Vec::new(),
            users: Vec::new(),
            interval_secs: 180,
            max_results: 10,
            fields: vec!["created_at".to_string(), "text".to_string()],
        }
    }
}

impl SearchConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn filter(&self) -> SearchFilter {
        SearchFilter::new(self.keywords.clone(), self.users.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub endpoint: String,
    pub bearer_token_env: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.twitter.com".to_string(),
            endpoint: "/2/tweets/search/recent".to_string(),
            bearer_token_env: "TWITTER_BEARER_TOKEN".to_string(),
            timeout_secs: 30,
            user_agent: concat!("tweetwatch/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding the store. Defaults to `<home>/AppData/tweet`.
    pub dir: Option<PathBuf>,
    pub file_name: String,
    pub busy_timeout_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            file_name: "tweet.db".to_string(),
            busy_timeout_ms: 1000,
        }
    }
}

impl CacheConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

/// Downstream target for matching posts, selected by `kind`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotifierConfig {
    #[default]
    None,
    Slack {
        channel_id: String,
        #[serde(default)]
        attachment: Option<SlackAttachment>,
    },
    Desktop {
        #[serde(default = "default_desktop_summary")]
        summary: String,
        #[serde(default)]
        timeout_ms: Option<u32>,
    },
}

fn default_desktop_summary() -> String {
    "New matching tweet".to_string()
}

impl NotifierConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            NotifierConfig::None => "none",
            NotifierConfig::Slack { .. } => "slack",
            NotifierConfig::Desktop { .. } => "desktop",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlackAttachment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pretext: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl AppConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;
        Self::from_toml_str(&raw)
    }

    /// Loads the file named by `TWEETWATCH_CONFIG`, or defaults when unset.
    pub fn load_from_env() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_PATH_ENV) {
            Some(path) => {
                tracing::info!("Loading configuration from {:?}", path);
                Self::load(Path::new(&path))
            }
            None => {
                tracing::info!("{} not set, using default configuration", CONFIG_PATH_ENV);
                Ok(Self::default())
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.search.interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "search.interval_secs".to_string(),
                value: "0".to_string(),
            });
        }
        // recent search accepts 10..=100 results per page
        if !(10..=100).contains(&self.search.max_results) {
            return Err(ConfigError::InvalidValue {
                field: "search.max_results".to_string(),
                value: self.search.max_results.to_string(),
            });
        }
        if self.api.bearer_token_env.is_empty() {
            return Err(ConfigError::ValidationFailed {
                reason: "api.bearer_token_env must name an environment variable".to_string(),
            });
        }
        if let NotifierConfig::Slack { channel_id, .. } = &self.notifier {
            if channel_id.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "notifier.channel_id".to_string(),
                    value: channel_id.clone(),
                });
            }
        }
        Ok(())
    }
}
