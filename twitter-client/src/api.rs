use crate::query::SearchQuery;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tweetwatch_core::{ApiConfig, CoreError, SearchApiError, SearchResult};
use url::Url;

/// Anything that can execute a recent-search query.
#[async_trait]
pub trait SearchTransport: Send + Sync {
    async fn fetch(&self, query: &SearchQuery) -> Result<SearchResult, CoreError>;
}

/// Where the bearer token comes from.
#[derive(Debug, Clone)]
pub enum TokenSource {
    /// Read from the named environment variable on every request.
    Env(String),
    Static(String),
}

impl TokenSource {
    fn resolve(&self) -> Result<String, SearchApiError> {
        match self {
            TokenSource::Static(token) => Ok(token.clone()),
            TokenSource::Env(var_name) => match std::env::var(var_name) {
                Ok(token) if !token.is_empty() => Ok(token),
                _ => Err(SearchApiError::MissingBearerToken {
                    var_name: var_name.clone(),
                }),
            },
        }
    }
}

#[derive(Debug)]
pub struct SearchApiClient {
    http_client: Client,
    search_url: Url,
    token: TokenSource,
}

impl SearchApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self, CoreError> {
        Self::with_token_source(config, TokenSource::Env(config.bearer_token_env.clone()))
    }

    pub fn with_token_source(config: &ApiConfig, token: TokenSource) -> Result<Self, CoreError> {
        let search_url = Url::parse(&config.base_url)
            .and_then(|base| base.join(&config.endpoint))
            .map_err(|e| {
                CoreError::Config(tweetwatch_core::ConfigError::InvalidValue {
                    field: "api.base_url".to_string(),
                    value: format!("{}{} ({})", config.base_url, config.endpoint, e),
                })
            })?;

        let http_client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            http_client,
            search_url,
            token,
        })
    }

    pub fn search_url(&self) -> &Url {
        &self.search_url
    }

    async fn send(&self, query: &SearchQuery) -> Result<Response, CoreError> {
        let token = self.token.resolve().map_err(|e| {
            error!("Unable to query search API: {}", e);
            CoreError::SearchApi(e)
        })?;

        let params = query.to_params();
        let request = self
            .http_client
            .get(self.search_url.clone())
            .bearer_auth(token)
            .query(&params);

        info!(
            "Sending search request: query={} since_id={:?}",
            query.query, query.since_id
        );
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                error!("Network error for {}: {}", self.search_url, e);
                if e.is_timeout() {
                    return Err(CoreError::SearchApi(SearchApiError::RequestTimeout));
                }
                return Err(CoreError::Network(e));
            }
        };

        let status = response.status();
        if status.is_success() {
            debug!("Request successful: {}", status);
            return Ok(response);
        }

        error!("Search request failed with status: {}", status);
        let err = match status {
            StatusCode::UNAUTHORIZED => SearchApiError::InvalidToken,
            StatusCode::FORBIDDEN => SearchApiError::Forbidden {
                resource: self.search_url.path().to_string(),
            },
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                warn!("Rate limited, retry after {} seconds", retry_after);
                SearchApiError::RateLimitExceeded { retry_after }
            }
            s if s.is_server_error() => SearchApiError::ServerError {
                status_code: s.as_u16(),
            },
            s => {
                let message = response.text().await.unwrap_or_default();
                SearchApiError::RequestFailed {
                    status_code: s.as_u16(),
                    message,
                }
            }
        };
        Err(CoreError::SearchApi(err))
    }
}

#[async_trait]
impl SearchTransport for SearchApiClient {
    async fn fetch(&self, query: &SearchQuery) -> Result<SearchResult, CoreError> {
        let start_time = Instant::now();
        let response = self.send(query).await?;

        let result: SearchResult = response.json().await.map_err(|e| {
            error!("Failed to parse search response: {}", e);
            CoreError::SearchApi(SearchApiError::InvalidResponse {
                details: e.to_string(),
            })
        })?;

        info!(
            "Retrieved {} tweets (newest_id={:?}) in {:?}",
            result.data.len(),
            result.meta.newest_id,
            start_time.elapsed()
        );
        Ok(result)
    }
}
