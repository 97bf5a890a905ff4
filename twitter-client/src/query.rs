use serde::{Deserialize, Serialize};
use tweetwatch_core::{CoreError, SearchConfig, SearchFilter};

pub const DEFAULT_MAX_RESULTS: u32 = 10;
pub const DEFAULT_FIELDS: &[&str] = &["created_at", "text"];

/// Page size and requested tweet fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    pub max_results: u32,
    pub fields: Vec<String>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            max_results: DEFAULT_MAX_RESULTS,
            fields: DEFAULT_FIELDS.iter().map(|f| f.to_string()).collect(),
        }
    }
}

impl From<&SearchConfig> for QueryOptions {
    fn from(config: &SearchConfig) -> Self {
        Self {
            max_results: config.max_results,
            fields: config.fields.clone(),
        }
    }
}

/// A fully built recent-search request, ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    pub since_id: Option<String>,
    pub max_results: u32,
    pub fields: Vec<String>,
}

impl SearchQuery {
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::with_capacity(4);
        params.push(("query".to_string(), self.query.clone()));
        if !self.fields.is_empty() {
            params.push(("tweet.fields".to_string(), self.fields.join(",")));
        }
        params.push(("max_results".to_string(), self.max_results.to_string()));
        if let Some(since_id) = &self.since_id {
            params.push(("since_id".to_string(), since_id.clone()));
        }
        params
    }
}

#[derive(Debug, Clone)]
pub struct QueryBuilder {
    filter: SearchFilter,
    options: QueryOptions,
}

impl QueryBuilder {
    /// Fails with a validation error when the filter has no usable keywords.
    pub fn new(filter: SearchFilter, options: QueryOptions) -> Result<Self, CoreError> {
        filter.validate()?;
        Ok(Self { filter, options })
    }

    pub fn filter(&self) -> &SearchFilter {
        &self.filter
    }

    /// Query expression, e.g. `("central bank" OR oil)(from:markets OR from:business)`.
    pub fn query_string(&self) -> String {
        let keywords: Vec<String> = self
            .filter
            .keywords
            .iter()
            .map(|k| escape_keyword(k.trim()))
            .collect();
        let mut query = format!("({})", keywords.join(" OR "));

        if !self.filter.users.is_empty() {
            let users: Vec<String> = self
                .filter
                .users
                .iter()
                .map(|u| format!("from:{}", u.trim().trim_start_matches('@')))
                .collect();
            query.push_str(&format!("({})", users.join(" OR ")));
        }

        query
    }

    pub fn build(&self, since_id: Option<&str>) -> SearchQuery {
        SearchQuery {
            query: self.query_string(),
            since_id: since_id.filter(|id| !id.is_empty()).map(str::to_string),
            max_results: self.options.max_results,
            fields: self.options.fields.clone(),
        }
    }
}

// Multi-word keywords are matched as exact phrases.
fn escape_keyword(keyword: &str) -> String {
    if keyword.chars().any(char::is_whitespace) {
        format!("\"{}\"", keyword.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        keyword.to_string()
    }
}
