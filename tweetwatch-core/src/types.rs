use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::CoreError;

/// Keyword and author filter for one subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilter {
    pub keywords: Vec<String>,
    #[serde(default)]
    pub users: Vec<String>,
}

impl SearchFilter {
    pub fn new(keywords: Vec<String>, users: Vec<String>) -> Self {
        Self { keywords, users }
    }

    /// Parses a comma separated keyword list such as `"oil, gold , central bank"`.
    /// Terms are trimmed and blank terms dropped.
    pub fn from_comma_separated(keywords: &str, users: Vec<String>) -> Self {
        let keywords = keywords
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect();
        Self { keywords, users }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.keywords.is_empty() {
            return Err(CoreError::validation("at least one keyword is required"));
        }
        if self.keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(CoreError::validation("keywords must not be blank"));
        }
        if self.users.iter().any(|u| u.trim().is_empty()) {
            return Err(CoreError::validation("users must not be blank"));
        }
        Ok(())
    }
}

/// A single post returned by the search API, flattened to string fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, Value>",
    into = "BTreeMap<String, String>"
)]
pub struct Record {
    fields: BTreeMap<String, String>,
}

impl Record {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// Post text, if present and non-empty.
    pub fn text(&self) -> Option<&str> {
        self.get("text").filter(|t| !t.is_empty())
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }
}

impl From<BTreeMap<String, Value>> for Record {
    fn from(raw: BTreeMap<String, Value>) -> Self {
        let fields = raw
            .into_iter()
            .filter_map(|(key, value)| match value {
                Value::String(s) => Some((key, s)),
                Value::Number(n) => Some((key, n.to_string())),
                Value::Bool(b) => Some((key, b.to_string())),
                // arrays and objects (e.g. edit_history_tweet_ids) are not part of the record
                _ => None,
            })
            .collect();
        Self { fields }
    }
}

impl From<BTreeMap<String, String>> for Record {
    fn from(fields: BTreeMap<String, String>) -> Self {
        Self { fields }
    }
}

impl From<Record> for BTreeMap<String, String> {
    fn from(record: Record) -> Self {
        record.fields
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchMeta {
    #[serde(default)]
    pub newest_id: Option<String>,
    #[serde(default)]
    pub oldest_id: Option<String>,
    #[serde(default)]
    pub result_count: u32,
    #[serde(default)]
    pub next_token: Option<String>,
}

/// One page of search results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub data: Vec<Record>,
    #[serde(default)]
    pub meta: SearchMeta,
}

impl SearchResult {
    /// Newest id in this page, ignoring empty strings.
    pub fn newest_id(&self) -> Option<&str> {
        self.meta.newest_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Texts of records carrying a non-empty `text` field, in response order.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.data.iter().filter_map(Record::text)
    }
}

/// Orders two cursor values. Numeric ids compare numerically, anything else
/// falls back to byte-wise comparison.
pub fn compare_cursors(a: &str, b: &str) -> Ordering {
    match (a.parse::<u128>(), b.parse::<u128>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}
