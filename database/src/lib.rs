//! Small persistent key/value cache backed by a SQLite file.
//!
//! Every operation opens the store, runs in its own transaction and closes the
//! connection again, so no handle outlives a call.

use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Connection, SqliteConnection};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use tweetwatch_core::{compare_cursors, CacheConfig, CacheError, CoreError};

#[cfg(test)]
mod tests;

const META_BUCKET: &str = "meta";
const SEARCH_TERMS_KEY: &str = "keywords";
const CURSOR_KEY: &str = "newest";

#[derive(Debug, Clone)]
pub struct KeyValueCache {
    dir: PathBuf,
    file_name: String,
    busy_timeout: Duration,
}

impl KeyValueCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let defaults = CacheConfig::default();
        Self {
            dir: dir.into(),
            busy_timeout: defaults.busy_timeout(),
            file_name: defaults.file_name,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Result<Self, CoreError> {
        let dir = match &config.dir {
            Some(dir) => dir.clone(),
            None => Self::default_dir()?,
        };
        Ok(Self {
            dir,
            file_name: config.file_name.clone(),
            busy_timeout: config.busy_timeout(),
        })
    }

    /// `<home>/AppData/tweet`
    pub fn default_dir() -> Result<PathBuf, CoreError> {
        let home = dirs::home_dir().ok_or(CacheError::HomeDirUnavailable)?;
        Ok(home.join("AppData").join("tweet"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn db_path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }

    pub async fn get_search_terms(&self) -> Result<Option<Vec<String>>, CoreError> {
        let Some(raw) = self.get(META_BUCKET, SEARCH_TERMS_KEY).await? else {
            return Ok(None);
        };
        let joined = decode_utf8(SEARCH_TERMS_KEY, raw)?;
        let terms = if joined.is_empty() {
            Vec::new()
        } else {
            joined.split(',').map(str::to_string).collect()
        };
        debug!("Fetched previous search terms {:?}", terms);
        Ok(Some(terms))
    }

    pub async fn set_search_terms(&self, terms: &[String]) -> Result<(), CoreError> {
        info!("Storing latest search terms {:?}", terms);
        let joined = terms.join(",").into_bytes();
        self.update(META_BUCKET, SEARCH_TERMS_KEY, |_| Some(joined))
            .await?;
        Ok(())
    }

    pub async fn get_cursor(&self) -> Result<Option<String>, CoreError> {
        match self.get(META_BUCKET, CURSOR_KEY).await? {
            Some(raw) => {
                let cursor = decode_utf8(CURSOR_KEY, raw)?;
                debug!("Fetched previous newest id [{}]", cursor);
                Ok(Some(cursor))
            }
            None => Ok(None),
        }
    }

    /// Stores `candidate` unless the stored cursor is already at or past it.
    /// Returns whether the cursor advanced.
    pub async fn set_cursor(&self, candidate: &str) -> Result<bool, CoreError> {
        if candidate.is_empty() {
            return Ok(false);
        }

        let advanced = self
            .update(META_BUCKET, CURSOR_KEY, |previous| {
                let previous = previous.map(String::from_utf8_lossy);
                match previous {
                    Some(prev) if compare_cursors(&prev, candidate) != Ordering::Less => {
                        debug!(
                            "Cached newest id [{}] is not older than [{}], keeping it",
                            prev, candidate
                        );
                        None
                    }
                    _ => Some(candidate.as_bytes().to_vec()),
                }
            })
            .await?;

        if advanced {
            info!("Stored latest newest id [{}]", candidate);
        }
        Ok(advanced)
    }

    async fn ensure_dir(&self) -> Result<(), CoreError> {
        if tokio::fs::metadata(&self.dir).await.is_ok() {
            return Ok(());
        }
        info!("Creating cache directory {}", self.dir.display());
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            CoreError::Cache(CacheError::DirectoryCreateFailed {
                path: self.dir.display().to_string(),
                reason: e.to_string(),
            })
        })
    }

    async fn open(&self) -> Result<SqliteConnection, CoreError> {
        self.ensure_dir().await?;
        let path = self.db_path();
        debug!("Opening cache store [{}]", path.display());

        SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .busy_timeout(self.busy_timeout)
            .connect()
            .await
            .map_err(|e| {
                CoreError::Cache(CacheError::OpenFailed {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })
            })
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>, CoreError> {
        let mut conn = self.open().await?;
        let mut tx = conn.begin().await.map_err(CacheError::from)?;

        create_bucket(&mut *tx, bucket).await?;
        let select = format!("SELECT value FROM \"{}\" WHERE key = ?1", bucket);
        let value: Option<Vec<u8>> = sqlx::query_scalar(&select)
            .bind(key)
            .fetch_optional(&mut *tx)
            .await
            .map_err(CacheError::from)?;

        tx.commit().await.map_err(CacheError::from)?;
        conn.close().await.map_err(CacheError::from)?;
        Ok(value)
    }

    /// Read-modify-write of one key inside a single transaction. `apply` sees
    /// the current value and returns the new one, or `None` to leave it as is.
    async fn update<F>(&self, bucket: &str, key: &str, apply: F) -> Result<bool, CoreError>
    where
        F: FnOnce(Option<&[u8]>) -> Option<Vec<u8>>,
    {
        let mut conn = self.open().await?;
        let mut tx = conn.begin().await.map_err(CacheError::from)?;

        create_bucket(&mut *tx, bucket).await?;
        let select = format!("SELECT value FROM \"{}\" WHERE key = ?1", bucket);
        let current: Option<Vec<u8>> = sqlx::query_scalar(&select)
            .bind(key)
            .fetch_optional(&mut *tx)
            .await
            .map_err(CacheError::from)?;

        let written = match apply(current.as_deref()) {
            Some(value) => {
                let upsert = format!(
                    "INSERT INTO \"{}\" (key, value) VALUES (?1, ?2) \
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                    bucket
                );
                sqlx::query(&upsert)
                    .bind(key)
                    .bind(value)
                    .execute(&mut *tx)
                    .await
                    .map_err(CacheError::from)?;
                true
            }
            None => false,
        };

        tx.commit().await.map_err(CacheError::from)?;
        conn.close().await.map_err(CacheError::from)?;
        Ok(written)
    }
}

async fn create_bucket(conn: &mut SqliteConnection, bucket: &str) -> Result<(), CoreError> {
    let ddl = format!(
        "CREATE TABLE IF NOT EXISTS \"{}\" (key TEXT PRIMARY KEY NOT NULL, value BLOB NOT NULL)",
        bucket
    );
    sqlx::query(&ddl)
        .execute(conn)
        .await
        .map_err(CacheError::from)?;
    Ok(())
}

fn decode_utf8(key: &str, raw: Vec<u8>) -> Result<String, CoreError> {
    String::from_utf8(raw).map_err(|_| {
        CoreError::Cache(CacheError::CorruptValue {
            key: key.to_string(),
        })
    })
}
