#[cfg(test)]
mod tests {
    use crate::KeyValueCache;
    use std::env;
    use tweetwatch_core::{CacheConfig, CoreError};

    fn setup_test_cache() -> KeyValueCache {
        let dir = env::temp_dir()
            .join(format!("test_tweetwatch_{}", uuid::Uuid::new_v4()))
            .join("nested");
        KeyValueCache::new(dir)
    }

    #[tokio::test]
    async fn test_bootstraps_directory() {
        let cache = setup_test_cache();
        assert!(!cache.dir().exists());

        assert_eq!(cache.get_cursor().await.unwrap(), None);
        assert!(cache.dir().exists());
        assert!(cache.db_path().exists());
    }

    #[test]
    fn test_new_uses_default_file_name() {
        let cache = KeyValueCache::new("/tmp/tweetwatch_defaults");
        assert_eq!(
            cache.db_path(),
            std::path::Path::new("/tmp/tweetwatch_defaults").join(CacheConfig::default().file_name)
        );
    }

    #[tokio::test]
    async fn test_missing_entries_are_none() {
        let cache = setup_test_cache();
        assert_eq!(cache.get_search_terms().await.unwrap(), None);
        assert_eq!(cache.get_cursor().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_search_terms_roundtrip() {
        let cache = setup_test_cache();
        let terms = vec!["oil".to_string(), "central bank".to_string()];

        cache.set_search_terms(&terms).await.unwrap();
        assert_eq!(cache.get_search_terms().await.unwrap(), Some(terms));

        let replaced = vec!["gold".to_string()];
        cache.set_search_terms(&replaced).await.unwrap();
        assert_eq!(cache.get_search_terms().await.unwrap(), Some(replaced));
    }

    #[tokio::test]
    async fn test_cursor_never_regresses() {
        let cache = setup_test_cache();

        assert!(cache.set_cursor("100").await.unwrap());
        assert!(cache.set_cursor("150").await.unwrap());
        assert_eq!(cache.get_cursor().await.unwrap(), Some("150".to_string()));

        assert!(!cache.set_cursor("120").await.unwrap());
        assert_eq!(cache.get_cursor().await.unwrap(), Some("150".to_string()));

        assert!(!cache.set_cursor("150").await.unwrap());
        assert_eq!(cache.get_cursor().await.unwrap(), Some("150".to_string()));
    }

    #[tokio::test]
    async fn test_cursor_is_max_of_writes() {
        let cache = setup_test_cache();
        let writes = ["1500", "99", "1499", "20000", "1", "19999"];

        for id in writes {
            cache.set_cursor(id).await.unwrap();
        }

        assert_eq!(cache.get_cursor().await.unwrap(), Some("20000".to_string()));
    }

    #[tokio::test]
    async fn test_cursor_compares_numerically() {
        let cache = setup_test_cache();

        cache.set_cursor("99").await.unwrap();
        assert!(cache.set_cursor("100").await.unwrap());
        assert_eq!(cache.get_cursor().await.unwrap(), Some("100".to_string()));
    }

    #[tokio::test]
    async fn test_empty_cursor_is_ignored() {
        let cache = setup_test_cache();
        cache.set_cursor("42").await.unwrap();

        assert!(!cache.set_cursor("").await.unwrap());
        assert_eq!(cache.get_cursor().await.unwrap(), Some("42".to_string()));
    }

    #[tokio::test]
    async fn test_entries_survive_new_instances() {
        let cache = setup_test_cache();
        cache.set_cursor("1234").await.unwrap();

        let reopened = KeyValueCache::new(cache.dir().to_path_buf());
        assert_eq!(reopened.get_cursor().await.unwrap(), Some("1234".to_string()));
    }

    #[tokio::test]
    async fn test_from_config_uses_file_name() {
        let dir = env::temp_dir().join(format!("test_tweetwatch_{}", uuid::Uuid::new_v4()));
        let config = CacheConfig {
            dir: Some(dir.clone()),
            file_name: "custom.db".to_string(),
            ..CacheConfig::default()
        };

        let cache = KeyValueCache::from_config(&config).unwrap();
        cache.set_search_terms(&["fx".to_string()]).await.unwrap();
        assert!(dir.join("custom.db").exists());
    }

    #[tokio::test]
    async fn test_directory_creation_failure() {
        let blocker = env::temp_dir().join(format!("test_tweetwatch_file_{}", uuid::Uuid::new_v4()));
        std::fs::write(&blocker, b"not a directory").unwrap();

        let cache = KeyValueCache::new(blocker.join("cache"));
        let result = cache.get_cursor().await;
        assert!(matches!(result, Err(CoreError::Cache(_))));
    }
}
