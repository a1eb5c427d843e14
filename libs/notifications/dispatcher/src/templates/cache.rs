use super::CompiledTemplate;
use crate::error::TemplateError;
use crate::metrics;
use crate::store::{template_path, ContentStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Lazily populated map of template name to compiled template.
///
/// Entries are never evicted or replaced: when two lookups for the same name
/// miss concurrently, both compile and the first insert wins. With caching
/// disabled nothing is kept and every lookup fetches and compiles.
pub struct TemplateCache {
    store: Arc<dyn ContentStore>,
    enabled: bool,
    entries: RwLock<HashMap<String, Arc<CompiledTemplate>>>,
}

impl TemplateCache {
    pub fn new(store: Arc<dyn ContentStore>, enabled: bool) -> Self {
        Self {
            store,
            enabled,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Get the compiled template for `name`, fetching `email/<name>` on a miss
    pub async fn get(&self, name: &str) -> Result<Arc<CompiledTemplate>, TemplateError> {
        if !self.enabled {
            return self.load(name).await.map(Arc::new);
        }

        if let Some(hit) = self.entries.read().await.get(name).cloned() {
            metrics::record_cache_lookup(true);
            return Ok(hit);
        }

        metrics::record_cache_lookup(false);
        let compiled = Arc::new(self.load(name).await?);

        let mut entries = self.entries.write().await;
        Ok(Arc::clone(
            entries.entry(name.to_string()).or_insert(compiled),
        ))
    }

    /// Number of cached templates
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.entries.read().await.contains_key(name)
    }

    async fn load(&self, name: &str) -> Result<CompiledTemplate, TemplateError> {
        let path = template_path(name);
        debug!(template = %name, path = %path, "Loading template");

        let source = self
            .store
            .fetch(&path)
            .await?
            .ok_or(TemplateError::NotFound(path))?;

        CompiledTemplate::compile(name, &source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryContentStore, MockContentStore};

    #[tokio::test]
    async fn test_cached_lookup_fetches_once() {
        let store = InMemoryContentStore::new().with_file("email/welcome", "Hi {{name}}");
        let cache = TemplateCache::new(Arc::new(store.clone()), true);

        let first = cache.get("welcome").await.unwrap();
        let second = cache.get("welcome").await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.fetch_count("email/welcome").await, 1);
        assert!(cache.contains("welcome").await);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_disabled_cache_fetches_every_time() {
        let store = InMemoryContentStore::new().with_file("email/welcome", "Hi {{name}}");
        let cache = TemplateCache::new(Arc::new(store.clone()), false);

        for _ in 0..3 {
            cache.get("welcome").await.unwrap();
        }

        assert_eq!(store.fetch_count("email/welcome").await, 3);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_missing_template() {
        let cache = TemplateCache::new(Arc::new(InMemoryContentStore::new()), true);

        let err = cache.get("nope").await.unwrap_err();
        assert_eq!(err.to_string(), "template not found: email/nope");
        assert!(!cache.contains("nope").await);
    }

    #[tokio::test]
    async fn test_failed_compile_is_not_cached() {
        let store = InMemoryContentStore::new().with_file("email/broken", "{{#each items}}");
        let cache = TemplateCache::new(Arc::new(store.clone()), true);

        assert!(matches!(
            cache.get("broken").await,
            Err(TemplateError::Compile { .. })
        ));
        assert!(matches!(
            cache.get("broken").await,
            Err(TemplateError::Compile { .. })
        ));
        assert_eq!(store.fetch_count("email/broken").await, 2);
    }

    #[tokio::test]
    async fn test_store_error_surfaces() {
        let mut store = MockContentStore::new();
        store
            .expect_fetch()
            .withf(|path| path == "email/welcome")
            .times(1)
            .returning(|path| Err(crate::error::StoreError::Timeout(path.to_string())));

        let cache = TemplateCache::new(Arc::new(store), true);
        let err = cache.get("welcome").await.unwrap_err();

        assert!(matches!(err, TemplateError::Store(_)));
    }

    #[tokio::test]
    async fn test_concurrent_misses_converge_on_one_entry() {
        let store = InMemoryContentStore::new()
            .with_file("email/welcome", "Hi")
            .with_delay("email/welcome", std::time::Duration::from_millis(20));
        let cache = Arc::new(TemplateCache::new(Arc::new(store.clone()), true));

        let (a, b) = tokio::join!(cache.get("welcome"), cache.get("welcome"));
        let (a, b) = (a.unwrap(), b.unwrap());

        // Both missed and compiled, but the cache holds a single entry afterwards
        assert_eq!(store.fetch_count("email/welcome").await, 2);
        let third = cache.get("welcome").await.unwrap();
        assert!(Arc::ptr_eq(&third, &a) || Arc::ptr_eq(&third, &b));
        assert_eq!(cache.len().await, 1);
    }
}
