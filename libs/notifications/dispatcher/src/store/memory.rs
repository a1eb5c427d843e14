//! In-memory content store for local runs and tests

use super::{normalize_path, ContentStore};
use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    files: HashMap<String, String>,
    failing: HashSet<String>,
    delays: HashMap<String, Duration>,
    fetches: HashMap<String, usize>,
}

/// Content store holding files in memory.
///
/// Paths are normalized the same way as the remote store, so `/partial/a.hbs`
/// and `partial/a.hbs` address the same file. Fetches are counted per path.
#[derive(Clone, Default)]
pub struct InMemoryContentStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert) for test setup
    pub fn with_file(self, path: &str, content: impl Into<String>) -> Self {
        if let Ok(mut inner) = self.inner.try_write() {
            inner
                .files
                .insert(normalize_path(path).to_string(), content.into());
        }
        self
    }

    /// Make every fetch of `path` fail with a transport-style error
    pub fn with_failure(self, path: &str) -> Self {
        if let Ok(mut inner) = self.inner.try_write() {
            inner.failing.insert(normalize_path(path).to_string());
        }
        self
    }

    /// Delay every fetch of `path`
    pub fn with_delay(self, path: &str, delay: Duration) -> Self {
        if let Ok(mut inner) = self.inner.try_write() {
            inner.delays.insert(normalize_path(path).to_string(), delay);
        }
        self
    }

    pub async fn insert(&self, path: &str, content: impl Into<String>) {
        self.inner
            .write()
            .await
            .files
            .insert(normalize_path(path).to_string(), content.into());
    }

    pub async fn clear_failure(&self, path: &str) {
        self.inner.write().await.failing.remove(normalize_path(path));
    }

    /// Number of fetches for `path` so far
    pub async fn fetch_count(&self, path: &str) -> usize {
        self.inner
            .read()
            .await
            .fetches
            .get(normalize_path(path))
            .copied()
            .unwrap_or(0)
    }

    /// Number of fetches across all paths
    pub async fn total_fetches(&self) -> usize {
        self.inner.read().await.fetches.values().sum()
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn fetch(&self, path: &str) -> Result<Option<String>, StoreError> {
        let key = normalize_path(path).to_string();

        let delay = {
            let mut inner = self.inner.write().await;
            *inner.fetches.entry(key.clone()).or_insert(0) += 1;
            inner.delays.get(&key).copied()
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let inner = self.inner.read().await;
        if inner.failing.contains(&key) {
            return Err(StoreError::Status {
                path: key,
                status: 503,
                body: "injected failure".to_string(),
            });
        }

        Ok(inner
            .files
            .get(&key)
            .filter(|content| !content.is_empty())
            .cloned())
    }
}
