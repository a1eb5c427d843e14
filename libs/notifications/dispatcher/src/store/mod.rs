//! Content store clients
//!
//! The content store is a versioned text repository holding the configuration
//! document, partial fragments and page templates. Every fetch is pinned to
//! the revision the client was built with.

pub mod github;
pub mod memory;

pub use github::{GithubContentStore, GithubStoreConfig};
pub use memory::InMemoryContentStore;

use crate::error::StoreError;
use async_trait::async_trait;

/// Read-only access to named text blobs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Fetch and decode the blob at `path`.
    ///
    /// Returns `Ok(None)` when the store has no content there. Transport and
    /// permission problems are errors.
    async fn fetch(&self, path: &str) -> Result<Option<String>, StoreError>;
}

/// Store path of a page template
pub fn template_path(name: &str) -> String {
    format!("email/{}", name)
}

/// Store path of a partial fragment
pub fn partial_path(source: &str) -> String {
    format!("/partial/{}.hbs", source)
}

/// Repository-relative form of a logical path
pub(crate) fn normalize_path(path: &str) -> &str {
    path.trim_start_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        assert_eq!(template_path("welcome"), "email/welcome");
        assert_eq!(partial_path("footer"), "/partial/footer.hbs");
        assert_eq!(normalize_path("/partial/footer.hbs"), "partial/footer.hbs");
        assert_eq!(normalize_path("email/welcome"), "email/welcome");
    }
}
