//! Dispatcher - per-process context behind the queue entry point
//!
//! Owns the content store, template engine, template cache and batch
//! processor. The first invocation loads the configuration document and
//! registers its partials; later invocations go straight to processing.
//! Setup failures propagate and leave the dispatcher unconfigured, so the
//! next invocation tries again.

use crate::error::{DispatchError, DispatchResult};
use crate::job::QueueBatch;
use crate::manifest::{load_configuration, Configuration};
use crate::models::{BatchResponse, OutcomeRecord};
use crate::partials::register_all;
use crate::processor::BatchProcessor;
use crate::provider::{EmailProvider, SesProvider};
use crate::settings::DispatcherSettings;
use crate::store::{ContentStore, GithubContentStore, GithubStoreConfig};
use crate::templates::{TemplateCache, TemplateEngine};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{info, instrument, warn};

pub struct Dispatcher {
    store: Arc<dyn ContentStore>,
    engine: Arc<TemplateEngine>,
    cache: Arc<TemplateCache>,
    processor: BatchProcessor,
    config_path: String,
    call_timeout: Duration,
    configured: OnceCell<Configuration>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn ContentStore>,
        provider: Arc<dyn EmailProvider>,
        settings: &DispatcherSettings,
    ) -> Self {
        let engine = Arc::new(TemplateEngine::new());
        let cache = Arc::new(TemplateCache::new(
            Arc::clone(&store),
            settings.cache_templates,
        ));
        let processor = BatchProcessor::new(
            Arc::clone(&cache),
            Arc::clone(&engine),
            provider,
            settings,
        );

        Self {
            store,
            engine,
            cache,
            processor,
            config_path: settings.config_path.clone(),
            call_timeout: settings.call_timeout,
            configured: OnceCell::new(),
        }
    }

    /// Build the production dispatcher: GitHub content store and AWS SES.
    pub async fn from_settings(settings: &DispatcherSettings) -> DispatchResult<Self> {
        let store = GithubContentStore::new(
            GithubStoreConfig::new(&settings.repository, &settings.revision)
                .with_api_url(&settings.api_url)
                .with_token(settings.token.clone())
                .with_timeout(settings.call_timeout),
        )?;
        let provider = SesProvider::from_env(settings.from_header()).await;

        info!(
            repository = %settings.repository,
            revision = %settings.revision,
            cache_templates = settings.cache_templates,
            delivery_mode = ?settings.delivery_mode,
            max_concurrency = settings.max_concurrency,
            "Dispatcher initialized"
        );

        Ok(Self::new(Arc::new(store), Arc::new(provider), settings))
    }

    pub fn is_configured(&self) -> bool {
        self.configured.initialized()
    }

    /// The loaded configuration document, once setup has succeeded
    pub fn configuration(&self) -> Option<&Configuration> {
        self.configured.get()
    }

    pub fn engine(&self) -> &TemplateEngine {
        &self.engine
    }

    pub fn cache(&self) -> &TemplateCache {
        &self.cache
    }

    /// Load the configuration document and register its partials, once.
    ///
    /// Concurrent callers wait for the same setup run. A failed run leaves
    /// the cell empty.
    pub async fn ensure_configured(&self) -> DispatchResult<&Configuration> {
        self.configured
            .get_or_try_init(|| async {
                let configuration =
                    load_configuration(self.store.as_ref(), &self.config_path, self.call_timeout)
                        .await?;

                let outcomes = register_all(
                    self.store.as_ref(),
                    &self.engine,
                    &configuration.partials,
                    self.call_timeout,
                )
                .await?;

                let failed = outcomes.iter().filter(|o| o.failed).count();
                if failed > 0 {
                    warn!(
                        failed,
                        total = outcomes.len(),
                        "Some partials could not be registered"
                    );
                }
                info!(
                    partials = outcomes.len() - failed,
                    "Dispatcher configured"
                );

                Ok::<_, DispatchError>(configuration)
            })
            .await
    }

    /// Handle one queue invocation.
    ///
    /// Returns the ids the queue should redeliver. Only setup failures are
    /// returned as errors; item failures are reported in the response.
    #[instrument(skip_all, fields(batch_size = batch.records.len()))]
    pub async fn handle(&self, batch: QueueBatch) -> DispatchResult<BatchResponse> {
        self.ensure_configured().await?;

        let outcomes = self.processor.process(batch.records).await;
        Ok(reduce_failures(&outcomes))
    }
}

/// Collapse ordered outcomes into the queue's partial-failure response
pub fn reduce_failures(outcomes: &[OutcomeRecord]) -> BatchResponse {
    BatchResponse::from_outcomes(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::job::QueueRecord;
    use crate::provider::MockProvider;
    use crate::store::{InMemoryContentStore, MockContentStore};
    use serde_json::json;

    fn settings() -> DispatcherSettings {
        DispatcherSettings::new("acme/mail-content", "noreply@acme.test")
    }

    fn record(id: &str, template: &str) -> QueueRecord {
        QueueRecord::new(
            id,
            json!({
                "template": template,
                "data": { "name": "Ada" },
                "subject": "Hello",
                "addresse": "ada@example.com",
            })
            .to_string(),
        )
    }

    fn batch(records: Vec<QueueRecord>) -> QueueBatch {
        QueueBatch { records }
    }

    #[test]
    fn test_reduce_failures_keeps_failed_ids_in_order() {
        let response = reduce_failures(&[
            OutcomeRecord::failure("3", "x"),
            OutcomeRecord::success("1"),
            OutcomeRecord::failure("2", "y"),
        ]);

        assert_eq!(response.failed_ids(), vec!["3", "2"]);
        assert!(reduce_failures(&[]).batch_item_failures.is_empty());
    }

    #[tokio::test]
    async fn test_missing_configuration_document_still_processes() {
        let store = InMemoryContentStore::new().with_file("email/welcome", "Hi {{name}}");
        let provider = MockProvider::new();
        let dispatcher = Dispatcher::new(Arc::new(store), Arc::new(provider.clone()), &settings());

        let response = dispatcher
            .handle(batch(vec![record("1", "welcome")]))
            .await
            .unwrap();

        assert!(response.batch_item_failures.is_empty());
        assert!(dispatcher.is_configured());
        assert_eq!(dispatcher.configuration(), Some(&Configuration::default()));
        assert_eq!(provider.sent_emails().await[0].body_html, "Hi Ada");
    }

    #[tokio::test]
    async fn test_partials_registered_before_rendering() {
        let store = InMemoryContentStore::new()
            .with_file("config.json", r#"{"partials":[{"name":"footer","source":"footer"}]}"#)
            .with_file("/partial/footer.hbs", "-- {{name}}")
            .with_file("email/welcome", "Hi {{> footer}}");
        let provider = MockProvider::new();
        let dispatcher = Dispatcher::new(Arc::new(store), Arc::new(provider.clone()), &settings());

        dispatcher
            .handle(batch(vec![record("1", "welcome")]))
            .await
            .unwrap();

        assert!(dispatcher.engine().has_partial("footer").await);
        assert_eq!(provider.sent_emails().await[0].body_html, "Hi -- Ada");
    }

    #[tokio::test]
    async fn test_malformed_configuration_fails_invocation_and_retries() {
        let store = InMemoryContentStore::new()
            .with_file("config.json", "{ partials: nope")
            .with_file("email/welcome", "Hi");
        let provider = MockProvider::new();
        let dispatcher =
            Dispatcher::new(Arc::new(store.clone()), Arc::new(provider.clone()), &settings());

        let err = dispatcher
            .handle(batch(vec![record("1", "welcome")]))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Configuration { .. }));
        assert!(!dispatcher.is_configured());
        assert_eq!(provider.sent_count().await, 0);

        store.insert("config.json", r#"{"partials":[]}"#).await;

        let response = dispatcher
            .handle(batch(vec![record("2", "welcome")]))
            .await
            .unwrap();
        assert!(response.batch_item_failures.is_empty());
        assert!(dispatcher.is_configured());
        assert_eq!(store.fetch_count("config.json").await, 2);
    }

    #[tokio::test]
    async fn test_partial_store_failure_leaves_unconfigured() {
        let store = InMemoryContentStore::new()
            .with_file("config.json", r#"{"partials":[{"name":"footer","source":"footer"}]}"#)
            .with_failure("/partial/footer.hbs");
        let dispatcher = Dispatcher::new(Arc::new(store), Arc::new(MockProvider::new()), &settings());

        let err = dispatcher.ensure_configured().await.unwrap_err();
        assert!(matches!(err, DispatchError::Store(StoreError::Status { .. })));
        assert!(!dispatcher.is_configured());
    }

    #[tokio::test]
    async fn test_configuration_runs_once() {
        let mut store = MockContentStore::new();
        store
            .expect_fetch()
            .withf(|path| path == "config.json")
            .times(1)
            .returning(|_| Ok(None));
        store
            .expect_fetch()
            .withf(|path| path == "email/welcome")
            .times(1)
            .returning(|_| Ok(Some("Hi".to_string())));

        let dispatcher = Dispatcher::new(Arc::new(store), Arc::new(MockProvider::new()), &settings());

        for id in ["1", "2", "3"] {
            let response = dispatcher.handle(batch(vec![record(id, "welcome")])).await.unwrap();
            assert!(response.batch_item_failures.is_empty());
        }
        assert_eq!(dispatcher.cache().len().await, 1);
    }

    #[tokio::test]
    async fn test_item_failures_reported_by_id() {
        let store = InMemoryContentStore::new().with_file("email/welcome", "Hi");
        let dispatcher = Dispatcher::new(Arc::new(store), Arc::new(MockProvider::new()), &settings());

        let response = dispatcher
            .handle(batch(vec![
                record("a", "welcome"),
                record("b", "unknown"),
                record("c", "/etc/passwd"),
                record("d", "welcome"),
            ]))
            .await
            .unwrap();

        assert_eq!(response.failed_ids(), vec!["b", "c"]);
    }
}
