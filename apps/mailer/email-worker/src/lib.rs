//! Email Worker
//!
//! Lambda function subscribed to the email request queue.
//!
//! ## Architecture
//!
//! ```text
//! SQS queue (email requests)
//!   ↓ (batch event)
//! Dispatcher (config + partials once per container)
//!   ↓ (per message: template from the content repository, Handlebars render)
//! AWS SES
//!   ↓
//! batchItemFailures → SQS redelivers only the failed messages
//! ```
//!
//! The dispatcher is built once per container and reused by every
//! invocation, so the template cache and registered partials survive warm
//! starts.

use core_config::{app_info, Environment, FromEnv};
use email_dispatcher::{BatchResponse, Dispatcher, DispatcherSettings, QueueBatch};
use eyre::{eyre, Result, WrapErr};
use lambda_runtime::{service_fn, LambdaEvent};
use std::sync::Arc;
use tracing::{error, info};

/// Handle a single SQS batch event
async fn handle_event(
    dispatcher: &Dispatcher,
    event: LambdaEvent<QueueBatch>,
) -> Result<BatchResponse, lambda_runtime::Error> {
    let request_id = event.context.request_id.clone();

    match dispatcher.handle(event.payload).await {
        Ok(response) => {
            info!(
                request_id = %request_id,
                failed = response.batch_item_failures.len(),
                "Invocation complete"
            );
            Ok(response)
        }
        Err(e) => {
            // Failing the invocation makes the queue redeliver the whole batch
            error!(request_id = %request_id, error = %e, "Invocation failed");
            Err(e.into())
        }
    }
}

/// Run the email worker
///
/// 1. Installs color-eyre and structured logging (JSON in production)
/// 2. Loads [`DispatcherSettings`] from the environment
/// 3. Builds the dispatcher (GitHub content store, AWS SES)
/// 4. Hands control to the Lambda runtime loop
///
/// # Errors
///
/// Returns an error if the settings are invalid, the content store client
/// cannot be built, or the runtime loop fails.
pub async fn run() -> Result<()> {
    core_config::tracing::install_color_eyre();

    let environment = Environment::from_env();
    core_config::tracing::init_tracing(&environment);

    let app_info = app_info!();
    info!(name = %app_info.name, version = %app_info.version, "Starting email worker");
    info!("Environment: {:?}", environment);

    let settings =
        DispatcherSettings::from_env().wrap_err("Failed to load dispatcher settings")?;

    let dispatcher = Arc::new(
        Dispatcher::from_settings(&settings)
            .await
            .wrap_err("Failed to initialize dispatcher")?,
    );

    lambda_runtime::run(service_fn(move |event: LambdaEvent<QueueBatch>| {
        let dispatcher = Arc::clone(&dispatcher);
        async move { handle_event(&dispatcher, event).await }
    }))
    .await
    .map_err(|e| eyre!("Lambda runtime failed: {}", e))?;

    info!("Email worker stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use email_dispatcher::{InMemoryContentStore, MockProvider, QueueRecord};
    use lambda_runtime::Context;

    fn dispatcher(store: InMemoryContentStore) -> Dispatcher {
        Dispatcher::new(
            Arc::new(store),
            Arc::new(MockProvider::new()),
            &DispatcherSettings::new("acme/mail-content", "noreply@acme.test"),
        )
    }

    fn event(records: Vec<QueueRecord>) -> LambdaEvent<QueueBatch> {
        LambdaEvent::new(QueueBatch { records }, Context::default())
    }

    #[tokio::test]
    async fn test_handle_event_reports_failed_items() {
        let dispatcher = dispatcher(InMemoryContentStore::new());

        let response = handle_event(&dispatcher, event(vec![QueueRecord::new("1", "{}")]))
            .await
            .unwrap();

        assert_eq!(response.failed_ids(), vec!["1"]);
    }

    #[tokio::test]
    async fn test_handle_event_fails_on_bad_configuration() {
        let store = InMemoryContentStore::new().with_file("config.json", "[not an object");
        let dispatcher = dispatcher(store);

        let result = handle_event(&dispatcher, event(vec![QueueRecord::new("1", "{}")])).await;

        assert!(result.is_err());
        assert!(!dispatcher.is_configured());
    }
}
