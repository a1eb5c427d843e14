//! BatchProcessor - renders and sends every record of a queue batch
//!
//! Each record runs as its own tokio task, so the network-bound work of
//! different items overlaps (bounded by a semaphore). Every task carries the
//! index of its record, and results are written into a pre-sized slot vector,
//! so the returned outcomes follow input order no matter which item finishes
//! first. A failing or panicking item only ever produces its own failure
//! record.

use crate::error::{StoreError, TemplateError};
use crate::job::{QueueRecord, WorkItem};
use crate::metrics::{self, ItemStatus};
use crate::models::{Email, OutcomeRecord};
use crate::provider::{EmailProvider, SendResult};
use crate::settings::{DeliveryMode, DispatcherSettings};
use crate::store::template_path;
use crate::templates::{TemplateCache, TemplateEngine};
use eyre::eyre;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Processes queue batches into per-record outcomes
#[derive(Clone)]
pub struct BatchProcessor {
    cache: Arc<TemplateCache>,
    engine: Arc<TemplateEngine>,
    provider: Arc<dyn EmailProvider>,
    from: Arc<str>,
    delivery_mode: DeliveryMode,
    call_timeout: Duration,
    concurrency: Arc<Semaphore>,
}

impl BatchProcessor {
    pub fn new(
        cache: Arc<TemplateCache>,
        engine: Arc<TemplateEngine>,
        provider: Arc<dyn EmailProvider>,
        settings: &DispatcherSettings,
    ) -> Self {
        Self {
            cache,
            engine,
            provider,
            from: Arc::from(settings.from_header()),
            delivery_mode: settings.delivery_mode,
            call_timeout: settings.call_timeout,
            concurrency: Arc::new(Semaphore::new(settings.max_concurrency.max(1))),
        }
    }

    /// Process `records` and return exactly one outcome per record, in input order.
    pub async fn process(&self, records: Vec<QueueRecord>) -> Vec<OutcomeRecord> {
        let started = Instant::now();
        let ids: Vec<String> = records.iter().map(|r| r.message_id.clone()).collect();
        let mut slots: Vec<Option<OutcomeRecord>> = vec![None; records.len()];
        let mut tasks: JoinSet<(usize, OutcomeRecord)> = JoinSet::new();

        debug!(batch_size = records.len(), "Processing batch");

        for (index, record) in records.into_iter().enumerate() {
            let processor = self.clone();
            let span = info_span!("dispatch_item", index, message_id = %record.message_id);

            tasks.spawn(
                async move {
                    let _permit = processor.concurrency.acquire().await.ok();
                    let id = record.message_id.clone();

                    let outcome = AssertUnwindSafe(processor.process_record(record))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|_| {
                            error!("Item processing panicked");
                            metrics::record_item(ItemStatus::Panicked);
                            OutcomeRecord::failure(id, "item processing panicked")
                        });

                    (index, outcome)
                }
                .instrument(span),
            );
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => slots[index] = Some(outcome),
                Err(e) => error!(error = %e, "Item task did not complete"),
            }
        }

        let outcomes: Vec<OutcomeRecord> = slots
            .into_iter()
            .zip(ids)
            .map(|(slot, id)| {
                slot.unwrap_or_else(|| OutcomeRecord::failure(id, "item processing did not complete"))
            })
            .collect();

        let failed = outcomes.iter().filter(|o| o.failed).count();
        metrics::record_batch(outcomes.len(), failed, started.elapsed());
        info!(
            batch_size = outcomes.len(),
            failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Batch processed"
        );

        outcomes
    }

    async fn process_record(&self, record: QueueRecord) -> OutcomeRecord {
        let item = match WorkItem::parse(&record) {
            Ok(item) => item,
            Err(e) => {
                warn!(error = %e, "Rejected message");
                metrics::record_item(ItemStatus::Invalid);
                return OutcomeRecord::failure(record.message_id, e.to_string());
            }
        };

        let body = match self.render(&item).await {
            Ok(body) => body,
            Err(e) => {
                warn!(template = %item.template_name, error = %e, "Template rendering failed");
                metrics::record_item(ItemStatus::TemplateFailed);
                return OutcomeRecord::failure(item.id, e.to_string());
            }
        };

        let email = Email::new(&item.recipient, &item.subject, body)
            .with_id(&item.id)
            .with_from(self.from.as_ref());

        match (self.deliver(&email).await, self.delivery_mode) {
            (Ok(result), _) => {
                info!(
                    template = %item.template_name,
                    to = %item.recipient,
                    provider_message_id = %result.message_id,
                    "Email sent"
                );
                metrics::record_item(ItemStatus::Sent);
                OutcomeRecord::success(item.id)
            }
            (Err(e), DeliveryMode::BestEffort) => {
                error!(
                    template = %item.template_name,
                    to = %item.recipient,
                    error = %e,
                    "Email delivery failed, not retried in best-effort mode"
                );
                metrics::record_item(ItemStatus::SendFailed);
                OutcomeRecord::success(item.id)
            }
            (Err(e), DeliveryMode::Confirmed) => {
                warn!(
                    template = %item.template_name,
                    to = %item.recipient,
                    error = %e,
                    "Email delivery failed"
                );
                metrics::record_item(ItemStatus::SendFailed);
                OutcomeRecord::failure(item.id, format!("delivery failed: {}", e))
            }
        }
    }

    async fn render(&self, item: &WorkItem) -> Result<String, TemplateError> {
        let template = tokio::time::timeout(self.call_timeout, self.cache.get(&item.template_name))
            .await
            .map_err(|_| StoreError::Timeout(template_path(&item.template_name)))??;

        self.engine.render(&template, &item.template_data).await
    }

    async fn deliver(&self, email: &Email) -> eyre::Result<SendResult> {
        match tokio::time::timeout(self.call_timeout, self.provider.send(email)).await {
            Ok(result) => result,
            Err(_) => Err(eyre!(
                "{} transport timed out after {}ms",
                self.provider.name(),
                self.call_timeout.as_millis()
            )),
        }
    }
}
