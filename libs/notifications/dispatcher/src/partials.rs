//! One-time registration of partial templates
//!
//! The configuration manifest names partials and the store file they come
//! from. Each one is fetched and registered into the engine's global
//! namespace. Problems with one partial are reported in its outcome and do
//! not stop the others.

use crate::error::{DispatchResult, StoreError};
use crate::job::is_unsafe_name;
use crate::metrics;
use crate::store::{partial_path, ContentStore};
use crate::templates::TemplateEngine;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// Manifest entry: register the file `partial/<source>.hbs` as `name`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PartialSpec {
    pub name: String,
    pub source: String,
}

impl PartialSpec {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }
}

/// Result of registering one partial
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialOutcome {
    pub name: String,
    pub failed: bool,
    pub reason: Option<String>,
}

impl PartialOutcome {
    fn registered(name: &str) -> Self {
        Self {
            name: name.to_string(),
            failed: false,
            reason: None,
        }
    }

    fn failed(name: &str, reason: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            failed: true,
            reason: Some(reason.into()),
        }
    }
}

enum Fetched {
    Invalid,
    Missing,
    Found(String),
    Failed(StoreError),
}

/// Fetch and register every partial in `specs`.
///
/// Fetches run concurrently; registration is applied afterwards in input
/// order, so a later spec with the same name overwrites an earlier one.
/// Outcomes are returned in input order.
///
/// A store failure (transport, auth, timeout) for any partial is returned as
/// an error once all specs have been walked: a partially configured engine
/// must not be treated as configured.
pub async fn register_all(
    store: &dyn ContentStore,
    engine: &TemplateEngine,
    specs: &[PartialSpec],
    call_timeout: Duration,
) -> DispatchResult<Vec<PartialOutcome>> {
    let fetched = join_all(specs.iter().map(|spec| async move {
        if is_unsafe_name(&spec.source) {
            return Fetched::Invalid;
        }

        let path = partial_path(&spec.source);
        match tokio::time::timeout(call_timeout, store.fetch(&path)).await {
            Ok(Ok(Some(text))) => Fetched::Found(text),
            Ok(Ok(None)) => Fetched::Missing,
            Ok(Err(e)) => Fetched::Failed(e),
            Err(_) => Fetched::Failed(StoreError::Timeout(path)),
        }
    }))
    .await;

    let mut outcomes = Vec::with_capacity(specs.len());
    let mut first_error: Option<StoreError> = None;

    for (spec, fetched) in specs.iter().zip(fetched) {
        let outcome = match fetched {
            Fetched::Invalid => PartialOutcome::failed(&spec.name, "invalid partial"),
            Fetched::Missing => PartialOutcome::failed(&spec.name, "empty or not found"),
            Fetched::Found(text) => match engine.register_partial(&spec.name, &text).await {
                Ok(()) => PartialOutcome::registered(&spec.name),
                Err(e) => PartialOutcome::failed(&spec.name, format!("invalid partial template: {}", e)),
            },
            Fetched::Failed(e) => {
                let outcome = PartialOutcome::failed(&spec.name, e.to_string());
                first_error.get_or_insert(e);
                outcome
            }
        };

        match &outcome.reason {
            None => info!(partial = %spec.name, source = %spec.source, "Partial registered"),
            Some(reason) => warn!(
                partial = %spec.name,
                source = %spec.source,
                reason = %reason,
                "Partial registration failed"
            ),
        }
        metrics::record_partial(outcome.failed);

        outcomes.push(outcome);
    }

    match first_error {
        Some(e) => Err(e.into()),
        None => Ok(outcomes),
    }
}
