//! Dispatcher metrics
//!
//! Recorded through the `metrics` facade. Without an installed recorder
//! (e.g. in tests or a function runtime without a scrape endpoint) these
//! calls are no-ops.

use metrics::{counter, histogram};
use std::time::Duration;

/// Item outcome labels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    Sent,
    Invalid,
    TemplateFailed,
    SendFailed,
    Panicked,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Sent => "sent",
            ItemStatus::Invalid => "invalid",
            ItemStatus::TemplateFailed => "template_failed",
            ItemStatus::SendFailed => "send_failed",
            ItemStatus::Panicked => "panicked",
        }
    }
}

pub fn record_item(status: ItemStatus) {
    counter!("email_dispatcher_items_total", "status" => status.as_str()).increment(1);
}

pub fn record_partial(failed: bool) {
    let status = if failed { "failed" } else { "registered" };
    counter!("email_dispatcher_partials_total", "status" => status).increment(1);
}

pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("email_dispatcher_template_cache_total", "result" => result).increment(1);
}

pub fn record_batch(size: usize, failed: usize, duration: Duration) {
    histogram!("email_dispatcher_batch_size").record(size as f64);
    counter!("email_dispatcher_batch_failures_total").increment(failed as u64);
    histogram!("email_dispatcher_batch_duration_seconds").record(duration.as_secs_f64());
}
