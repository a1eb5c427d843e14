//! Queue-driven email dispatcher
//!
//! Consumes batches of email requests from a queue, renders each one with a
//! Handlebars template fetched from a versioned content repository, and sends
//! it through AWS SES. Failures are reported per message so the queue only
//! redelivers what actually failed.
//!
//! ## Components
//!
//! - **Content store**: `ContentStore` trait, `GithubContentStore`, `InMemoryContentStore`
//! - **Templates**: `TemplateEngine` (global partials), `TemplateCache` (compiled page templates)
//! - **Setup**: `load_configuration` and `register_all` (partials), run once by the `Dispatcher`
//! - **Processing**: `BatchProcessor`, concurrent and order-preserving
//! - **Providers**: `SesProvider` and `MockProvider`
//!
//! ## Usage
//!
//! ```ignore
//! use core_config::FromEnv;
//! use email_dispatcher::{Dispatcher, DispatcherSettings};
//!
//! let settings = DispatcherSettings::from_env()?;
//! let dispatcher = Dispatcher::from_settings(&settings).await?;
//! let response = dispatcher.handle(batch).await?;
//! ```

pub mod dispatcher;
pub mod error;
pub mod job;
pub mod manifest;
pub mod metrics;
pub mod models;
pub mod partials;
pub mod processor;
pub mod provider;
pub mod settings;
pub mod store;
pub mod templates;

pub use dispatcher::{reduce_failures, Dispatcher};
pub use error::{DispatchError, DispatchResult, ItemError, StoreError, TemplateError};
pub use job::{QueueBatch, QueueRecord, WorkItem};
pub use manifest::{load_configuration, Configuration};
pub use models::{BatchItemFailure, BatchResponse, Email, OutcomeRecord};
pub use partials::{register_all, PartialOutcome, PartialSpec};
pub use processor::BatchProcessor;
pub use provider::{EmailProvider, MockProvider, SendResult, SesProvider};
pub use settings::{DeliveryMode, DispatcherSettings};
pub use store::{ContentStore, GithubContentStore, GithubStoreConfig, InMemoryContentStore};
pub use templates::{CompiledTemplate, TemplateCache, TemplateEngine};
